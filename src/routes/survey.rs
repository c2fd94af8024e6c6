use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::constants::{MAX_REPORTED_ELAPSED_MS, MAX_SELECTED_OPTIONS};
use crate::extractors::JsonBody;
use crate::response::{created, ok, AppError};
use crate::state::AppState;
use crate::survey::types::{
    AnswerSubmission, ChallengePayload, Phase, ProficiencyHint, SessionStatus, StepOutcome,
    SurveySession, TriMetricReport,
};

/// 对外的题目视图：只暴露选项 id 与文本，不含角色和答案
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeView {
    challenge_id: String,
    question_index: u32,
    word: String,
    options: Vec<OptionView>,
    time_limit_ms: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionView {
    id: String,
    text: String,
}

impl From<&ChallengePayload> for ChallengeView {
    fn from(c: &ChallengePayload) -> Self {
        Self {
            challenge_id: c.challenge_id.clone(),
            question_index: c.question_index,
            word: c.word_text.clone(),
            options: c
                .options
                .iter()
                .map(|o| OptionView {
                    id: o.id.clone(),
                    text: o.text.clone(),
                })
                .collect(),
            time_limit_ms: c.time_limit_ms,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    id: String,
    status: SessionStatus,
    phase: Phase,
    questions_answered: u32,
    low_bound: u32,
    high_bound: u32,
    confidence: f64,
}

impl From<&SurveySession> for SessionSummary {
    fn from(s: &SurveySession) -> Self {
        Self {
            id: s.id.clone(),
            status: s.status,
            phase: s.phase,
            questions_answered: s.question_count(),
            low_bound: s.low_bound,
            high_bound: s.high_bound,
            confidence: s.confidence,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum StepView {
    Continue {
        session: SessionSummary,
        challenge: ChallengeView,
    },
    Complete {
        session: SessionSummary,
        report: TriMetricReport,
    },
}

impl From<&StepOutcome> for StepView {
    fn from(outcome: &StepOutcome) -> Self {
        match outcome {
            StepOutcome::Continue { session, challenge } => Self::Continue {
                session: session.into(),
                challenge: challenge.into(),
            },
            StepOutcome::Complete { session, report } => Self::Complete {
                session: session.into(),
                report: report.clone(),
            },
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/start", post(start_survey))
        .route("/config", get(active_config))
        .route("/:id", get(get_survey))
        .route("/:id/answer", post(submit_answer))
        .route("/:id/report", get(get_report))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartSurveyRequest {
    hint: Option<String>,
}

/// Active tuning (question budget, time limit, benchmarks) so clients can
/// size their UI; changes after a SIGHUP reload.
async fn active_config(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    ok(state.surveys().get_config().await)
}

async fn start_survey(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<StartSurveyRequest>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let hint = match req.hint.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(ProficiencyHint::parse(raw).ok_or_else(|| {
            AppError::bad_request("INVALID_HINT", "hint must be one of A1, A2, B1, B2, C1, C2")
        })?),
    };

    let (session, challenge) = state.surveys().start_survey(hint).await?;

    Ok(created(serde_json::json!({
        "session": SessionSummary::from(&session),
        "challenge": ChallengeView::from(&challenge),
    })))
}

async fn submit_answer(
    Path(id): Path<String>,
    State(state): State<AppState>,
    JsonBody(submission): JsonBody<AnswerSubmission>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    if submission.selected.len() > MAX_SELECTED_OPTIONS {
        return Err(AppError::bad_request(
            "INVALID_ANSWER",
            &format!("at most {MAX_SELECTED_OPTIONS} options may be selected"),
        ));
    }
    if submission.elapsed_ms > MAX_REPORTED_ELAPSED_MS {
        return Err(AppError::bad_request("INVALID_ANSWER", "elapsedMs is out of range"));
    }

    let outcome = state.surveys().submit_answer(&id, &submission).await?;
    Ok(ok(StepView::from(&outcome)))
}

async fn get_survey(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let session = state.surveys().get_session(&id).await?;
    Ok(ok(SessionSummary::from(&session)))
}

async fn get_report(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let stored = state.surveys().get_report(&id).await?;
    Ok(ok(serde_json::json!({
        "report": stored.report,
        "createdAt": stored.created_at,
    })))
}
