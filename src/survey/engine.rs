//! Pure survey step functions.
//!
//! [`SurveyEngine`] holds only configuration. Each call takes the previous
//! session state and returns the next one; nothing is cached between calls,
//! so the same inputs always give the same outputs.

use std::collections::HashSet;

use crate::survey::challenge::{ChallengeBuilder, ChallengeRequest};
use crate::survey::config::SurveyConfig;
use crate::survey::error::SurveyError;
use crate::survey::lexicon::LexicalStore;
use crate::survey::metrics::MetricsCalculator;
use crate::survey::phase::PhaseController;
use crate::survey::pivot::PivotController;
use crate::survey::types::*;

/// Outcome of grading one submission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grade {
    pub credit: f64,
    pub is_correct: bool,
    pub timed_out: bool,
}

#[derive(Debug, Clone)]
pub struct SurveyEngine {
    config: SurveyConfig,
}

impl SurveyEngine {
    pub fn new(config: SurveyConfig) -> Result<Self, SurveyError> {
        config.validate().map_err(SurveyError::Config)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SurveyConfig {
        &self.config
    }

    /// Opens a session and builds its first question.
    pub fn start(
        &self,
        lexicon: &dyn LexicalStore,
        session_id: &str,
        hint: Option<ProficiencyHint>,
    ) -> Result<(SurveySession, ChallengePayload), SurveyError> {
        let requested = self.config.start.rank_for(hint);
        let max_rank = self.config.max_rank.min(lexicon.max_rank());
        if max_rank == 0 {
            return Err(SurveyError::NoWordAtRank { rank: requested });
        }
        let start_rank = requested.clamp(1, max_rank);

        let mut session = SurveySession {
            id: session_id.to_string(),
            status: SessionStatus::Active,
            max_rank,
            current_rank: start_rank,
            low_bound: 1,
            high_bound: max_rank,
            phase: Phase::Coarse,
            history: Vec::new(),
            pivot_triggered: false,
            pivot: None,
            pivot_failed: false,
            forced_fine_remaining: 0,
            step_scale: 1.0,
            verify_anchor: None,
            confidence: 0.0,
            hint,
            outstanding: None,
        };

        let challenge = self.build_challenge(lexicon, &session, start_rank, Phase::Coarse, false)?;
        session.outstanding = Some(challenge.clone());

        tracing::info!(
            session_id,
            start_rank,
            max_rank,
            hint = ?hint,
            "Survey started"
        );
        Ok((session, challenge))
    }

    /// Grades `submission` against the outstanding question and advances the
    /// session by one step. On error the input session is left as it was.
    pub fn next(
        &self,
        lexicon: &dyn LexicalStore,
        session: &SurveySession,
        submission: &AnswerSubmission,
    ) -> Result<StepOutcome, SurveyError> {
        if session.is_complete() {
            return Err(SurveyError::SessionAlreadyComplete {
                id: session.id.clone(),
            });
        }
        let challenge = session
            .outstanding
            .as_ref()
            .ok_or(SurveyError::NoOutstandingChallenge {
                phase: session.phase,
                question_count: session.question_count(),
            })?;
        let grade = grade(&self.config, session, challenge, submission)?;

        let phase_ctl = PhaseController::new(&self.config);
        let pivot_ctl = PivotController::new(&self.config);

        let mut next = session.clone();
        next.outstanding = None;

        if challenge.is_pivot {
            if let Some(probe) = next.pivot.take() {
                pivot_ctl.resolve(&mut next, &probe, grade.is_correct);
            }
            phase_ctl.normalize_bounds(&mut next);
        } else {
            phase_ctl.apply_answer(&mut next, challenge.phase, challenge.target_rank, grade.is_correct);
            if challenge.phase == Phase::Fine && next.forced_fine_remaining > 0 {
                next.forced_fine_remaining -= 1;
            }
        }

        let record = AnswerRecord {
            question_index: challenge.question_index,
            target_rank: challenge.target_rank,
            word_id: challenge.word_id.clone(),
            word_rank: challenge.word_rank,
            phase: challenge.phase,
            is_pivot: challenge.is_pivot,
            selected: submission.selected.clone(),
            credit: grade.credit,
            is_correct: grade.is_correct,
            elapsed_ms: submission.elapsed_ms,
            timed_out: grade.timed_out,
            low_after: next.low_bound,
            high_after: next.high_bound,
        };
        next.history.push(record.clone());

        if let Some(probe) = pivot_ctl.detect(&next, &record) {
            next.pivot_triggered = true;
            next.pivot = Some(probe);
        }

        next.confidence = phase_ctl.confidence(&next);

        tracing::debug!(
            session_id = %next.id,
            question = record.question_index,
            phase = record.phase.as_str(),
            rank = record.target_rank,
            correct = record.is_correct,
            low = next.low_bound,
            high = next.high_bound,
            confidence = next.confidence,
            "Answer graded"
        );

        if phase_ctl.should_stop(&next) {
            next.status = SessionStatus::Completed;
            next.pivot = None;
            let report = MetricsCalculator::new(&self.config).report(&next);
            tracing::info!(
                session_id = %next.id,
                questions = next.question_count(),
                volume = report.volume,
                reach = report.reach,
                density = report.density,
                confidence = report.confidence,
                "Survey completed"
            );
            return Ok(StepOutcome::Complete {
                session: next,
                report,
            });
        }

        let challenge = self.plan_next(lexicon, &mut next, &phase_ctl)?;
        Ok(StepOutcome::Continue {
            session: next,
            challenge,
        })
    }

    /// Report for a session, completed or not.
    pub fn report(&self, session: &SurveySession) -> TriMetricReport {
        MetricsCalculator::new(&self.config).report(session)
    }

    fn plan_next(
        &self,
        lexicon: &dyn LexicalStore,
        session: &mut SurveySession,
        phase_ctl: &PhaseController<'_>,
    ) -> Result<ChallengePayload, SurveyError> {
        let pivot_rank = session.pivot.as_ref().map(|probe| probe.rank);
        let (rank, phase, is_pivot) = if let Some(rank) = pivot_rank {
            (rank, session.phase, true)
        } else {
            let phase = phase_ctl.phase_for(session);
            if phase == Phase::Verify && session.verify_anchor.is_none() {
                phase_ctl.enter_verify(session);
            }
            session.phase = phase;
            (phase_ctl.next_rank(session, phase), phase, false)
        };
        session.current_rank = rank.clamp(session.low_bound, session.high_bound);

        let challenge = self.build_challenge(lexicon, session, session.current_rank, phase, is_pivot)?;
        session.outstanding = Some(challenge.clone());
        Ok(challenge)
    }

    fn build_challenge(
        &self,
        lexicon: &dyn LexicalStore,
        session: &SurveySession,
        rank: u32,
        phase: Phase,
        is_pivot: bool,
    ) -> Result<ChallengePayload, SurveyError> {
        let exclude = session.used_word_ids();
        ChallengeBuilder::new(lexicon, &self.config).build(&ChallengeRequest {
            session_id: &session.id,
            question_index: session.question_count(),
            target_rank: rank,
            phase,
            is_pivot,
            exclude_word_ids: &exclude,
        })
    }
}

/// Checks a submission against the answer key and scores it.
pub fn grade(
    config: &SurveyConfig,
    session: &SurveySession,
    challenge: &ChallengePayload,
    submission: &AnswerSubmission,
) -> Result<Grade, SurveyError> {
    let invalid = |reason: String| SurveyError::InvalidAnswer {
        reason,
        phase: session.phase,
        question_count: session.question_count(),
    };

    if submission.challenge_id != challenge.challenge_id {
        return Err(invalid(format!(
            "stale challenge id {}",
            submission.challenge_id
        )));
    }
    if submission.selected.is_empty() {
        return Err(invalid("no option selected".to_string()));
    }

    let mut seen = HashSet::new();
    let mut options = Vec::with_capacity(submission.selected.len());
    for id in &submission.selected {
        if !seen.insert(id.as_str()) {
            return Err(invalid(format!("duplicate option id {id}")));
        }
        let option = challenge
            .option(id)
            .ok_or_else(|| invalid(format!("unknown option id {id}")))?;
        options.push(option);
    }

    let picked_unknown = options.iter().any(|o| o.role == OptionRole::Unknown);
    if picked_unknown && options.len() > 1 {
        return Err(invalid("\"I don't know\" cannot be combined with other options".to_string()));
    }

    let timed_out = submission.elapsed_ms > challenge.time_limit_ms;
    if timed_out || options.iter().any(|o| o.role != OptionRole::Target) {
        return Ok(Grade {
            credit: 0.0,
            is_correct: false,
            timed_out,
        });
    }

    let targets: Vec<&ChallengeOption> = challenge
        .options
        .iter()
        .filter(|o| o.role == OptionRole::Target)
        .collect();
    let total: f64 = targets.iter().map(|o| o.weight).sum();
    let credit = if total > 0.0 {
        options.iter().map(|o| o.weight).sum::<f64>() / total
    } else {
        options.len() as f64 / targets.len().max(1) as f64
    };
    let credit = credit.clamp(0.0, 1.0);

    Ok(Grade {
        credit,
        is_correct: credit >= config.metrics.correct_credit_threshold,
        timed_out: false,
    })
}
