use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use tokio::sync::{Mutex, RwLock};

use crate::response::AppError;
use crate::store::operations::survey_reports::StoredReport;
use crate::store::operations::survey_sessions::SurveyRecord;
use crate::store::Store;
use crate::survey::config::SurveyConfig;
use crate::survey::engine::SurveyEngine;
use crate::survey::error::SurveyError;
use crate::survey::lexicon::{Lexicon, LexiconStats};
use crate::survey::types::*;

/// Persistence-backed front of [`SurveyEngine`]. Every step reloads the
/// session from the store; the only in-memory state is the shared lexicon,
/// the active config and the per-session submission locks.
pub struct SurveyOrchestrator {
    store: Arc<Store>,
    engine: RwLock<Arc<SurveyEngine>>,
    lexicon: RwLock<Arc<Lexicon>>,
    session_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    session_ttl: Duration,
}

impl SurveyOrchestrator {
    pub fn new(
        store: Arc<Store>,
        config: SurveyConfig,
        lexicon: Lexicon,
        session_ttl: Duration,
    ) -> Result<Self, SurveyError> {
        let engine = SurveyEngine::new(config)?;
        Ok(Self {
            store,
            engine: RwLock::new(Arc::new(engine)),
            lexicon: RwLock::new(Arc::new(lexicon)),
            session_locks: Mutex::new(HashMap::new()),
            session_ttl,
        })
    }

    /// Builds the orchestrator over whatever lexicon the store holds.
    pub fn from_store(
        store: Arc<Store>,
        config: SurveyConfig,
        session_ttl: Duration,
    ) -> Result<Self, AppError> {
        let lexicon = Lexicon::from_words(store.load_lexicon_words()?);
        if lexicon.is_empty() {
            tracing::warn!("Lexicon is empty, surveys cannot start until words are imported");
        } else {
            let dangling = lexicon.dangling_confusables();
            if !dangling.is_empty() {
                tracing::warn!(count = dangling.len(), "Words reference unknown confusables");
            }
            tracing::info!(words = lexicon.len(), max_rank = lexicon.stats().max_rank, "Lexicon loaded");
        }
        Ok(Self::new(store, config, lexicon, session_ttl)?)
    }

    pub async fn reload_config(&self, new_config: SurveyConfig) -> Result<(), String> {
        let engine = SurveyEngine::new(new_config).map_err(|e| e.to_string())?;
        let mut current = self.engine.write().await;
        *current = Arc::new(engine);
        tracing::info!("Survey config reloaded");
        Ok(())
    }

    pub async fn get_config(&self) -> SurveyConfig {
        self.engine.read().await.config().clone()
    }

    /// Rebuilds the shared lexicon from the store. Sessions in flight keep
    /// working because each step looks words up by id.
    pub async fn reload_lexicon(&self) -> Result<LexiconStats, AppError> {
        let lexicon = Lexicon::from_words(self.store.load_lexicon_words()?);
        let stats = lexicon.stats();
        *self.lexicon.write().await = Arc::new(lexicon);
        tracing::info!(words = stats.word_count, max_rank = stats.max_rank, "Lexicon reloaded");
        Ok(stats)
    }

    /// Applies a new config and re-reads the lexicon from the store. The
    /// config is validated first; on failure nothing changes.
    pub async fn reload(&self, config: SurveyConfig) -> Result<LexiconStats, AppError> {
        self.reload_config(config)
            .await
            .map_err(|e| AppError::bad_request("INVALID_SURVEY_CONFIG", &e))?;
        self.reload_lexicon().await
    }

    pub async fn lexicon_stats(&self) -> LexiconStats {
        self.lexicon.read().await.stats()
    }

    async fn acquire_session_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.session_locks.lock().await;

        // Arc::strong_count == 1 means only the map holds the lock, so it is idle.
        if locks.len() > 1000 {
            locks.retain(|_, v| Arc::strong_count(v) > 1);
        }

        locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn snapshot(&self) -> (Arc<SurveyEngine>, Arc<Lexicon>) {
        let engine = self.engine.read().await.clone();
        let lexicon = self.lexicon.read().await.clone();
        (engine, lexicon)
    }

    pub async fn start_survey(
        &self,
        hint: Option<ProficiencyHint>,
    ) -> Result<(SurveySession, ChallengePayload), AppError> {
        let (engine, lexicon) = self.snapshot().await;
        let session_id = uuid::Uuid::new_v4().to_string();

        let (session, challenge) = engine.start(lexicon.as_ref(), &session_id, hint)?;
        self.store
            .put_survey_session(&SurveyRecord::new(session.clone(), self.session_ttl))?;

        Ok((session, challenge))
    }

    /// Grades one answer and persists the resulting state. Concurrent
    /// submissions for the same session are applied one at a time; the
    /// second one sees the advanced session and fails as stale.
    pub async fn submit_answer(
        &self,
        session_id: &str,
        submission: &AnswerSubmission,
    ) -> Result<StepOutcome, AppError> {
        let start = std::time::Instant::now();
        let lock = self.acquire_session_lock(session_id).await;
        let _guard = lock.lock().await;

        let mut record = self
            .store
            .get_survey_session(session_id)?
            .ok_or_else(|| SurveyError::SessionNotFound(session_id.to_string()))?;

        let (engine, lexicon) = self.snapshot().await;
        let outcome = engine.next(lexicon.as_ref(), &record.session, submission)?;

        record.advance(outcome.session().clone(), self.session_ttl);
        match &outcome {
            StepOutcome::Complete { report, .. } => {
                self.store.complete_survey_session(&record, report)?;
            }
            StepOutcome::Continue { .. } => self.store.put_survey_session(&record)?,
        }

        tracing::debug!(
            session_id,
            questions = record.session.question_count(),
            complete = record.session.is_complete(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "Survey step persisted"
        );
        Ok(outcome)
    }

    pub async fn get_session(&self, session_id: &str) -> Result<SurveySession, AppError> {
        let record = self
            .store
            .get_survey_session(session_id)?
            .ok_or_else(|| SurveyError::SessionNotFound(session_id.to_string()))?;
        Ok(record.session)
    }

    pub async fn get_report(&self, session_id: &str) -> Result<StoredReport, AppError> {
        if let Some(stored) = self.store.get_survey_report(session_id)? {
            return Ok(stored);
        }
        match self.store.get_survey_session(session_id)? {
            Some(_) => Err(AppError::conflict(
                "SURVEY_IN_PROGRESS",
                "Survey has not finished yet",
            )),
            None => Err(SurveyError::SessionNotFound(session_id.to_string()).into()),
        }
    }
}
