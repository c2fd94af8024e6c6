use chrono::{DateTime, Utc};

use crate::store::{Store, StoreError};

pub async fn run(store: &Store) {
    tracing::debug!("session_cleanup: start");
    match sweep(store, Utc::now()) {
        Ok(0) => tracing::debug!("session_cleanup: nothing expired"),
        Ok(count) => tracing::info!(cleaned = count, "session_cleanup: done"),
        Err(e) => tracing::error!(error = %e, "session_cleanup failed"),
    }
}

/// Removes sessions whose TTL ran out before `now`.
pub fn sweep(store: &Store, now: DateTime<Utc>) -> Result<u32, StoreError> {
    store.cleanup_expired_survey_sessions(now)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::store::operations::survey_sessions::SurveyRecord;
    use crate::survey::types::{Phase, SessionStatus, SurveySession};

    fn session(id: &str) -> SurveySession {
        SurveySession {
            id: id.to_string(),
            status: SessionStatus::Active,
            max_rank: 8000,
            current_rank: 2000,
            low_bound: 1,
            high_bound: 8000,
            phase: Phase::Coarse,
            history: vec![],
            pivot_triggered: false,
            pivot: None,
            pivot_failed: false,
            forced_fine_remaining: 0,
            step_scale: 1.0,
            verify_anchor: None,
            confidence: 0.0,
            hint: None,
            outstanding: None,
        }
    }

    #[test]
    fn sweep_only_removes_expired() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("db").to_str().unwrap()).unwrap();
        store
            .put_survey_session(&SurveyRecord::new(session("short"), Duration::minutes(1)))
            .unwrap();
        store
            .put_survey_session(&SurveyRecord::new(session("long"), Duration::hours(2)))
            .unwrap();

        let removed = sweep(&store, Utc::now() + Duration::minutes(30)).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.count_survey_sessions(), 1);
    }
}
