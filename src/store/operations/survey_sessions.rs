use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::store::keys;
use crate::store::{Store, StoreError};
use crate::survey::types::SurveySession;

/// Persisted survey state plus the wall-clock bookkeeping the engine itself
/// never sees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurveyRecord {
    pub session: SurveySession,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SurveyRecord {
    pub fn new(session: SurveySession, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            session,
            created_at: now,
            updated_at: now,
            expires_at: now + ttl,
        }
    }

    /// Replaces the session and slides the expiry window forward.
    pub fn advance(&mut self, session: SurveySession, ttl: Duration) {
        let now = Utc::now();
        self.session = session;
        self.updated_at = now;
        self.expires_at = now + ttl;
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

impl Store {
    pub fn put_survey_session(&self, record: &SurveyRecord) -> Result<(), StoreError> {
        let key = keys::survey_session_key(&record.session.id)?;
        self.survey_sessions
            .insert(key.as_bytes(), Self::serialize(record)?)?;
        Ok(())
    }

    /// 获取问卷会话，已过期则返回 None。
    /// 不产生删除副作用，过期记录由后台任务 cleanup_expired_survey_sessions 清理。
    pub fn get_survey_session(&self, session_id: &str) -> Result<Option<SurveyRecord>, StoreError> {
        let key = keys::survey_session_key(session_id)?;
        let Some(raw) = self.survey_sessions.get(key.as_bytes())? else {
            return Ok(None);
        };

        let record: SurveyRecord = Self::deserialize(&raw)?;
        if record.is_expired(Utc::now()) {
            return Ok(None);
        }
        Ok(Some(record))
    }

    pub fn count_survey_sessions(&self) -> usize {
        self.survey_sessions.len()
    }

    /// Deletes up to one batch of records expired at `now`.
    pub fn cleanup_expired_survey_sessions(&self, now: DateTime<Utc>) -> Result<u32, StoreError> {
        const MAX_BATCH_SIZE: usize = 1000;

        let mut expired = Vec::new();
        for item in self.survey_sessions.iter() {
            let (k, v) = item?;
            let record: SurveyRecord = match Self::deserialize(&v) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(
                        key = %String::from_utf8_lossy(&k),
                        error = %e,
                        "Removing undecodable survey session"
                    );
                    expired.push(k);
                    continue;
                }
            };
            if record.is_expired(now) {
                expired.push(k);
                if expired.len() >= MAX_BATCH_SIZE {
                    break;
                }
            }
        }

        let count = expired.len() as u32;
        for key in expired {
            self.survey_sessions.remove(key)?;
        }
        Ok(count)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::survey::types::{Phase, SessionStatus};

    pub(crate) fn session(id: &str) -> SurveySession {
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
    fn roundtrip_is_lossless() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("db").to_str().unwrap()).unwrap();
        let record = SurveyRecord::new(session("s1"), Duration::hours(1));
        store.put_survey_session(&record).unwrap();
        assert_eq!(store.get_survey_session("s1").unwrap(), Some(record));
        assert!(store.get_survey_session("missing").unwrap().is_none());
    }

    #[test]
    fn expired_sessions_are_hidden_and_cleaned() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("db").to_str().unwrap()).unwrap();
        store
            .put_survey_session(&SurveyRecord::new(session("old"), Duration::seconds(-1)))
            .unwrap();
        store
            .put_survey_session(&SurveyRecord::new(session("live"), Duration::hours(1)))
            .unwrap();

        assert!(store.get_survey_session("old").unwrap().is_none());
        assert_eq!(store.cleanup_expired_survey_sessions(Utc::now()).unwrap(), 1);
        assert_eq!(store.count_survey_sessions(), 1);
        assert!(store.get_survey_session("live").unwrap().is_some());
    }
}
