use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::Transactional;

use crate::store::keys;
use crate::store::operations::survey_sessions::SurveyRecord;
use crate::store::{Store, StoreError};
use crate::survey::types::TriMetricReport;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredReport {
    pub report: TriMetricReport,
    pub created_at: DateTime<Utc>,
}

impl StoredReport {
    fn new(report: &TriMetricReport) -> Self {
        Self {
            report: report.clone(),
            created_at: Utc::now(),
        }
    }
}

impl Store {
    /// 在同一个 sled 事务中写入已完成的会话和报告，二者要么都可见，要么都不可见。
    pub fn complete_survey_session(
        &self,
        record: &SurveyRecord,
        report: &TriMetricReport,
    ) -> Result<StoredReport, StoreError> {
        if record.session.id != report.session_id {
            return Err(StoreError::Validation(format!(
                "report for {} does not belong to session {}",
                report.session_id, record.session.id
            )));
        }
        let session_key = keys::survey_session_key(&record.session.id)?;
        let report_key = keys::survey_report_key(&report.session_id)?;
        let stored = StoredReport::new(report);
        let session_bytes = Self::serialize(record)?;
        let report_bytes = Self::serialize(&stored)?;

        (&self.survey_sessions, &self.survey_reports)
            .transaction(|(sessions, reports)| {
                sessions.insert(session_key.as_bytes(), session_bytes.as_slice())?;
                reports.insert(report_key.as_bytes(), report_bytes.as_slice())?;
                Ok::<(), ConflictableTransactionError<()>>(())
            })
            .map_err(|e: TransactionError<()>| match e {
                TransactionError::Abort(()) => {
                    StoreError::Sled(sled::Error::Unsupported("transaction aborted".into()))
                }
                TransactionError::Storage(se) => StoreError::Sled(se),
            })?;
        Ok(stored)
    }

    pub fn get_survey_report(&self, session_id: &str) -> Result<Option<StoredReport>, StoreError> {
        let key = keys::survey_report_key(session_id)?;
        match self.survey_reports.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    /// Deletes reports created before `cutoff`.
    pub fn cleanup_reports_before(&self, cutoff: DateTime<Utc>) -> Result<u32, StoreError> {
        let mut stale = Vec::new();
        for item in self.survey_reports.iter() {
            let (k, v) = item?;
            let stored: StoredReport = Self::deserialize(&v)?;
            if stored.created_at < cutoff {
                stale.push(k);
            }
        }

        let count = stale.len() as u32;
        for key in stale {
            self.survey_reports.remove(key)?;
        }
        Ok(count)
    }
}
