use chrono::{Duration, Utc};

use crate::store::Store;

/// Drops reports older than the retention window.
pub async fn run(store: &Store, retention_days: u64) {
    tracing::debug!(retention_days, "report_cleanup: start");
    let cutoff = Utc::now() - Duration::days(retention_days as i64);
    match store.cleanup_reports_before(cutoff) {
        Ok(count) => tracing::info!(cleaned = count, "report_cleanup: done"),
        Err(e) => tracing::error!(error=%e, "report_cleanup failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::operations::survey_sessions::{tests::session, SurveyRecord};
    use crate::survey::types::{RankBand, TriMetricReport, ZoneBreakdown, ZoneConfidence};

    #[tokio::test]
    async fn keeps_reports_inside_window() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("db").to_str().unwrap()).unwrap();
        let band = RankBand {
            start: 1,
            end: 1,
            confidence: ZoneConfidence::Unknown,
        };
        let record = SurveyRecord::new(session("s"), Duration::hours(1));
        store
            .complete_survey_session(&record, &TriMetricReport {
                session_id: "s".to_string(),
                volume: 1,
                reach: 1,
                density: 0.0,
                confidence: 0.0,
                questions_asked: 20,
                max_rank: 8000,
                zones: ZoneBreakdown {
                    owned: band.clone(),
                    frontier: band.clone(),
                    unexplored: band,
                },
                benchmarks: vec![],
            })
            .unwrap();

        run(&store, 30).await;
        assert!(store.get_survey_report("s").unwrap().is_some());
    }
}
