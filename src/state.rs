use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;

use crate::config::Config;
use crate::store::Store;
use crate::survey::SurveyOrchestrator;

/// Shared handler state. Cloning is cheap; everything heavy sits behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    store: Arc<Store>,
    surveys: Arc<SurveyOrchestrator>,
    config: Arc<Config>,
    shutdown_tx: broadcast::Sender<()>,
    started_at: Instant,
}

impl AppState {
    pub fn new(
        store: Arc<Store>,
        surveys: Arc<SurveyOrchestrator>,
        config: &Config,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        Self {
            store,
            surveys,
            config: Arc::new(config.clone()),
            shutdown_tx,
            started_at: Instant::now(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn surveys(&self) -> &SurveyOrchestrator {
        &self.surveys
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn shutdown_rx(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Surveys can only start once the store answers and words are loaded.
    pub async fn is_ready(&self) -> bool {
        self.store.ping().is_ok() && self.surveys.lexicon_stats().await.word_count > 0
    }
}

#[cfg(test)]
mod tests {
    use crate::survey::{Lexicon, SurveyConfig};

    use super::*;

    fn state(dir: &tempfile::TempDir, lexicon: Lexicon) -> (AppState, broadcast::Sender<()>) {
        let cfg = Config::from_env();
        let store = Arc::new(Store::open(dir.path().join("state.sled").to_str().unwrap()).unwrap());
        let surveys = Arc::new(
            SurveyOrchestrator::new(store.clone(), SurveyConfig::default(), lexicon, cfg.session_ttl())
                .unwrap(),
        );
        let (tx, _) = broadcast::channel(4);
        (AppState::new(store, surveys, &cfg, tx.clone()), tx)
    }

    #[tokio::test]
    async fn every_subscriber_sees_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let (state, tx) = state(&dir, Lexicon::default());

        let mut rx1 = state.shutdown_rx();
        let mut rx2 = state.clone().shutdown_rx();
        tx.send(()).unwrap();
        rx1.recv().await.unwrap();
        rx2.recv().await.unwrap();
    }

    #[tokio::test]
    async fn empty_lexicon_is_not_ready() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _tx) = state(&dir, Lexicon::default());
        assert!(!state.is_ready().await);
    }
}
