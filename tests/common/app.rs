use std::sync::Arc;

use axum::Router;
use tempfile::TempDir;
use tokio::sync::broadcast;

use vocab_survey::config::{Config, RetentionConfig, SurveyEnvConfig, WorkerConfig};
use vocab_survey::routes::build_router;
use vocab_survey::state::AppState;
use vocab_survey::store::Store;
use vocab_survey::survey::{SurveyConfig, SurveyOrchestrator};

use super::fixtures;

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub config: Config,
    _temp_dir: TempDir,
}

fn test_config(sled_path: String) -> Config {
    // 直接构造 Config，避免使用 set_var 造成多线程测试环境变量竞态
    Config {
        host: std::net::IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
        port: 3000,
        log_level: "info".to_string(),
        enable_file_logs: false,
        log_dir: "./logs".to_string(),
        sled_path,
        cors_origin: "http://localhost:5173".to_string(),
        lexicon_seed_path: None,
        retention: RetentionConfig {
            session_ttl_secs: 3600,
            report_ttl_days: 90,
        },
        worker: WorkerConfig { is_leader: false },
        survey: SurveyEnvConfig {
            max_rank: 8000,
            target_questions: 15,
            max_questions: 20,
            similarity_threshold: 0.6,
        },
    }
}

async fn spawn_with_lexicon(max_rank: u32) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let sled_path = temp_dir.path().join("survey-test.sled");
    let config = test_config(sled_path.to_string_lossy().to_string());

    let store = Arc::new(Store::open(&config.sled_path).expect("open store"));
    store.run_migrations().expect("run migrations");
    if max_rank > 0 {
        fixtures::seed_lexicon(&store, max_rank);
    }

    let surveys = Arc::new(
        SurveyOrchestrator::from_store(
            store.clone(),
            SurveyConfig::from_env(&config.survey),
            config.session_ttl(),
        )
        .expect("build orchestrator"),
    );
    let (shutdown_tx, _) = broadcast::channel::<()>(8);
    let state = AppState::new(store, surveys, &config, shutdown_tx);
    let app = build_router(state.clone());

    TestApp {
        app,
        state,
        config,
        _temp_dir: temp_dir,
    }
}

pub async fn spawn_test_app() -> TestApp {
    spawn_with_lexicon(fixtures::LEXICON_SIZE).await
}

/// App over an empty lexicon, for readiness and start-failure paths.
pub async fn spawn_empty_app() -> TestApp {
    spawn_with_lexicon(0).await
}
