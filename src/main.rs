use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::http::{header, HeaderValue};
use axum::Router;
use tokio::sync::broadcast;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use vocab_survey::config::Config;
use vocab_survey::logging::{init_tracing, LogConfig};
use vocab_survey::routes::build_router;
use vocab_survey::state::AppState;
use vocab_survey::store::Store;
use vocab_survey::survey::{SurveyConfig, SurveyOrchestrator};
use vocab_survey::workers::WorkerManager;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = Config::from_env();
    init_tracing(&LogConfig::from(&config));
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting vocab-survey");

    let store = Arc::new(Store::open(&config.sled_path).expect("Failed to open sled database"));
    store.run_migrations().expect("Failed to run migrations");
    if let Some(seed) = &config.lexicon_seed_path {
        import_seed(&store, seed);
    }

    let surveys = SurveyOrchestrator::from_store(
        store.clone(),
        SurveyConfig::from_env(&config.survey),
        config.session_ttl(),
    )
    .unwrap_or_else(|e| panic!("Failed to build survey engine: {}", e.message));

    let (shutdown_tx, _) = broadcast::channel::<()>(8);
    let state = AppState::new(store.clone(), Arc::new(surveys), &config, shutdown_tx.clone());

    if config.worker.is_leader {
        spawn_workers(WorkerManager::new(
            store.clone(),
            shutdown_tx.subscribe(),
            &config.worker,
            &config.retention,
        ));
    } else {
        tracing::info!("Not the worker leader, background sweeps disabled");
    }

    spawn_reload_on_hangup(state.clone(), config.lexicon_seed_path.clone());
    let app = with_http_layers(build_router(state), &config);
    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind TCP listener");
    tracing::info!(%addr, "Listening");

    let served = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            wait_for_signal().await;
            tracing::info!("Shutdown signal received");
            let _ = shutdown_tx.send(());
        })
        .await;
    if let Err(e) = served {
        tracing::error!(error = %e, "HTTP server crashed");
    }

    // sled 在 Drop 时也会刷盘，这里显式刷一次以便记录失败
    if let Err(e) = store.flush() {
        tracing::error!(error = %e, "Failed to flush store before exit");
    }
    tracing::info!("Shutdown complete");
}

/// A bad seed file is logged and skipped; words already in the store stay usable.
fn import_seed(store: &Store, seed: &str) {
    match store.import_lexicon_file(Path::new(seed)) {
        Ok(count) => tracing::info!(path = %seed, count, "Lexicon seed imported"),
        Err(e) => tracing::error!(path = %seed, error = %e, "Failed to import lexicon seed"),
    }
}

/// SIGHUP 时重新读取 .env 与环境变量，重新导入种子词表并热更新引擎配置。
fn spawn_reload_on_hangup(state: AppState, seed: Option<String>) {
    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(hangup) => hangup,
            Err(e) => {
                tracing::warn!(error = %e, "SIGHUP handler unavailable, hot reload disabled");
                return;
            }
        };
        while hangup.recv().await.is_some() {
            dotenvy::dotenv_override().ok();
            if let Some(seed) = &seed {
                import_seed(state.store(), seed);
            }
            let survey_config = SurveyConfig::from_env(&Config::from_env().survey);
            match state.surveys().reload(survey_config).await {
                Ok(stats) => tracing::info!(words = stats.word_count, "Hot reload complete"),
                Err(e) => tracing::error!(code = %e.code, error = %e.message, "Hot reload rejected"),
            }
        }
    });

    #[cfg(not(unix))]
    let _ = (state, seed);
}

fn spawn_workers(manager: WorkerManager) {
    let handle = tokio::spawn(async move {
        if let Err(e) = manager.start().await {
            tracing::error!(error = %e, "Worker manager failed");
        }
    });
    // Worker panic 只记录，不影响 HTTP 服务
    tokio::spawn(async move {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Worker task panicked, HTTP server continues");
        }
    });
}

fn with_http_layers(router: Router, config: &Config) -> Router {
    let security_headers = [
        (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        (header::X_FRAME_OPTIONS, "DENY"),
        (header::CACHE_CONTROL, "no-store"),
    ];

    let mut router = router
        .layer(cors_layer(&config.cors_origin))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new());
    for (name, value) in security_headers {
        router = router.layer(SetResponseHeaderLayer::overriding(name, HeaderValue::from_static(value)));
    }
    router
}

fn cors_layer(origin: &str) -> CorsLayer {
    let allow_origin = match origin.trim() {
        "*" => AllowOrigin::any(),
        exact => match exact.parse::<HeaderValue>() {
            Ok(value) => AllowOrigin::exact(value),
            Err(e) => panic!("FATAL: Invalid CORS_ORIGIN '{origin}': {e}"),
        },
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_methods(Any)
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
