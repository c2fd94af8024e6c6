use axum::extract::State;
use axum::routing::get;
use axum::Router;

use crate::response::{ok, AppError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/stats", get(lexicon_stats))
}

async fn lexicon_stats(
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let stats = state.surveys().lexicon_stats().await;
    let stored = state.store().lexicon_word_count();
    Ok(ok(serde_json::json!({
        "loaded": stats,
        "storedWords": stored,
    })))
}
