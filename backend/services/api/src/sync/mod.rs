pub mod handlers;
pub mod requests;
pub mod responses;

use axum::routing::{get, post};
use axum::Router;

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sync/{entity}/mark", post(handlers::mark_for_sync))
        .route("/sync/{entity}/status", get(handlers::sync_status))
}
