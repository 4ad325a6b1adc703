use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub mod agent;
pub mod health;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/agent/search", post(agent::agent_search))
        .route("/api/health", get(health::health))
        .with_state(state)
}
