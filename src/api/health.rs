use std::time::Duration;

use axum::extract::State;
use axum::Json;

use crate::models::HealthResponse;
use crate::state::AppState;

const COUNT_TIMEOUT: Duration = Duration::from_secs(5);

/// GET /api/health - Liveness plus the embedding store row count.
///
/// A failing store shows up as `"embeddings": null`, never as a non-200.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let embeddings = match tokio::time::timeout(COUNT_TIMEOUT, state.store.count()).await {
        Ok(Ok(count)) => Some(count),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Health check could not count embeddings");
            None
        }
        Err(_) => {
            tracing::warn!("Health check embedding count timed out");
            None
        }
    };

    Json(HealthResponse {
        status: "ok",
        embeddings,
    })
}
