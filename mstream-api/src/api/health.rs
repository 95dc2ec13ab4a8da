//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use tracing::error;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /health
///
/// Pings the store. Does not require authentication.
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<&'static str>> {
    if let Err(e) = state.store.ping().await {
        error!("Database ping failed: {}", e);
        return Err(ApiError::internal(
            "API is running but unable to connect to database",
        ));
    }

    Ok(Json("API is running and connected to database"))
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
