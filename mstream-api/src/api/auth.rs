//! Bearer token middleware
//!
//! Applied to every route except `/health`. The token is checked against
//! the external login service on each request.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use mstream_common::auth::parse_bearer;
use tracing::warn;

use crate::error::ApiError;
use crate::AppState;

/// Reject the request unless it carries a token the login service accepts
///
/// A missing or malformed header is a 400; a rejected token (or an
/// unreachable login service) is a 401.
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .map(|value| value.to_str().unwrap_or_default());

    let token = parse_bearer(header_value).map_err(|e| {
        warn!("Error retrieving auth token: {}", e);
        ApiError::from(e)
    })?;

    if let Err(e) = state.auth.validate(token).await {
        warn!(
            method = %request.method(),
            path = %request.uri().path(),
            "Authentication failed: {}",
            e
        );
        return Err(ApiError::Unauthorized);
    }

    Ok(next.run(request).await)
}
