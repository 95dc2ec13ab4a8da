//! Bearer token handling and external token validation
//!
//! # Architecture
//!
//! mstream does not issue or verify tokens itself. Every protected request
//! carries `Authorization: Bearer <token>`; the token is forwarded to the
//! external login service, which accepts it with HTTP 200 and rejects it
//! with anything else.
//!
//! This module holds no HTTP framework code. The API crate wraps it in axum
//! middleware.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use thiserror::Error;

// ========================================
// Error Types
// ========================================

/// Malformed `Authorization` header
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BearerError {
    #[error("no authorization header found")]
    Missing,

    #[error("authorization header must be in format 'Bearer' <token>")]
    Malformed,
}

/// Token validation failure
#[derive(Debug, Error)]
pub enum AuthError {
    /// Login service location not configured
    #[error("login service url cannot be empty")]
    EmptyLoginUrl,

    /// Request to the login service failed before a response arrived
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    /// Login service answered with anything other than 200
    #[error("non-200 status code received: {}", .0.as_u16())]
    Rejected(StatusCode),
}

// ========================================
// Header Parsing
// ========================================

/// Extract the token from an `Authorization` header value
///
/// # Examples
///
/// ```
/// use mstream_common::auth::{parse_bearer, BearerError};
///
/// assert_eq!(parse_bearer(Some("Bearer abc")), Ok("abc"));
/// assert_eq!(parse_bearer(None), Err(BearerError::Missing));
/// assert_eq!(parse_bearer(Some("Basic abc")), Err(BearerError::Malformed));
/// ```
pub fn parse_bearer(header_value: Option<&str>) -> Result<&str, BearerError> {
    let value = match header_value {
        None | Some("") => return Err(BearerError::Missing),
        Some(value) => value,
    };

    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Ok(token),
        _ => Err(BearerError::Malformed),
    }
}

// ========================================
// Validation
// ========================================

/// Capability to decide whether a bearer token is valid
#[async_trait]
pub trait TokenValidator: Send + Sync {
    async fn validate(&self, token: &str) -> Result<(), AuthError>;
}

/// Validates tokens against the external login service
///
/// Issues a single `POST <login_url>/token` per call. No caching, no retry.
#[derive(Debug, Clone)]
pub struct LoginServiceValidator {
    http_client: Client,
    login_url: String,
}

impl LoginServiceValidator {
    /// `login_url` may be a bare `host:port` (http is assumed) or a full URL
    pub fn new(http_client: Client, login_url: impl Into<String>) -> Self {
        Self {
            http_client,
            login_url: login_url.into(),
        }
    }

    fn token_endpoint(&self) -> String {
        let base = self.login_url.trim_end_matches('/');
        if base.starts_with("http://") || base.starts_with("https://") {
            format!("{}/token", base)
        } else {
            format!("http://{}/token", base)
        }
    }
}

#[async_trait]
impl TokenValidator for LoginServiceValidator {
    async fn validate(&self, token: &str) -> Result<(), AuthError> {
        if self.login_url.is_empty() {
            return Err(AuthError::EmptyLoginUrl);
        }

        let response = self
            .http_client
            .post(self.token_endpoint())
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(AuthError::Rejected(response.status()));
        }

        Ok(())
    }
}

// ========================================
// Tests
// ========================================
