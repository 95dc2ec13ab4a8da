//! mstream-api library - music streaming backend
//!
//! Track and playlist CRUD over a storage client, audio upload and
//! retrieval, and deprecated ingest from remote video links. Every route
//! except `/health` requires a bearer token accepted by the external login
//! service.

use axum::{
    error_handling::HandleErrorLayer,
    extract::DefaultBodyLimit,
    http::{header, HeaderName, Method},
    BoxError, Router,
};
use mstream_common::auth::TokenValidator;
use mstream_common::config::{
    ServiceConfig, DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_REQUEST_TIMEOUT_SECS,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod api;
pub mod error;
pub mod media;
pub mod store;

use error::ApiError;
use media::MediaPipeline;
use store::Storage;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Storage>,
    pub auth: Arc<dyn TokenValidator>,
    pub media: Arc<MediaPipeline>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Storage>,
        auth: Arc<dyn TokenValidator>,
        media: Arc<MediaPipeline>,
    ) -> Self {
        Self { store, auth, media }
    }
}

/// Per-request limits applied by the router
#[derive(Debug, Clone, Copy)]
pub struct HttpLimits {
    pub request_timeout: Duration,
    pub max_body_bytes: usize,
}

impl Default for HttpLimits {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_body_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl From<&ServiceConfig> for HttpLimits {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            request_timeout: config.request_timeout,
            max_body_bytes: config.max_upload_bytes,
        }
    }
}

/// Build application router
///
/// `/health` is public; everything else goes through `auth_middleware`.
pub fn build_router(state: AppState, limits: HttpLimits) -> Router {
    use axum::middleware;
    use axum::routing::{delete, get, post};

    let protected = Router::new()
        .route("/track", post(api::create_track))
        .route(
            "/track/:id",
            get(api::get_track_audio)
                .put(api::update_track)
                .delete(api::delete_track),
        )
        .route("/tracks", get(api::list_tracks))
        .route("/playlist", post(api::create_playlist))
        .route(
            "/playlist/:id/track/:track_id",
            post(api::add_track).delete(api::remove_track),
        )
        .route("/playlist/:id", delete(api::delete_playlist))
        .route("/playlists", get(api::list_playlists))
        // Deprecated ingest paths
        .route("/video", post(api::get_video))
        .route("/upload", post(api::upload_audio))
        .route("/youtube/track", post(api::create_track_from_link))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    let public = Router::new().merge(api::health_routes());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::HEAD,
            Method::POST,
            Method::PUT,
            Method::OPTIONS,
            Method::DELETE,
        ])
        .allow_headers([
            HeaderName::from_static("x-requested-with"),
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
        ]);

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(DefaultBodyLimit::max(limits.max_body_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .timeout(limits.request_timeout),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// A request that outlives the timeout is dropped and reported as a 500
async fn handle_middleware_error(err: BoxError) -> ApiError {
    if err.is::<tower::timeout::error::Elapsed>() {
        ApiError::internal("request timed out")
    } else {
        ApiError::internal(format!("unhandled middleware error: {}", err))
    }
}
