//! API Router and Application State
//!
//! JSON over HTTP in front of the recording lifecycle manager. Start and stop
//! require a bearer token; listing routes are public.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod models;

use std::sync::Arc;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use cameraman_capture_engine::RecordingLifecycleManager;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use auth::{Identity, IdentityVerifier, StaticTokenVerifier};
pub use error::ApiError;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Recording lifecycle manager
    pub manager: RecordingLifecycleManager,
    /// Bearer token verifier
    pub verifier: Arc<dyn IdentityVerifier>,
}

impl AppState {
    #[must_use]
    pub fn new(manager: RecordingLifecycleManager, verifier: Arc<dyn IdentityVerifier>) -> Self {
        Self { manager, verifier }
    }
}

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected_routes = Router::new()
        .route("/camera/{number}/start", post(handlers::start_recording))
        .route("/record/{id}/stop", post(handlers::stop_recording))
        .layer(from_fn_with_state(state.clone(), auth::require_auth));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/cameras", get(handlers::list_cameras))
        .route("/records", get(handlers::list_records))
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
