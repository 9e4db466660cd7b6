//! HTTP API built on axum.
//!
//! Public routes (health, pet browsing) need no identity. Everything else runs
//! behind [`identity::identity_middleware`], which turns the upstream auth
//! headers into an [`Actor`](crate::types::Actor).

pub mod adoptions;
pub mod identity;
pub mod pets;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::coordinator::LifecycleCoordinator;
use crate::error::AdoptionError;

/// Shared state for request handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<LifecycleCoordinator>,
}

/// Build the application router.
///
/// - GET /health, GET /pets, GET /pets/{id} (public)
/// - pet management and every /adoptions route (identity required)
pub fn router(coordinator: Arc<LifecycleCoordinator>) -> Router {
    let state = AppState { coordinator };

    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/pets", get(pets::list_pets))
        .route("/pets/{id}", get(pets::get_pet));

    let api_routes = Router::new()
        .route("/pets", post(pets::create_pet))
        .route("/pets/owner", get(pets::owner_pets))
        .route("/pets/admin", get(pets::all_pets))
        .route("/pets/{id}", put(pets::update_pet).delete(pets::delete_pet))
        .route(
            "/pets/{id}/adoptions",
            get(adoptions::requests_for_pet).post(adoptions::submit),
        )
        .route("/adoptions/my-requests", get(adoptions::my_requests))
        .route("/adoptions/my-adoptions", get(adoptions::my_adoptions))
        .route("/adoptions/owner-requests", get(adoptions::owner_requests))
        .route("/adoptions/{id}", get(adoptions::detail))
        .route("/adoptions/{id}/status", put(adoptions::update_status))
        .route_layer(axum_middleware::from_fn(identity::identity_middleware));

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Envelope<&'static str>> {
    Json(Envelope::new("ok").with_message("Pet adoption service is running"))
}

/// Success body: `{"success": true, "data": ..}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl<T> Envelope<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
            count: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<T> Envelope<Vec<T>> {
    pub fn list(data: Vec<T>) -> Self {
        let count = data.len();
        Self {
            count: Some(count),
            ..Self::new(data)
        }
    }
}

/// Failure body: `{"success": false, "message": .., "missingFields"?: [..]}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_fields: Option<Vec<String>>,
}

/// Everything a handler can fail with.
#[derive(Debug)]
pub enum ApiError {
    Domain(AdoptionError),
    Unauthenticated(&'static str),
    BadRequest(String),
    Internal(String),
}

impl From<AdoptionError> for ApiError {
    fn from(err: AdoptionError) -> Self {
        Self::Domain(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Domain(err) => match err {
                AdoptionError::Validation { .. } | AdoptionError::InvalidTransition { .. } => {
                    StatusCode::BAD_REQUEST
                }
                AdoptionError::NotFound(_) => StatusCode::NOT_FOUND,
                AdoptionError::Unauthorized(_) => StatusCode::FORBIDDEN,
                AdoptionError::Conflict(_) => StatusCode::CONFLICT,
                AdoptionError::Storage(_)
                | AdoptionError::Encode(_)
                | AdoptionError::Decode(_)
                | AdoptionError::Id(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (message, missing_fields) = match self {
            Self::Domain(AdoptionError::Validation { message, fields }) => (message, Some(fields)),
            Self::Domain(err) if err.is_client_error() => (err.to_string(), None),
            Self::Domain(err) => {
                tracing::error!(error = %err, "request failed");
                ("Server error".to_string(), None)
            }
            Self::Unauthenticated(reason) => (reason.to_string(), None),
            Self::BadRequest(message) => (message, None),
            Self::Internal(message) => {
                tracing::error!(error = %message, "request failed");
                ("Server error".to_string(), None)
            }
        };

        let body = ErrorBody {
            success: false,
            message,
            missing_fields,
        };
        (status, Json(body)).into_response()
    }
}

/// Run a blocking store operation off the async runtime.
pub(crate) async fn blocking<T, F>(op: F) -> Result<T, ApiError>
where
    F: FnOnce() -> crate::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(op).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(e) => Err(ApiError::Internal(format!("worker task failed: {e}"))),
    }
}
