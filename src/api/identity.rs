//! Identity middleware.
//!
//! Authentication happens upstream; this layer trusts the forwarded headers:
//! - `x-user-id`: the caller's id
//! - `x-user-role`: `user`, `petowner` or `admin`
//!
//! Missing or malformed headers are rejected with 401 before any handler runs.

use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use super::ApiError;
use crate::types::{Actor, Role};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Resolve the caller and stash it in the request extensions for handlers.
pub async fn identity_middleware(mut request: Request, next: Next) -> Result<Response, ApiError> {
    let actor = actor_from_headers(request.headers())?;
    tracing::debug!(actor = %actor.id, role = %actor.role, "identity resolved");

    request.extensions_mut().insert(actor);
    Ok(next.run(request).await)
}

fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ApiError> {
    let id = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ApiError::Unauthenticated("Missing or invalid x-user-id header"))?;

    let role = headers
        .get(USER_ROLE_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<Role>().ok())
        .ok_or(ApiError::Unauthenticated("Missing or invalid x-user-role header"))?;

    Ok(Actor::new(id, role))
}
