//! Adoption request handlers.

use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::Deserialize;

use super::{ApiError, AppState, Envelope, blocking};
use crate::adoption::{AdoptionRequest, AdoptionStatus, ApplicationForm};
use crate::error::AdoptionError;
use crate::types::Actor;

/// Body of PUT /adoptions/{id}/status.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub status: Option<String>,
    pub owner_notes: Option<String>,
}

/// POST /pets/{petId}/adoptions
pub async fn submit(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(pet_id): Path<String>,
    body: Result<Json<ApplicationForm>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<AdoptionRequest>>), ApiError> {
    let Json(form) = body?;
    let coordinator = state.coordinator.clone();
    let request = blocking(move || coordinator.submit_request(&actor, &pet_id, &form)).await?;

    Ok((
        StatusCode::CREATED,
        Json(Envelope::new(request).with_message("Adoption request submitted successfully")),
    ))
}

/// GET /pets/{petId}/adoptions
pub async fn requests_for_pet(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(pet_id): Path<String>,
) -> Result<Json<Envelope<Vec<AdoptionRequest>>>, ApiError> {
    let coordinator = state.coordinator.clone();
    let requests = blocking(move || coordinator.requests_for_pet(&actor, &pet_id)).await?;
    Ok(Json(Envelope::list(requests)))
}

/// GET /adoptions/my-requests
pub async fn my_requests(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Envelope<Vec<AdoptionRequest>>>, ApiError> {
    let coordinator = state.coordinator.clone();
    let requests = blocking(move || coordinator.ledger().get_by_applicant(&actor.id)).await?;
    Ok(Json(Envelope::list(requests)))
}

/// GET /adoptions/my-adoptions
pub async fn my_adoptions(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Envelope<Vec<AdoptionRequest>>>, ApiError> {
    let coordinator = state.coordinator.clone();
    let requests = blocking(move || coordinator.ledger().adoptions_of(&actor.id)).await?;
    Ok(Json(Envelope::list(requests)))
}

/// GET /adoptions/owner-requests
pub async fn owner_requests(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Envelope<Vec<AdoptionRequest>>>, ApiError> {
    let coordinator = state.coordinator.clone();
    let requests = blocking(move || coordinator.ledger().get_by_owner(&actor.id)).await?;
    Ok(Json(Envelope::list(requests)))
}

/// GET /adoptions/{id}
pub async fn detail(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(request_id): Path<String>,
) -> Result<Json<Envelope<AdoptionRequest>>, ApiError> {
    let coordinator = state.coordinator.clone();
    let request = blocking(move || coordinator.request_detail(&actor, &request_id)).await?;
    Ok(Json(Envelope::new(request)))
}

/// PUT /adoptions/{id}/status
pub async fn update_status(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(request_id): Path<String>,
    body: Result<Json<StatusUpdate>, JsonRejection>,
) -> Result<Json<Envelope<AdoptionRequest>>, ApiError> {
    let Json(update) = body?;
    let requested: AdoptionStatus = update
        .status
        .as_deref()
        .ok_or_else(|| AdoptionError::invalid_field("status"))?
        .parse()?;

    let coordinator = state.coordinator.clone();
    let request = blocking(move || {
        coordinator.update_status(&request_id, &actor, requested, update.owner_notes)
    })
    .await?;

    let message = format!(
        "Adoption request {} successfully",
        requested.to_string().to_lowercase()
    );
    Ok(Json(Envelope::new(request).with_message(message)))
}
