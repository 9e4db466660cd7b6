//! Pet listing and management handlers.

use axum::{
    Extension, Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
};
use serde::Serialize;

use super::{ApiError, AppState, Envelope, blocking};
use crate::coordinator::OwnerStatistics;
use crate::pet::{Pet, PetDraft, PetFilter};
use crate::types::Actor;

/// Body of GET /pets/owner: the caller's pets plus dashboard figures.
#[derive(Debug, Serialize)]
pub struct OwnerPets {
    pub success: bool,
    pub count: usize,
    pub data: Vec<Pet>,
    pub statistics: OwnerStatistics,
}

/// GET /pets
pub async fn list_pets(
    State(state): State<AppState>,
    query: Result<Query<PetFilter>, QueryRejection>,
) -> Result<Json<Envelope<Vec<Pet>>>, ApiError> {
    let Query(filter) = query?;
    let coordinator = state.coordinator.clone();
    let pets = blocking(move || coordinator.registry().list_available(&filter)).await?;
    Ok(Json(Envelope::list(pets)))
}

/// GET /pets/{id}
pub async fn get_pet(
    State(state): State<AppState>,
    Path(pet_id): Path<String>,
) -> Result<Json<Envelope<Pet>>, ApiError> {
    let coordinator = state.coordinator.clone();
    let pet = blocking(move || coordinator.registry().get_pet(&pet_id)).await?;
    Ok(Json(Envelope::new(pet)))
}

/// POST /pets
pub async fn create_pet(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    body: Result<Json<PetDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<Pet>>), ApiError> {
    let Json(draft) = body?;
    let coordinator = state.coordinator.clone();
    let pet = blocking(move || coordinator.registry().create_pet(&actor, &draft)).await?;

    let message = format!("Pet \"{}\" has been successfully added", pet.name);
    Ok((
        StatusCode::CREATED,
        Json(Envelope::new(pet).with_message(message)),
    ))
}

/// PUT /pets/{id}
pub async fn update_pet(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(pet_id): Path<String>,
    body: Result<Json<PetDraft>, JsonRejection>,
) -> Result<Json<Envelope<Pet>>, ApiError> {
    let Json(patch) = body?;
    let coordinator = state.coordinator.clone();
    let pet =
        blocking(move || coordinator.registry().update_pet(&pet_id, &actor, &patch)).await?;
    Ok(Json(Envelope::new(pet)))
}

/// DELETE /pets/{id}
pub async fn delete_pet(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(pet_id): Path<String>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    let coordinator = state.coordinator.clone();
    blocking(move || coordinator.registry().delete_pet(&pet_id, &actor)).await?;
    Ok(Json(
        Envelope::new(serde_json::json!({})).with_message("Pet deleted successfully"),
    ))
}

/// GET /pets/owner
pub async fn owner_pets(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<OwnerPets>, ApiError> {
    let coordinator = state.coordinator.clone();
    let (pets, statistics) = blocking(move || {
        let pets = coordinator.registry().list_by_owner(&actor.id)?;
        let statistics = coordinator.owner_statistics(&actor.id)?;
        Ok((pets, statistics))
    })
    .await?;

    Ok(Json(OwnerPets {
        success: true,
        count: pets.len(),
        data: pets,
        statistics,
    }))
}

/// GET /pets/admin
pub async fn all_pets(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Envelope<Vec<Pet>>>, ApiError> {
    let coordinator = state.coordinator.clone();
    let pets = blocking(move || coordinator.registry().list_all(&actor)).await?;
    Ok(Json(Envelope::list(pets)))
}
