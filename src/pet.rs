//! Pet records, their enumerated attributes and listing filters
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::{AdoptionError, Result};
use crate::types::TimeStamp;
use crate::validation::FieldErrors;

const SHORT_TEXT_MAX: usize = 50;
const DESCRIPTION_MAX: usize = 500;

#[derive(
    minicbor::Encode, minicbor::Decode, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum Gender {
    #[n(0)]
    Male,
    #[n(1)]
    Female,
}

#[derive(
    minicbor::Encode, minicbor::Decode, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum Size {
    #[n(0)]
    Small,
    #[n(1)]
    Medium,
    #[n(2)]
    Large,
}

#[derive(
    minicbor::Encode,
    minicbor::Decode,
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
)]
pub enum PetStatus {
    #[default]
    #[n(0)]
    Available,
    #[n(1)]
    Pending,
    #[n(2)]
    Adopted,
}

impl FromStr for Gender {
    type Err = AdoptionError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Male" => Ok(Gender::Male),
            "Female" => Ok(Gender::Female),
            _ => Err(AdoptionError::invalid_field("gender")),
        }
    }
}

impl FromStr for Size {
    type Err = AdoptionError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Small" => Ok(Size::Small),
            "Medium" => Ok(Size::Medium),
            "Large" => Ok(Size::Large),
            _ => Err(AdoptionError::invalid_field("size")),
        }
    }
}

impl fmt::Display for PetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PetStatus::Available => "Available",
            PetStatus::Pending => "Pending",
            PetStatus::Adopted => "Adopted",
        };
        f.write_str(name)
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pet {
    #[n(0)]
    pub id: String, // bech32 encoded uuid7, "pet_" prefix
    #[n(1)]
    pub name: String,
    #[n(2)]
    pub species: String,
    #[n(3)]
    pub breed: String,
    #[n(4)]
    pub age: String, // free text, e.g. "2 years"
    #[n(5)]
    pub gender: Gender,
    #[n(6)]
    pub size: Size,
    #[n(7)]
    pub description: String,
    #[n(8)]
    pub location: String,
    #[n(9)]
    pub image_url: String,
    #[n(10)]
    pub(crate) status: PetStatus,
    #[n(11)]
    pub owner: String,
    #[n(12)]
    pub created_at: TimeStamp,
    #[n(13)]
    pub updated_at: TimeStamp,
    #[n(14)]
    pub(crate) version: u64, // bumped on every committed write
    #[n(15)]
    pub(crate) adopted_by: Option<String>, // applicant of the approved request
}

impl Pet {
    pub(crate) fn new(id: String, owner: String, attrs: PetAttributes, now: TimeStamp) -> Self {
        Self {
            id,
            name: attrs.name,
            species: attrs.species,
            breed: attrs.breed,
            age: attrs.age,
            gender: attrs.gender,
            size: attrs.size,
            description: attrs.description,
            location: attrs.location,
            image_url: attrs.image_url,
            status: PetStatus::Available,
            owner,
            created_at: now,
            updated_at: now,
            version: 0,
            adopted_by: None,
        }
    }

    pub fn status(&self) -> PetStatus {
        self.status
    }
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn adopted_by(&self) -> Option<&str> {
        self.adopted_by.as_deref()
    }

    // Only the lifecycle coordinator (and pet removal) moves a pet's status.
    pub(crate) fn set_status(&mut self, status: PetStatus, now: TimeStamp) {
        if status != PetStatus::Adopted {
            self.adopted_by = None;
        }
        if self.status != status {
            self.status = status;
            self.updated_at = now;
        }
    }

    pub(crate) fn adopt(&mut self, applicant_id: &str, now: TimeStamp) {
        self.adopted_by = Some(applicant_id.to_string());
        self.set_status(PetStatus::Adopted, now);
    }

    pub(crate) fn apply(&mut self, attrs: PetAttributes, now: TimeStamp) {
        self.name = attrs.name;
        self.species = attrs.species;
        self.breed = attrs.breed;
        self.age = attrs.age;
        self.gender = attrs.gender;
        self.size = attrs.size;
        self.description = attrs.description;
        self.location = attrs.location;
        self.image_url = attrs.image_url;
        self.updated_at = now;
    }
}

/// Validated, trimmed pet fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PetAttributes {
    pub name: String,
    pub species: String,
    pub breed: String,
    pub age: String,
    pub gender: Gender,
    pub size: Size,
    pub description: String,
    pub location: String,
    pub image_url: String,
}

/// Client supplied pet fields. Used whole for creation and sparse as an
/// update patch. There is no status field: status is never client input.
#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PetDraft {
    pub name: Option<String>,
    pub species: Option<String>,
    pub breed: Option<String>,
    pub age: Option<String>,
    pub gender: Option<String>,
    pub size: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub image_url: Option<String>,
}

impl PetDraft {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }
    pub fn set_species(mut self, species: &str) -> Self {
        self.species = Some(species.to_string());
        self
    }
    pub fn set_breed(mut self, breed: &str) -> Self {
        self.breed = Some(breed.to_string());
        self
    }
    pub fn set_age(mut self, age: &str) -> Self {
        self.age = Some(age.to_string());
        self
    }
    pub fn set_gender(mut self, gender: &str) -> Self {
        self.gender = Some(gender.to_string());
        self
    }
    pub fn set_size(mut self, size: &str) -> Self {
        self.size = Some(size.to_string());
        self
    }
    pub fn set_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }
    pub fn set_location(mut self, location: &str) -> Self {
        self.location = Some(location.to_string());
        self
    }
    pub fn set_image_url(mut self, image_url: &str) -> Self {
        self.image_url = Some(image_url.to_string());
        self
    }

    /// Layers `patch` on top of this draft; fields the patch leaves out keep
    /// their current value.
    pub fn overlay(self, patch: &PetDraft) -> Self {
        Self {
            name: patch.name.clone().or(self.name),
            species: patch.species.clone().or(self.species),
            breed: patch.breed.clone().or(self.breed),
            age: patch.age.clone().or(self.age),
            gender: patch.gender.clone().or(self.gender),
            size: patch.size.clone().or(self.size),
            description: patch.description.clone().or(self.description),
            location: patch.location.clone().or(self.location),
            image_url: patch.image_url.clone().or(self.image_url),
        }
    }

    // Checks every field and reports all failures at once
    pub fn validate(&self) -> Result<PetAttributes> {
        let mut errors = FieldErrors::new();

        let name = errors.require("name", self.name.as_deref());
        let species = errors.require("species", self.species.as_deref());
        let breed = errors.require("breed", self.breed.as_deref());
        let age = errors.require("age", self.age.as_deref());
        let gender = errors.require_parsed::<Gender>("gender", self.gender.as_deref());
        let size = errors.require_parsed::<Size>("size", self.size.as_deref());
        let description = errors.require("description", self.description.as_deref());
        let location = errors.require("location", self.location.as_deref());
        let image_url = errors.require("imageUrl", self.image_url.as_deref());

        errors.max_len("name", name.as_deref(), SHORT_TEXT_MAX);
        errors.max_len("species", species.as_deref(), SHORT_TEXT_MAX);
        errors.max_len("breed", breed.as_deref(), SHORT_TEXT_MAX);
        errors.max_len("description", description.as_deref(), DESCRIPTION_MAX);

        match (
            name,
            species,
            breed,
            age,
            gender,
            size,
            description,
            location,
            image_url,
        ) {
            (
                Some(name),
                Some(species),
                Some(breed),
                Some(age),
                Some(gender),
                Some(size),
                Some(description),
                Some(location),
                Some(image_url),
            ) if errors.is_empty() => Ok(PetAttributes {
                name,
                species,
                breed,
                age,
                gender,
                size,
                description,
                location,
                image_url,
            }),
            _ => {
                errors.finish()?;
                Err(AdoptionError::invalid_field("pet"))
            }
        }
    }
}

impl From<&Pet> for PetDraft {
    fn from(pet: &Pet) -> Self {
        let gender = match pet.gender {
            Gender::Male => "Male",
            Gender::Female => "Female",
        };
        let size = match pet.size {
            Size::Small => "Small",
            Size::Medium => "Medium",
            Size::Large => "Large",
        };
        Self {
            name: Some(pet.name.clone()),
            species: Some(pet.species.clone()),
            breed: Some(pet.breed.clone()),
            age: Some(pet.age.clone()),
            gender: Some(gender.to_string()),
            size: Some(size.to_string()),
            description: Some(pet.description.clone()),
            location: Some(pet.location.clone()),
            image_url: Some(pet.image_url.clone()),
        }
    }
}

/// Listing query. Text filters match case-insensitive substrings; `status`
/// defaults to `Available`.
#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct PetFilter {
    pub species: Option<String>,
    pub gender: Option<Gender>,
    pub size: Option<Size>,
    pub location: Option<String>,
    pub status: Option<PetStatus>,
    pub search: Option<String>, // over name, breed and description
}

impl PetFilter {
    pub fn matches(&self, pet: &Pet) -> bool {
        if pet.status != self.status.unwrap_or(PetStatus::Available) {
            return false;
        }
        if self.gender.is_some_and(|g| g != pet.gender) {
            return false;
        }
        if self.size.is_some_and(|s| s != pet.size) {
            return false;
        }
        if !contains_ignore_case(&pet.species, self.species.as_deref()) {
            return false;
        }
        if !contains_ignore_case(&pet.location, self.location.as_deref()) {
            return false;
        }
        match self.search.as_deref() {
            Some(term) => [&pet.name, &pet.breed, &pet.description]
                .iter()
                .any(|field| contains_ignore_case(field, Some(term))),
            None => true,
        }
    }
}

// an absent or blank needle matches everything
fn contains_ignore_case(haystack: &str, needle: Option<&str>) -> bool {
    match needle.map(str::trim) {
        Some(n) if !n.is_empty() => haystack.to_lowercase().contains(&n.to_lowercase()),
        _ => true,
    }
}
