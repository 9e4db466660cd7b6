//! Adoption requests and the application snapshot captured at submission
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::{AdoptionError, Result};
use crate::types::TimeStamp;
use crate::validation::FieldErrors;

const NOTES_MAX: usize = 500;

#[derive(
    minicbor::Encode, minicbor::Decode, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash,
)]
pub enum AdoptionStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Approved,
    #[n(2)]
    Rejected,
    #[n(3)]
    Completed,
}

impl AdoptionStatus {
    /// Pending and Approved requests block a second request from the same
    /// applicant for the same pet.
    pub fn is_open(self) -> bool {
        matches!(self, AdoptionStatus::Pending | AdoptionStatus::Approved)
    }
    /// Requests that make their pet Adopted.
    pub fn is_successful(self) -> bool {
        matches!(self, AdoptionStatus::Approved | AdoptionStatus::Completed)
    }
    pub fn is_terminal(self) -> bool {
        matches!(self, AdoptionStatus::Rejected | AdoptionStatus::Completed)
    }
}

impl fmt::Display for AdoptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AdoptionStatus::Pending => "Pending",
            AdoptionStatus::Approved => "Approved",
            AdoptionStatus::Rejected => "Rejected",
            AdoptionStatus::Completed => "Completed",
        };
        f.write_str(name)
    }
}

impl FromStr for AdoptionStatus {
    type Err = AdoptionError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Pending" => Ok(AdoptionStatus::Pending),
            "Approved" => Ok(AdoptionStatus::Approved),
            "Rejected" => Ok(AdoptionStatus::Rejected),
            "Completed" => Ok(AdoptionStatus::Completed),
            _ => Err(AdoptionError::invalid_field("status")),
        }
    }
}

/// The applicant's details and questionnaire answers, frozen at submission.
#[derive(minicbor::Encode, minicbor::Decode, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSnapshot {
    #[n(0)]
    pub first_name: String,
    #[n(1)]
    pub last_name: String,
    #[n(2)]
    pub email: String,
    #[n(3)]
    pub phone: String,
    #[n(4)]
    pub address: String,
    #[n(5)]
    pub city: String,
    #[n(6)]
    pub state: String,
    #[n(7)]
    pub zip_code: String,
    #[n(8)]
    pub home_environment: String,
    #[n(9)]
    pub previous_pets: String,
    #[n(10)]
    pub reason_for_adoption: String,
    #[n(11)]
    pub time_at_home: String,
    #[n(12)]
    pub other_pets: String,
    #[n(13)]
    pub children: String,
    #[n(14)]
    pub landlord_approval: String,
}

impl ApplicationSnapshot {
    /// sha256 over the CBOR encoding; stored next to the snapshot so any later
    /// change to it is detectable.
    pub fn digest(&self) -> Result<String> {
        let contents = minicbor::to_vec(self)?;
        Ok(sha256::digest(&contents))
    }
}

/// The submitted application form as received from the client.
#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationForm {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub home_environment: Option<String>,
    pub previous_pets: Option<String>,
    pub reason_for_adoption: Option<String>,
    pub time_at_home: Option<String>,
    pub other_pets: Option<String>,
    pub children: Option<String>,
    pub landlord_approval: Option<String>,
    pub notes: Option<String>,
}

impl ApplicationForm {
    /// Returns the snapshot and the applicant notes. Notes fall back to a
    /// summary of the questionnaire when none were given.
    pub fn validate(&self) -> Result<(ApplicationSnapshot, String)> {
        let mut errors = FieldErrors::new();

        let fields = [
            ("firstName", &self.first_name),
            ("lastName", &self.last_name),
            ("email", &self.email),
            ("phone", &self.phone),
            ("address", &self.address),
            ("city", &self.city),
            ("state", &self.state),
            ("zipCode", &self.zip_code),
            ("homeEnvironment", &self.home_environment),
            ("previousPets", &self.previous_pets),
            ("reasonForAdoption", &self.reason_for_adoption),
            ("timeAtHome", &self.time_at_home),
            ("otherPets", &self.other_pets),
            ("children", &self.children),
            ("landlordApproval", &self.landlord_approval),
        ];
        let values: Vec<String> = fields
            .iter()
            .map(|(name, value)| errors.require(name, value.as_deref()).unwrap_or_default())
            .collect();

        let notes = self
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty());
        errors.max_len("notes", notes, NOTES_MAX);
        errors.finish()?;

        let [
            first_name,
            last_name,
            email,
            phone,
            address,
            city,
            state,
            zip_code,
            home_environment,
            previous_pets,
            reason_for_adoption,
            time_at_home,
            other_pets,
            children,
            landlord_approval,
        ]: [String; 15] = values
            .try_into()
            .map_err(|_| AdoptionError::invalid_field("application"))?;

        let notes = match notes {
            Some(n) => n.to_string(),
            None => format!(
                "{reason_for_adoption} - {home_environment} home with {time_at_home} availability"
            ),
        };

        let snapshot = ApplicationSnapshot {
            first_name,
            last_name,
            email,
            phone,
            address,
            city,
            state,
            zip_code,
            home_environment,
            previous_pets,
            reason_for_adoption,
            time_at_home,
            other_pets,
            children,
            landlord_approval,
        };

        Ok((snapshot, notes))
    }
}

/// Owner notes are optional; blank ones are treated as absent.
pub(crate) fn validate_owner_notes(notes: Option<String>) -> Result<Option<String>> {
    let notes = notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    let mut errors = FieldErrors::new();
    errors.max_len("ownerNotes", notes.as_deref(), NOTES_MAX);
    errors.finish()?;
    Ok(notes)
}

#[derive(minicbor::Encode, minicbor::Decode, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AdoptionRequest {
    #[n(0)]
    pub id: String, // "adoption_" prefixed bech32 uuid7
    #[n(1)]
    pub pet_id: String,
    #[n(2)]
    pub applicant_id: String,
    #[n(3)]
    pub pet_owner_id: String, // copied from the pet at submission
    #[n(4)]
    pub(crate) status: AdoptionStatus,
    #[n(5)]
    pub application: ApplicationSnapshot,
    #[n(6)]
    pub application_digest: String,
    #[n(7)]
    pub notes: String,
    #[n(8)]
    pub owner_notes: Option<String>,
    #[n(9)]
    pub submitted_at: TimeStamp,
    #[n(10)]
    pub approval_date: Option<TimeStamp>,
    #[n(11)]
    pub completion_date: Option<TimeStamp>,
    #[n(12)]
    pub updated_at: TimeStamp,
    #[n(13)]
    pub pet_removed: bool, // tombstone: the pet listing was deleted
}

impl AdoptionRequest {
    pub fn status(&self) -> AdoptionStatus {
        self.status
    }

    /// Field mutation and timestamp stamping only. Whether the move is legal,
    /// and what it means for the pet, is decided by the coordinator.
    pub(crate) fn set_status(
        &mut self,
        status: AdoptionStatus,
        owner_notes: Option<String>,
        now: TimeStamp,
    ) {
        if status == AdoptionStatus::Approved && self.approval_date.is_none() {
            self.approval_date = Some(now);
        }
        if status == AdoptionStatus::Completed && self.completion_date.is_none() {
            self.completion_date = Some(now);
        }
        if owner_notes.is_some() {
            self.owner_notes = owner_notes;
        }
        self.status = status;
        self.updated_at = now;
    }

    pub(crate) fn mark_pet_removed(&mut self, now: TimeStamp) {
        self.pet_removed = true;
        self.updated_at = now;
    }
}
