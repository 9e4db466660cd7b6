//! Adoption request ledger: record keeping for adoption attempts
//!
//! The ledger validates and builds records and answers read queries. It holds
//! no cross-entity rules; records reach the store through the coordinator so
//! they land in the same transaction as the pet status they imply.
use crate::adoption::{AdoptionRequest, AdoptionStatus, ApplicationForm};
use crate::error::{AdoptionError, Result};
use crate::pet::{Pet, PetStatus};
use crate::registry::PetRegistry;
use crate::store::Store;
use crate::types::TimeStamp;
use crate::utils::{ADOPTION_PREFIX, new_record_id};

#[derive(Clone)]
pub struct AdoptionLedger {
    store: Store,
    registry: PetRegistry,
}

/// A validated request together with the pet snapshot it was checked against.
#[derive(Debug, Clone)]
pub struct Submission {
    pub pet: Pet,
    pub request: AdoptionRequest,
}

impl AdoptionLedger {
    pub fn new(store: Store, registry: PetRegistry) -> Self {
        Self { store, registry }
    }

    /// Build a new Pending request for `applicant_id`.
    pub fn submit(
        &self,
        pet_id: &str,
        applicant_id: &str,
        form: &ApplicationForm,
        now: TimeStamp,
    ) -> Result<Submission> {
        let pet = self.registry.get_pet(pet_id)?;

        if pet.status() == PetStatus::Adopted {
            return Err(AdoptionError::Conflict(format!(
                "Pet {pet_id} has already been adopted"
            )));
        }

        let siblings = self.store.requests_for_pet(pet_id)?;
        if let Some(existing) = siblings
            .iter()
            .find(|r| r.applicant_id == applicant_id && r.status().is_open())
        {
            return Err(AdoptionError::Conflict(format!(
                "Duplicate request: you already have a {} adoption request for this pet",
                existing.status().to_string().to_lowercase()
            )));
        }

        let (application, notes) = form.validate()?;

        let request = AdoptionRequest {
            id: new_record_id(ADOPTION_PREFIX)?,
            pet_id: pet.id.clone(),
            applicant_id: applicant_id.to_string(),
            pet_owner_id: pet.owner.clone(),
            status: AdoptionStatus::Pending,
            application_digest: application.digest()?,
            application,
            notes,
            owner_notes: None,
            submitted_at: now,
            approval_date: None,
            completion_date: None,
            updated_at: now,
            pet_removed: false,
        };

        Ok(Submission { pet, request })
    }

    pub fn get(&self, request_id: &str) -> Result<AdoptionRequest> {
        self.store
            .get_request(request_id)?
            .ok_or_else(|| AdoptionError::NotFound(format!("Adoption request {request_id}")))
    }

    pub fn get_by_pet(&self, pet_id: &str) -> Result<Vec<AdoptionRequest>> {
        let mut requests = self.store.requests_for_pet(pet_id)?;
        sort_newest_first(&mut requests);
        Ok(requests)
    }

    pub fn get_by_applicant(&self, applicant_id: &str) -> Result<Vec<AdoptionRequest>> {
        self.scan(|r| r.applicant_id == applicant_id)
    }

    pub fn get_by_owner(&self, owner_id: &str) -> Result<Vec<AdoptionRequest>> {
        self.scan(|r| r.pet_owner_id == owner_id)
    }

    /// The applicant's successful adoptions, most recently approved first.
    pub fn adoptions_of(&self, applicant_id: &str) -> Result<Vec<AdoptionRequest>> {
        let mut requests =
            self.scan(|r| r.applicant_id == applicant_id && r.status().is_successful())?;
        requests.sort_by(|a, b| b.approval_date.cmp(&a.approval_date));
        Ok(requests)
    }

    fn scan(&self, keep: impl Fn(&AdoptionRequest) -> bool) -> Result<Vec<AdoptionRequest>> {
        let mut requests: Vec<AdoptionRequest> = self
            .store
            .requests()?
            .into_iter()
            .filter(|r| keep(r))
            .collect();
        sort_newest_first(&mut requests);
        Ok(requests)
    }
}

fn sort_newest_first(requests: &mut [AdoptionRequest]) {
    requests.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
}
