//! Lifecycle coordinator: adoption workflow operations
//!
//! Every operation reads the pet and its requests, decides the outcome with
//! the rules in [`crate::lifecycle`], and writes all affected records in one
//! commit guarded by the pet's version. A commit that loses a race is re-read
//! and retried a bounded number of times.
use serde::Serialize;

use crate::adoption::{AdoptionRequest, AdoptionStatus, ApplicationForm, validate_owner_notes};
use crate::config::LifecycleConfig;
use crate::error::{AdoptionError, Result};
use crate::ledger::{AdoptionLedger, Submission};
use crate::lifecycle::{self, Transition};
use crate::pet::PetStatus;
use crate::registry::PetRegistry;
use crate::store::{Commit, Store, retry_stale};
use crate::types::{Actor, TimeStamp};

pub struct LifecycleCoordinator {
    store: Store,
    registry: PetRegistry,
    ledger: AdoptionLedger,
    config: LifecycleConfig,
}

/// Dashboard figures for a pet owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerStatistics {
    pub total_pets: usize,
    pub available_pets: usize,
    pub pending_pets: usize,
    pub adopted_pets: usize,
    pub pending_requests: usize,
}

impl LifecycleCoordinator {
    pub fn new(store: Store, config: LifecycleConfig) -> Self {
        let registry = PetRegistry::new(store.clone(), config);
        let ledger = AdoptionLedger::new(store.clone(), registry.clone());
        Self {
            store,
            registry,
            ledger,
            config,
        }
    }

    pub fn registry(&self) -> &PetRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &AdoptionLedger {
        &self.ledger
    }

    /// Submit an adoption application. The new request and the pet's move to
    /// Pending are committed together.
    pub fn submit_request(
        &self,
        actor: &Actor,
        pet_id: &str,
        form: &ApplicationForm,
    ) -> Result<AdoptionRequest> {
        retry_stale(self.config.max_commit_retries, "submit", pet_id, || {
            let now = TimeStamp::new();
            let Submission { mut pet, request } =
                self.ledger.submit(pet_id, &actor.id, form, now)?;

            let mut commit = Commit::guarded(&pet);
            // Pending -> Pending is a no-op but still bumps the version
            pet.set_status(PetStatus::Pending, now);
            commit.put_pet(pet);
            commit.insert_request(request.clone());

            if self.store.commit(&commit)?.is_stale() {
                return Ok(None);
            }

            tracing::info!(
                request_id = %request.id,
                pet_id,
                applicant = %actor.id,
                "adoption request submitted"
            );
            Ok(Some(request))
        })
    }

    /// Approve a pending request. The pet becomes Adopted and every other
    /// pending request for it is rejected.
    pub fn approve(
        &self,
        request_id: &str,
        actor: &Actor,
        owner_notes: Option<String>,
    ) -> Result<AdoptionRequest> {
        self.transition(request_id, actor, AdoptionStatus::Approved, owner_notes)
    }

    /// Reject a pending request. The pet reverts to Available when no other
    /// request is still pending.
    pub fn reject(
        &self,
        request_id: &str,
        actor: &Actor,
        owner_notes: Option<String>,
    ) -> Result<AdoptionRequest> {
        self.transition(request_id, actor, AdoptionStatus::Rejected, owner_notes)
    }

    /// Confirm the hand-off of an approved adoption.
    pub fn complete(&self, request_id: &str, actor: &Actor) -> Result<AdoptionRequest> {
        self.transition(request_id, actor, AdoptionStatus::Completed, None)
    }

    /// Move a request to `requested`, whatever it is. Illegal moves fail
    /// without touching anything.
    pub fn update_status(
        &self,
        request_id: &str,
        actor: &Actor,
        requested: AdoptionStatus,
        owner_notes: Option<String>,
    ) -> Result<AdoptionRequest> {
        self.transition(request_id, actor, requested, owner_notes)
    }

    fn transition(
        &self,
        request_id: &str,
        actor: &Actor,
        requested: AdoptionStatus,
        owner_notes: Option<String>,
    ) -> Result<AdoptionRequest> {
        let request = self.ledger.get(request_id)?;
        authorize_decision(actor, &request)?;
        let owner_notes = validate_owner_notes(owner_notes)?;

        // Illegal from the status the caller saw: a plain invalid transition.
        // Anything that changes it afterwards is a lost race.
        let observed = request.status();
        lifecycle::plan_transition(observed, requested)?;

        retry_stale(
            self.config.max_commit_retries,
            "transition",
            &request.pet_id,
            || self.try_transition(request_id, actor, observed, requested, owner_notes.clone()),
        )
    }

    fn try_transition(
        &self,
        request_id: &str,
        actor: &Actor,
        observed: AdoptionStatus,
        requested: AdoptionStatus,
        owner_notes: Option<String>,
    ) -> Result<Option<AdoptionRequest>> {
        let mut request = self.ledger.get(request_id)?;
        authorize_decision(actor, &request)?;

        let from = request.status();
        if from != observed {
            return Err(AdoptionError::Conflict(format!(
                "Adoption request {request_id} was changed concurrently ({observed} -> {from}), please retry"
            )));
        }
        let step = lifecycle::plan_transition(from, requested)?;
        let now = TimeStamp::new();

        let mut commit = match step {
            Transition::Approve => {
                let mut pet = self.registry.get_pet(&request.pet_id)?;
                if pet.status() == PetStatus::Adopted {
                    return Err(AdoptionError::Conflict(format!(
                        "Pet {} has already been adopted",
                        pet.id
                    )));
                }

                let mut commit = Commit::guarded(&pet);
                request.set_status(AdoptionStatus::Approved, owner_notes, now);

                // Fan-out: everyone else still waiting lost the race
                for mut sibling in self.ledger.get_by_pet(&pet.id)? {
                    if sibling.id != request.id && sibling.status() == AdoptionStatus::Pending {
                        sibling.set_status(AdoptionStatus::Rejected, None, now);
                        commit.put_request(sibling);
                    }
                }

                pet.adopt(&request.applicant_id, now);
                commit.put_pet(pet);
                commit
            }
            Transition::Reject => {
                let mut pet = self.registry.get_pet(&request.pet_id)?;
                let mut commit = Commit::guarded(&pet);
                request.set_status(AdoptionStatus::Rejected, owner_notes, now);

                let still_pending = self
                    .ledger
                    .get_by_pet(&pet.id)?
                    .iter()
                    .filter(|r| r.id != request.id && r.status() == AdoptionStatus::Pending)
                    .count();
                if still_pending == 0 && pet.status() == PetStatus::Pending {
                    pet.set_status(PetStatus::Available, now);
                }
                commit.put_pet(pet);
                commit
            }
            Transition::Complete => {
                request.set_status(AdoptionStatus::Completed, owner_notes, now);
                match self.store.get_pet(&request.pet_id)? {
                    Some(pet) => {
                        let mut commit = Commit::guarded(&pet);
                        commit.put_pet(pet);
                        commit
                    }
                    // listing already removed; the ledger row is all that is left
                    None => Commit::unguarded(&request.pet_id),
                }
            }
        };

        commit.put_request(request.clone());

        if self.store.commit(&commit)?.is_stale() {
            return Ok(None);
        }

        tracing::info!(
            request_id,
            pet_id = %request.pet_id,
            actor = %actor.id,
            %from,
            to = %requested,
            "adoption request transitioned"
        );
        Ok(Some(request))
    }

    /// Request detail, visible to the applicant, the pet owner and admins.
    pub fn request_detail(&self, actor: &Actor, request_id: &str) -> Result<AdoptionRequest> {
        let request = self.ledger.get(request_id)?;
        if actor.id != request.applicant_id && !actor.acts_for(&request.pet_owner_id) {
            return Err(AdoptionError::Unauthorized(format!(
                "{} is not a party to adoption request {request_id}",
                actor.id
            )));
        }
        Ok(request)
    }

    /// All requests for one pet. Pet owner or admin only.
    pub fn requests_for_pet(&self, actor: &Actor, pet_id: &str) -> Result<Vec<AdoptionRequest>> {
        let pet = self.registry.get_pet(pet_id)?;
        if !actor.acts_for(&pet.owner) {
            return Err(AdoptionError::Unauthorized(format!(
                "{} may not view requests for pet {pet_id}",
                actor.id
            )));
        }
        self.ledger.get_by_pet(pet_id)
    }

    pub fn owner_statistics(&self, owner_id: &str) -> Result<OwnerStatistics> {
        let pets = self.registry.list_by_owner(owner_id)?;
        let count = |status: PetStatus| pets.iter().filter(|p| p.status() == status).count();

        let mut pending_requests = 0;
        for pet in &pets {
            pending_requests += self
                .store
                .requests_for_pet(&pet.id)?
                .iter()
                .filter(|r| r.status() == AdoptionStatus::Pending)
                .count();
        }

        Ok(OwnerStatistics {
            total_pets: pets.len(),
            available_pets: count(PetStatus::Available),
            pending_pets: count(PetStatus::Pending),
            adopted_pets: count(PetStatus::Adopted),
            pending_requests,
        })
    }

    /// Checks the pet/request invariants for one pet against the store.
    pub fn is_consistent(&self, pet_id: &str) -> Result<bool> {
        let pet = self.registry.get_pet(pet_id)?;
        let statuses: Vec<AdoptionStatus> = self
            .store
            .requests_for_pet(pet_id)?
            .iter()
            .map(|r| r.status())
            .collect();
        Ok(lifecycle::is_consistent(pet.status(), &statuses))
    }
}

// Only the pet's owner or an admin decides on a request
fn authorize_decision(actor: &Actor, request: &AdoptionRequest) -> Result<()> {
    if actor.acts_for(&request.pet_owner_id) {
        Ok(())
    } else {
        Err(AdoptionError::Unauthorized(format!(
            "{} may not update adoption request {}",
            actor.id, request.id
        )))
    }
}
