//! Pet registry: pet records and the authority on each pet's current status
use crate::adoption::AdoptionStatus;
use crate::config::LifecycleConfig;
use crate::error::{AdoptionError, Result};
use crate::pet::{Pet, PetDraft, PetFilter};
use crate::store::{Commit, Store, retry_stale};
use crate::types::{Actor, Role, TimeStamp};
use crate::utils::{PET_PREFIX, new_record_id};

#[derive(Clone)]
pub struct PetRegistry {
    store: Store,
    config: LifecycleConfig,
}

impl PetRegistry {
    pub fn new(store: Store, config: LifecycleConfig) -> Self {
        Self { store, config }
    }

    /// List a new pet. The caller becomes its owner and it starts Available.
    pub fn create_pet(&self, actor: &Actor, draft: &PetDraft) -> Result<Pet> {
        if !matches!(actor.role, Role::PetOwner | Role::Admin) {
            return Err(AdoptionError::Unauthorized(
                "only pet owners can list pets".into(),
            ));
        }

        let attrs = draft.validate()?;
        let pet = Pet::new(
            new_record_id(PET_PREFIX)?,
            actor.id.clone(),
            attrs,
            TimeStamp::new(),
        );
        self.store.insert_pet(&pet)?;

        tracing::info!(pet_id = %pet.id, owner = %pet.owner, "pet listed");
        Ok(pet)
    }

    pub fn get_pet(&self, pet_id: &str) -> Result<Pet> {
        self.store
            .get_pet(pet_id)?
            .ok_or_else(|| AdoptionError::NotFound(format!("Pet {pet_id}")))
    }

    /// Owner load with the ownership check the mutating calls share.
    fn get_owned(&self, pet_id: &str, actor: &Actor) -> Result<Pet> {
        let pet = self.get_pet(pet_id)?;
        if !actor.acts_for(&pet.owner) {
            return Err(AdoptionError::Unauthorized(format!(
                "{} does not own pet {pet_id}",
                actor.id
            )));
        }
        Ok(pet)
    }

    /// Merge `patch` into the pet's fields and re-validate. Status is not
    /// part of a patch.
    pub fn update_pet(&self, pet_id: &str, actor: &Actor, patch: &PetDraft) -> Result<Pet> {
        retry_stale(self.config.max_commit_retries, "update_pet", pet_id, || {
            let mut pet = self.get_owned(pet_id, actor)?;
            let attrs = PetDraft::from(&pet).overlay(patch).validate()?;
            pet.apply(attrs, TimeStamp::new());

            let mut commit = Commit::guarded(&pet);
            commit.put_pet(pet.clone());
            if self.store.commit(&commit)?.is_stale() {
                return Ok(None);
            }

            pet.version += 1;
            Ok(Some(pet))
        })
    }

    /// Remove a pet listing. Its adoption requests stay in the ledger flagged
    /// `pet_removed`; any still pending are rejected in the same commit.
    pub fn delete_pet(&self, pet_id: &str, actor: &Actor) -> Result<()> {
        retry_stale(self.config.max_commit_retries, "delete_pet", pet_id, || {
            let pet = self.get_owned(pet_id, actor)?;
            let now = TimeStamp::new();

            let mut commit = Commit::guarded(&pet);
            commit.remove_pet();
            for mut request in self.store.requests_for_pet(pet_id)? {
                if request.status() == AdoptionStatus::Pending {
                    request.set_status(AdoptionStatus::Rejected, None, now);
                }
                request.mark_pet_removed(now);
                commit.put_request(request);
            }

            if self.store.commit(&commit)?.is_stale() {
                return Ok(None);
            }
            tracing::info!(pet_id, actor = %actor.id, "pet removed");
            Ok(Some(()))
        })
    }

    /// Public listing, newest first. Status defaults to Available.
    pub fn list_available(&self, filter: &PetFilter) -> Result<Vec<Pet>> {
        let mut pets: Vec<Pet> = self
            .store
            .pets()?
            .into_iter()
            .filter(|pet| filter.matches(pet))
            .collect();
        sort_newest_first(&mut pets);
        Ok(pets)
    }

    pub fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Pet>> {
        let mut pets: Vec<Pet> = self
            .store
            .pets()?
            .into_iter()
            .filter(|pet| pet.owner == owner_id)
            .collect();
        sort_newest_first(&mut pets);
        Ok(pets)
    }

    /// Every pet regardless of status. Admin only.
    pub fn list_all(&self, actor: &Actor) -> Result<Vec<Pet>> {
        if !actor.is_admin() {
            return Err(AdoptionError::Unauthorized(
                "only admins can list every pet".into(),
            ));
        }
        let mut pets = self.store.pets()?;
        sort_newest_first(&mut pets);
        Ok(pets)
    }
}

fn sort_newest_first(pets: &mut [Pet]) {
    pets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
