//! sled-backed persistence for pets and adoption requests
//!
//! Three trees:
//! - `pets`: pet id -> CBOR `Pet`
//! - `adoptions`: request id -> CBOR `AdoptionRequest`
//! - `pet_requests`: pet id -> CBOR list of request ids for that pet
//!
//! Every write that spans records goes through [`Store::commit`], a single
//! multi-tree transaction guarded by the pet's version number.
use sled::Transactional;
use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult, TransactionError};
use std::path::Path;
use std::sync::Arc;

use crate::adoption::AdoptionRequest;
use crate::config::StorageConfig;
use crate::error::{AdoptionError, Result};
use crate::pet::Pet;

const PETS: &str = "pets";
const ADOPTIONS: &str = "adoptions";
const PET_REQUESTS: &str = "pet_requests";

#[derive(Clone)]
pub struct Store {
    instance: Arc<sled::Db>,
    pets: sled::Tree,
    adoptions: sled::Tree,
    pet_requests: sled::Tree,
}

/// What a commit does to the pet record itself.
#[derive(Debug, Clone)]
pub(crate) enum PetWrite {
    Keep,
    Put(Pet),
    Remove,
}

/// A staged set of writes for one pet and its requests.
#[derive(Debug, Clone)]
pub(crate) struct Commit {
    pet_id: String,
    expected_version: Option<u64>, // None: no guard, the pet is gone
    pet: PetWrite,
    requests: Vec<AdoptionRequest>,
    indexed: Vec<String>, // new request ids to append to the pet's index
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CommitOutcome {
    Applied,
    Stale, // the pet changed since it was read
}

impl CommitOutcome {
    pub fn is_stale(self) -> bool {
        self == CommitOutcome::Stale
    }
}

impl Commit {
    /// Writes that only apply if `pet` is still at the version it was read at.
    pub fn guarded(pet: &Pet) -> Self {
        Self {
            pet_id: pet.id.clone(),
            expected_version: Some(pet.version),
            pet: PetWrite::Keep,
            requests: vec![],
            indexed: vec![],
        }
    }

    pub fn unguarded(pet_id: &str) -> Self {
        Self {
            pet_id: pet_id.to_string(),
            expected_version: None,
            pet: PetWrite::Keep,
            requests: vec![],
            indexed: vec![],
        }
    }

    pub fn put_pet(&mut self, mut pet: Pet) {
        pet.version = self.expected_version.map_or(pet.version, |v| v + 1);
        self.pet = PetWrite::Put(pet);
    }

    pub fn remove_pet(&mut self) {
        self.pet = PetWrite::Remove;
    }

    pub fn put_request(&mut self, request: AdoptionRequest) {
        self.requests.push(request);
    }

    pub fn insert_request(&mut self, request: AdoptionRequest) {
        self.indexed.push(request.id.clone());
        self.requests.push(request);
    }
}

fn decode<T>(raw: &[u8]) -> Result<T>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    Ok(minicbor::decode(raw)?)
}

fn abort<T>(err: impl Into<AdoptionError>) -> ConflictableTransactionResult<T, AdoptionError> {
    Err(ConflictableTransactionError::Abort(err.into()))
}

impl Store {
    pub fn new(instance: Arc<sled::Db>) -> Result<Self> {
        Ok(Self {
            pets: instance.open_tree(PETS)?,
            adoptions: instance.open_tree(ADOPTIONS)?,
            pet_requests: instance.open_tree(PET_REQUESTS)?,
            instance,
        })
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(Arc::new(sled::open(path)?))
    }

    /// Opens the configured database; `temporary` stores are removed on drop.
    pub fn open_with(config: &StorageConfig) -> Result<Self> {
        let db = sled::Config::new()
            .path(&config.path)
            .temporary(config.temporary)
            .open()?;
        Self::new(Arc::new(db))
    }

    pub fn flush(&self) -> Result<()> {
        self.instance.flush()?;
        Ok(())
    }

    pub fn get_pet(&self, pet_id: &str) -> Result<Option<Pet>> {
        self.pets
            .get(pet_id.as_bytes())?
            .map(|raw| decode(&raw))
            .transpose()
    }

    pub fn pets(&self) -> Result<Vec<Pet>> {
        self.pets.iter().values().map(|raw| decode(&raw?)).collect()
    }

    /// Stores a freshly created pet. Ids are unique so no guard is needed.
    pub fn insert_pet(&self, pet: &Pet) -> Result<()> {
        self.pets.insert(pet.id.as_bytes(), minicbor::to_vec(pet)?)?;
        Ok(())
    }

    pub fn get_request(&self, request_id: &str) -> Result<Option<AdoptionRequest>> {
        self.adoptions
            .get(request_id.as_bytes())?
            .map(|raw| decode(&raw))
            .transpose()
    }

    pub fn requests(&self) -> Result<Vec<AdoptionRequest>> {
        self.adoptions.iter().values().map(|raw| decode(&raw?)).collect()
    }

    pub fn requests_for_pet(&self, pet_id: &str) -> Result<Vec<AdoptionRequest>> {
        let ids: Vec<String> = match self.pet_requests.get(pet_id.as_bytes())? {
            Some(raw) => decode(&raw)?,
            None => return Ok(vec![]),
        };

        let mut requests = Vec::with_capacity(ids.len());
        for id in ids {
            // index entries are written in the same transaction as the record
            match self.get_request(&id)? {
                Some(request) => requests.push(request),
                None => return Err(AdoptionError::NotFound(format!("Adoption request {id}"))),
            }
        }
        Ok(requests)
    }

    /// Applies every write in `commit` atomically, or none of them if the
    /// pet's version moved since it was read.
    pub(crate) fn commit(&self, commit: &Commit) -> Result<CommitOutcome> {
        // encode outside the transaction; the closure may run more than once
        let pet_bytes = match &commit.pet {
            PetWrite::Put(pet) => Some(minicbor::to_vec(pet)?),
            PetWrite::Keep | PetWrite::Remove => None,
        };
        let request_bytes = commit
            .requests
            .iter()
            .map(|r| Ok((r.id.clone(), minicbor::to_vec(r)?)))
            .collect::<Result<Vec<_>>>()?;
        let pet_key = commit.pet_id.as_bytes();

        let result = (&self.pets, &self.adoptions, &self.pet_requests).transaction(
            |(pets, adoptions, index)| -> ConflictableTransactionResult<CommitOutcome, AdoptionError> {
                if let Some(expected) = commit.expected_version {
                    let current = match pets.get(pet_key)? {
                        Some(raw) => match decode::<Pet>(&raw) {
                            Ok(pet) => Some(pet.version),
                            Err(e) => return abort(e),
                        },
                        None => None,
                    };
                    if current != Some(expected) {
                        return Ok(CommitOutcome::Stale);
                    }
                }

                match &pet_bytes {
                    Some(bytes) => {
                        pets.insert(pet_key, bytes.as_slice())?;
                    }
                    None if matches!(commit.pet, PetWrite::Remove) => {
                        pets.remove(pet_key)?;
                    }
                    None => {}
                }

                for (id, bytes) in &request_bytes {
                    adoptions.insert(id.as_bytes(), bytes.as_slice())?;
                }

                if !commit.indexed.is_empty() {
                    let mut ids: Vec<String> = match index.get(pet_key)? {
                        Some(raw) => match decode(&raw) {
                            Ok(ids) => ids,
                            Err(e) => return abort(e),
                        },
                        None => vec![],
                    };
                    ids.extend(commit.indexed.iter().cloned());
                    match minicbor::to_vec(&ids) {
                        Ok(bytes) => {
                            index.insert(pet_key, bytes)?;
                        }
                        Err(e) => return abort(e),
                    }
                }

                Ok(CommitOutcome::Applied)
            },
        );

        match result {
            Ok(outcome) => Ok(outcome),
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(e.into()),
        }
    }
}

/// Runs `attempt` until it commits, retrying stale commits at most
/// `max_retries` times before reporting a conflict. `attempt` returns
/// `Ok(None)` when its commit was stale; any error ends the loop at once.
pub(crate) fn retry_stale<T>(
    max_retries: u32,
    operation: &str,
    pet_id: &str,
    mut attempt: impl FnMut() -> Result<Option<T>>,
) -> Result<T> {
    for n in 0..=max_retries {
        if let Some(value) = attempt()? {
            return Ok(value);
        }
        tracing::debug!(operation, pet_id, attempt = n + 1, "stale commit, re-reading pet");
    }

    tracing::warn!(operation, pet_id, max_retries, "giving up after repeated stale commits");
    Err(AdoptionError::Conflict(format!(
        "Pet {pet_id} was modified concurrently, please retry"
    )))
}
