pub mod adoption;
pub mod api;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod pet;
pub mod registry;
pub mod store;
pub mod types;
pub mod utils;
mod validation;

pub use adoption::{AdoptionRequest, AdoptionStatus, ApplicationForm};
pub use coordinator::{LifecycleCoordinator, OwnerStatistics};
pub use error::{AdoptionError, Result};
pub use pet::{Pet, PetDraft, PetFilter, PetStatus};
pub use store::Store;
pub use types::{Actor, Role};
