//! Record id generation

use bech32::Bech32m;
use uuid7::uuid7;

use crate::error::{AdoptionError, Result};

pub const PET_PREFIX: &str = "pet_";
pub const ADOPTION_PREFIX: &str = "adoption_";

// construct a time-ordered unique id then encode using bech32
pub fn new_record_id(hrp: &str) -> Result<String> {
    let hrp = bech32::Hrp::parse(hrp).map_err(|e| AdoptionError::Id(e.to_string()))?;
    bech32::encode::<Bech32m>(hrp, uuid7().as_bytes()).map_err(|e| AdoptionError::Id(e.to_string()))
}
