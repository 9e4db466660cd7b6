use crate::adoption::AdoptionStatus;

pub type Result<T> = std::result::Result<T, AdoptionError>;

#[derive(thiserror::Error, Debug)]
pub enum AdoptionError {
    #[error("{message}")]
    Validation {
        message: String,
        fields: Vec<String>, // every missing or invalid field, not just the first
    },
    #[error("{0} not found")]
    NotFound(String),
    #[error("Not authorized: {0}")]
    Unauthorized(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Cannot move an adoption request from {from} to {to}")]
    InvalidTransition {
        from: AdoptionStatus,
        to: AdoptionStatus,
    },
    #[error("Storage failure: {0}")]
    Storage(#[from] sled::Error),
    #[error("Failed to encode record: {0}")]
    Encode(#[from] minicbor::encode::Error<std::convert::Infallible>),
    #[error("Failed to decode record: {0}")]
    Decode(#[from] minicbor::decode::Error),
    #[error("Failed to generate record id: {0}")]
    Id(String),
}

impl AdoptionError {
    pub fn invalid_field(field: &str) -> Self {
        Self::Validation {
            message: format!("Invalid value for {field}"),
            fields: vec![field.to_string()],
        }
    }

    /// True for failures caused by the caller rather than by the store.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            Self::Storage(_) | Self::Encode(_) | Self::Decode(_) | Self::Id(_)
        )
    }
}
