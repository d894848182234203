//! Error types for Vergraph Core

use crate::entity::EntityId;
use crate::validation::ValidationError;
use thiserror::Error;

/// Result type alias using Vergraph's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Vergraph error types
///
/// Every variant is a contract violation surfaced to the immediate caller;
/// nothing in the core retries or recovers.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Entity not found: {0}")]
    MissingEntity(EntityId),

    #[error("Invalid mutation: {0}")]
    InvalidMutation(String),

    #[error("Malformed entity: {0}")]
    MalformedEntity(String),

    #[error("Rebase chain mismatch: {0}")]
    ChainMismatch(String),
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Self::MalformedEntity(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_surface_as_malformed() {
        let err: Error = ValidationError::EmptyEntityId.into();
        assert!(matches!(&err, Error::MalformedEntity(msg) if msg == "Entity id cannot be empty"));
        assert_eq!(err.to_string(), "Malformed entity: Entity id cannot be empty");
    }

    #[test]
    fn test_missing_entity_message() {
        let err = Error::MissingEntity(EntityId::new("w7"));
        assert_eq!(err.to_string(), "Entity not found: w7");
    }
}
