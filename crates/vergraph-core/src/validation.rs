//! Structural validation for entities entering the graph

use crate::entity::{Entity, EntityId};

/// Maximum length for entity ids (64 chars)
pub const MAX_ENTITY_ID_LEN: usize = 64;

/// Maximum tags per entity (1024)
pub const MAX_TAGS_PER_ENTITY: usize = 1024;

/// Maximum tag key length (255 chars)
pub const MAX_TAG_KEY_LEN: usize = 255;

/// Maximum entities in a single rebase
pub const MAX_REBASE_BATCH: usize = 1_000_000;

/// Validation error type
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmptyEntityId,
    EntityIdTooLong { len: usize, max: usize },
    EntityIdWhitespace { id: String },
    EmptyReference { parent: String },
    NonFiniteLocation { id: String },
    TooManyTags { id: String, count: usize, max: usize },
    TagKeyTooLong { id: String, len: usize, max: usize },
    TooManyEntities { count: usize, max: usize },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyEntityId => write!(f, "Entity id cannot be empty"),
            Self::EntityIdTooLong { len, max } => {
                write!(f, "Entity id too long: {} chars (max {})", len, max)
            }
            Self::EntityIdWhitespace { id } => {
                write!(f, "Entity id contains whitespace: {:?}", id)
            }
            Self::EmptyReference { parent } => {
                write!(f, "Entity {} references an empty id", parent)
            }
            Self::NonFiniteLocation { id } => {
                write!(f, "Node {} has a non-finite location", id)
            }
            Self::TooManyTags { id, count, max } => {
                write!(f, "Too many tags on {}: {} (max {})", id, count, max)
            }
            Self::TagKeyTooLong { id, len, max } => {
                write!(f, "Tag key too long on {}: {} chars (max {})", id, len, max)
            }
            Self::TooManyEntities { count, max } => {
                write!(f, "Too many entities in rebase: {} (max {})", count, max)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate entity id
pub fn validate_entity_id(id: &EntityId) -> Result<(), ValidationError> {
    let id = id.as_str();
    if id.is_empty() {
        return Err(ValidationError::EmptyEntityId);
    }
    if id.len() > MAX_ENTITY_ID_LEN {
        return Err(ValidationError::EntityIdTooLong {
            len: id.len(),
            max: MAX_ENTITY_ID_LEN,
        });
    }
    if id.chars().any(char::is_whitespace) {
        return Err(ValidationError::EntityIdWhitespace { id: id.to_string() });
    }
    Ok(())
}

/// Validate an entity's id, references, location and tags
pub fn validate_entity(entity: &Entity) -> Result<(), ValidationError> {
    validate_entity_id(&entity.id)?;

    if entity.references().iter().any(|r| r.as_str().is_empty()) {
        return Err(ValidationError::EmptyReference {
            parent: entity.id.to_string(),
        });
    }

    if let Some(loc) = entity.loc() {
        if !loc.iter().all(|c| c.is_finite()) {
            return Err(ValidationError::NonFiniteLocation {
                id: entity.id.to_string(),
            });
        }
    }

    if entity.tags.len() > MAX_TAGS_PER_ENTITY {
        return Err(ValidationError::TooManyTags {
            id: entity.id.to_string(),
            count: entity.tags.len(),
            max: MAX_TAGS_PER_ENTITY,
        });
    }
    if let Some(key) = entity.tags.keys().find(|k| k.len() > MAX_TAG_KEY_LEN) {
        return Err(ValidationError::TagKeyTooLong {
            id: entity.id.to_string(),
            len: key.len(),
            max: MAX_TAG_KEY_LEN,
        });
    }
    Ok(())
}

/// Validate a whole rebase batch before any of it is merged
pub fn validate_rebase_batch(entities: &[Entity]) -> Result<(), ValidationError> {
    if entities.len() > MAX_REBASE_BATCH {
        return Err(ValidationError::TooManyEntities {
            count: entities.len(),
            max: MAX_REBASE_BATCH,
        });
    }
    entities.iter().try_for_each(validate_entity)
}
