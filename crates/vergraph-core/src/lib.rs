//! Vergraph Core - Versioned entity graph
//!
//! This crate provides immutable graph snapshots of nodes, ways and
//! relations. Snapshots in a chain share a base layer of fetched entities
//! and each carries its own local overrides, so an edit is cheap and every
//! earlier version stays readable. Newly fetched data is merged into a
//! chain with [`rebase`].

pub mod batch;
pub mod entity;
pub mod error;
pub mod graph;
pub mod rebase;
pub mod transient;
pub mod validation;

mod index;
mod layer;

pub use batch::{GraphBuilder, Mutation};
pub use entity::{Entity, EntityId, EntityKind, EntityType, Member};
pub use error::{Error, Result};
pub use graph::{Changes, Graph};
pub use rebase::{rebase, RebaseOptions, RebaseStats};
pub use transient::{TransientCache, TransientKey};
pub use validation::ValidationError;
