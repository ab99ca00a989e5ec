//! Financial entity domain model.
//!
//! This module owns the raw/normalized entity types, the cleanup and
//! deduplication rules, and the searchable-document rendering.

mod document;
mod normalizer;
mod types;

pub use document::{build_document, Chunker};
pub use normalizer::{Normalizer, ValidationError};
pub use types::{EntityMetadata, EntityType, NormalizedEntity, RawEntity};
