//! kgmem-core: Shared types, configuration, and error handling for kgmem.
//!
//! This crate provides the foundational types used across all kgmem components:
//! - Entity and relation types for the knowledge graph
//! - Request and result shapes for the observation operations
//! - Configuration management
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use error::CoreError;
pub use types::{
    AddedObservations, Entity, KnowledgeGraph, ObservationAddition, ObservationDeletion, Relation,
};
