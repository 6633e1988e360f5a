//! kgmem-memory: knowledge graph memory operations.
//!
//! Entities and relations live in an external graph store reached through
//! [`kgmem_graph::GraphStore`]. This crate adds the operation semantics on top:
//! merge-on-create, observation de-duplication, cascading deletes, endpoint
//! checks, case-insensitive search, and input validation. No graph state is
//! cached between calls.

pub mod entities;
pub mod error;
pub mod facade;
pub mod query;
pub mod relations;
pub mod stdio;
mod unit;

pub use entities::EntityRepository;
pub use error::MemoryError;
pub use facade::{Ack, KnowledgeGraphMemory, Operation};
pub use query::QueryService;
pub use relations::RelationRepository;
