//! kgmem-graph: the storage gateway for the knowledge graph.
//!
//! Every read and write the repositories perform is expressed as a
//! [`QueryIntent`] and executed inside a [`StoreTxn`] obtained from a
//! [`GraphStore`]. Two stores are provided: [`GraphClient`] against Neo4j and
//! [`InMemoryStore`] for tests and ephemeral runs.

pub mod client;
pub mod cypher;
pub mod memory;
pub mod store;

pub use client::{GraphClient, GraphConfig, GraphError};
pub use memory::InMemoryStore;
pub use store::{GraphStore, QueryIntent, Record, StoreTxn};
