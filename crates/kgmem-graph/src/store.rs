//! The transactional storage boundary.
//!
//! Repositories never talk to a database directly. They open a transaction,
//! run a sequence of [`QueryIntent`]s, and commit or roll back. Each store
//! decides how an intent is executed.

use async_trait::async_trait;

use kgmem_core::{Entity, Relation};

use crate::client::GraphError;

/// A primitive graph operation together with its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryIntent {
    /// Entities whose name is in `names`. Yields [`Record::Entity`].
    FetchEntities { names: Vec<String> },
    /// Every entity. Yields [`Record::Entity`].
    FetchAllEntities,
    /// Entities whose name, type, or any observation contains `needle`,
    /// ignoring case. Yields [`Record::Entity`].
    SearchEntities { needle: String },
    /// Every relation. Yields [`Record::Relation`].
    FetchAllRelations,
    /// Relations with both endpoints in `names`. Yields [`Record::Relation`].
    FetchRelationsAmong { names: Vec<String> },
    /// Take the write lock on the named entities for the rest of the
    /// transaction. Issued before a read whose result is written back.
    /// Yields one [`Record::Count`] of the entities locked.
    LockEntities { names: Vec<String> },
    /// Create the entity unless its name exists. Yields one [`Record::Created`].
    CreateEntity(Entity),
    /// Replace an entity's observation list. Yields one [`Record::Count`].
    SetObservations {
        name: String,
        observations: Vec<String>,
    },
    /// Delete entities and every relation touching them. Yields one [`Record::Count`].
    DeleteEntities { names: Vec<String> },
    /// Create the relation unless the triple exists. Yields one
    /// [`Record::Created`], or nothing when an endpoint is missing.
    CreateRelation(Relation),
    /// Delete an exact triple. Yields one [`Record::Count`].
    DeleteRelation(Relation),
}

impl QueryIntent {
    /// Short name used in log fields.
    pub fn name(&self) -> &'static str {
        match self {
            Self::FetchEntities { .. } => "fetch_entities",
            Self::FetchAllEntities => "fetch_all_entities",
            Self::SearchEntities { .. } => "search_entities",
            Self::FetchAllRelations => "fetch_all_relations",
            Self::FetchRelationsAmong { .. } => "fetch_relations_among",
            Self::LockEntities { .. } => "lock_entities",
            Self::CreateEntity(_) => "create_entity",
            Self::SetObservations { .. } => "set_observations",
            Self::DeleteEntities { .. } => "delete_entities",
            Self::CreateRelation(_) => "create_relation",
            Self::DeleteRelation(_) => "delete_relation",
        }
    }
}

/// One row produced by running a [`QueryIntent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Entity(Entity),
    Relation(Relation),
    Created(bool),
    Count(i64),
}

/// A backing store that hands out transactions.
#[async_trait]
pub trait GraphStore: Send + Sync {
    type Txn: StoreTxn;

    /// Open a transaction. Nothing it writes is visible to other callers
    /// until [`StoreTxn::commit`].
    async fn begin(&self) -> Result<Self::Txn, GraphError>;
}

/// A unit of work against a [`GraphStore`].
///
/// Dropping a transaction without committing discards its writes.
#[async_trait]
pub trait StoreTxn: Send {
    async fn run(&mut self, intent: QueryIntent) -> Result<Vec<Record>, GraphError>;

    async fn commit(self) -> Result<(), GraphError>;

    async fn rollback(self) -> Result<(), GraphError>;
}

// ── Record Helpers ───────────────────────────────────────────────

/// Keep only entity rows.
pub fn entities(records: Vec<Record>) -> Vec<Entity> {
    records
        .into_iter()
        .filter_map(|r| match r {
            Record::Entity(e) => Some(e),
            _ => None,
        })
        .collect()
}

/// Keep only relation rows.
pub fn relations(records: Vec<Record>) -> Vec<Relation> {
    records
        .into_iter()
        .filter_map(|r| match r {
            Record::Relation(rel) => Some(rel),
            _ => None,
        })
        .collect()
}

/// The created flag of a create intent. No row means nothing was created.
pub fn created(records: &[Record]) -> bool {
    records
        .iter()
        .any(|r| matches!(r, Record::Created(true)))
}

/// The affected-row count of a write intent.
pub fn count(records: &[Record]) -> i64 {
    records
        .iter()
        .map(|r| match r {
            Record::Count(n) => *n,
            _ => 0,
        })
        .sum()
}
