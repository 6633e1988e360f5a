//! Relation repository: create with endpoint checks, and exact-triple delete.

use std::collections::HashSet;

use kgmem_core::Relation;
use kgmem_graph::store::{count, created, entities};
use kgmem_graph::{GraphStore, QueryIntent, Record, StoreTxn};

use crate::error::{MemoryError, Result};
use crate::unit::finish;

/// Stateless relation operations over an injected store.
#[derive(Clone)]
pub struct RelationRepository<S> {
    store: S,
}

impl<S: GraphStore> RelationRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Create relations that do not exist yet and return only those.
    ///
    /// Both endpoints of every relation must already exist. If any does not,
    /// the call fails with [`MemoryError::Constraint`] and creates nothing.
    pub async fn create_relations(&self, batch: Vec<Relation>) -> Result<Vec<Relation>> {
        let requested = batch.len();
        let mut txn = self.store.begin().await?;
        let outcome = create_in(&mut txn, batch).await;
        let created = finish(txn, outcome).await?;
        tracing::debug!(requested, created = created.len(), "create_relations");
        Ok(created)
    }

    /// Delete exact `(from, to, relationType)` matches. Absent triples are ignored.
    pub async fn delete_relations(&self, batch: Vec<Relation>) -> Result<()> {
        let requested = batch.len();
        let mut txn = self.store.begin().await?;
        let outcome = delete_in(&mut txn, batch).await;
        let deleted = finish(txn, outcome).await?;
        tracing::debug!(requested, deleted, "delete_relations");
        Ok(())
    }
}

async fn create_in<X: StoreTxn>(txn: &mut X, batch: Vec<Relation>) -> Result<Vec<Relation>> {
    let mut seen = HashSet::new();
    let batch: Vec<Relation> = batch.into_iter().filter(|r| seen.insert(r.clone())).collect();

    let mut endpoints: Vec<String> = Vec::new();
    for rel in &batch {
        for name in [&rel.from, &rel.to] {
            if !endpoints.contains(name) {
                endpoints.push(name.clone());
            }
        }
    }

    txn.run(QueryIntent::LockEntities {
        names: endpoints.clone(),
    })
    .await?;
    let rows = txn
        .run(QueryIntent::FetchEntities {
            names: endpoints.clone(),
        })
        .await?;
    let existing: HashSet<String> = entities(rows).into_iter().map(|e| e.name).collect();
    let dangling: Vec<String> = endpoints
        .into_iter()
        .filter(|name| !existing.contains(name))
        .collect();
    if !dangling.is_empty() {
        tracing::warn!(?dangling, "Rejected relations with missing endpoints");
        return Err(MemoryError::Constraint(format!(
            "relation endpoints do not exist: {}",
            dangling.join(", ")
        )));
    }

    let mut created_relations = Vec::new();
    for rel in batch {
        let rows = txn.run(QueryIntent::CreateRelation(rel.clone())).await?;
        if created_or_dangling(&rows, &rel)? {
            created_relations.push(rel);
        }
    }
    Ok(created_relations)
}

/// Whether a `CreateRelation` made a new relationship. No row at all means an
/// endpoint was missing when the relationship was merged.
fn created_or_dangling(rows: &[Record], rel: &Relation) -> Result<bool> {
    if rows.is_empty() {
        tracing::warn!(from = %rel.from, to = %rel.to, "Relation endpoint vanished before create");
        return Err(MemoryError::Constraint(format!(
            "relation endpoints do not exist: {} -> {}",
            rel.from, rel.to
        )));
    }
    Ok(created(rows))
}

async fn delete_in<X: StoreTxn>(txn: &mut X, batch: Vec<Relation>) -> Result<i64> {
    let mut deleted = 0;
    for rel in batch {
        let rows = txn.run(QueryIntent::DeleteRelation(rel)).await?;
        deleted += count(&rows);
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_create_row_is_a_constraint_error() {
        let rel = Relation::new("A", "B", "knows");
        let err = created_or_dangling(&[], &rel).unwrap_err();
        assert_eq!(err.kind(), "constraint");
        assert!(err.to_string().contains("A -> B"));
    }

    #[test]
    fn test_create_row_reports_flag() {
        let rel = Relation::new("A", "B", "knows");
        assert!(created_or_dangling(&[Record::Created(true)], &rel).unwrap());
        assert!(!created_or_dangling(&[Record::Created(false)], &rel).unwrap());
    }
}
