//! Entity repository: create, observation edits, and cascading delete.
//!
//! Each public operation runs in one store transaction. A failure anywhere in
//! the call rolls back everything the call wrote.

use std::collections::{HashMap, HashSet};

use kgmem_core::{AddedObservations, Entity, ObservationAddition, ObservationDeletion};
use kgmem_graph::store::{count, created, entities};
use kgmem_graph::{GraphStore, QueryIntent, StoreTxn};

use crate::error::{MemoryError, Result};
use crate::unit::finish;

/// Stateless entity operations over an injected store.
#[derive(Clone)]
pub struct EntityRepository<S> {
    store: S,
}

impl<S: GraphStore> EntityRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Create entities whose names do not exist yet.
    ///
    /// Returns only the newly created ones. Existing entities are left as
    /// they are, and a name repeated within `batch` is created once from its
    /// first occurrence.
    pub async fn create_entities(&self, batch: Vec<Entity>) -> Result<Vec<Entity>> {
        let requested = batch.len();
        let mut txn = self.store.begin().await?;
        let outcome = create_in(&mut txn, batch).await;
        let created = finish(txn, outcome).await?;
        tracing::debug!(requested, created = created.len(), "create_entities");
        Ok(created)
    }

    /// Append observations that are not already present.
    ///
    /// Fails with [`MemoryError::NotFound`] naming every missing entity, in
    /// which case nothing is applied.
    pub async fn add_observations(
        &self,
        additions: Vec<ObservationAddition>,
    ) -> Result<Vec<AddedObservations>> {
        let mut txn = self.store.begin().await?;
        let outcome = add_in(&mut txn, additions).await;
        let added = finish(txn, outcome).await?;
        tracing::debug!(
            entities = added.len(),
            added = added.iter().map(|a| a.added_observations.len()).sum::<usize>(),
            "add_observations"
        );
        Ok(added)
    }

    /// Remove matching observations. Unknown entities are skipped.
    pub async fn delete_observations(&self, deletions: Vec<ObservationDeletion>) -> Result<()> {
        let mut txn = self.store.begin().await?;
        let outcome = delete_observations_in(&mut txn, deletions).await;
        let touched = finish(txn, outcome).await?;
        tracing::debug!(touched, "delete_observations");
        Ok(())
    }

    /// Delete entities and every relation that starts or ends at them.
    /// Unknown names are ignored.
    pub async fn delete_entities(&self, names: Vec<String>) -> Result<()> {
        let requested = names.len();
        let mut txn = self.store.begin().await?;
        let outcome = txn
            .run(QueryIntent::DeleteEntities { names })
            .await
            .map(|rows| count(&rows))
            .map_err(MemoryError::from);
        let deleted = finish(txn, outcome).await?;
        tracing::debug!(requested, deleted, "delete_entities");
        Ok(())
    }
}

async fn create_in<X: StoreTxn>(txn: &mut X, batch: Vec<Entity>) -> Result<Vec<Entity>> {
    let mut seen = HashSet::new();
    let mut created_entities = Vec::new();
    for entity in batch {
        if !seen.insert(entity.name.clone()) {
            continue;
        }
        let rows = txn.run(QueryIntent::CreateEntity(entity.clone())).await?;
        if created(&rows) {
            created_entities.push(entity);
        }
    }
    Ok(created_entities)
}

/// Current observation lists for `names`, keyed by entity name.
///
/// The entities stay write-locked until the transaction ends, so the lists
/// can be modified and written back without losing a concurrent update.
async fn observations_of<X: StoreTxn>(
    txn: &mut X,
    names: Vec<String>,
) -> Result<HashMap<String, Vec<String>>> {
    txn.run(QueryIntent::LockEntities {
        names: names.clone(),
    })
    .await?;
    let rows = txn.run(QueryIntent::FetchEntities { names }).await?;
    Ok(entities(rows)
        .into_iter()
        .map(|e| (e.name, e.observations))
        .collect())
}

fn unique_names<'a>(names: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut seen = HashSet::new();
    names.filter(|n| seen.insert(*n)).cloned().collect()
}

async fn add_in<X: StoreTxn>(
    txn: &mut X,
    additions: Vec<ObservationAddition>,
) -> Result<Vec<AddedObservations>> {
    let targets = unique_names(additions.iter().map(|a| &a.entity_name));
    let mut current = observations_of(txn, targets.clone()).await?;

    let missing: Vec<String> = targets
        .into_iter()
        .filter(|name| !current.contains_key(name))
        .collect();
    if !missing.is_empty() {
        return Err(MemoryError::NotFound { names: missing });
    }

    let mut results = Vec::with_capacity(additions.len());
    for addition in additions {
        let observations = current
            .get_mut(&addition.entity_name)
            .ok_or_else(|| MemoryError::NotFound {
                names: vec![addition.entity_name.clone()],
            })?;

        let mut added = Vec::new();
        for content in addition.contents {
            if !observations.contains(&content) {
                observations.push(content.clone());
                added.push(content);
            }
        }

        if !added.is_empty() {
            txn.run(QueryIntent::SetObservations {
                name: addition.entity_name.clone(),
                observations: observations.clone(),
            })
            .await?;
        }
        results.push(AddedObservations {
            entity_name: addition.entity_name,
            added_observations: added,
        });
    }
    Ok(results)
}

async fn delete_observations_in<X: StoreTxn>(
    txn: &mut X,
    deletions: Vec<ObservationDeletion>,
) -> Result<usize> {
    let targets = unique_names(deletions.iter().map(|d| &d.entity_name));
    let mut current = observations_of(txn, targets).await?;

    let mut touched = 0;
    for deletion in deletions {
        let Some(observations) = current.get_mut(&deletion.entity_name) else {
            continue;
        };
        let before = observations.len();
        observations.retain(|o| !deletion.observations.contains(o));
        if observations.len() == before {
            continue;
        }
        txn.run(QueryIntent::SetObservations {
            name: deletion.entity_name,
            observations: observations.clone(),
        })
        .await?;
        touched += 1;
    }
    Ok(touched)
}
