//! In-memory implementation of [`GraphStore`].
//!
//! Holds the whole graph behind one `tokio::sync::Mutex`. A transaction owns
//! the lock until it finishes and writes to a staged copy, so transactions
//! are serialized and a commit publishes all of its writes at once.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use kgmem_core::{Entity, Relation};

use crate::client::GraphError;
use crate::store::{GraphStore, QueryIntent, Record, StoreTxn};

#[derive(Debug, Clone, Default)]
struct GraphState {
    /// Keyed by name; the value is `(entity_type, observations)`.
    entities: BTreeMap<String, (String, Vec<String>)>,
    relations: BTreeSet<Relation>,
}

impl GraphState {
    fn entity(&self, name: &str) -> Option<Entity> {
        self.entities
            .get(name)
            .map(|(entity_type, observations)| Entity {
                name: name.to_string(),
                entity_type: entity_type.clone(),
                observations: observations.clone(),
            })
    }

    fn all_entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.keys().filter_map(|name| self.entity(name))
    }

    fn apply(&mut self, intent: QueryIntent) -> Vec<Record> {
        match intent {
            QueryIntent::FetchEntities { names } => {
                let wanted: BTreeSet<&str> = names.iter().map(String::as_str).collect();
                wanted
                    .into_iter()
                    .filter_map(|name| self.entity(name))
                    .map(Record::Entity)
                    .collect()
            }
            QueryIntent::FetchAllEntities => self.all_entities().map(Record::Entity).collect(),
            QueryIntent::SearchEntities { needle } => {
                let needle = needle.to_lowercase();
                self.all_entities()
                    .filter(|e| e.matches(&needle))
                    .map(Record::Entity)
                    .collect()
            }
            QueryIntent::FetchAllRelations => {
                self.relations.iter().cloned().map(Record::Relation).collect()
            }
            QueryIntent::FetchRelationsAmong { names } => {
                let wanted: BTreeSet<&str> = names.iter().map(String::as_str).collect();
                self.relations
                    .iter()
                    .filter(|r| wanted.contains(r.from.as_str()) && wanted.contains(r.to.as_str()))
                    .cloned()
                    .map(Record::Relation)
                    .collect()
            }
            QueryIntent::LockEntities { names } => {
                // The transaction already holds the store-wide lock.
                let wanted: BTreeSet<&String> = names.iter().collect();
                let held = wanted
                    .into_iter()
                    .filter(|name| self.entities.contains_key(*name))
                    .count();
                vec![Record::Count(held as i64)]
            }
            QueryIntent::CreateEntity(entity) => {
                let created = !self.entities.contains_key(&entity.name);
                if created {
                    self.entities
                        .insert(entity.name, (entity.entity_type, entity.observations));
                }
                vec![Record::Created(created)]
            }
            QueryIntent::SetObservations { name, observations } => {
                match self.entities.get_mut(&name) {
                    Some((_, current)) => {
                        *current = observations;
                        vec![Record::Count(1)]
                    }
                    None => vec![Record::Count(0)],
                }
            }
            QueryIntent::DeleteEntities { names } => {
                let mut removed = 0;
                for name in &names {
                    if self.entities.remove(name).is_some() {
                        removed += 1;
                        self.relations.retain(|r| !r.touches(name));
                    }
                }
                vec![Record::Count(removed)]
            }
            QueryIntent::CreateRelation(rel) => {
                if !self.entities.contains_key(&rel.from) || !self.entities.contains_key(&rel.to) {
                    return Vec::new();
                }
                vec![Record::Created(self.relations.insert(rel))]
            }
            QueryIntent::DeleteRelation(rel) => {
                vec![Record::Count(i64::from(self.relations.remove(&rel)))]
            }
        }
    }
}

/// A process-local graph store.
///
/// Clone is cheap and clones share state.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<GraphState>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate losing the backing store. While unavailable, `begin` and
    /// `run` fail with [`GraphError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    fn check_available(flag: &AtomicBool) -> Result<(), GraphError> {
        if flag.load(Ordering::SeqCst) {
            Err(GraphError::Unavailable("in-memory store switched off".to_string()))
        } else {
            Ok(())
        }
    }
}

/// A transaction over an [`InMemoryStore`].
pub struct InMemoryTxn {
    guard: OwnedMutexGuard<GraphState>,
    staged: GraphState,
    unavailable: Arc<AtomicBool>,
}

#[async_trait]
impl GraphStore for InMemoryStore {
    type Txn = InMemoryTxn;

    async fn begin(&self) -> Result<InMemoryTxn, GraphError> {
        Self::check_available(&self.unavailable)?;
        let guard = Arc::clone(&self.state).lock_owned().await;
        let staged = guard.clone();
        Ok(InMemoryTxn {
            guard,
            staged,
            unavailable: Arc::clone(&self.unavailable),
        })
    }
}

#[async_trait]
impl StoreTxn for InMemoryTxn {
    async fn run(&mut self, intent: QueryIntent) -> Result<Vec<Record>, GraphError> {
        InMemoryStore::check_available(&self.unavailable)?;
        Ok(self.staged.apply(intent))
    }

    async fn commit(mut self) -> Result<(), GraphError> {
        InMemoryStore::check_available(&self.unavailable)?;
        *self.guard = self.staged;
        Ok(())
    }

    async fn rollback(self) -> Result<(), GraphError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{count, created, entities, relations};

    fn person(name: &str) -> Entity {
        Entity::new(name, "Person", ["seed"])
    }

    async fn seed(store: &InMemoryStore) {
        let mut txn = store.begin().await.unwrap();
        for name in ["A", "B", "C"] {
            txn.run(QueryIntent::CreateEntity(person(name))).await.unwrap();
        }
        txn.run(QueryIntent::CreateRelation(Relation::new("A", "B", "knows")))
            .await
            .unwrap();
        txn.run(QueryIntent::CreateRelation(Relation::new("C", "A", "likes")))
            .await
            .unwrap();
        txn.commit().await.unwrap();
    }

    async fn all_relations(store: &InMemoryStore) -> Vec<Relation> {
        let mut txn = store.begin().await.unwrap();
        let rows = txn.run(QueryIntent::FetchAllRelations).await.unwrap();
        txn.commit().await.unwrap();
        relations(rows)
    }

    #[tokio::test]
    async fn test_create_entity_reports_existing() {
        let store = InMemoryStore::new();
        let mut txn = store.begin().await.unwrap();
        let first = txn.run(QueryIntent::CreateEntity(person("A"))).await.unwrap();
        let second = txn
            .run(QueryIntent::CreateEntity(Entity::new("A", "Robot", ["other"])))
            .await
            .unwrap();
        assert!(created(&first));
        assert!(!created(&second));

        let rows = txn
            .run(QueryIntent::FetchEntities {
                names: vec!["A".to_string()],
            })
            .await
            .unwrap();
        assert_eq!(entities(rows), vec![person("A")]);
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let store = InMemoryStore::new();
        let mut txn = store.begin().await.unwrap();
        txn.run(QueryIntent::CreateEntity(person("A"))).await.unwrap();
        txn.rollback().await.unwrap();

        let mut txn = store.begin().await.unwrap();
        let rows = txn.run(QueryIntent::FetchAllEntities).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_drop_without_commit_discards_writes() {
        let store = InMemoryStore::new();
        {
            let mut txn = store.begin().await.unwrap();
            txn.run(QueryIntent::CreateEntity(person("A"))).await.unwrap();
        }
        let mut txn = store.begin().await.unwrap();
        assert!(txn.run(QueryIntent::FetchAllEntities).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_entities_cascades_relations() {
        let store = InMemoryStore::new();
        seed(&store).await;

        let mut txn = store.begin().await.unwrap();
        let rows = txn
            .run(QueryIntent::DeleteEntities {
                names: vec!["A".to_string(), "missing".to_string()],
            })
            .await
            .unwrap();
        txn.commit().await.unwrap();

        assert_eq!(count(&rows), 1);
        assert!(all_relations(&store).await.is_empty());
    }

    #[tokio::test]
    async fn test_create_relation_requires_endpoints() {
        let store = InMemoryStore::new();
        seed(&store).await;

        let mut txn = store.begin().await.unwrap();
        let rows = txn
            .run(QueryIntent::CreateRelation(Relation::new("A", "Z", "knows")))
            .await
            .unwrap();
        assert!(rows.is_empty());

        let rows = txn
            .run(QueryIntent::CreateRelation(Relation::new("A", "B", "knows")))
            .await
            .unwrap();
        assert!(!created(&rows));
    }

    #[tokio::test]
    async fn test_lock_entities_counts_existing_names() {
        let store = InMemoryStore::new();
        seed(&store).await;

        let mut txn = store.begin().await.unwrap();
        let rows = txn
            .run(QueryIntent::LockEntities {
                names: vec!["A".to_string(), "A".to_string(), "Z".to_string()],
            })
            .await
            .unwrap();
        assert_eq!(count(&rows), 1);
    }

    #[tokio::test]
    async fn test_relations_among_is_induced() {
        let store = InMemoryStore::new();
        seed(&store).await;

        let mut txn = store.begin().await.unwrap();
        let rows = txn
            .run(QueryIntent::FetchRelationsAmong {
                names: vec!["A".to_string(), "B".to_string()],
            })
            .await
            .unwrap();
        assert_eq!(relations(rows), vec![Relation::new("A", "B", "knows")]);
    }

    #[tokio::test]
    async fn test_search_ignores_case() {
        let store = InMemoryStore::new();
        let mut txn = store.begin().await.unwrap();
        txn.run(QueryIntent::CreateEntity(Entity::new(
            "Alice Smith",
            "Person",
            ["Speaks FRENCH"],
        )))
        .await
        .unwrap();
        txn.run(QueryIntent::CreateEntity(person("Bob"))).await.unwrap();

        let rows = txn
            .run(QueryIntent::SearchEntities {
                needle: "french".to_string(),
            })
            .await
            .unwrap();
        let found = entities(rows);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Alice Smith");
    }

    #[tokio::test]
    async fn test_unavailable_store_fails_fast() {
        let store = InMemoryStore::new();
        store.set_available(false);
        assert!(matches!(store.begin().await, Err(GraphError::Unavailable(_))));

        store.set_available(true);
        assert!(store.begin().await.is_ok());
    }
}
