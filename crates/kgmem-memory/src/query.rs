//! Query service: full-graph read, substring search, and name lookup.
//!
//! Search matches case-insensitively against name, type, and every
//! observation. An empty query matches nothing. Both search and lookup
//! return the induced relations of the matched entities, i.e. only
//! relations whose two endpoints were matched.

use kgmem_core::{Entity, KnowledgeGraph};
use kgmem_graph::store::{entities, relations};
use kgmem_graph::{GraphStore, QueryIntent, StoreTxn};

use crate::error::Result;
use crate::unit::finish;

/// Stateless read operations over an injected store.
#[derive(Clone)]
pub struct QueryService<S> {
    store: S,
}

impl<S: GraphStore> QueryService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Every entity and every relation, read in one transaction.
    pub async fn read_graph(&self) -> Result<KnowledgeGraph> {
        let mut txn = self.store.begin().await?;
        let outcome = read_all(&mut txn).await;
        let graph = finish(txn, outcome).await?;
        tracing::debug!(
            entities = graph.entities.len(),
            relations = graph.relations.len(),
            "read_graph"
        );
        Ok(graph)
    }

    /// Entities matching `query` plus their induced relations.
    pub async fn search_nodes(&self, query: &str) -> Result<KnowledgeGraph> {
        if query.is_empty() {
            return Ok(KnowledgeGraph::default());
        }
        let mut txn = self.store.begin().await?;
        let outcome = lookup(
            &mut txn,
            QueryIntent::SearchEntities {
                needle: query.to_string(),
            },
        )
        .await;
        let graph = finish(txn, outcome).await?;
        tracing::debug!(matched = graph.entities.len(), "search_nodes");
        Ok(graph)
    }

    /// Entities named in `names` plus their induced relations.
    /// Names with no entity are ignored.
    pub async fn open_nodes(&self, names: Vec<String>) -> Result<KnowledgeGraph> {
        let requested = names.len();
        let mut txn = self.store.begin().await?;
        let outcome = lookup(&mut txn, QueryIntent::FetchEntities { names }).await;
        let graph = finish(txn, outcome).await?;
        tracing::debug!(requested, matched = graph.entities.len(), "open_nodes");
        Ok(graph)
    }
}

async fn read_all<X: StoreTxn>(txn: &mut X) -> Result<KnowledgeGraph> {
    let entity_rows = txn.run(QueryIntent::FetchAllEntities).await?;
    let relation_rows = txn.run(QueryIntent::FetchAllRelations).await?;
    Ok(KnowledgeGraph {
        entities: entities(entity_rows),
        relations: relations(relation_rows),
    })
}

/// Run an entity-producing intent and attach the induced relations.
async fn lookup<X: StoreTxn>(txn: &mut X, intent: QueryIntent) -> Result<KnowledgeGraph> {
    let matched: Vec<Entity> = entities(txn.run(intent).await?);
    if matched.is_empty() {
        return Ok(KnowledgeGraph::default());
    }
    let names = matched.iter().map(|e| e.name.clone()).collect();
    let rows = txn.run(QueryIntent::FetchRelationsAmong { names }).await?;
    Ok(KnowledgeGraph {
        entities: matched,
        relations: relations(rows),
    })
}
