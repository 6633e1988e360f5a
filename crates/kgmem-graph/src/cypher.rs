//! Cypher translation of [`QueryIntent`]s and the Neo4j-backed store.
//!
//! Entities are `:Memory` nodes keyed by `name` with `type` and
//! `observations` properties. A relation is a directed relationship whose
//! Neo4j type is the caller's `relationType`.

use async_trait::async_trait;
use neo4rs::{query, Query, Row};

use kgmem_core::{Entity, Relation};

use crate::client::{GraphClient, GraphError};
use crate::store::{GraphStore, QueryIntent, Record, StoreTxn};

/// Uniqueness constraint backing the entity primary key.
pub const SCHEMA_CONSTRAINT: &str =
    "CREATE CONSTRAINT memory_name_unique IF NOT EXISTS FOR (m:Memory) REQUIRE m.name IS UNIQUE";

const ENTITY_RETURN: &str = "RETURN m.name AS name,
               coalesce(m.type, '') AS entity_type,
               coalesce(m.observations, []) AS observations
             ORDER BY m.name";

const RELATION_RETURN: &str = "RETURN a.name AS from, b.name AS to, type(r) AS relation_type";

/// The row layout an intent produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Entity,
    Relation,
    Created,
    Count,
}

fn shape(intent: &QueryIntent) -> Shape {
    match intent {
        QueryIntent::FetchEntities { .. }
        | QueryIntent::FetchAllEntities
        | QueryIntent::SearchEntities { .. } => Shape::Entity,
        QueryIntent::FetchAllRelations | QueryIntent::FetchRelationsAmong { .. } => {
            Shape::Relation
        }
        QueryIntent::CreateEntity(_) | QueryIntent::CreateRelation(_) => Shape::Created,
        QueryIntent::LockEntities { .. }
        | QueryIntent::SetObservations { .. }
        | QueryIntent::DeleteEntities { .. }
        | QueryIntent::DeleteRelation(_) => Shape::Count,
    }
}

/// Quote a relation type as a Cypher identifier.
///
/// Relationship types cannot be parameterized, so the caller's string is
/// wrapped in backticks with embedded backticks doubled.
pub fn quote_rel_type(relation_type: &str) -> String {
    format!("`{}`", relation_type.replace('`', "``"))
}

/// The Cypher text for an intent.
pub fn cypher(intent: &QueryIntent) -> String {
    match intent {
        QueryIntent::FetchEntities { .. } => format!(
            "MATCH (m:Memory)
             WHERE m.name IN $names
             {ENTITY_RETURN}"
        ),
        QueryIntent::FetchAllEntities => format!(
            "MATCH (m:Memory)
             {ENTITY_RETURN}"
        ),
        QueryIntent::SearchEntities { .. } => format!(
            "WITH toLower($needle) AS needle
             MATCH (m:Memory)
             WHERE toLower(coalesce(m.name, '')) CONTAINS needle
                OR toLower(coalesce(m.type, '')) CONTAINS needle
                OR any(o IN coalesce(m.observations, []) WHERE toLower(o) CONTAINS needle)
             {ENTITY_RETURN}"
        ),
        QueryIntent::FetchAllRelations => format!(
            "MATCH (a:Memory)-[r]->(b:Memory)
             {RELATION_RETURN}"
        ),
        QueryIntent::FetchRelationsAmong { .. } => format!(
            "MATCH (a:Memory)-[r]->(b:Memory)
             WHERE a.name IN $names AND b.name IN $names
             {RELATION_RETURN}"
        ),
        QueryIntent::LockEntities { .. } => "MATCH (m:Memory)
             WHERE m.name IN $names
             SET m.name = m.name
             RETURN count(m) AS cnt"
            .to_string(),
        QueryIntent::CreateEntity(_) => "MERGE (m:Memory {name: $name})
             ON CREATE SET m.type = $entity_type,
                           m.observations = $observations,
                           m._created = true
             WITH m, coalesce(m._created, false) AS created
             REMOVE m._created
             RETURN created"
            .to_string(),
        QueryIntent::SetObservations { .. } => "MATCH (m:Memory {name: $name})
             SET m.observations = $observations
             RETURN count(m) AS cnt"
            .to_string(),
        QueryIntent::DeleteEntities { .. } => "MATCH (m:Memory)
             WHERE m.name IN $names
             DETACH DELETE m
             RETURN count(m) AS cnt"
            .to_string(),
        QueryIntent::CreateRelation(rel) => {
            let rel_type = quote_rel_type(&rel.relation_type);
            format!(
                "MATCH (a:Memory {{name: $from}})
                 MATCH (b:Memory {{name: $to}})
                 SET a.name = a.name
                 MERGE (a)-[r:{rel_type}]->(b)
                 ON CREATE SET r._created = true
                 WITH r, coalesce(r._created, false) AS created
                 REMOVE r._created
                 RETURN created"
            )
        }
        QueryIntent::DeleteRelation(_) => "MATCH (a:Memory {name: $from})-[r]->(b:Memory {name: $to})
             WHERE type(r) = $relation_type
             DELETE r
             RETURN count(r) AS cnt"
            .to_string(),
    }
}

/// Build the parameterized neo4rs query for an intent.
pub fn to_query(intent: &QueryIntent) -> Query {
    let q = query(&cypher(intent));
    match intent {
        QueryIntent::FetchEntities { names }
        | QueryIntent::LockEntities { names }
        | QueryIntent::FetchRelationsAmong { names }
        | QueryIntent::DeleteEntities { names } => q.param("names", names.clone()),
        QueryIntent::SearchEntities { needle } => q.param("needle", needle.clone()),
        QueryIntent::FetchAllEntities | QueryIntent::FetchAllRelations => q,
        QueryIntent::CreateEntity(entity) => q
            .param("name", entity.name.clone())
            .param("entity_type", entity.entity_type.clone())
            .param("observations", entity.observations.clone()),
        QueryIntent::SetObservations { name, observations } => q
            .param("name", name.clone())
            .param("observations", observations.clone()),
        QueryIntent::CreateRelation(rel) => q
            .param("from", rel.from.clone())
            .param("to", rel.to.clone()),
        QueryIntent::DeleteRelation(rel) => q
            .param("from", rel.from.clone())
            .param("to", rel.to.clone())
            .param("relation_type", rel.relation_type.clone()),
    }
}

fn column<T: serde::de::DeserializeOwned>(row: &Row, key: &str) -> Result<T, GraphError> {
    row.get::<T>(key)
        .map_err(|e| GraphError::Serialization(format!("Failed to read column {key}: {e}")))
}

fn decode(shape: Shape, row: &Row) -> Result<Record, GraphError> {
    Ok(match shape {
        Shape::Entity => Record::Entity(Entity {
            name: column(row, "name")?,
            entity_type: column(row, "entity_type")?,
            observations: column(row, "observations")?,
        }),
        Shape::Relation => Record::Relation(Relation {
            from: column(row, "from")?,
            to: column(row, "to")?,
            relation_type: column(row, "relation_type")?,
        }),
        Shape::Created => Record::Created(column(row, "created")?),
        Shape::Count => Record::Count(column(row, "cnt")?),
    })
}

// ── Neo4j Store ──────────────────────────────────────────────────

/// An open Neo4j transaction.
pub struct Neo4jTxn {
    txn: neo4rs::Txn,
}

#[async_trait]
impl GraphStore for GraphClient {
    type Txn = Neo4jTxn;

    async fn begin(&self) -> Result<Neo4jTxn, GraphError> {
        Ok(Neo4jTxn {
            txn: self.start_txn().await?,
        })
    }
}

#[async_trait]
impl StoreTxn for Neo4jTxn {
    async fn run(&mut self, intent: QueryIntent) -> Result<Vec<Record>, GraphError> {
        let shape = shape(&intent);
        let mut stream = self.txn.execute(to_query(&intent)).await?;

        let mut records = Vec::new();
        while let Some(row) = stream.next(self.txn.handle()).await? {
            records.push(decode(shape, &row)?);
        }
        tracing::trace!(intent = intent.name(), rows = records.len(), "Ran intent");
        Ok(records)
    }

    async fn commit(self) -> Result<(), GraphError> {
        self.txn.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<(), GraphError> {
        self.txn.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_rel_type_escapes_backticks() {
        assert_eq!(quote_rel_type("knows"), "`knows`");
        assert_eq!(quote_rel_type("works at"), "`works at`");
        assert_eq!(quote_rel_type("a`b"), "`a``b`");
    }

    #[test]
    fn test_create_relation_embeds_quoted_type() {
        let intent = QueryIntent::CreateRelation(Relation::new("A", "B", "x`]->() DETACH DELETE a//"));
        let text = cypher(&intent);
        assert!(text.contains("MERGE (a)-[r:`x``]->() DETACH DELETE a//`]->(b)"));
    }

    #[test]
    fn test_create_flags_come_from_merge() {
        let entity = cypher(&QueryIntent::CreateEntity(Entity::new(
            "A",
            "T",
            Vec::<String>::new(),
        )));
        let relation = cypher(&QueryIntent::CreateRelation(Relation::new("A", "B", "r")));
        for text in [&entity, &relation] {
            assert!(!text.contains("OPTIONAL MATCH"), "{text}");
            assert!(text.contains("ON CREATE SET"), "{text}");
            assert!(text.contains("._created = true"), "{text}");
            assert!(text.contains("REMOVE"), "{text}");
        }
        // The created flag is read after the MERGE has taken its lock.
        let merge_at = entity.find("MERGE").unwrap();
        let flag_at = entity.find("AS created").unwrap();
        assert!(merge_at < flag_at);
    }

    #[test]
    fn test_create_relation_locks_source_endpoint() {
        let text = cypher(&QueryIntent::CreateRelation(Relation::new("A", "B", "r")));
        let lock_at = text.find("SET a.name = a.name").unwrap();
        assert!(lock_at < text.find("MERGE").unwrap());
    }

    #[test]
    fn test_lock_entities_writes_before_read() {
        let intent = QueryIntent::LockEntities {
            names: vec!["A".to_string()],
        };
        let text = cypher(&intent);
        assert!(text.contains("WHERE m.name IN $names"));
        assert!(text.contains("SET m.name = m.name"));
        assert_eq!(shape(&intent), Shape::Count);
        assert_eq!(intent.name(), "lock_entities");
    }

    #[test]
    fn test_delete_relation_parameterizes_type() {
        let intent = QueryIntent::DeleteRelation(Relation::new("A", "B", "knows"));
        let text = cypher(&intent);
        assert!(text.contains("type(r) = $relation_type"));
        assert!(!text.contains("knows"));
    }

    #[test]
    fn test_delete_entities_detaches() {
        let text = cypher(&QueryIntent::DeleteEntities {
            names: vec!["A".to_string()],
        });
        assert!(text.contains("DETACH DELETE m"));
    }

    #[test]
    fn test_search_lowercases_in_cypher() {
        let text = cypher(&QueryIntent::SearchEntities {
            needle: "Alice".to_string(),
        });
        assert!(text.contains("toLower($needle)"));
        assert!(text.contains("any(o IN"));
    }

    #[test]
    fn test_shapes() {
        assert_eq!(shape(&QueryIntent::FetchAllEntities), Shape::Entity);
        assert_eq!(shape(&QueryIntent::FetchAllRelations), Shape::Relation);
        assert_eq!(
            shape(&QueryIntent::CreateEntity(Entity::new("A", "T", Vec::<String>::new()))),
            Shape::Created
        );
        assert_eq!(
            shape(&QueryIntent::DeleteRelation(Relation::new("A", "B", "r"))),
            Shape::Count
        );
    }
}
