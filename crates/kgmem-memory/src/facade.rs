//! The operation facade: the single entry point the protocol layer calls.
//!
//! Checks the shape of every request, then delegates to the repositories and
//! the query service. It holds no state of its own beyond them.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use kgmem_core::{
    AddedObservations, Entity, KnowledgeGraph, ObservationAddition, ObservationDeletion, Relation,
};
use kgmem_graph::GraphStore;

use crate::entities::EntityRepository;
use crate::error::{MemoryError, Result};
use crate::query::QueryService;
use crate::relations::RelationRepository;

const MAX_NAME_LENGTH: usize = 256;
const MAX_TYPE_LENGTH: usize = 128;
const MAX_OBSERVATION_LENGTH: usize = 4096;

// ── Operations ───────────────────────────────────────────────────

/// Every operation the facade accepts, by wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CreateEntities,
    CreateRelations,
    AddObservations,
    DeleteEntities,
    DeleteObservations,
    DeleteRelations,
    ReadGraph,
    SearchNodes,
    OpenNodes,
}

impl Operation {
    pub const ALL: [Operation; 9] = [
        Self::CreateEntities,
        Self::CreateRelations,
        Self::AddObservations,
        Self::DeleteEntities,
        Self::DeleteObservations,
        Self::DeleteRelations,
        Self::ReadGraph,
        Self::SearchNodes,
        Self::OpenNodes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateEntities => "create_entities",
            Self::CreateRelations => "create_relations",
            Self::AddObservations => "add_observations",
            Self::DeleteEntities => "delete_entities",
            Self::DeleteObservations => "delete_observations",
            Self::DeleteRelations => "delete_relations",
            Self::ReadGraph => "read_graph",
            Self::SearchNodes => "search_nodes",
            Self::OpenNodes => "open_nodes",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| MemoryError::Validation(format!("Unknown operation: {s}")))
    }
}

// ── Request Shapes ───────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CreateEntitiesArgs {
    entities: Vec<Entity>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RelationsArgs {
    relations: Vec<Relation>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct AddObservationsArgs {
    observations: Vec<ObservationAddition>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct DeleteEntitiesArgs {
    entity_names: Vec<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct DeleteObservationsArgs {
    deletions: Vec<ObservationDeletion>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ReadGraphArgs {}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchNodesArgs {
    query: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct OpenNodesArgs {
    names: Vec<String>,
}

/// Success signal for operations with no other result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ack {
    pub success: bool,
    pub message: &'static str,
}

impl Ack {
    fn new(message: &'static str) -> Self {
        Self {
            success: true,
            message,
        }
    }
}

// ── Facade ───────────────────────────────────────────────────────

/// Knowledge graph memory backed by any [`GraphStore`].
#[derive(Clone)]
pub struct KnowledgeGraphMemory<S> {
    entities: EntityRepository<S>,
    relations: RelationRepository<S>,
    queries: QueryService<S>,
}

impl<S: GraphStore + Clone> KnowledgeGraphMemory<S> {
    pub fn new(store: S) -> Self {
        Self {
            entities: EntityRepository::new(store.clone()),
            relations: RelationRepository::new(store.clone()),
            queries: QueryService::new(store),
        }
    }

    /// Run the operation named `tool` with JSON `args` and return a JSON result.
    pub async fn dispatch(&self, tool: &str, args: Value) -> Result<Value> {
        let outcome = self.dispatch_inner(tool, args).await;
        if let Err(e) = &outcome {
            tracing::warn!(tool, kind = e.kind(), error = %e, "Operation failed");
        }
        outcome
    }

    async fn dispatch_inner(&self, tool: &str, args: Value) -> Result<Value> {
        let op: Operation = tool.parse()?;
        match op {
            Operation::CreateEntities => {
                let a: CreateEntitiesArgs = parse_args(op, args)?;
                to_json(self.create_entities(a.entities).await?)
            }
            Operation::CreateRelations => {
                let a: RelationsArgs = parse_args(op, args)?;
                to_json(self.create_relations(a.relations).await?)
            }
            Operation::AddObservations => {
                let a: AddObservationsArgs = parse_args(op, args)?;
                to_json(self.add_observations(a.observations).await?)
            }
            Operation::DeleteEntities => {
                let a: DeleteEntitiesArgs = parse_args(op, args)?;
                to_json(self.delete_entities(a.entity_names).await?)
            }
            Operation::DeleteObservations => {
                let a: DeleteObservationsArgs = parse_args(op, args)?;
                to_json(self.delete_observations(a.deletions).await?)
            }
            Operation::DeleteRelations => {
                let a: RelationsArgs = parse_args(op, args)?;
                to_json(self.delete_relations(a.relations).await?)
            }
            Operation::ReadGraph => {
                let _: ReadGraphArgs = parse_args(op, args)?;
                to_json(self.read_graph().await?)
            }
            Operation::SearchNodes => {
                let a: SearchNodesArgs = parse_args(op, args)?;
                to_json(self.search_nodes(&a.query).await?)
            }
            Operation::OpenNodes => {
                let a: OpenNodesArgs = parse_args(op, args)?;
                to_json(self.open_nodes(a.names).await?)
            }
        }
    }

    pub async fn create_entities(&self, entities: Vec<Entity>) -> Result<Vec<Entity>> {
        non_empty("entities", &entities)?;
        for e in &entities {
            validate_name("name", &e.name)?;
            validate_len("entityType", &e.entity_type, MAX_TYPE_LENGTH)?;
            validate_observations(&e.observations)?;
        }
        self.entities.create_entities(entities).await
    }

    pub async fn create_relations(&self, relations: Vec<Relation>) -> Result<Vec<Relation>> {
        validate_relations(&relations)?;
        self.relations.create_relations(relations).await
    }

    pub async fn add_observations(
        &self,
        observations: Vec<ObservationAddition>,
    ) -> Result<Vec<AddedObservations>> {
        non_empty("observations", &observations)?;
        for o in &observations {
            validate_name("entityName", &o.entity_name)?;
            validate_observations(&o.contents)?;
        }
        self.entities.add_observations(observations).await
    }

    pub async fn delete_entities(&self, entity_names: Vec<String>) -> Result<Ack> {
        non_empty("entityNames", &entity_names)?;
        for name in &entity_names {
            validate_name("entityNames", name)?;
        }
        self.entities.delete_entities(entity_names).await?;
        Ok(Ack::new("Entities deleted successfully"))
    }

    pub async fn delete_observations(&self, deletions: Vec<ObservationDeletion>) -> Result<Ack> {
        non_empty("deletions", &deletions)?;
        for d in &deletions {
            validate_name("entityName", &d.entity_name)?;
        }
        self.entities.delete_observations(deletions).await?;
        Ok(Ack::new("Observations deleted successfully"))
    }

    pub async fn delete_relations(&self, relations: Vec<Relation>) -> Result<Ack> {
        validate_relations(&relations)?;
        self.relations.delete_relations(relations).await?;
        Ok(Ack::new("Relations deleted successfully"))
    }

    pub async fn read_graph(&self) -> Result<KnowledgeGraph> {
        self.queries.read_graph().await
    }

    pub async fn search_nodes(&self, query: &str) -> Result<KnowledgeGraph> {
        self.queries.search_nodes(query).await
    }

    pub async fn open_nodes(&self, names: Vec<String>) -> Result<KnowledgeGraph> {
        non_empty("names", &names)?;
        self.queries.open_nodes(names).await
    }
}

// ── Validation ───────────────────────────────────────────────────

fn parse_args<T: DeserializeOwned>(op: Operation, args: Value) -> Result<T> {
    let args = if args.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        args
    };
    serde_json::from_value(args)
        .map_err(|e| MemoryError::Validation(format!("{op}: {e}")))
}

fn to_json<T: Serialize>(value: T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| MemoryError::Internal(e.to_string()))
}

fn non_empty<T>(field: &str, items: &[T]) -> Result<()> {
    if items.is_empty() {
        return Err(MemoryError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

fn validate_len(field: &str, value: &str, max: usize) -> Result<()> {
    if value.chars().count() > max {
        return Err(MemoryError::Validation(format!(
            "{field} too long (max {max} chars)"
        )));
    }
    Ok(())
}

fn validate_name(field: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MemoryError::Validation(format!("{field} cannot be empty")));
    }
    validate_len(field, name, MAX_NAME_LENGTH)?;
    if name.chars().any(char::is_control) {
        return Err(MemoryError::Validation(format!(
            "{field} contains control characters"
        )));
    }
    Ok(())
}

fn validate_observations(observations: &[String]) -> Result<()> {
    for obs in observations {
        validate_len("observation", obs, MAX_OBSERVATION_LENGTH)?;
        if obs.contains('\0') {
            return Err(MemoryError::Validation(
                "observation contains null bytes".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_relations(relations: &[Relation]) -> Result<()> {
    non_empty("relations", relations)?;
    for r in relations {
        validate_name("from", &r.from)?;
        validate_name("to", &r.to)?;
        validate_name("relationType", &r.relation_type)?;
    }
    Ok(())
}
