//! Core domain types for the kgmem knowledge graph.
//!
//! Field names serialize in camelCase (`entityType`, `relationType`,
//! `entityName`) because that is the shape callers send and expect back.

use serde::{Deserialize, Serialize};

// ── Entities ──────────────────────────────────────────────────────

/// A uniquely named node with a type label and accumulated observations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Entity {
    pub name: String,
    pub entity_type: String,
    pub observations: Vec<String>,
}

impl Entity {
    pub fn new(
        name: impl Into<String>,
        entity_type: impl Into<String>,
        observations: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            entity_type: entity_type.into(),
            observations: observations.into_iter().map(Into::into).collect(),
        }
    }

    /// Case-insensitive substring match over name, type, and every observation.
    ///
    /// `needle_lower` must already be lowercased.
    pub fn matches(&self, needle_lower: &str) -> bool {
        self.name.to_lowercase().contains(needle_lower)
            || self.entity_type.to_lowercase().contains(needle_lower)
            || self
                .observations
                .iter()
                .any(|o| o.to_lowercase().contains(needle_lower))
    }
}

// ── Relations ─────────────────────────────────────────────────────

/// A directed, typed edge. Identity is the full `(from, to, relationType)` triple.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Relation {
    pub from: String,
    pub to: String,
    pub relation_type: String,
}

impl Relation {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        relation_type: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            relation_type: relation_type.into(),
        }
    }

    /// True when the relation starts or ends at `name`.
    pub fn touches(&self, name: &str) -> bool {
        self.from == name || self.to == name
    }
}

// ── Graph ─────────────────────────────────────────────────────────

/// A set of entities plus relations, as returned by the read operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct KnowledgeGraph {
    pub entities: Vec<Entity>,
    pub relations: Vec<Relation>,
}

impl KnowledgeGraph {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relations.is_empty()
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }
}

// ── Observation Operations ────────────────────────────────────────

/// Observations to append to one entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ObservationAddition {
    pub entity_name: String,
    pub contents: Vec<String>,
}

/// Observations to remove from one entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ObservationDeletion {
    pub entity_name: String,
    pub observations: Vec<String>,
}

/// The strings actually appended to an entity by one addition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AddedObservations {
    pub entity_name: String,
    pub added_observations: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_serializes_camel_case() {
        let entity = Entity::new("Alice", "Person", ["likes tea"]);
        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json["entityType"], "Person");
        assert_eq!(json["observations"][0], "likes tea");
    }

    #[test]
    fn relation_rejects_unknown_fields() {
        let err = serde_json::from_str::<Relation>(
            r#"{"from":"A","to":"B","relationType":"knows","weight":3}"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn relation_requires_all_fields() {
        let err = serde_json::from_str::<Relation>(r#"{"from":"A","to":"B"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn entity_match_is_case_insensitive_over_all_fields() {
        let entity = Entity::new("Alice Smith", "Person", ["Works at ACME"]);
        assert!(entity.matches("alice"));
        assert!(entity.matches("person"));
        assert!(entity.matches("acme"));
        assert!(!entity.matches("bob"));
    }

    #[test]
    fn added_observations_shape() {
        let added = AddedObservations {
            entity_name: "A".to_string(),
            added_observations: vec!["x".to_string()],
        };
        let json = serde_json::to_string(&added).unwrap();
        assert_eq!(json, r#"{"entityName":"A","addedObservations":["x"]}"#);
    }
}
