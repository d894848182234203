//! Dataset files
//!
//! A dataset is either a bare JSON array of entities or an object holding
//! the fetched `entities` plus saved local `overrides`, where an override
//! with a `null` entity restores a deletion.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use vergraph_core::{Entity, EntityId, Graph};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Dataset {
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub overrides: Vec<Override>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Override {
    pub id: EntityId,
    pub entity: Option<Entity>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DatasetFile {
    Entities(Vec<Entity>),
    Full(Dataset),
}

impl Dataset {
    pub fn parse(json: &str) -> anyhow::Result<Self> {
        let file: DatasetFile = serde_json::from_str(json)?;
        Ok(match file {
            DatasetFile::Entities(entities) => Self {
                entities,
                overrides: Vec::new(),
            },
            DatasetFile::Full(dataset) => dataset,
        })
    }

    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read dataset {}", path.display()))?;
        Self::parse(&json).with_context(|| format!("Invalid dataset {}", path.display()))
    }

    /// Build a frozen snapshot: entities in the base layer, overrides local
    pub fn into_graph(self) -> anyhow::Result<Graph> {
        let mut builder = Graph::builder(self.entities)?;
        builder.load(self.overrides.into_iter().map(|o| (o.id, o.entity)))?;
        let graph = builder.freeze();
        tracing::info!(
            "Loaded dataset: {} base entities, {} local overrides",
            graph.base_len(),
            graph.local_len()
        );
        Ok(graph)
    }
}

/// Read a dataset file into a snapshot
pub fn load(path: &Path) -> anyhow::Result<Graph> {
    Dataset::read(path)?.into_graph()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_array() {
        let dataset = Dataset::parse(
            r#"[{"id": "n1", "type": "node", "loc": [0.0, 0.0]},
                {"id": "w1", "type": "way", "nodes": ["n1"]}]"#,
        )
        .unwrap();
        assert_eq!(dataset.entities.len(), 2);
        assert!(dataset.overrides.is_empty());
    }

    #[test]
    fn test_overrides_restore_local_state() {
        let graph = Dataset::parse(
            r#"{
                "entities": [
                    {"id": "n1", "type": "node", "loc": [0.0, 0.0]},
                    {"id": "n2", "type": "node", "loc": [1.0, 0.0]}
                ],
                "overrides": [
                    {"id": "w1", "entity": {"id": "w1", "type": "way", "nodes": ["n1", "n2"]}},
                    {"id": "n2", "entity": null}
                ]
            }"#,
        )
        .unwrap()
        .into_graph()
        .unwrap();

        assert_eq!(graph.base_len(), 2);
        assert!(graph.has_entity("n2").is_none());
        let n1 = graph.entity("n1").unwrap();
        assert_eq!(graph.parent_ways(&n1).len(), 1);
    }

    #[test]
    fn test_rejects_malformed_entities() {
        let dataset = Dataset::parse(r#"[{"id": "", "type": "node", "loc": [0.0, 0.0]}]"#).unwrap();
        assert!(dataset.into_graph().is_err());
    }
}
