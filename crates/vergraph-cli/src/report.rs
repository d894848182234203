//! Serializable views of a snapshot for printing

use std::fmt::Write;

use serde::Serialize;
use vergraph_core::{Entity, EntityId, EntityType, Graph, RebaseStats, TransientKey};

use crate::output::{join_or_dash, Tabular};

fn ids_of(entities: &[std::sync::Arc<Entity>]) -> Vec<EntityId> {
    entities.iter().map(|e| e.id.clone()).collect()
}

/// Entity counts of a snapshot
#[derive(Debug, Default, Serialize)]
pub struct GraphSummary {
    pub entities: usize,
    pub nodes: usize,
    pub ways: usize,
    pub relations: usize,
    pub closed_ways: usize,
    pub multipolygons: usize,
    pub base_entities: usize,
    pub local_overrides: usize,
}

impl GraphSummary {
    pub fn of(graph: &Graph) -> Self {
        let mut summary = Self {
            base_entities: graph.base_len(),
            local_overrides: graph.local_len(),
            ..Self::default()
        };
        for entity in graph.entities() {
            summary.entities += 1;
            match entity.entity_type() {
                EntityType::Node => summary.nodes += 1,
                EntityType::Way => {
                    summary.ways += 1;
                    if graph.memoize(&entity, TransientKey::IsClosed, || entity.is_closed()) {
                        summary.closed_ways += 1;
                    }
                }
                EntityType::Relation => {
                    summary.relations += 1;
                    if entity.is_multipolygon() {
                        summary.multipolygons += 1;
                    }
                }
            }
        }
        summary
    }
}

impl Tabular for GraphSummary {
    fn to_table(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Entities: {}", self.entities);
        let _ = writeln!(out, "  Nodes: {}", self.nodes);
        let _ = writeln!(
            out,
            "  Ways: {} ({} closed)",
            self.ways, self.closed_ways
        );
        let _ = writeln!(
            out,
            "  Relations: {} ({} multipolygons)",
            self.relations, self.multipolygons
        );
        let _ = write!(
            out,
            "Layers: {} base, {} local",
            self.base_entities, self.local_overrides
        );
        out
    }
}

/// Reverse-index view of one id in a snapshot
#[derive(Debug, Serialize)]
pub struct ParentsReport {
    pub id: EntityId,
    pub present: bool,
    pub parent_ways: Vec<EntityId>,
    pub parent_relations: Vec<EntityId>,
}

impl ParentsReport {
    pub fn of(graph: &Graph, id: &str) -> Self {
        match graph.has_entity(id) {
            Some(entity) => {
                let ways = graph.parent_ways(&entity);
                let relations = graph.parent_relations(&entity);
                Self {
                    id: entity.id.clone(),
                    present: true,
                    parent_ways: ids_of(&ways),
                    parent_relations: ids_of(&relations),
                }
            }
            None => Self {
                id: EntityId::new(id),
                present: false,
                parent_ways: Vec::new(),
                parent_relations: Vec::new(),
            },
        }
    }
}

impl Tabular for ParentsReport {
    fn to_table(&self) -> String {
        if !self.present {
            return format!("{}: not present", self.id);
        }
        format!(
            "{}: ways [{}] relations [{}]",
            self.id,
            join_or_dash(&self.parent_ways),
            join_or_dash(&self.parent_relations)
        )
    }
}

/// One entity with its tags, children and parents
#[derive(Debug, Serialize)]
pub struct EntityReport {
    pub entity: Entity,
    pub overridden: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub child_nodes: Vec<EntityId>,
    pub parents: ParentsReport,
}

impl EntityReport {
    pub fn of(graph: &Graph, id: &str) -> anyhow::Result<Self> {
        let entity = graph.entity(id)?;
        let child_nodes = match entity.entity_type() {
            EntityType::Way => ids_of(&graph.child_nodes(&entity)?),
            _ => Vec::new(),
        };
        Ok(Self {
            entity: entity.as_ref().clone(),
            overridden: graph.is_overridden(id),
            child_nodes,
            parents: ParentsReport::of(graph, id),
        })
    }
}

impl Tabular for EntityReport {
    fn to_table(&self) -> String {
        let entity = &self.entity;
        let mut out = String::new();
        let _ = writeln!(out, "Entity: {}", entity.id);
        let _ = writeln!(out, "  Type: {}", entity.entity_type());
        if let Some(version) = entity.version {
            let _ = writeln!(out, "  Version: {}", version);
        }
        if let Some([lon, lat]) = entity.loc() {
            let _ = writeln!(out, "  Location: {}, {}", lon, lat);
        }
        if !self.child_nodes.is_empty() {
            let closed = if entity.is_closed() { " (closed)" } else { "" };
            let _ = writeln!(out, "  Nodes: {}{}", join_or_dash(&self.child_nodes), closed);
        }
        for member in entity.members() {
            let _ = writeln!(
                out,
                "  Member: {} {} {}",
                member.member_type, member.id, member.role
            );
        }
        for (key, value) in &entity.tags {
            let _ = writeln!(out, "  Tag: {}={}", key, value);
        }
        if self.overridden {
            let _ = writeln!(out, "  Local override");
        }
        let _ = writeln!(out, "  Parent ways: {}", join_or_dash(&self.parents.parent_ways));
        let _ = write!(
            out,
            "  Parent relations: {}",
            join_or_dash(&self.parents.parent_relations)
        );
        out
    }
}

/// Local changes of a snapshot, by id
#[derive(Debug, Default, Serialize)]
pub struct ChangesReport {
    pub created: Vec<EntityId>,
    pub modified: Vec<EntityId>,
    pub deleted: Vec<EntityId>,
}

impl ChangesReport {
    pub fn of(graph: &Graph) -> Self {
        let changes = graph.local_changes();
        Self {
            created: ids_of(&changes.created),
            modified: ids_of(&changes.modified),
            deleted: ids_of(&changes.deleted),
        }
    }
}

impl Tabular for ChangesReport {
    fn to_table(&self) -> String {
        format!(
            "Created: {}\nModified: {}\nDeleted: {}",
            join_or_dash(&self.created),
            join_or_dash(&self.modified),
            join_or_dash(&self.deleted)
        )
    }
}

/// Outcome of a replayed script
#[derive(Debug, Serialize)]
pub struct ReplayReport {
    pub steps: usize,
    pub history: usize,
    pub rebase: RebaseStats,
    pub head: GraphSummary,
    pub changes: ChangesReport,
    pub parents: Vec<ParentsReport>,
}

impl Tabular for ReplayReport {
    fn to_table(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Replayed {} steps, {} snapshots in history",
            self.steps, self.history
        );
        let _ = writeln!(
            out,
            "Rebase: merged {}, skipped {} existing, {} deleted",
            self.rebase.merged, self.rebase.skipped_existing, self.rebase.skipped_deleted
        );
        let _ = writeln!(out, "{}", self.head.to_table());
        let _ = write!(out, "{}", self.changes.to_table());
        for parents in &self.parents {
            let _ = write!(out, "\n{}", parents.to_table());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vergraph_core::Member;

    fn sample() -> Graph {
        Graph::from_entities(vec![
            Entity::node("n1", [0.0, 0.0]),
            Entity::node("n2", [1.0, 0.0]),
            Entity::node("n3", [1.0, 1.0]),
            Entity::way("w1", ["n1", "n2", "n3", "n1"]),
            Entity::relation("r1", vec![Member::new("w1", EntityType::Way, "outer")])
                .with_tag("type", "multipolygon"),
        ])
        .unwrap()
    }

    #[test]
    fn test_summary_counts() {
        let summary = GraphSummary::of(&sample());
        assert_eq!(summary.entities, 5);
        assert_eq!(summary.nodes, 3);
        assert_eq!(summary.closed_ways, 1);
        assert_eq!(summary.multipolygons, 1);
        assert_eq!(summary.local_overrides, 0);
    }

    #[test]
    fn test_entity_report_lists_parents_and_children() {
        let graph = sample();
        let report = EntityReport::of(&graph, "w1").unwrap();
        assert_eq!(report.child_nodes.len(), 4);
        assert_eq!(report.parents.parent_relations, vec![EntityId::new("r1")]);

        let table = report.to_table();
        assert!(table.contains("Nodes: n1, n2, n3, n1 (closed)"));
        assert!(table.contains("Parent relations: r1"));
    }

    #[test]
    fn test_missing_entity_report() {
        let graph = sample();
        assert!(EntityReport::of(&graph, "n9").is_err());
        let parents = ParentsReport::of(&graph, "n9");
        assert!(!parents.present);
        assert_eq!(parents.to_table(), "n9: not present");
    }
}
