//! Entity (node, way, relation) types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;

/// Unique identifier for an entity, e.g. `n1`, `w-3`, `r7`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for EntityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&EntityId> for EntityId {
    fn from(id: &EntityId) -> Self {
        id.clone()
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Entity type discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Node,
    Way,
    Relation,
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Node => "node",
            Self::Way => "way",
            Self::Relation => "relation",
        };
        f.write_str(s)
    }
}

/// A relation member: a referenced entity plus its role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: EntityId,

    #[serde(rename = "type")]
    pub member_type: EntityType,

    #[serde(default)]
    pub role: String,
}

impl Member {
    pub fn new(id: impl Into<EntityId>, member_type: EntityType, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            member_type,
            role: role.into(),
        }
    }
}

/// Type-specific payload of an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EntityKind {
    Node {
        #[serde(default)]
        loc: [f64; 2],
    },
    Way {
        #[serde(default)]
        nodes: Vec<EntityId>,
    },
    Relation {
        #[serde(default)]
        members: Vec<Member>,
    },
}

fn default_visible() -> bool {
    true
}

/// An addressable feature record
///
/// Entities are values: editing one produces a new `Entity` that replaces the
/// old one in a new graph snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier
    pub id: EntityId,

    /// Type and references
    #[serde(flatten)]
    pub kind: EntityKind,

    /// Key/value tags
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,

    /// `false` for entities fetched as deleted upstream
    #[serde(default = "default_visible")]
    pub visible: bool,

    /// Upstream version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,

    /// Upstream timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Entity {
    fn with_kind(id: impl Into<EntityId>, kind: EntityKind) -> Self {
        Self {
            id: id.into(),
            kind,
            tags: BTreeMap::new(),
            visible: true,
            version: None,
            timestamp: None,
        }
    }

    /// Create a node at `loc` (`[lon, lat]`)
    pub fn node(id: impl Into<EntityId>, loc: [f64; 2]) -> Self {
        Self::with_kind(id, EntityKind::Node { loc })
    }

    /// Create a way over the given node ids
    pub fn way<I, S>(id: impl Into<EntityId>, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<EntityId>,
    {
        let nodes = nodes.into_iter().map(Into::into).collect();
        Self::with_kind(id, EntityKind::Way { nodes })
    }

    /// Create a relation with the given members
    pub fn relation(id: impl Into<EntityId>, members: Vec<Member>) -> Self {
        Self::with_kind(id, EntityKind::Relation { members })
    }

    pub fn entity_type(&self) -> EntityType {
        match self.kind {
            EntityKind::Node { .. } => EntityType::Node,
            EntityKind::Way { .. } => EntityType::Way,
            EntityKind::Relation { .. } => EntityType::Relation,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Ids this entity references, deduplicated, in first-seen order
    pub fn references(&self) -> Vec<EntityId> {
        let mut refs: Vec<EntityId> = Vec::new();
        let ids: Box<dyn Iterator<Item = &EntityId>> = match &self.kind {
            EntityKind::Node { .. } => return refs,
            EntityKind::Way { nodes } => Box::new(nodes.iter()),
            EntityKind::Relation { members } => Box::new(members.iter().map(|m| &m.id)),
        };
        for id in ids {
            if !refs.contains(id) {
                refs.push(id.clone());
            }
        }
        refs
    }

    /// Node ids of a way (empty for other types)
    pub fn way_nodes(&self) -> &[EntityId] {
        match &self.kind {
            EntityKind::Way { nodes } => nodes,
            _ => &[],
        }
    }

    /// Members of a relation (empty for other types)
    pub fn members(&self) -> &[Member] {
        match &self.kind {
            EntityKind::Relation { members } => members,
            _ => &[],
        }
    }

    pub fn loc(&self) -> Option<[f64; 2]> {
        match self.kind {
            EntityKind::Node { loc } => Some(loc),
            _ => None,
        }
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Move a node; ignored for ways and relations
    pub fn with_loc(mut self, new_loc: [f64; 2]) -> Self {
        if let EntityKind::Node { loc } = &mut self.kind {
            *loc = new_loc;
        }
        self
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// A way is closed when it has more than one node and ends where it starts
    pub fn is_closed(&self) -> bool {
        let nodes = self.way_nodes();
        nodes.len() > 1 && nodes.first() == nodes.last()
    }

    pub fn is_multipolygon(&self) -> bool {
        self.entity_type() == EntityType::Relation && self.tag("type") == Some("multipolygon")
    }

    /// Append a node to a way
    pub fn add_node(mut self, id: impl Into<EntityId>) -> Self {
        if let EntityKind::Way { nodes } = &mut self.kind {
            nodes.push(id.into());
        }
        self
    }

    /// Remove every occurrence of a node from a way
    ///
    /// Consecutive repeats left behind are collapsed, and a closed way stays
    /// closed as long as it keeps more than one node.
    pub fn remove_node(mut self, id: &str) -> Self {
        let was_closed = self.is_closed();
        if let EntityKind::Way { nodes } = &mut self.kind {
            nodes.retain(|n| n.as_str() != id);
            nodes.dedup();
            if was_closed && nodes.len() > 1 && nodes.first() != nodes.last() {
                let first = nodes[0].clone();
                nodes.push(first);
            }
        }
        self
    }

    /// Drop every member of a relation that references `id`
    pub fn remove_members_with_id(mut self, id: &str) -> Self {
        if let EntityKind::Relation { members } = &mut self.kind {
            members.retain(|m| m.id.as_str() != id);
        }
        self
    }
}
