//! Resolved Forest
//!
//! The flat form of a resolved repository handed to the execution engine:
//! one entry per live node with its index, class, init record and the
//! indices of its children. A child that was removed (or an empty child
//! slot) is `-1`.

use indexmap::IndexMap;
use serde::Serialize;
use tdl_nodes::InitRecord;

use crate::{errors::TdlError, repository::NodeRepository};

/// Child indices of a resolved node, positional or keyed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ChildIndices {
    List(Vec<i64>),
    Map(IndexMap<String, i64>),
}

impl ChildIndices {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            ChildIndices::List(list) => list.len(),
            ChildIndices::Map(map) => map.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Indices in child order.
    #[must_use]
    pub fn indices(&self) -> Vec<i64> {
        match self {
            ChildIndices::List(list) => list.clone(),
            ChildIndices::Map(map) => map.values().copied().collect(),
        }
    }
}

impl Default for ChildIndices {
    fn default() -> Self {
        ChildIndices::List(Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedNode {
    pub nodeindex: u32,
    pub name: String,
    pub class: String,
    pub init_record: InitRecord,
    pub children: ChildIndices,
    pub step_children: Vec<i64>,
}

/// Every live node of a resolved repository, in index order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedForest {
    pub nodes: Vec<ResolvedNode>,
    pub roots: Vec<String>,
}

impl ResolvedForest {
    /// Collects the forest of a resolved repository.
    ///
    /// # Errors
    ///
    /// [`TdlError::NotResolved`] if the repository was not resolved.
    pub fn from_repository(repo: &NodeRepository) -> Result<Self, TdlError> {
        let roots = repo.roots()?.keys().cloned().collect();
        let mut nodes = repo
            .iter()
            .filter_map(|(_, slot)| {
                Some(ResolvedNode {
                    nodeindex: slot.nodeindex?,
                    name: slot.name.clone(),
                    class: slot.classname.clone()?,
                    init_record: slot.init_record.clone()?,
                    children: slot.child_indices.clone().unwrap_or_default(),
                    step_children: slot.step_indices.clone(),
                })
            })
            .collect::<Vec<_>>();
        nodes.sort_by_key(|node| node.nodeindex);
        Ok(Self { nodes, roots })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ResolvedNode> {
        self.nodes.iter().find(|node| node.name == name)
    }

    /// Pretty-printed JSON of the forest.
    ///
    /// # Errors
    ///
    /// Serialization errors from `serde_json`.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
