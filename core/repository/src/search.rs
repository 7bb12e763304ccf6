//! Node Search
//!
//! Searches match bound nodes against optional criteria:
//!
//! - `name` and `class_name` are regular expressions that must match the
//!   whole node name or class name
//! - each entry of `tags` is a regular expression that must match the start
//!   of at least one of the node's tags
//!
//! Without a subtree the whole repository is searched in registration order.
//! With one, the search walks the children of the given nodes depth-first and
//! visits every node at most once.

use regex::Regex;
use rustc_hash::FxHashSet;
use tdl_nodes::{NodeId, SourceLocation};

use crate::{
    errors::{NodeError, TdlError},
    repository::{NodeRepository, NodeSlot},
};

/// What to search for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchCriteria {
    pub name: Option<String>,
    pub class_name: Option<String>,
    pub tags: Vec<String>,
    pub subtree: Option<Vec<NodeId>>,
}

impl SearchCriteria {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn name(mut self, pattern: impl Into<String>) -> Self {
        self.name = Some(pattern.into());
        self
    }

    #[must_use]
    pub fn class_name(mut self, pattern: impl Into<String>) -> Self {
        self.class_name = Some(pattern.into());
        self
    }

    /// Adds tag patterns; a string holding several patterns is split on
    /// whitespace.
    #[must_use]
    pub fn tags(mut self, patterns: &str) -> Self {
        self.tags
            .extend(patterns.split_whitespace().map(ToString::to_string));
        self
    }

    /// Restricts the search to the subtrees rooted at `roots`.
    #[must_use]
    pub fn subtree(mut self, roots: impl IntoIterator<Item = NodeId>) -> Self {
        self.subtree = Some(roots.into_iter().collect());
        self
    }
}

struct Matcher {
    name: Option<Regex>,
    class_name: Option<Regex>,
    tags: Vec<Regex>,
}

fn compile(pattern: &str, anchored: &str, location: SourceLocation) -> Result<Regex, NodeError> {
    Regex::new(anchored).map_err(|err| NodeError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: err.to_string(),
        location,
    })
}

impl Matcher {
    fn new(criteria: &SearchCriteria, location: SourceLocation) -> Result<Self, NodeError> {
        let full = |pattern: &String| compile(pattern, &format!("^(?:{pattern})$"), location);
        Ok(Self {
            name: criteria.name.as_ref().map(full).transpose()?,
            class_name: criteria.class_name.as_ref().map(full).transpose()?,
            tags: criteria
                .tags
                .iter()
                .map(|pattern| compile(pattern, &format!("^(?:{pattern})"), location))
                .collect::<Result<_, _>>()?,
        })
    }

    fn matches(&self, slot: &NodeSlot) -> bool {
        let Some(record) = slot.init_record() else {
            return false;
        };
        if self
            .name
            .as_ref()
            .is_some_and(|regex| !regex.is_match(slot.name()))
        {
            return false;
        }
        if self
            .class_name
            .as_ref()
            .is_some_and(|regex| !regex.is_match(slot.classname().unwrap_or_default()))
        {
            return false;
        }
        let node_tags = record.tags();
        self.tags
            .iter()
            .all(|regex| node_tags.iter().any(|tag| regex.is_match(tag)))
    }
}

impl NodeRepository {
    /// Bound nodes matching `criteria`.
    ///
    /// # Errors
    ///
    /// [`NodeError::InvalidPattern`] for a pattern that is not a valid
    /// regular expression.
    pub fn search(
        &self,
        criteria: &SearchCriteria,
        location: SourceLocation,
    ) -> Result<Vec<NodeId>, TdlError> {
        let matcher = Matcher::new(criteria, location)?;
        let Some(subtree) = &criteria.subtree else {
            return Ok(self
                .iter()
                .filter(|(_, slot)| matcher.matches(slot))
                .map(|(id, _)| id)
                .collect());
        };
        let mut found = Vec::new();
        let mut visited = FxHashSet::default();
        let mut stack = subtree.iter().rev().copied().collect::<Vec<_>>();
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let Some(slot) = self.get(id).filter(|slot| slot.is_bound()) else {
                continue;
            };
            if matcher.matches(slot) {
                found.push(id);
            }
            stack.extend(slot.children().stub_ids().collect::<Vec<_>>().into_iter().rev());
        }
        Ok(found)
    }

    /// Bound nodes named `name` or `name:<qualifiers>`.
    pub fn find_family(&self, name: &str) -> Vec<NodeId> {
        let prefix = format!("{name}:");
        self.iter()
            .filter(|(_, slot)| slot.is_bound())
            .filter(|(_, slot)| slot.name() == name || slot.name().starts_with(&prefix))
            .map(|(id, _)| id)
            .collect()
    }
}
