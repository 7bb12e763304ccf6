use std::fmt::{self, Display, Formatter};

use tdl_nodes::{BuildError, ChildLabel, SourceLocation};
use thiserror::Error;

/// A diagnostic about one node, reported at a source location.
///
/// Most of these are collected by the repository rather than returned, so
/// that a tree definition can run to completion and report every problem
/// at once. [`NodeError::CalledFrom`] and [`NodeError::FirstDefinedHere`] are
/// not failures of their own; they follow a real error in the list and show
/// where it came from.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NodeError {
    #[error("{location}: child '{label}' = {name} not found")]
    ChildNotFound {
        label: ChildLabel,
        name: String,
        location: SourceLocation,
    },

    #[error("{location}: child '{label}' has illegal type {kind}")]
    IllegalChild {
        label: ChildLabel,
        kind: &'static str,
        location: SourceLocation,
    },

    #[error("{location}: child '{label}' = {child} of node `{parent}` is not initialized")]
    UninitializedChild {
        label: ChildLabel,
        child: String,
        parent: String,
        location: SourceLocation,
    },

    #[error("{location}: conflicting definition for node `{name}`")]
    NodeRedefined {
        name: String,
        location: SourceLocation,
        first_defined: SourceLocation,
    },

    #[error("{location}: node `{name}` first defined here")]
    FirstDefinedHere {
        name: String,
        location: SourceLocation,
    },

    #[error("{location}: node `{name}` not initialized")]
    UninitializedNode {
        name: String,
        location: SourceLocation,
    },

    #[error("{location}: {operation} on unbound node `{name}`")]
    UnboundNode {
        name: String,
        operation: &'static str,
        location: SourceLocation,
    },

    #[error("{location}: can't bind node `{name}` with argument of type {kind}")]
    Unbindable {
        name: String,
        kind: &'static str,
        location: SourceLocation,
    },

    #[error("{location}: definition of node `{name}` failed: {source}")]
    Definition {
        name: String,
        #[source]
        source: BuildError,
        location: SourceLocation,
    },

    #[error("{location}: {note}")]
    CalledFrom {
        note: String,
        location: SourceLocation,
    },

    #[error("{location}: invalid search pattern `{pattern}`: {reason}")]
    InvalidPattern {
        pattern: String,
        reason: String,
        location: SourceLocation,
    },
}

impl NodeError {
    #[must_use]
    pub fn location(&self) -> SourceLocation {
        match self {
            NodeError::ChildNotFound { location, .. }
            | NodeError::IllegalChild { location, .. }
            | NodeError::UninitializedChild { location, .. }
            | NodeError::NodeRedefined { location, .. }
            | NodeError::FirstDefinedHere { location, .. }
            | NodeError::UninitializedNode { location, .. }
            | NodeError::UnboundNode { location, .. }
            | NodeError::Unbindable { location, .. }
            | NodeError::Definition { location, .. }
            | NodeError::CalledFrom { location, .. }
            | NodeError::InvalidPattern { location, .. } => *location,
        }
    }

    /// The error chained after this one, if any.
    #[must_use]
    pub fn next_error(&self) -> Option<NodeError> {
        match self {
            NodeError::NodeRedefined {
                name,
                first_defined,
                ..
            } => Some(NodeError::FirstDefinedHere {
                name: name.clone(),
                location: *first_defined,
            }),
            _ => None,
        }
    }

    /// Trail entries only give provenance for the error before them.
    #[must_use]
    pub fn is_trail(&self) -> bool {
        matches!(
            self,
            NodeError::CalledFrom { .. } | NodeError::FirstDefinedHere { .. }
        )
    }
}

/// Every error collected during a tree definition, in report order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CumulativeError {
    pub errors: Vec<NodeError>,
}

impl CumulativeError {
    /// Errors that are not trail entries.
    pub fn primary(&self) -> impl Iterator<Item = &NodeError> {
        self.errors.iter().filter(|err| !err.is_trail())
    }
}

impl Display for CumulativeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tree definition failed with {} error(s):",
            self.primary().count()
        )?;
        for (n, err) in self.errors.iter().enumerate() {
            write!(f, "\n [{:3}] {err}", n + 1)?;
        }
        Ok(())
    }
}

impl std::error::Error for CumulativeError {}

/// Errors surfaced to the caller of the scope API.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TdlError {
    /// Raised immediately in testing mode, or by operations that do not
    /// defer their errors.
    #[error(transparent)]
    Node(#[from] NodeError),

    #[error(transparent)]
    Cumulative(#[from] CumulativeError),

    #[error("repository must be resolved to determine root nodes")]
    NotResolved,
}
