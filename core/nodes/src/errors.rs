use thiserror::Error;

use crate::location::SourceLocation;

/// A malformed node definition.
///
/// Construction does not fail eagerly: the error travels inside
/// `Result<NodeDef, BuildError>` until the definition is bound, where the
/// repository reports it together with the bind site.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("{location}: children of `{class}` specified by more than one of {sources}")]
    ConflictingChildren {
        class: String,
        sources: String,
        location: SourceLocation,
    },

    #[error("{location}: step-children of `{class}` must be a list or a single node, not keyed")]
    KeyedStepchildren {
        class: String,
        location: SourceLocation,
    },

    #[error("{location}: 'tags' of `{class}` must be a string or a list of strings, found {found}")]
    InvalidTags {
        class: String,
        found: String,
        location: SourceLocation,
    },

    #[error("{location}: 'node_groups' of `{class}` must be a string or a list of strings, found {found}")]
    InvalidNodeGroups {
        class: String,
        found: String,
        location: SourceLocation,
    },

    #[error("{location}: field `{field}` of `{class}` is reserved")]
    ReservedField {
        class: String,
        field: String,
        location: SourceLocation,
    },

    #[error("{location}: invalid definition: {reason}")]
    Invalid {
        reason: String,
        location: SourceLocation,
    },
}

impl BuildError {
    #[must_use]
    pub fn location(&self) -> SourceLocation {
        match self {
            BuildError::ConflictingChildren { location, .. }
            | BuildError::KeyedStepchildren { location, .. }
            | BuildError::InvalidTags { location, .. }
            | BuildError::InvalidNodeGroups { location, .. }
            | BuildError::ReservedField { location, .. }
            | BuildError::Invalid { location, .. } => *location,
        }
    }

    /// Builds an [`BuildError::Invalid`] at the caller's location.
    #[track_caller]
    #[must_use]
    pub fn invalid(reason: impl Into<String>) -> Self {
        BuildError::Invalid {
            reason: reason.into(),
            location: SourceLocation::caller(),
        }
    }
}
