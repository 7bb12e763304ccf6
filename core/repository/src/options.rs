use serde::{Deserialize, Serialize};

/// Default cap on collected errors.
pub const DEFAULT_ERROR_LIMIT: usize = 100;

/// Behaviour switches of a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryOptions {
    /// Return errors from the failing call instead of collecting them.
    pub testing: bool,
    /// Abort with all collected errors once this many have been recorded.
    /// `None` collects without a cap and is written as `error_limit = 0`.
    #[serde(with = "error_limit")]
    pub error_limit: Option<usize>,
    /// Keep parentless nodes as roots instead of sweeping unreferenced ones.
    pub orphans_are_roots: bool,
    /// File name at which called-from trails stop.
    pub trail_boundary: Option<String>,
}

impl Default for RepositoryOptions {
    fn default() -> Self {
        Self {
            testing: false,
            error_limit: Some(DEFAULT_ERROR_LIMIT),
            orphans_are_roots: false,
            trail_boundary: None,
        }
    }
}

impl RepositoryOptions {
    /// Options for unit tests: errors are returned immediately.
    #[must_use]
    pub fn testing() -> Self {
        Self {
            testing: true,
            ..Self::default()
        }
    }
}

/// `error_limit` as a plain integer, 0 standing for no cap.
mod error_limit {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[allow(clippy::ref_option)]
    pub(super) fn serialize<S: Serializer>(
        limit: &Option<usize>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        limit.unwrap_or(0).serialize(serializer)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<usize>, D::Error> {
        let limit = usize::deserialize(deserializer)?;
        Ok((limit != 0).then_some(limit))
    }
}
