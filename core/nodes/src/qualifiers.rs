//! Name Qualifiers
//!
//! Qualifiers derive related node names from a common basename, e.g. one node
//! per station (`G:1`, `G:2`) or per source (`E:src=3C147`). A fully qualified
//! name is rendered as
//!
//! ```text
//! basename[:q]*[:key=v1,v2]*
//! ```
//!
//! with positional qualifiers in order and keyword qualifiers sorted by key.
//!
//! Two merge modes exist. [`MergeMode::Append`] concatenates positional
//! qualifiers, so qualifying twice with the same value repeats it.
//! [`MergeMode::Merge`] only adds positional qualifiers that are not present
//! yet. Keyword qualifiers are merged in both modes.

use core::fmt;
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
};

use itertools::Itertools;

/// A single qualifier value, kept in its rendered form.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Qualifier(String);

impl Qualifier {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Qualifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Qualifier {
    fn from(value: &str) -> Self {
        Qualifier(value.to_string())
    }
}

impl From<String> for Qualifier {
    fn from(value: String) -> Self {
        Qualifier(value)
    }
}

impl From<&String> for Qualifier {
    fn from(value: &String) -> Self {
        Qualifier(value.clone())
    }
}

macro_rules! qualifier_from_display {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Qualifier {
                fn from(value: $t) -> Self {
                    Qualifier(value.to_string())
                }
            }
        )*
    };
}

qualifier_from_display!(i32, i64, u32, u64, usize, char);

impl From<f64> for Qualifier {
    fn from(value: f64) -> Self {
        Qualifier(format!("{value:?}"))
    }
}

/// How positional qualifiers are combined.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeMode {
    /// Concatenate, keeping duplicates.
    Append,
    /// Add only values that are not present yet.
    Merge,
}

/// Positional and keyword qualifiers of a node name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Qualifiers {
    pub positional: Vec<Qualifier>,
    pub keyword: BTreeMap<String, Vec<Qualifier>>,
}

impl Qualifiers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a positional qualifier.
    #[must_use]
    pub fn with(mut self, qual: impl Into<Qualifier>) -> Self {
        self.positional.push(qual.into());
        self
    }

    /// Adds a keyword qualifier value, merging with existing values of `key`.
    #[must_use]
    pub fn with_kw(mut self, key: impl Into<String>, qual: impl Into<Qualifier>) -> Self {
        let qual = qual.into();
        let values = self.keyword.entry(key.into()).or_default();
        if !values.contains(&qual) {
            values.push(qual);
        }
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }

    /// Merges `other` into `self`.
    pub fn merge(&mut self, other: &Qualifiers, mode: MergeMode) {
        match mode {
            MergeMode::Append => self.positional.extend(other.positional.iter().cloned()),
            MergeMode::Merge => {
                let fresh = other
                    .positional
                    .iter()
                    .filter(|q| !self.positional.contains(q))
                    .cloned()
                    .collect::<Vec<_>>();
                self.positional.extend(fresh);
            }
        }
        for (key, values) in &other.keyword {
            let existing = self.keyword.entry(key.clone()).or_default();
            let fresh = values
                .iter()
                .filter(|q| !existing.contains(q))
                .cloned()
                .collect::<Vec<_>>();
            existing.extend(fresh);
        }
    }

    /// Returns `self` merged with `other`.
    #[must_use]
    pub fn merged(&self, other: &Qualifiers, mode: MergeMode) -> Qualifiers {
        let mut result = self.clone();
        result.merge(other, mode);
        result
    }
}

impl Display for Qualifiers {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let parts = self
            .positional
            .iter()
            .map(ToString::to_string)
            .chain(
                self.keyword
                    .iter()
                    .map(|(key, values)| format!("{key}={}", values.iter().join(","))),
            );
        write!(f, "{}", parts.format(":"))
    }
}

/// Renders `basename` qualified by `quals`.
#[must_use]
pub fn qualify_name(basename: &str, quals: &Qualifiers) -> String {
    if quals.is_empty() {
        basename.to_string()
    } else {
        format!("{basename}:{quals}")
    }
}
