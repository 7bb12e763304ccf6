use core::fmt;
use std::{
    fmt::{Display, Formatter},
    path::Path,
};

/// Source position of a call into the tree-building API.
///
/// Public construction and binding functions are `#[track_caller]`, so the
/// captured position is the user's call site rather than a frame inside
/// this workspace.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SourceLocation {
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    #[must_use]
    pub fn new(file: &'static str, line: u32, column: u32) -> Self {
        Self { file, line, column }
    }

    /// Location of the caller of the enclosing `#[track_caller]` function.
    #[track_caller]
    #[must_use]
    pub fn caller() -> Self {
        Self::from(std::panic::Location::caller())
    }

    /// Final path component of the file, used in node descriptions.
    #[must_use]
    pub fn file_name(&self) -> &'static str {
        Path::new(self.file)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(self.file)
    }

    /// Two locations on the same line of the same file.
    #[must_use]
    pub fn same_line(&self, other: &SourceLocation) -> bool {
        self.file == other.file && self.line == other.line
    }
}

impl From<&'static std::panic::Location<'static>> for SourceLocation {
    fn from(location: &'static std::panic::Location<'static>) -> Self {
        Self {
            file: location.file(),
            line: location.line(),
            column: location.column(),
        }
    }
}

impl Display for SourceLocation {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}
