#![warn(clippy::pedantic)]
//! Node Definitions for the TDL Tree Builder
//!
//! This crate holds everything a tree script produces *before* a name is
//! attached to it: pending node definitions, child references, init records
//! and name qualifiers. Nothing here knows about scopes or repositories; the
//! binding and resolution machinery lives in `tdl-repository`.
//!
//! ## Building Blocks
//!
//! - [`NodeClass`] - a node class such as `MeqAdd`; [`meq`] creates classes of
//!   the default `Meq` package
//! - [`NodeBuilder`] - collects children, step-children and init fields and
//!   produces a [`NodeDef`] (or a deferred [`BuildError`])
//! - [`ChildRef`] - a child reference that is not resolved yet: a node name, a
//!   numeric constant, an existing node, a nested definition or a factory
//! - [`ChildList`] - ordered `(label, child)` pairs, positional or keyed
//! - [`Qualifiers`] - positional and keyword name qualifiers with the
//!   append/merge rules used for node families
//! - [`InitRecord`] and [`Value`] - the key/value bag handed to the engine
//!
//! ## Deferred Errors
//!
//! Construction never panics on a malformed definition. [`NodeBuilder::build`]
//! returns `Result<NodeDef, BuildError>` and that result can be passed straight
//! to a bind call, which reports the error at the bind site:
//!
//! ```
//! use tdl_nodes::{meq, BuildError, ChildList};
//!
//! let def = meq("Add")
//!     .with()
//!     .child(1.0)
//!     .children(ChildList::positional([2.0.into()]))
//!     .build();
//! assert!(matches!(def, Err(BuildError::ConflictingChildren { .. })));
//! ```
//!
//! ## Arithmetic
//!
//! Definitions support `+ - * / %` and unary `-`, producing `Add`, `Subtract`,
//! `Multiply`, `Divide`, `FMod` and `Negate` definitions. The same operations
//! are available as plain functions in [`ops`].

pub mod child;
pub mod def;
pub mod errors;
pub mod location;
pub mod ops;
pub mod qualifiers;
pub mod value;

pub use child::{
    ChildLabel, ChildList, ChildRef, ConstKey, Constant, DEFAULT_RESOLVE_DEPTH, Factory,
    IntoChild, NodeId, NodeRef, RepositoryId,
};
pub use def::{MEQ_PACKAGE, NodeBuilder, NodeClass, NodeDef, meq};
pub use errors::BuildError;
pub use location::SourceLocation;
pub use qualifiers::{MergeMode, Qualifier, Qualifiers, qualify_name};
pub use value::{InitRecord, Value};
