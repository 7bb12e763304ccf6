#![warn(clippy::pedantic)]
//! Node Repository and Resolver for TDL Trees
//!
//! Tree scripts define nodes through a [`NodeScope`]. Every scope of a tree
//! shares one [`NodeRepository`], which stores the nodes, collects errors and
//! finally resolves the tree into a [`ResolvedForest`] for the engine.
//!
//! ## Lifecycle
//!
//! 1. **Define**: [`NodeScope::node`] names a node and returns a [`NodeStub`]
//!    handle; [`NodeStub::bind`] attaches a definition from `tdl-nodes`.
//!    Children given as names, constants or nested definitions are turned
//!    into nodes at bind time.
//! 2. **Collect errors**: a failing bind is recorded, together with the call
//!    frames pushed by [`NodeScope::frame`], and the script goes on. Only the
//!    error limit or testing mode stops it early.
//! 3. **Resolve**: [`NodeScope::resolve`] checks for unbound children, sweeps
//!    orphans, fails with a [`CumulativeError`] if anything went wrong, and
//!    otherwise numbers the nodes and rewrites children into indices.
//!
//! ## Roots and Orphans
//!
//! A bound node without parents is a root if user code still holds a handle
//! to it (or [`RepositoryOptions::orphans_are_roots`] is set). Otherwise it is
//! an orphan and deleted, which may orphan its children in turn.

pub mod bind;
pub mod errors;
pub mod forest;
pub mod options;
pub mod pretty;
pub mod repository;
pub mod resolve;
pub mod scope;
pub mod search;
pub mod stub;

pub use errors::{CumulativeError, NodeError, TdlError};
pub use forest::{ChildIndices, ResolvedForest, ResolvedNode};
pub use options::{DEFAULT_ERROR_LIMIT, RepositoryOptions};
pub use repository::{NodeRepository, NodeSlot, ScopeId};
pub use resolve::{NoHook, ResolveHook, VisDataMuxHook};
pub use scope::{FrameGuard, NodeGroup, NodeScope};
pub use search::SearchCriteria;
pub use stub::NodeStub;
