#![warn(clippy::pedantic)]
//! Entry Points for TDL Trees
//!
//! This crate ties definition and resolution together. A tree is defined by a
//! closure that receives the root [`NodeScope`]; once it returns, its local
//! handles are gone, so only nodes it kept referenced (through the root group
//! or a parent) survive the orphan sweep.
//!
//! ```
//! use tdl::{Settings, define};
//! use tdl_nodes::meq;
//!
//! let forest = define(&Settings::default(), |ns| {
//!     let x = ns.define("x", meq("Parm").with().field("value", 1.5).build())?;
//!     let y = ns.define("y", &x * 2.0)?;
//!     ns.add_root(&y);
//!     Ok(())
//! })?;
//! assert_eq!(forest.roots, vec!["y".to_string()]);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Configuration
//!
//! [`Settings`] carries the [`RepositoryOptions`] and a log filter and can be
//! read from TOML. Logging goes through the `log` facade;
//! [`Settings::init_logging`] installs `env_logger`.

pub mod settings;

use anyhow::{Context, Result};
use log::info;
pub use settings::Settings;
pub use tdl_repository::{
    NodeScope, NodeStub, RepositoryOptions, ResolvedForest, SearchCriteria, TdlError,
};

/// Defines a tree in a fresh root scope and resolves it.
///
/// `definition` runs first; its handles are dropped before the resolve pass.
///
/// # Errors
///
/// Returns an error if `definition` fails or if the tree does not resolve.
/// Resolve failures carry a [`TdlError`] that can be recovered with
/// `downcast_ref`.
pub fn define<F>(settings: &Settings, definition: F) -> Result<ResolvedForest>
where
    F: FnOnce(&NodeScope) -> Result<()>,
{
    let scope = NodeScope::new(settings.repository.clone());
    definition(&scope).context("Tree definition failed")?;
    resolve_scope(&scope)
}

/// Resolves a scope built by the caller and returns its forest.
///
/// # Errors
///
/// Returns an error carrying the [`TdlError`] of the resolve pass.
pub fn resolve_scope(scope: &NodeScope) -> Result<ResolvedForest> {
    scope.resolve().context("Failed to resolve tree")?;
    let forest = scope.forest()?;
    info!(
        "resolved {} nodes with {} roots",
        forest.len(),
        forest.roots.len()
    );
    Ok(forest)
}
