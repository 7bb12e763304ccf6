//! Scopes
//!
//! A [`NodeScope`] is the entry point for defining trees. The root scope owns
//! a fresh [`NodeRepository`]; subscopes share it and prefix the names of
//! their nodes with `parent::name`.
//!
//! ```
//! use tdl_nodes::meq;
//! use tdl_repository::{NodeScope, RepositoryOptions};
//!
//! let ns = NodeScope::new(RepositoryOptions::testing());
//! let a = ns.define("a", meq("Constant").with().field("value", 1.0).build()).unwrap();
//! let b = ns.define("b", meq("Constant").with().field("value", 2.0).build()).unwrap();
//! let sum = ns.define("sum", &a + &b).unwrap();
//! ns.resolve().unwrap();
//! assert_eq!(sum.nodeindex(), Some(3));
//! ```

use std::{cell::RefCell, rc::Rc};

use indexmap::IndexMap;
use tdl_nodes::{ChildRef, Constant, IntoChild, Qualifiers, SourceLocation};

use crate::{
    errors::{NodeError, TdlError},
    forest::ResolvedForest,
    options::RepositoryOptions,
    repository::{NodeRepository, ScopeId},
    resolve::{ResolveHook, VisDataMuxHook},
    search::SearchCriteria,
    stub::NodeStub,
};

/// Named collection of nodes; holding a node here keeps it referenced.
#[derive(Debug, Clone, Default)]
pub struct NodeGroup {
    name: String,
    nodes: IndexMap<String, NodeStub>,
}

impl NodeGroup {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds `node` unless a node of the same name is already present.
    pub fn add(&mut self, node: &NodeStub) {
        self.nodes
            .entry(node.name().to_string())
            .or_insert_with(|| node.clone());
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&NodeStub> {
        self.nodes.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeStub> {
        self.nodes.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Pushes a call frame on the repository's trail until dropped.
///
/// Errors raised while the guard lives list the frame as a
/// [`NodeError::CalledFrom`] entry.
#[must_use = "the frame is popped when the guard is dropped"]
#[derive(Debug)]
pub struct FrameGuard {
    frames: Rc<RefCell<Vec<SourceLocation>>>,
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        self.frames.borrow_mut().pop();
    }
}

/// Named scope over a shared node repository.
#[derive(Debug, Clone)]
pub struct NodeScope {
    repo: Rc<RefCell<NodeRepository>>,
    id: ScopeId,
    roots: Rc<RefCell<NodeGroup>>,
}

impl Default for NodeScope {
    fn default() -> Self {
        Self::new(RepositoryOptions::default())
    }
}

impl NodeScope {
    /// Root scope over a new repository.
    #[must_use]
    pub fn new(options: RepositoryOptions) -> Self {
        Self {
            repo: Rc::new(RefCell::new(NodeRepository::new(options))),
            id: ScopeId::ROOT,
            roots: Rc::new(RefCell::new(NodeGroup::new("ROOT"))),
        }
    }

    /// Child scope named `parent::name`, qualified by `quals`.
    #[must_use]
    pub fn subscope(&self, name: &str, quals: &Qualifiers) -> NodeScope {
        let id = self.repo.borrow_mut().add_scope(self.id, name, quals);
        NodeScope {
            repo: Rc::clone(&self.repo),
            id,
            roots: Rc::clone(&self.roots),
        }
    }

    #[must_use]
    pub fn id(&self) -> ScopeId {
        self.id
    }

    /// Qualified scope name; `None` for the root scope.
    #[must_use]
    pub fn name(&self) -> Option<String> {
        self.repo.borrow().scope_name(self.id).map(ToString::to_string)
    }

    /// Node named `name` in this scope, created unbound when missing.
    #[track_caller]
    #[must_use]
    pub fn node(&self, name: &str) -> NodeStub {
        let location = SourceLocation::caller();
        let id = self.repo.borrow_mut().node_in_scope(self.id, name, location);
        NodeStub::new(&self.repo, id)
    }

    /// `self.node(name).bind(arg)`.
    ///
    /// # Errors
    ///
    /// As [`NodeStub::bind`].
    #[track_caller]
    pub fn define(&self, name: &str, arg: impl IntoChild) -> Result<NodeStub, TdlError> {
        self.node(name).bind(arg)
    }

    /// Binds `arg` under a generated name.
    ///
    /// A handle of this repository is returned as it is; one of another
    /// repository is rejected. Unlike named binds, errors are
    /// returned to the caller rather than collected.
    ///
    /// # Errors
    ///
    /// [`NodeError::Definition`] for a failed construction,
    /// [`NodeError::Unbindable`] for an argument that is not a definition, or
    /// a child resolution error.
    #[track_caller]
    pub fn bind(&self, arg: impl IntoChild) -> Result<NodeStub, TdlError> {
        let location = SourceLocation::caller();
        let child = arg.into_child().map_err(|source| NodeError::Definition {
            name: "(anonymous)".to_string(),
            source,
            location,
        })?;
        if let Some(node) = child.as_node() {
            if node.repository != self.repo.borrow().id() {
                return Err(NodeError::Unbindable {
                    name: "(anonymous)".to_string(),
                    kind: "node of another repository",
                    location,
                }
                .into());
            }
            return Ok(NodeStub::new(&self.repo, node.id));
        }
        let child = child.expand_factories();
        let def = child
            .definition()
            .ok_or_else(|| NodeError::Unbindable {
                name: "(anonymous)".to_string(),
                kind: child.kind(),
                location,
            })?;
        let id = self.repo.borrow_mut().autodefine(self.id, def, location)?;
        Ok(NodeStub::new(&self.repo, id))
    }

    /// `(name)` on the first call for `name`, then `(name)1`, `(name)2`, ...
    pub fn make_unique_name(&self, name: &str) -> String {
        self.repo.borrow_mut().make_unique_name(self.id, name)
    }

    /// Shared constant node for `value`.
    ///
    /// # Errors
    ///
    /// See [`NodeRepository::add_error`].
    #[track_caller]
    pub fn make_constant(&self, value: impl Into<Constant>) -> Result<NodeStub, TdlError> {
        let location = SourceLocation::caller();
        let id = self
            .repo
            .borrow_mut()
            .make_constant(value.into(), location)?;
        Ok(NodeStub::new(&self.repo, id))
    }

    /// Bound nodes matching `criteria`.
    ///
    /// # Errors
    ///
    /// [`NodeError::InvalidPattern`] for a bad pattern.
    #[track_caller]
    pub fn search(&self, criteria: &SearchCriteria) -> Result<Vec<NodeStub>, TdlError> {
        let location = SourceLocation::caller();
        let ids = self.repo.borrow().search(criteria, location)?;
        Ok(NodeStub::attach_all(&self.repo, ids))
    }

    /// Names of the bound nodes matching `criteria`.
    ///
    /// # Errors
    ///
    /// [`NodeError::InvalidPattern`] for a bad pattern.
    #[track_caller]
    pub fn search_names(&self, criteria: &SearchCriteria) -> Result<Vec<String>, TdlError> {
        let location = SourceLocation::caller();
        let repo = self.repo.borrow();
        let ids = repo.search(criteria, location)?;
        Ok(ids
            .into_iter()
            .filter_map(|id| repo.name_of(id).map(ToString::to_string))
            .collect())
    }

    /// Bound nodes named `name` or `name:<qualifiers>`.
    #[must_use]
    pub fn find_family(&self, name: &str) -> Vec<NodeStub> {
        let ids = self.repo.borrow().find_family(name);
        NodeStub::attach_all(&self.repo, ids)
    }

    /// Errors collected so far.
    #[must_use]
    pub fn errors(&self) -> Vec<NodeError> {
        self.repo.borrow().errors().to_vec()
    }

    /// Records `err` with the current call frames.
    ///
    /// # Errors
    ///
    /// See [`NodeRepository::add_error`].
    pub fn add_error(&self, err: NodeError) -> Result<(), TdlError> {
        self.repo.borrow_mut().report(err)
    }

    /// Adds `node` to the root group, which keeps it referenced.
    pub fn add_root(&self, node: &NodeStub) {
        self.roots.borrow_mut().add(node);
    }

    #[must_use]
    pub fn root_group(&self) -> NodeGroup {
        self.roots.borrow().clone()
    }

    /// Pushes the caller's location on the call trail until the guard drops.
    #[track_caller]
    pub fn frame(&self) -> FrameGuard {
        let frames = self.repo.borrow().frames();
        frames.borrow_mut().push(SourceLocation::caller());
        FrameGuard { frames }
    }

    /// Resolves the repository with the sink and spigot mux policy.
    ///
    /// # Errors
    ///
    /// See [`NodeRepository::resolve`].
    #[track_caller]
    pub fn resolve(&self) -> Result<(), TdlError> {
        self.resolve_with(&mut VisDataMuxHook)
    }

    /// Resolves the repository with a custom hook.
    ///
    /// # Errors
    ///
    /// See [`NodeRepository::resolve`].
    #[track_caller]
    pub fn resolve_with(&self, hook: &mut dyn ResolveHook) -> Result<(), TdlError> {
        let location = SourceLocation::caller();
        self.repo.borrow_mut().resolve(hook, location)
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.repo.borrow().is_resolved()
    }

    /// Every node in registration order.
    #[must_use]
    pub fn all_nodes(&self) -> Vec<NodeStub> {
        let ids = self
            .repo
            .borrow()
            .iter()
            .map(|(id, _)| id)
            .collect::<Vec<_>>();
        NodeStub::attach_all(&self.repo, ids)
    }

    /// Root nodes of the resolved repository.
    ///
    /// # Errors
    ///
    /// [`TdlError::NotResolved`] before a successful resolve.
    pub fn root_nodes(&self) -> Result<Vec<NodeStub>, TdlError> {
        let ids = self
            .repo
            .borrow()
            .roots()?
            .values()
            .copied()
            .collect::<Vec<_>>();
        Ok(NodeStub::attach_all(&self.repo, ids))
    }

    /// Flat form of the resolved repository.
    ///
    /// # Errors
    ///
    /// [`TdlError::NotResolved`] before a successful resolve.
    pub fn forest(&self) -> Result<ResolvedForest, TdlError> {
        ResolvedForest::from_repository(&self.repo.borrow())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.repo.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.repo.borrow().is_empty()
    }

    /// A node with this fully qualified name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.repo.borrow().lookup(name).is_some()
    }

    /// Handle to the node with this fully qualified name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<NodeStub> {
        let id = self.repo.borrow().lookup(name)?;
        NodeStub::attach(&self.repo, id)
    }

    /// Indented dump of the subtree under `node`.
    #[must_use]
    pub fn print_tree(&self, node: &NodeStub) -> String {
        self.repo.borrow().print_tree(node.id())
    }

    /// Runs `f` on the repository.
    pub fn with_repository<R>(&self, f: impl FnOnce(&NodeRepository) -> R) -> R {
        f(&self.repo.borrow())
    }
}
