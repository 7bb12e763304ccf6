//! Node Repository
//!
//! The repository is the single store behind a tree of scopes. It owns every
//! node slot in an arena indexed by [`NodeId`], a name map in registration
//! order, the shared constants cache and the list of collected errors.
//!
//! ## Ownership
//!
//! Slots refer to each other only by id: children are `ChildRef::Stub`
//! entries tagged with the repository's [`RepositoryId`] and parents are a
//! set of ids. Handles held by user code
//! ([`NodeStub`](crate::NodeStub)) carry a strong `Rc<NodeId>` token while the
//! slot keeps a `Weak`, so the resolve pass can tell whether anything outside
//! the repository still refers to a node.
//!
//! Removed slots become tombstones; ids are never reused.
//!
//! ## Error Collection
//!
//! [`NodeRepository::add_error`] appends an error, then one
//! [`NodeError::CalledFrom`] per enclosing call frame (innermost first), then
//! any chained error. Once `error_limit` errors are recorded the whole list is
//! returned as a [`CumulativeError`]. In testing mode the error is returned
//! right away instead.

use std::{
    cell::RefCell,
    rc::{Rc, Weak},
    sync::atomic::{AtomicU32, Ordering},
};

use indexmap::{IndexMap, IndexSet};
use log::{trace, warn};
use rustc_hash::FxHashMap;
use tdl_nodes::{
    ChildList, ChildRef, ConstKey, InitRecord, NodeId, NodeRef, Qualifiers, RepositoryId,
    SourceLocation,
};

use crate::{
    errors::{CumulativeError, NodeError, TdlError},
    forest::ChildIndices,
    options::RepositoryOptions,
};

static NEXT_REPOSITORY: AtomicU32 = AtomicU32::new(0);

/// Index of a scope sharing a repository.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScopeId(pub(crate) u32);

impl ScopeId {
    pub const ROOT: ScopeId = ScopeId(0);
}

#[derive(Debug, Default)]
pub(crate) struct ScopeData {
    pub(crate) name: Option<String>,
    pub(crate) unique_counters: FxHashMap<String, u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResolveState {
    Building,
    Resolved,
    Failed,
}

/// State of one node.
#[derive(Debug)]
pub struct NodeSlot {
    pub(crate) name: String,
    pub(crate) basename: String,
    pub(crate) scope: ScopeId,
    pub(crate) quals: Qualifiers,
    pub(crate) classname: Option<String>,
    pub(crate) parents: IndexSet<NodeId>,
    pub(crate) children: ChildList,
    pub(crate) stepchildren: ChildList,
    pub(crate) init_record: Option<InitRecord>,
    pub(crate) nodeindex: Option<u32>,
    pub(crate) defined_at: SourceLocation,
    pub(crate) trail: Vec<SourceLocation>,
    pub(crate) bound_at: Option<SourceLocation>,
    pub(crate) bind_trail: Vec<SourceLocation>,
    pub(crate) token: Weak<NodeId>,
    pub(crate) child_indices: Option<ChildIndices>,
    pub(crate) step_indices: Vec<i64>,
}

impl NodeSlot {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn basename(&self) -> &str {
        &self.basename
    }

    #[must_use]
    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    #[must_use]
    pub fn quals(&self) -> &Qualifiers {
        &self.quals
    }

    #[must_use]
    pub fn classname(&self) -> Option<&str> {
        self.classname.as_deref()
    }

    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.init_record.is_some()
    }

    #[must_use]
    pub fn init_record(&self) -> Option<&InitRecord> {
        self.init_record.as_ref()
    }

    #[must_use]
    pub fn children(&self) -> &ChildList {
        &self.children
    }

    #[must_use]
    pub fn stepchildren(&self) -> &ChildList {
        &self.stepchildren
    }

    pub fn parents(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.parents.iter().copied()
    }

    #[must_use]
    pub fn nodeindex(&self) -> Option<u32> {
        self.nodeindex
    }

    /// Where the node was first named.
    #[must_use]
    pub fn defined_at(&self) -> SourceLocation {
        self.defined_at
    }

    /// Where the node was bound.
    #[must_use]
    pub fn bound_at(&self) -> Option<SourceLocation> {
        self.bound_at
    }

    /// A handle outside the repository still refers to the node.
    #[must_use]
    pub fn is_referenced(&self) -> bool {
        self.token.strong_count() > 0
    }

    pub(crate) fn child_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children.stub_ids().chain(self.stepchildren.stub_ids())
    }
}

/// Arena of nodes shared by a root scope and its subscopes.
#[derive(Debug)]
pub struct NodeRepository {
    pub(crate) id: RepositoryId,
    pub(crate) slots: Vec<Option<NodeSlot>>,
    pub(crate) names: IndexMap<String, NodeId>,
    pub(crate) scopes: Vec<ScopeData>,
    pub(crate) constants: FxHashMap<ConstKey, NodeId>,
    pub(crate) errors: Vec<NodeError>,
    pub(crate) frames: Rc<RefCell<Vec<SourceLocation>>>,
    pub(crate) options: RepositoryOptions,
    pub(crate) sinks: Vec<NodeId>,
    pub(crate) spigots: Vec<NodeId>,
    pub(crate) mux: Option<NodeId>,
    pub(crate) pinned: FxHashMap<NodeId, Rc<NodeId>>,
    pub(crate) roots: Option<IndexMap<String, NodeId>>,
    pub(crate) state: ResolveState,
}

impl NodeRepository {
    #[must_use]
    pub fn new(options: RepositoryOptions) -> Self {
        Self {
            id: RepositoryId(NEXT_REPOSITORY.fetch_add(1, Ordering::Relaxed)),
            slots: Vec::new(),
            names: IndexMap::new(),
            scopes: vec![ScopeData::default()],
            constants: FxHashMap::default(),
            errors: Vec::new(),
            frames: Rc::new(RefCell::new(Vec::new())),
            options,
            sinks: Vec::new(),
            spigots: Vec::new(),
            mux: None,
            pinned: FxHashMap::default(),
            roots: None,
            state: ResolveState::Building,
        }
    }

    #[must_use]
    pub fn id(&self) -> RepositoryId {
        self.id
    }

    /// Child reference to node `id` of this repository.
    #[must_use]
    pub fn child(&self, id: NodeId) -> ChildRef {
        ChildRef::Stub(NodeRef {
            repository: self.id,
            id,
        })
    }

    #[must_use]
    pub fn options(&self) -> &RepositoryOptions {
        &self.options
    }

    /// Errors collected so far, in report order.
    #[must_use]
    pub fn errors(&self) -> &[NodeError] {
        &self.errors
    }

    /// Number of named nodes, bound or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.state == ResolveState::Resolved
    }

    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&NodeSlot> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut NodeSlot> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Node registered under `name`, bound or not.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    /// Bound node registered under `name`.
    #[must_use]
    pub fn lookup_bound(&self, name: &str) -> Option<NodeId> {
        self.lookup(name)
            .filter(|id| self.get(*id).is_some_and(NodeSlot::is_bound))
    }

    /// Nodes in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &NodeSlot)> {
        self.names
            .values()
            .filter_map(|id| self.get(*id).map(|slot| (*id, slot)))
    }

    #[must_use]
    pub fn name_of(&self, id: NodeId) -> Option<&str> {
        self.get(id).map(NodeSlot::name)
    }

    /// Bound `MeqSink` nodes.
    #[must_use]
    pub fn sinks(&self) -> &[NodeId] {
        &self.sinks
    }

    /// Bound `MeqSpigot` nodes.
    #[must_use]
    pub fn spigots(&self) -> &[NodeId] {
        &self.spigots
    }

    /// The `MeqVisDataMux` node, if one was bound.
    #[must_use]
    pub fn mux(&self) -> Option<NodeId> {
        self.mux
    }

    /// Root nodes by name, available once resolved.
    ///
    /// # Errors
    ///
    /// [`TdlError::NotResolved`] before a successful resolve.
    pub fn roots(&self) -> Result<&IndexMap<String, NodeId>, TdlError> {
        match (&self.roots, self.state) {
            (Some(roots), ResolveState::Resolved) => Ok(roots),
            _ => Err(TdlError::NotResolved),
        }
    }

    pub(crate) fn add_scope(&mut self, parent: ScopeId, name: &str, quals: &Qualifiers) -> ScopeId {
        let name = match self.scope_name(parent) {
            Some(parent) => format!("{parent}::{name}"),
            None => name.to_string(),
        };
        let id = ScopeId(u32::try_from(self.scopes.len()).unwrap_or(u32::MAX));
        self.scopes.push(ScopeData {
            name: Some(tdl_nodes::qualify_name(&name, quals)),
            unique_counters: FxHashMap::default(),
        });
        id
    }

    #[must_use]
    pub fn scope_name(&self, scope: ScopeId) -> Option<&str> {
        self.scopes
            .get(scope.0 as usize)
            .and_then(|data| data.name.as_deref())
    }

    /// `name` prefixed with the scope's name.
    #[must_use]
    pub fn scoped_name(&self, scope: ScopeId, name: &str) -> String {
        match self.scope_name(scope) {
            Some(prefix) => format!("{prefix}::{name}"),
            None => name.to_string(),
        }
    }

    /// Returns `(name)` on the first call for `name` in `scope`, then
    /// `(name)1`, `(name)2`, ...
    pub fn make_unique_name(&mut self, scope: ScopeId, name: &str) -> String {
        let Some(data) = self.scopes.get_mut(scope.0 as usize) else {
            return format!("({name})");
        };
        let counter = data.unique_counters.entry(name.to_string()).or_insert(0);
        let num = *counter;
        *counter += 1;
        if num == 0 {
            format!("({name})")
        } else {
            format!("({name}){num}")
        }
    }

    /// Node named `name` in `scope`, created unbound when missing.
    pub fn node_in_scope(&mut self, scope: ScopeId, name: &str, location: SourceLocation) -> NodeId {
        let fqname = self.scoped_name(scope, name);
        self.get_or_create(fqname.clone(), fqname, scope, Qualifiers::new(), location)
    }

    pub(crate) fn get_or_create(
        &mut self,
        name: String,
        basename: String,
        scope: ScopeId,
        quals: Qualifiers,
        location: SourceLocation,
    ) -> NodeId {
        if let Some(id) = self.lookup(&name) {
            return id;
        }
        let id = NodeId(u32::try_from(self.slots.len()).unwrap_or(u32::MAX));
        trace!("creating node stub {name} at {location}");
        let trail = self.trail();
        self.slots.push(Some(NodeSlot {
            name: name.clone(),
            basename,
            scope,
            quals,
            classname: None,
            parents: IndexSet::new(),
            children: ChildList::new(),
            stepchildren: ChildList::new(),
            init_record: None,
            nodeindex: None,
            defined_at: location,
            trail,
            bound_at: None,
            bind_trail: Vec::new(),
            token: Weak::new(),
            child_indices: None,
            step_indices: Vec::new(),
        }));
        self.names.insert(name, id);
        id
    }

    /// Strong token for a handle to `id`; `None` for removed nodes.
    pub(crate) fn token(&mut self, id: NodeId) -> Option<Rc<NodeId>> {
        let slot = self.get_mut(id)?;
        if let Some(token) = slot.token.upgrade() {
            return Some(token);
        }
        let token = Rc::new(id);
        slot.token = Rc::downgrade(&token);
        Some(token)
    }

    /// Keeps `id` referenced from inside the repository.
    pub fn pin(&mut self, id: NodeId) {
        if let Some(token) = self.token(id) {
            self.pinned.insert(id, token);
        }
    }

    pub fn unpin(&mut self, id: NodeId) {
        self.pinned.remove(&id);
    }

    pub(crate) fn frames(&self) -> Rc<RefCell<Vec<SourceLocation>>> {
        Rc::clone(&self.frames)
    }

    /// Snapshot of the current call frames, outermost first.
    #[must_use]
    pub fn trail(&self) -> Vec<SourceLocation> {
        self.frames.borrow().clone()
    }

    /// Records `err` with the called-from entries of `trail`.
    ///
    /// # Errors
    ///
    /// In testing mode, `err` itself. Otherwise a [`CumulativeError`] holding
    /// every recorded error once the error limit is reached.
    pub fn add_error(&mut self, err: NodeError, trail: &[SourceLocation]) -> Result<(), TdlError> {
        if self.options.testing {
            return Err(TdlError::Node(err));
        }
        warn!("{err}");
        let location = err.location();
        let next = err.next_error();
        self.errors.push(err);
        for frame in trail.iter().rev() {
            if self
                .options
                .trail_boundary
                .as_deref()
                .is_some_and(|boundary| frame.file_name() == boundary || frame.file == boundary)
            {
                break;
            }
            if !frame.same_line(&location) {
                self.errors.push(NodeError::CalledFrom {
                    note: format!("called from {}", frame.file),
                    location: *frame,
                });
            }
        }
        if let Some(next) = next {
            self.add_error(next, &[])?;
        }
        match self.options.error_limit {
            Some(limit) if self.errors.len() >= limit => Err(TdlError::Cumulative(CumulativeError {
                errors: self.errors.clone(),
            })),
            _ => Ok(()),
        }
    }

    /// Records `err` with the current call frames.
    ///
    /// # Errors
    ///
    /// See [`NodeRepository::add_error`].
    pub fn report(&mut self, err: NodeError) -> Result<(), TdlError> {
        let trail = self.trail();
        self.add_error(err, &trail)
    }

    /// Tombstones a slot and unlinks it from its children. Returns the ids of
    /// its children.
    ///
    /// The name map, the constants cache and the sink and spigot lists still
    /// mention the node until [`NodeRepository::compact`] runs.
    pub(crate) fn detach(&mut self, id: NodeId) -> Vec<NodeId> {
        let Some(slot) = self.slots.get_mut(id.index()).and_then(Option::take) else {
            return Vec::new();
        };
        let children = slot.child_ids().collect::<Vec<_>>();
        for child in &children {
            if let Some(child) = self.get_mut(*child) {
                child.parents.shift_remove(&id);
            }
        }
        self.pinned.remove(&id);
        if self.mux == Some(id) {
            self.mux = None;
        }
        children
    }

    /// Drops tombstoned nodes from the name map and the bookkeeping lists, in
    /// one pass over each.
    pub(crate) fn compact(&mut self) {
        let slots = &self.slots;
        let live = |id: &NodeId| slots.get(id.index()).is_some_and(Option::is_some);
        self.names.retain(|_, id| live(id));
        self.constants.retain(|_, id| live(id));
        self.sinks.retain(|id| live(id));
        self.spigots.retain(|id| live(id));
    }
}
