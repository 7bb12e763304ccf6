//! Node Handles
//!
//! A [`NodeStub`] is the user's handle to a named node. It may be unbound
//! (only a name so far) or bound to a definition. Holding a handle marks the
//! node as referenced: at resolve time a parentless node that still has a
//! handle becomes a root instead of being swept as an orphan.
//!
//! Factories passed to a handle are expanded before the repository is
//! borrowed, so a factory may itself query or bind handles.

use core::fmt;
use std::{
    cell::RefCell,
    fmt::{Debug, Display, Formatter},
    rc::Rc,
};

use tdl_nodes::{
    BuildError, ChildList, ChildRef, InitRecord, IntoChild, MergeMode, NodeDef, NodeId, NodeRef,
    Qualifiers, RepositoryId, SourceLocation, Value,
};

use crate::{
    errors::TdlError,
    repository::{NodeRepository, ScopeId},
    search::SearchCriteria,
};

#[derive(Debug)]
struct StubKey {
    name: String,
    basename: String,
    quals: Qualifiers,
    scope: ScopeId,
}

/// Handle to a node of a repository.
#[derive(Clone)]
pub struct NodeStub {
    id: NodeId,
    repository: RepositoryId,
    key: Rc<StubKey>,
    _token: Rc<NodeId>,
    repo: Rc<RefCell<NodeRepository>>,
}

impl NodeStub {
    /// Handle to `id`; `None` if the node was removed.
    pub(crate) fn attach(repo: &Rc<RefCell<NodeRepository>>, id: NodeId) -> Option<Self> {
        let mut inner = repo.borrow_mut();
        let token = inner.token(id)?;
        let slot = inner.get(id)?;
        let key = StubKey {
            name: slot.name.clone(),
            basename: slot.basename.clone(),
            quals: slot.quals.clone(),
            scope: slot.scope,
        };
        Some(Self {
            id,
            repository: inner.id(),
            key: Rc::new(key),
            _token: token,
            repo: Rc::clone(repo),
        })
    }

    /// Handle to `id`, detached from any slot if the node was removed.
    pub(crate) fn new(repo: &Rc<RefCell<NodeRepository>>, id: NodeId) -> Self {
        Self::attach(repo, id).unwrap_or_else(|| Self {
            id,
            repository: repo.borrow().id(),
            key: Rc::new(StubKey {
                name: String::new(),
                basename: String::new(),
                quals: Qualifiers::new(),
                scope: ScopeId::ROOT,
            }),
            _token: Rc::new(id),
            repo: Rc::clone(repo),
        })
    }

    pub(crate) fn attach_all(
        repo: &Rc<RefCell<NodeRepository>>,
        ids: impl IntoIterator<Item = NodeId>,
    ) -> Vec<Self> {
        ids.into_iter()
            .filter_map(|id| Self::attach(repo, id))
            .collect()
    }

    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Node id together with the repository it belongs to.
    #[must_use]
    pub fn node_ref(&self) -> NodeRef {
        NodeRef {
            repository: self.repository,
            id: self.id,
        }
    }

    /// Fully qualified name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.key.name
    }

    #[must_use]
    pub fn basename(&self) -> &str {
        &self.key.basename
    }

    #[must_use]
    pub fn quals(&self) -> &Qualifiers {
        &self.key.quals
    }

    #[must_use]
    pub fn scope(&self) -> ScopeId {
        self.key.scope
    }

    #[must_use]
    pub fn classname(&self) -> Option<String> {
        self.repo
            .borrow()
            .get(self.id)
            .and_then(|slot| slot.classname.clone())
    }

    /// The node is bound to a definition.
    #[must_use]
    pub fn initialized(&self) -> bool {
        self.repo
            .borrow()
            .get(self.id)
            .is_some_and(|slot| slot.is_bound())
    }

    #[must_use]
    pub fn init_record(&self) -> Option<InitRecord> {
        self.repo
            .borrow()
            .get(self.id)
            .and_then(|slot| slot.init_record.clone())
    }

    /// Index assigned by a successful resolve.
    #[must_use]
    pub fn nodeindex(&self) -> Option<u32> {
        self.repo.borrow().get(self.id).and_then(|slot| slot.nodeindex)
    }

    #[must_use]
    pub fn children(&self) -> ChildList {
        self.repo
            .borrow()
            .get(self.id)
            .map(|slot| slot.children.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn stepchildren(&self) -> ChildList {
        self.repo
            .borrow()
            .get(self.id)
            .map(|slot| slot.stepchildren.clone())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn parents(&self) -> Vec<NodeStub> {
        let parents = self
            .repo
            .borrow()
            .get(self.id)
            .map(|slot| slot.parents().collect::<Vec<_>>())
            .unwrap_or_default();
        Self::attach_all(&self.repo, parents)
    }

    /// Binds the node to a definition.
    ///
    /// Binding an identical definition again does nothing. Errors (an
    /// unresolvable child, a conflicting redefinition, a failed construction)
    /// are recorded in the repository and the node stays unbound.
    ///
    /// # Errors
    ///
    /// In testing mode the bind error itself; otherwise only the cumulative
    /// error once the error limit is reached.
    #[track_caller]
    pub fn bind(&self, arg: impl IntoChild) -> Result<NodeStub, TdlError> {
        let location = SourceLocation::caller();
        let arg = arg.into_child().map(ChildRef::expand_factories);
        self.repo.borrow_mut().bind(self.id, arg, location)?;
        Ok(self.clone())
    }

    /// Binds the node unless it is already bound.
    ///
    /// # Errors
    ///
    /// As [`NodeStub::bind`].
    #[track_caller]
    pub fn bind_if_unbound(&self, arg: impl IntoChild) -> Result<NodeStub, TdlError> {
        if self.initialized() {
            return Ok(self.clone());
        }
        let location = SourceLocation::caller();
        let arg = arg.into_child().map(ChildRef::expand_factories);
        self.repo.borrow_mut().bind(self.id, arg, location)?;
        Ok(self.clone())
    }

    #[track_caller]
    fn requalify(&self, quals: &Qualifiers, mode: MergeMode) -> NodeStub {
        let location = SourceLocation::caller();
        let merged = self.key.quals.merged(quals, mode);
        let id = self
            .repo
            .borrow_mut()
            .qualify(&self.key.basename, self.key.scope, merged, location);
        Self::new(&self.repo, id)
    }

    /// Node with `quals` appended to this node's qualifiers.
    #[track_caller]
    #[must_use]
    pub fn qualify(&self, quals: &Qualifiers) -> NodeStub {
        self.requalify(quals, MergeMode::Append)
    }

    /// Appends the qualifiers of each of `nodes` in turn.
    #[track_caller]
    #[must_use]
    pub fn qadd(&self, nodes: &[&NodeStub]) -> NodeStub {
        let mut stub = self.clone();
        for node in nodes {
            stub = stub.requalify(node.quals(), MergeMode::Append);
        }
        stub
    }

    /// Merges the qualifiers of each of `nodes` in turn, skipping values
    /// already present.
    #[track_caller]
    #[must_use]
    pub fn qmerge(&self, nodes: &[&NodeStub]) -> NodeStub {
        let mut stub = self.clone();
        for node in nodes {
            stub = stub.requalify(node.quals(), MergeMode::Merge);
        }
        stub
    }

    /// Appends children to a bound node.
    ///
    /// # Errors
    ///
    /// [`NodeError::UninitializedNode`](crate::NodeError::UninitializedNode)
    /// if the node is unbound, or a child resolution error.
    #[track_caller]
    pub fn add_children(
        &self,
        children: impl IntoIterator<Item = ChildRef>,
    ) -> Result<NodeStub, TdlError> {
        let location = SourceLocation::caller();
        let children = children
            .into_iter()
            .map(ChildRef::expand_factories)
            .collect();
        self.repo
            .borrow_mut()
            .add_children(self.id, children, location)?;
        Ok(self.clone())
    }

    /// Appends step-children to a bound node.
    ///
    /// # Errors
    ///
    /// As [`NodeStub::add_children`].
    #[track_caller]
    pub fn add_stepchildren(
        &self,
        children: impl IntoIterator<Item = ChildRef>,
    ) -> Result<NodeStub, TdlError> {
        let location = SourceLocation::caller();
        let children = children
            .into_iter()
            .map(ChildRef::expand_factories)
            .collect();
        self.repo
            .borrow_mut()
            .add_stepchildren(self.id, children, location)?;
        Ok(self.clone())
    }

    /// Sets init-record fields of a bound node.
    ///
    /// # Errors
    ///
    /// [`NodeError::UnboundNode`](crate::NodeError::UnboundNode) if the node
    /// is unbound.
    #[track_caller]
    pub fn set_options<K: Into<String>, V: Into<Value>>(
        &self,
        options: impl IntoIterator<Item = (K, V)>,
    ) -> Result<NodeStub, TdlError> {
        let location = SourceLocation::caller();
        let options = options
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()));
        self.repo
            .borrow_mut()
            .set_options(self.id, options, location)?;
        Ok(self.clone())
    }

    /// Bound nodes derived from this one's name by qualification, this one
    /// included.
    #[must_use]
    pub fn family(&self) -> Vec<NodeStub> {
        let ids = self.repo.borrow().find_family(self.name());
        Self::attach_all(&self.repo, ids)
    }

    /// Searches the subtrees of this node's family, or of this node alone
    /// with `no_family`. A subtree set in `criteria` is replaced.
    ///
    /// # Errors
    ///
    /// [`NodeError::InvalidPattern`](crate::NodeError::InvalidPattern) for a
    /// bad pattern.
    #[track_caller]
    pub fn search(
        &self,
        no_family: bool,
        criteria: SearchCriteria,
    ) -> Result<Vec<NodeStub>, TdlError> {
        let location = SourceLocation::caller();
        let roots = if no_family {
            vec![self.id]
        } else {
            self.repo.borrow().find_family(self.name())
        };
        let ids = self
            .repo
            .borrow()
            .search(&criteria.subtree(roots), location)?;
        Ok(Self::attach_all(&self.repo, ids))
    }

    /// `self ** exponent`
    #[must_use]
    pub fn pow(&self, exponent: impl Into<ChildRef>) -> NodeDef {
        tdl_nodes::ops::pow(self, exponent)
    }

    #[must_use]
    pub fn abs(&self) -> NodeDef {
        tdl_nodes::ops::abs(self)
    }
}

impl PartialEq for NodeStub {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Rc::ptr_eq(&self.repo, &other.repo)
    }
}

impl Eq for NodeStub {}

impl Debug for NodeStub {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeStub")
            .field("id", &self.id)
            .field("name", &self.key.name)
            .finish()
    }
}

impl Display for NodeStub {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let class = self.classname();
        write!(f, "{}({})", self.name(), class.as_deref().unwrap_or("unbound"))
    }
}

impl From<&NodeStub> for ChildRef {
    fn from(stub: &NodeStub) -> Self {
        ChildRef::Stub(stub.node_ref())
    }
}

impl From<NodeStub> for ChildRef {
    fn from(stub: NodeStub) -> Self {
        ChildRef::Stub(stub.node_ref())
    }
}

impl IntoChild for &NodeStub {
    fn into_child(self) -> Result<ChildRef, BuildError> {
        Ok(self.into())
    }
}

impl IntoChild for NodeStub {
    fn into_child(self) -> Result<ChildRef, BuildError> {
        Ok(self.into())
    }
}

tdl_nodes::impl_node_arithmetic!(<'a> &'a NodeStub);
tdl_nodes::impl_node_arithmetic!(NodeStub);
