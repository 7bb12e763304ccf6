//! Binding
//!
//! Binding attaches a definition to a named node. The definition's children
//! are resolved against the node's scope first:
//!
//! - node children are kept
//! - names are looked up among bound nodes
//! - numeric constants share one `MeqConstant` node per value
//! - nested definitions are bound anonymously under a name derived from
//!   their class and children
//! - nodes of another repository are rejected
//!
//! Factories are never called here; handles and scopes expand them before
//! borrowing the repository (see [`ChildRef::expand_factories`]).
//!
//! A failing bind does not abort the tree definition. The error is recorded
//! with [`NodeRepository::add_error`] and the node stays unbound.

use log::{debug, trace};
use tdl_nodes::{
    BuildError, ChildLabel, ChildList, ChildRef, Constant, MergeMode, NodeDef, NodeId, Qualifiers,
    SourceLocation, Value, qualify_name,
};

use crate::{
    errors::{NodeError, TdlError},
    repository::{NodeRepository, ScopeId},
};

const SINK_CLASS: &str = "MeqSink";
const SPIGOT_CLASS: &str = "MeqSpigot";
pub(crate) const MUX_CLASS: &str = "MeqVisDataMux";

impl NodeRepository {
    fn node_name(&self, id: NodeId) -> String {
        self.name_of(id).unwrap_or_default().to_string()
    }

    /// Binds `id` to the definition `arg` resolves to, recording any error.
    ///
    /// Factories must already be expanded; one left in `arg` is unbindable.
    ///
    /// # Errors
    ///
    /// Only what [`NodeRepository::add_error`] returns: the error itself in
    /// testing mode, or the cumulative error at the error limit.
    pub fn bind(
        &mut self,
        id: NodeId,
        arg: Result<ChildRef, BuildError>,
        location: SourceLocation,
    ) -> Result<(), TdlError> {
        match self.try_bind(id, arg, location) {
            Err(TdlError::Node(err)) => self.report(err),
            other => other,
        }
    }

    /// Binds `id` to `def`, returning errors instead of recording them.
    pub(crate) fn try_bind(
        &mut self,
        id: NodeId,
        arg: Result<ChildRef, BuildError>,
        location: SourceLocation,
    ) -> Result<(), TdlError> {
        let name = self.node_name(id);
        let arg = arg.map_err(|source| NodeError::Definition {
            name: name.clone(),
            source,
            location,
        })?;
        let def = arg
            .definition()
            .ok_or_else(|| NodeError::Unbindable {
                name: name.clone(),
                kind: arg.kind(),
                location,
            })?;
        let Some(scope) = self.get(id).map(|slot| slot.scope) else {
            return Err(NodeError::UnboundNode {
                name,
                operation: "bind",
                location,
            }
            .into());
        };

        let (class, children, stepchildren, init_record) = def.into_parts();
        let children = self.resolve_children(scope, children, location)?;
        let stepchildren = self.resolve_children(scope, stepchildren, location)?;
        let trail = self.trail();

        let Some(slot) = self.get_mut(id) else {
            return Ok(());
        };
        if let Some(existing) = &slot.init_record {
            if *existing == init_record
                && slot.children == children
                && slot.stepchildren == stepchildren
            {
                trace!("{name} rebound with an identical definition");
                return Ok(());
            }
            return Err(NodeError::NodeRedefined {
                name,
                location,
                first_defined: slot.bound_at.unwrap_or(slot.defined_at),
            }
            .into());
        }

        let classname = class.full_name();
        debug!("binding {name} as {classname}");
        slot.classname = Some(classname.clone());
        slot.children = children;
        slot.stepchildren = stepchildren;
        slot.bound_at = Some(location);
        slot.bind_trail = trail;
        let child_ids = slot.child_ids().collect::<Vec<_>>();
        for child in child_ids {
            if let Some(child) = self.get_mut(child) {
                child.parents.insert(id);
            }
        }
        match classname.as_str() {
            SINK_CLASS => self.sinks.push(id),
            SPIGOT_CLASS => self.spigots.push(id),
            MUX_CLASS => self.mux = Some(id),
            _ => {}
        }
        if let Some(slot) = self.get_mut(id) {
            slot.init_record = Some(init_record);
        }
        Ok(())
    }

    /// Resolves every entry of `list` to a node in `scope`.
    ///
    /// Lists that are already resolved are returned as they are.
    pub(crate) fn resolve_children(
        &mut self,
        scope: ScopeId,
        list: ChildList,
        location: SourceLocation,
    ) -> Result<ChildList, TdlError> {
        if list.is_resolved() {
            if let Some((label, _)) = list
                .iter()
                .find(|(_, child)| child.as_node().is_some_and(|node| node.repository != self.id))
            {
                return Err(self.foreign_child(label.clone(), location));
            }
            return Ok(list);
        }
        let is_dict = list.is_dict();
        let mut resolved = Vec::with_capacity(list.len());
        for (label, child) in list.into_entries() {
            trace!("checking child {label} = {child:?}");
            let child = match child {
                ChildRef::Empty => ChildRef::Empty,
                ChildRef::Stub(node) => {
                    if node.repository != self.id {
                        return Err(self.foreign_child(label, location));
                    }
                    if self.get(node.id).is_none() {
                        return Err(NodeError::IllegalChild {
                            label,
                            kind: "removed node",
                            location,
                        }
                        .into());
                    }
                    ChildRef::Stub(node)
                }
                ChildRef::Name(name) => match self.lookup_bound(&name) {
                    Some(id) => self.child(id),
                    None => return Err(NodeError::ChildNotFound { label, name, location }.into()),
                },
                ChildRef::Const(value) => {
                    let id = self.make_constant(value, location)?;
                    self.child(id)
                }
                other => match other.definition() {
                    Some(def) => {
                        trace!("creating anonymous child {label}");
                        let id = self.autodefine(scope, def, location)?;
                        self.child(id)
                    }
                    None => {
                        return Err(NodeError::IllegalChild {
                            label,
                            kind: other.kind(),
                            location,
                        }
                        .into());
                    }
                },
            };
            resolved.push((label, child));
        }
        Ok(ChildList::resolved_from(resolved, is_dict))
    }

    fn foreign_child(&self, label: ChildLabel, location: SourceLocation) -> TdlError {
        trace!("child {label} belongs to another repository than {:?}", self.id);
        NodeError::IllegalChild {
            label,
            kind: "node of another repository",
            location,
        }
        .into()
    }

    /// Shared `MeqConstant` node for `value`, named `c<value>`.
    ///
    /// # Errors
    ///
    /// See [`NodeRepository::add_error`].
    pub fn make_constant(
        &mut self,
        value: Constant,
        location: SourceLocation,
    ) -> Result<NodeId, TdlError> {
        let key = value.key();
        if let Some(id) = self.constants.get(&key).copied()
            && self.get(id).is_some()
        {
            return Ok(id);
        }
        let base = format!("c{value}");
        let mut name = base.clone();
        let mut count = 1;
        while self.lookup(&name).is_some() {
            name = format!("{base}{count}");
            count += 1;
        }
        let id = self.get_or_create(
            name.clone(),
            name,
            ScopeId::ROOT,
            Qualifiers::new(),
            location,
        );
        self.bind(id, Ok(NodeDef::constant(value).into()), location)?;
        self.constants.insert(key, id);
        Ok(id)
    }

    /// Binds `def` under a generated name and returns the node.
    ///
    /// With children the name is `class(child,...)` qualified by the merged
    /// qualifiers of the children, so identical subexpressions share a node.
    /// Without children it is a scope-unique `(class)`, `(class)1`, ...
    pub(crate) fn autodefine(
        &mut self,
        scope: ScopeId,
        def: NodeDef,
        location: SourceLocation,
    ) -> Result<NodeId, TdlError> {
        let (class, children, stepchildren, init_record) = def.into_parts();
        let children = self.resolve_children(scope, children, location)?;
        let classname = class.name.to_lowercase();
        let id = if children.is_empty() {
            let unique = self.make_unique_name(scope, &classname);
            self.node_in_scope(scope, &unique, location)
        } else {
            let mut quals = Qualifiers::new();
            let mut basenames = Vec::with_capacity(children.len());
            for (_, child) in &children {
                match child.as_stub().and_then(|id| self.get(id)) {
                    Some(slot) => {
                        quals.merge(&slot.quals, MergeMode::Merge);
                        basenames.push(slot.basename.clone());
                    }
                    None => basenames.push(String::new()),
                }
            }
            let basename =
                self.scoped_name(scope, &format!("{classname}({})", basenames.join(",")));
            let name = qualify_name(&basename, &quals);
            debug!("creating auto-name {name}");
            self.get_or_create(name, basename, scope, quals, location)
        };
        let def = NodeDef::from_parts(class, children, stepchildren, init_record);
        self.bind(id, Ok(def.into()), location)?;
        Ok(id)
    }

    /// Node named `basename` qualified by `quals`, created unbound when
    /// missing.
    pub fn qualify(
        &mut self,
        basename: &str,
        scope: ScopeId,
        quals: Qualifiers,
        location: SourceLocation,
    ) -> NodeId {
        let name = qualify_name(basename, &quals);
        trace!("requalified {basename} as {name}");
        self.get_or_create(name, basename.to_string(), scope, quals, location)
    }

    fn extend_children(
        &mut self,
        id: NodeId,
        children: Vec<ChildRef>,
        step: bool,
        location: SourceLocation,
    ) -> Result<(), TdlError> {
        let Some(scope) = self
            .get(id)
            .filter(|slot| slot.is_bound())
            .map(|slot| slot.scope)
        else {
            return Err(NodeError::UninitializedNode {
                name: self.node_name(id),
                location,
            }
            .into());
        };
        let resolved = self.resolve_children(scope, ChildList::positional(children), location)?;
        let added = resolved.stub_ids().collect::<Vec<_>>();
        if let Some(slot) = self.get_mut(id) {
            let list = if step {
                &mut slot.stepchildren
            } else {
                &mut slot.children
            };
            for (_, child) in resolved.into_entries() {
                list.push_positional(child);
            }
        }
        for child in added {
            if let Some(child) = self.get_mut(child) {
                child.parents.insert(id);
            }
        }
        Ok(())
    }

    /// Appends children to a bound node.
    ///
    /// # Errors
    ///
    /// [`NodeError::UninitializedNode`] if `id` is not bound, or a child
    /// resolution error.
    pub fn add_children(
        &mut self,
        id: NodeId,
        children: Vec<ChildRef>,
        location: SourceLocation,
    ) -> Result<(), TdlError> {
        self.extend_children(id, children, false, location)
    }

    /// Appends step-children to a bound node.
    ///
    /// # Errors
    ///
    /// As [`NodeRepository::add_children`].
    pub fn add_stepchildren(
        &mut self,
        id: NodeId,
        children: Vec<ChildRef>,
        location: SourceLocation,
    ) -> Result<(), TdlError> {
        self.extend_children(id, children, true, location)
    }

    /// Sets init-record fields of a bound node.
    ///
    /// # Errors
    ///
    /// [`NodeError::UnboundNode`] if `id` is not bound.
    pub fn set_options(
        &mut self,
        id: NodeId,
        options: impl IntoIterator<Item = (String, Value)>,
        location: SourceLocation,
    ) -> Result<(), TdlError> {
        let name = self.node_name(id);
        let Some(record) = self.get_mut(id).and_then(|slot| slot.init_record.as_mut()) else {
            return Err(NodeError::UnboundNode {
                name,
                operation: "set_options",
                location,
            }
            .into());
        };
        for (key, value) in options {
            record.insert(key, value);
        }
        Ok(())
    }
}
