//! Resolve Pass
//!
//! Resolving turns the repository into its final, indexed form. It runs once
//! over the whole repository:
//!
//! 1. report bound nodes whose children were never bound
//! 2. run the [`ResolveHook`]
//! 3. classify parentless nodes as roots or orphan candidates
//! 4. remove nodes that were never bound
//! 5. sweep orphans: parentless nodes without a live handle are deleted,
//!    and their children are checked again; parentless nodes with a live
//!    handle become roots
//! 6. fail with every collected error, if there are any
//! 7. number the remaining nodes `1..=N` in registration order and stamp
//!    `nodeindex`, `name` and `node_description` into their init records
//! 8. replace child references by child indices (`-1` for missing children)
//!
//! Indices follow registration order, not dependency order: a parent may get
//! a lower index than its children.

use indexmap::IndexMap;
use log::{Level, debug, info, log_enabled, trace, warn};
use rustc_hash::FxHashMap;
use tdl_nodes::{ChildList, ChildRef, InitRecord, NodeDef, NodeId, SourceLocation, Value, meq};

use crate::{
    bind::MUX_CLASS,
    errors::{CumulativeError, NodeError, TdlError},
    forest::ChildIndices,
    repository::{NodeRepository, ResolveState, ScopeId},
};

/// Domain step run before roots and orphans are determined.
pub trait ResolveHook {
    /// Called once per resolve, after the uninitialized-child check.
    ///
    /// # Errors
    ///
    /// Any error aborts the resolve.
    fn before_resolve(
        &mut self,
        repo: &mut NodeRepository,
        location: SourceLocation,
    ) -> Result<(), TdlError>;
}

/// Hook that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHook;

impl ResolveHook for NoHook {
    fn before_resolve(
        &mut self,
        _repo: &mut NodeRepository,
        _location: SourceLocation,
    ) -> Result<(), TdlError> {
        Ok(())
    }
}

/// Connects sinks and spigots to a `MeqVisDataMux`.
///
/// When sinks or spigots exist, the mux bound by the tree (or a new
/// `VisDataMux` node in the root scope) adopts every sink as a child and
/// every spigot as a step-child, unless it already has a mux parent. The mux
/// is kept referenced so it survives the orphan sweep. Without sinks and
/// spigots an explicitly bound mux is left to the sweep like any other node.
#[derive(Debug, Default, Clone, Copy)]
pub struct VisDataMuxHook;

impl VisDataMuxHook {
    pub const NODE_NAME: &'static str = "VisDataMux";

    fn without_mux_parent(repo: &NodeRepository, nodes: &[NodeId]) -> Vec<ChildRef> {
        nodes
            .iter()
            .filter(|id| {
                repo.get(**id).is_some_and(|slot| {
                    !slot.parents().any(|parent| {
                        repo.get(parent)
                            .and_then(|parent| parent.classname())
                            .is_some_and(|class| class == MUX_CLASS)
                    })
                })
            })
            .map(|id| repo.child(*id))
            .collect()
    }
}

impl ResolveHook for VisDataMuxHook {
    fn before_resolve(
        &mut self,
        repo: &mut NodeRepository,
        location: SourceLocation,
    ) -> Result<(), TdlError> {
        if repo.sinks().is_empty() && repo.spigots().is_empty() {
            if let Some(mux) = repo.mux() {
                repo.unpin(mux);
            }
            return Ok(());
        }
        let mux = match repo.mux() {
            Some(mux) => mux,
            None => {
                let mux = repo.node_in_scope(ScopeId::ROOT, Self::NODE_NAME, location);
                let children = ChildList::keyed([
                    ("pre", ChildRef::Empty),
                    ("post", ChildRef::Empty),
                    ("start", ChildRef::Empty),
                ]);
                let def = NodeDef::from_parts(
                    meq("VisDataMux"),
                    children,
                    ChildList::new(),
                    InitRecord::new(),
                );
                debug!("creating {} for sinks and spigots", Self::NODE_NAME);
                repo.bind(mux, Ok(def.into()), location)?;
                mux
            }
        };
        repo.pin(mux);
        let sinks = Self::without_mux_parent(repo, repo.sinks());
        let spigots = Self::without_mux_parent(repo, repo.spigots());
        repo.add_children(mux, sinks, location)?;
        repo.add_stepchildren(mux, spigots, location)?;
        Ok(())
    }
}

impl NodeRepository {
    /// Validates, sweeps and indexes the repository.
    ///
    /// A second call after success does nothing; a call after a failed
    /// resolve fails again with the same errors.
    ///
    /// # Errors
    ///
    /// [`TdlError::Cumulative`] with every collected error if any error was
    /// recorded before or during the pass, or the error returned by the hook.
    pub fn resolve(
        &mut self,
        hook: &mut dyn ResolveHook,
        location: SourceLocation,
    ) -> Result<(), TdlError> {
        match self.state {
            ResolveState::Resolved => return Ok(()),
            ResolveState::Failed => return Err(self.cumulative()),
            ResolveState::Building => {}
        }
        let result = self.run_resolve(hook, location);
        self.state = if result.is_ok() {
            ResolveState::Resolved
        } else {
            ResolveState::Failed
        };
        result
    }

    fn cumulative(&self) -> TdlError {
        TdlError::Cumulative(CumulativeError {
            errors: self.errors.clone(),
        })
    }

    fn run_resolve(
        &mut self,
        hook: &mut dyn ResolveHook,
        location: SourceLocation,
    ) -> Result<(), TdlError> {
        let cleanup_orphans = !self.options.orphans_are_roots;
        self.check_uninitialized_children()?;
        hook.before_resolve(self, location)?;

        let mut roots = IndexMap::new();
        let mut orphans = Vec::new();
        let mut uninit = Vec::new();
        for (id, slot) in self.iter() {
            if !slot.is_bound() {
                uninit.push(id);
            } else if slot.parents.is_empty() {
                if cleanup_orphans {
                    orphans.push(id);
                } else {
                    roots.insert(slot.name.clone(), id);
                }
            }
        }
        info!(
            "found {} uninitialized nodes, {} root candidates",
            uninit.len(),
            orphans.len() + roots.len()
        );
        for id in uninit {
            self.detach(id);
        }
        self.compact();

        if cleanup_orphans {
            let before = self.len();
            self.sweep_orphans(orphans, &mut roots);
            self.compact();
            info!(
                "{} orphans were deleted, {} roots remain",
                before - self.len(),
                roots.len()
            );
        }

        if !self.errors.is_empty() {
            warn!("{} errors reported", self.errors.len());
            return Err(self.cumulative());
        }

        self.assign_indices();
        self.rewrite_children();
        info!("{} total nodes in repository", self.len());
        debug!("root nodes: {:?}", roots.keys().collect::<Vec<_>>());
        if log_enabled!(Level::Trace) {
            for id in roots.values() {
                trace!("\n{}", self.print_tree(*id));
            }
        }
        self.roots = Some(roots);
        Ok(())
    }

    fn check_uninitialized_children(&mut self) -> Result<(), TdlError> {
        let mut found = Vec::new();
        for (_, slot) in self.iter().filter(|(_, slot)| slot.is_bound()) {
            for (label, child) in slot.children.iter().chain(slot.stepchildren.iter()) {
                let Some(child_id) = child.as_stub() else {
                    continue;
                };
                let child = self.get(child_id);
                if child.is_some_and(|child| child.is_bound()) {
                    continue;
                }
                let error = NodeError::UninitializedChild {
                    label: label.clone(),
                    child: child.map_or_else(|| child_id.to_string(), |c| c.name.clone()),
                    parent: slot.name.clone(),
                    location: slot.bound_at.unwrap_or(slot.defined_at),
                };
                let reference = child
                    .filter(|child| !child.defined_at.same_line(&slot.defined_at))
                    .map(|child| {
                        let note = NodeError::CalledFrom {
                            note: "child referenced here".to_string(),
                            location: child.defined_at,
                        };
                        (note, child.trail.clone())
                    });
                found.push((error, slot.bind_trail.clone(), reference));
            }
        }
        for (error, trail, reference) in found {
            self.add_error(error, &trail)?;
            if let Some((note, trail)) = reference {
                self.add_error(note, &trail)?;
            }
        }
        Ok(())
    }

    fn sweep_orphans(&mut self, orphans: Vec<NodeId>, roots: &mut IndexMap<String, NodeId>) {
        let mut pending = orphans;
        pending.reverse();
        while let Some(id) = pending.pop() {
            let Some(slot) = self.get(id) else {
                continue;
            };
            if !slot.parents.is_empty() {
                continue;
            }
            if slot.is_referenced() {
                debug!("node {} is still referenced, keeping it as a root", slot.name);
                roots.insert(slot.name.clone(), id);
                continue;
            }
            debug!("deleting orphan node {}", slot.name);
            let mut children = self.detach(id);
            children.reverse();
            pending.extend(children);
        }
    }

    fn assign_indices(&mut self) {
        let ids = self.names.values().copied().collect::<Vec<_>>();
        let mut nodeindex = 1u32;
        for id in ids {
            let Some(slot) = self.get_mut(id) else {
                continue;
            };
            let classname = slot.classname.clone().unwrap_or_default();
            let description = format!(
                "{}:{}:{}:{}",
                slot.name,
                classname,
                slot.defined_at.file_name(),
                slot.defined_at.line
            );
            let name = slot.name.clone();
            if let Some(record) = slot.init_record.as_mut() {
                record.insert("nodeindex", nodeindex);
                record.insert("node_description", description);
                record.insert("name", name);
            }
            slot.nodeindex = Some(nodeindex);
            trace!("checked node {} nodeindex {nodeindex}", slot.name);
            nodeindex += 1;
        }
    }

    fn rewrite_children(&mut self) {
        let indices = self
            .iter()
            .filter_map(|(id, slot)| slot.nodeindex.map(|index| (id, i64::from(index))))
            .collect::<FxHashMap<_, _>>();
        let index_of = |child: &ChildRef| {
            child
                .as_stub()
                .and_then(|id| indices.get(&id).copied())
                .unwrap_or(-1)
        };
        let ids = self.names.values().copied().collect::<Vec<_>>();
        for id in ids {
            let Some(slot) = self.get_mut(id) else {
                continue;
            };
            let children = if slot.children.is_dict() {
                ChildIndices::Map(
                    slot.children
                        .iter()
                        .map(|(label, child)| (label.to_string(), index_of(child)))
                        .collect(),
                )
            } else {
                ChildIndices::List(slot.children.iter().map(|(_, child)| index_of(child)).collect())
            };
            let step_children = slot
                .stepchildren
                .iter()
                .map(|(_, child)| index_of(child))
                .collect::<Vec<_>>();
            trace!("node {} child nodeindices are {children:?}", slot.name);
            if let Some(record) = slot.init_record.as_mut() {
                if !children.is_empty() {
                    record.insert("children", children_value(&children));
                }
                if !step_children.is_empty() {
                    record.insert("step_children", step_children.clone());
                }
            }
            slot.child_indices = Some(children);
            slot.step_indices = step_children;
        }
    }
}

fn children_value(children: &ChildIndices) -> Value {
    match children {
        ChildIndices::List(list) => Value::from(list.clone()),
        ChildIndices::Map(map) => Value::Record(
            map.iter()
                .map(|(label, index)| (label.clone(), *index))
                .collect(),
        ),
    }
}
