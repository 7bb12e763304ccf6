//! Child References
//!
//! A [`ChildRef`] is whatever a definition names as a child before the
//! definition is bound: a node name, a numeric constant, a handle to an
//! existing node, a nested definition or a factory producing one. Binding
//! resolves every reference into a [`ChildRef::Stub`] (or leaves
//! [`ChildRef::Empty`] slots as they are).
//!
//! Factories are expanded with [`ChildRef::expand_factories`] before a
//! repository is touched; repositories never call them.
//!
//! The conversions into `ChildRef` follow the implicit rules of tree
//! scripts: integers and booleans become real constants, strings are node
//! names, definitions are nested anonymous nodes.

use core::fmt;
use std::{
    fmt::{Debug, Display, Formatter},
    rc::Rc,
};

use num_complex::Complex64;

use crate::{def::NodeDef, errors::BuildError};

/// Recursion bound for factories returning factories.
pub const DEFAULT_RESOLVE_DEPTH: u32 = 5;

/// Index of a node slot in a repository arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of a repository. Node ids are only meaningful inside the
/// repository that issued them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RepositoryId(pub u32);

/// A node together with the repository it lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub repository: RepositoryId,
    pub id: NodeId,
}

/// Numeric value of a constant node.
#[derive(Clone, Copy, Debug)]
pub enum Constant {
    Real(f64),
    Complex(Complex64),
}

/// Hashable identity of a [`Constant`], used to share constant nodes.
///
/// `-0.0` is folded into `0.0`; every other value is keyed by its bit pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConstKey {
    Real(u64),
    Complex(u64, u64),
}

fn canonical_bits(value: f64) -> u64 {
    (value + 0.0).to_bits()
}

impl Constant {
    #[must_use]
    pub fn key(&self) -> ConstKey {
        match self {
            Constant::Real(v) => ConstKey::Real(canonical_bits(*v)),
            Constant::Complex(c) => ConstKey::Complex(canonical_bits(c.re), canonical_bits(c.im)),
        }
    }
}

impl From<f64> for Constant {
    fn from(value: f64) -> Self {
        Constant::Real(value)
    }
}

impl From<Complex64> for Constant {
    fn from(value: Complex64) -> Self {
        Constant::Complex(value)
    }
}

impl PartialEq for Constant {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Constant {}

impl Display for Constant {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Real(v) => write!(f, "{v:?}"),
            Constant::Complex(c) => write!(f, "({:?}{:+?}j)", c.re, c.im),
        }
    }
}

/// Zero-argument callable producing a child.
///
/// Factories are called when the definition holding them is bound, before
/// the repository is borrowed, so they may use handles and scopes.
pub type Factory = Rc<dyn Fn() -> ChildRef>;

/// An unresolved child reference.
#[derive(Clone, Default)]
pub enum ChildRef {
    /// Unused child slot.
    #[default]
    Empty,
    /// Name of a node bound in the same repository.
    Name(String),
    Const(Constant),
    /// Existing node.
    Stub(NodeRef),
    /// Nested definition, bound anonymously.
    Pending(Box<NodeDef>),
    Factory(Factory),
}

impl ChildRef {
    /// Wraps a closure as a factory child.
    pub fn factory(f: impl Fn() -> ChildRef + 'static) -> Self {
        ChildRef::Factory(Rc::new(f))
    }

    /// Short name of the variant, used in diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ChildRef::Empty => "empty",
            ChildRef::Name(_) => "name",
            ChildRef::Const(_) => "constant",
            ChildRef::Stub(_) => "node",
            ChildRef::Pending(_) => "definition",
            ChildRef::Factory(_) => "factory",
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, ChildRef::Empty)
    }

    /// Id of a node child, whichever repository it belongs to.
    #[must_use]
    pub fn as_stub(&self) -> Option<NodeId> {
        if let ChildRef::Stub(node) = self {
            Some(node.id)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_node(&self) -> Option<NodeRef> {
        if let ChildRef::Stub(node) = self {
            Some(*node)
        } else {
            None
        }
    }

    /// Calls every factory, recursing into the children and step-children of
    /// nested definitions.
    ///
    /// A chain of factories returning factories is followed at most
    /// [`DEFAULT_RESOLVE_DEPTH`] times; a factory left at the end of a longer
    /// chain stays in place. Resolved child lists are not walked.
    #[must_use]
    pub fn expand_factories(self) -> ChildRef {
        let mut child = self;
        for _ in 0..DEFAULT_RESOLVE_DEPTH {
            let ChildRef::Factory(factory) = &child else {
                break;
            };
            child = factory();
        }
        match child {
            ChildRef::Pending(def) => ChildRef::Pending(Box::new(def.expand_factories())),
            other => other,
        }
    }

    /// The definition a child denotes without calling factories: nested
    /// definitions as they are, constants as `Constant` definitions.
    #[must_use]
    pub fn definition(&self) -> Option<NodeDef> {
        self.resolve_value(0)
    }

    /// Turns the reference into a definition, if it denotes one.
    ///
    /// Definitions are returned as they are and constants become `Constant`
    /// definitions. Factories are invoked and their result resolved again,
    /// at most `depth` times. Names, nodes and empty slots are not
    /// definitions.
    #[must_use]
    pub fn resolve_value(&self, depth: u32) -> Option<NodeDef> {
        match self {
            ChildRef::Pending(def) => Some((**def).clone()),
            ChildRef::Const(value) => Some(NodeDef::constant(*value)),
            ChildRef::Factory(factory) if depth > 0 => factory().resolve_value(depth - 1),
            _ => None,
        }
    }
}

impl Debug for ChildRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ChildRef::Empty => write!(f, "Empty"),
            ChildRef::Name(name) => f.debug_tuple("Name").field(name).finish(),
            ChildRef::Const(value) => f.debug_tuple("Const").field(value).finish(),
            ChildRef::Stub(node) => f.debug_tuple("Stub").field(node).finish(),
            ChildRef::Pending(def) => f.debug_tuple("Pending").field(def).finish(),
            ChildRef::Factory(factory) => write!(f, "Factory({:p})", Rc::as_ptr(factory)),
        }
    }
}

impl PartialEq for ChildRef {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ChildRef::Empty, ChildRef::Empty) => true,
            (ChildRef::Name(a), ChildRef::Name(b)) => a == b,
            (ChildRef::Const(a), ChildRef::Const(b)) => a == b,
            (ChildRef::Stub(a), ChildRef::Stub(b)) => a == b,
            (ChildRef::Pending(a), ChildRef::Pending(b)) => a == b,
            (ChildRef::Factory(a), ChildRef::Factory(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<NodeDef> for ChildRef {
    fn from(def: NodeDef) -> Self {
        ChildRef::Pending(Box::new(def))
    }
}

impl From<NodeRef> for ChildRef {
    fn from(node: NodeRef) -> Self {
        ChildRef::Stub(node)
    }
}

impl From<Constant> for ChildRef {
    fn from(value: Constant) -> Self {
        ChildRef::Const(value)
    }
}

impl From<f64> for ChildRef {
    fn from(value: f64) -> Self {
        ChildRef::Const(Constant::Real(value))
    }
}

impl From<f32> for ChildRef {
    fn from(value: f32) -> Self {
        ChildRef::Const(Constant::Real(f64::from(value)))
    }
}

impl From<i32> for ChildRef {
    fn from(value: i32) -> Self {
        ChildRef::Const(Constant::Real(f64::from(value)))
    }
}

impl From<u32> for ChildRef {
    fn from(value: u32) -> Self {
        ChildRef::Const(Constant::Real(f64::from(value)))
    }
}

impl From<i64> for ChildRef {
    #[allow(clippy::cast_precision_loss)]
    fn from(value: i64) -> Self {
        ChildRef::Const(Constant::Real(value as f64))
    }
}

impl From<bool> for ChildRef {
    fn from(value: bool) -> Self {
        ChildRef::Const(Constant::Real(if value { 1.0 } else { 0.0 }))
    }
}

impl From<Complex64> for ChildRef {
    fn from(value: Complex64) -> Self {
        ChildRef::Const(Constant::Complex(value))
    }
}

impl From<&str> for ChildRef {
    fn from(name: &str) -> Self {
        ChildRef::Name(name.to_string())
    }
}

impl From<String> for ChildRef {
    fn from(name: String) -> Self {
        ChildRef::Name(name)
    }
}

impl<T: Into<ChildRef>> From<Option<T>> for ChildRef {
    fn from(value: Option<T>) -> Self {
        value.map_or(ChildRef::Empty, Into::into)
    }
}

/// Anything that can be named as a child or bound to a node.
///
/// Unlike `Into<ChildRef>` this includes `Result<_, BuildError>`, so a
/// failed construction travels to the bind call that consumes it.
pub trait IntoChild {
    /// Converts into a child reference.
    ///
    /// # Errors
    ///
    /// Returns the deferred construction error carried by the value.
    fn into_child(self) -> Result<ChildRef, BuildError>;
}

macro_rules! into_child_via_from {
    ($($t:ty),* $(,)?) => {
        $(
            impl IntoChild for $t {
                fn into_child(self) -> Result<ChildRef, BuildError> {
                    Ok(self.into())
                }
            }
        )*
    };
}

into_child_via_from!(
    ChildRef, NodeDef, NodeRef, Constant, f64, f32, i32, u32, i64, bool, Complex64, &str, String,
);

impl<T: IntoChild> IntoChild for Result<T, BuildError> {
    fn into_child(self) -> Result<ChildRef, BuildError> {
        self.and_then(IntoChild::into_child)
    }
}

impl<T: IntoChild> IntoChild for Option<T> {
    fn into_child(self) -> Result<ChildRef, BuildError> {
        self.map_or(Ok(ChildRef::Empty), IntoChild::into_child)
    }
}

/// Label of a child: its position, or its key in a keyed list.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChildLabel {
    Index(usize),
    Key(String),
}

impl Display for ChildLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ChildLabel::Index(i) => write!(f, "{i}"),
            ChildLabel::Key(key) => f.write_str(key),
        }
    }
}

/// Ordered `(label, child)` pairs.
///
/// `is_dict` marks a keyed list; resolved forms of keyed lists are emitted as
/// maps rather than arrays. A list produced by resolution is flagged as
/// resolved so that resolving it again is a no-op; the flag does not take
/// part in equality.
#[derive(Clone, Debug, Default)]
pub struct ChildList {
    entries: Vec<(ChildLabel, ChildRef)>,
    is_dict: bool,
    resolved: bool,
}

impl ChildList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Positional list labelled `0..n`.
    pub fn positional(children: impl IntoIterator<Item = ChildRef>) -> Self {
        Self {
            entries: children
                .into_iter()
                .enumerate()
                .map(|(i, child)| (ChildLabel::Index(i), child))
                .collect(),
            is_dict: false,
            resolved: false,
        }
    }

    /// Keyed list.
    pub fn keyed<K: Into<String>>(children: impl IntoIterator<Item = (K, ChildRef)>) -> Self {
        Self {
            entries: children
                .into_iter()
                .map(|(key, child)| (ChildLabel::Key(key.into()), child))
                .collect(),
            is_dict: true,
            resolved: false,
        }
    }

    /// A list whose entries are already resolved.
    #[must_use]
    pub fn resolved_from(entries: Vec<(ChildLabel, ChildRef)>, is_dict: bool) -> Self {
        Self {
            entries,
            is_dict,
            resolved: true,
        }
    }

    #[must_use]
    pub fn is_dict(&self) -> bool {
        self.is_dict
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[(ChildLabel, ChildRef)] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &(ChildLabel, ChildRef)> {
        self.entries.iter()
    }

    #[must_use]
    pub fn into_entries(self) -> Vec<(ChildLabel, ChildRef)> {
        self.entries
    }

    /// Applies `f` to every child of an unresolved list, keeping labels.
    #[must_use]
    pub fn map_children(self, mut f: impl FnMut(ChildRef) -> ChildRef) -> Self {
        if self.resolved {
            return self;
        }
        Self {
            entries: self
                .entries
                .into_iter()
                .map(|(label, child)| (label, f(child)))
                .collect(),
            ..self
        }
    }

    /// Appends a child labelled with the next free position.
    pub fn push_positional(&mut self, child: ChildRef) {
        let label = ChildLabel::Index(self.entries.len());
        self.entries.push((label, child));
    }

    /// Ids of all node children, in order.
    pub fn stub_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.entries.iter().filter_map(|(_, child)| child.as_stub())
    }
}

impl PartialEq for ChildList {
    fn eq(&self, other: &Self) -> bool {
        self.is_dict == other.is_dict && self.entries == other.entries
    }
}

impl<'a> IntoIterator for &'a ChildList {
    type Item = &'a (ChildLabel, ChildRef);
    type IntoIter = std::slice::Iter<'a, (ChildLabel, ChildRef)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
