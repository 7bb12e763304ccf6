//! Node Classes and Definitions
//!
//! A [`NodeDef`] says "a node of class X with these children and these init
//! fields". It has no name; a name is attached by binding it through a scope.
//!
//! Definitions are produced by a [`NodeBuilder`], obtained from a
//! [`NodeClass`]:
//!
//! ```
//! use tdl_nodes::meq;
//!
//! let parm = meq("Parm").with().field("default", 0.5).tags("solvable phase").build().unwrap();
//! assert_eq!(parm.class_name(), "MeqParm");
//! assert_eq!(parm.init_record().tags(), vec!["solvable", "phase"]);
//! ```
//!
//! ## Children
//!
//! Children come from exactly one of three sources: positional
//! [`NodeBuilder::child`] calls, an explicit list given to
//! [`NodeBuilder::children`], or keyed [`NodeBuilder::node_field`] calls.
//! Mixing sources is a [`BuildError::ConflictingChildren`]. Step-children are
//! always positional.

use core::fmt;
use std::fmt::{Display, Formatter};

use crate::{
    child::{ChildList, ChildRef, Constant, IntoChild},
    errors::BuildError,
    location::SourceLocation,
    value::{InitRecord, Value},
};

/// Package prefix of the standard node classes.
pub const MEQ_PACKAGE: &str = "Meq";

/// Init-record fields owned by the repository.
const RESERVED_FIELDS: &[&str] = &[
    InitRecord::CLASS,
    "children",
    "stepchildren",
    "step_children",
    "name",
    "nodeindex",
    "node_description",
];

/// A node class, e.g. `Meq` + `Add`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeClass {
    pub package: String,
    pub name: String,
}

/// Class `name` of the standard `Meq` package.
#[must_use]
pub fn meq(name: &str) -> NodeClass {
    NodeClass::new(MEQ_PACKAGE, name)
}

impl NodeClass {
    #[must_use]
    pub fn new(package: &str, name: &str) -> Self {
        Self {
            package: package.to_string(),
            name: name.to_string(),
        }
    }

    /// Class name as stored in init records, e.g. `MeqAdd`.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}{}", self.package, self.name)
    }

    /// Definition without children or fields.
    #[must_use]
    pub fn def(&self) -> NodeDef {
        NodeDef::from_parts(
            self.clone(),
            ChildList::new(),
            ChildList::new(),
            InitRecord::new(),
        )
    }

    /// Starts a definition of this class.
    #[track_caller]
    #[must_use]
    pub fn with(&self) -> NodeBuilder {
        NodeBuilder::new(self.clone(), SourceLocation::caller())
    }

    /// The class used as a zero-argument factory child.
    #[must_use]
    pub fn factory(&self) -> ChildRef {
        let class = self.clone();
        ChildRef::factory(move || class.def().into())
    }
}

impl Display for NodeClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.package, self.name)
    }
}

/// A pending, unnamed node.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeDef {
    class: NodeClass,
    children: ChildList,
    stepchildren: ChildList,
    init_record: InitRecord,
}

impl NodeDef {
    /// Assembles a definition; the `class` field of the record is set from
    /// `class`.
    #[must_use]
    pub fn from_parts(
        class: NodeClass,
        children: ChildList,
        stepchildren: ChildList,
        mut init_record: InitRecord,
    ) -> Self {
        init_record.insert(InitRecord::CLASS, class.full_name());
        Self {
            class,
            children,
            stepchildren,
            init_record,
        }
    }

    /// A `MeqConstant` holding `value`.
    #[must_use]
    pub fn constant(value: Constant) -> Self {
        let value = match value {
            Constant::Real(v) => Value::Float(v),
            Constant::Complex(c) => Value::Complex(c),
        };
        let record = InitRecord::from_iter([("value", value)]);
        NodeDef::from_parts(meq("Constant"), ChildList::new(), ChildList::new(), record)
    }

    #[must_use]
    pub fn class(&self) -> &NodeClass {
        &self.class
    }

    /// Full class name, e.g. `MeqAdd`.
    #[must_use]
    pub fn class_name(&self) -> String {
        self.class.full_name()
    }

    #[must_use]
    pub fn children(&self) -> &ChildList {
        &self.children
    }

    #[must_use]
    pub fn stepchildren(&self) -> &ChildList {
        &self.stepchildren
    }

    #[must_use]
    pub fn init_record(&self) -> &InitRecord {
        &self.init_record
    }

    #[must_use]
    pub fn into_parts(self) -> (NodeClass, ChildList, ChildList, InitRecord) {
        (self.class, self.children, self.stepchildren, self.init_record)
    }

    /// Calls the factories among the children and step-children, see
    /// [`ChildRef::expand_factories`].
    #[must_use]
    pub fn expand_factories(self) -> NodeDef {
        Self {
            children: self.children.map_children(ChildRef::expand_factories),
            stepchildren: self.stepchildren.map_children(ChildRef::expand_factories),
            ..self
        }
    }

    /// `self ** exponent`
    #[must_use]
    pub fn pow(self, exponent: impl Into<ChildRef>) -> NodeDef {
        crate::ops::pow(self, exponent)
    }

    #[must_use]
    pub fn abs(self) -> NodeDef {
        crate::ops::abs(self)
    }
}

crate::impl_node_arithmetic!(NodeDef);

/// Collects the parts of a [`NodeDef`].
///
/// The first failing call poisons the builder; later calls are ignored and
/// [`NodeBuilder::build`] returns that error.
#[derive(Debug)]
#[must_use = "call `build` to obtain the definition"]
pub struct NodeBuilder {
    class: NodeClass,
    location: SourceLocation,
    positional: Vec<ChildRef>,
    explicit: Option<ChildList>,
    keyed: Vec<(String, ChildRef)>,
    step_positional: Vec<ChildRef>,
    step_explicit: Option<ChildList>,
    fields: InitRecord,
    error: Option<BuildError>,
}

impl NodeBuilder {
    fn new(class: NodeClass, location: SourceLocation) -> Self {
        Self {
            class,
            location,
            positional: Vec::new(),
            explicit: None,
            keyed: Vec::new(),
            step_positional: Vec::new(),
            step_explicit: None,
            fields: InitRecord::new(),
            error: None,
        }
    }

    fn fail(&mut self, error: BuildError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }

    fn accept(&mut self, child: impl IntoChild) -> Option<ChildRef> {
        match child.into_child() {
            Ok(child) => Some(child),
            Err(err) => {
                self.fail(err);
                None
            }
        }
    }

    /// Appends a positional child.
    pub fn child(mut self, child: impl IntoChild) -> Self {
        if let Some(child) = self.accept(child) {
            self.positional.push(child);
        }
        self
    }

    /// Sets the complete child list.
    pub fn children(mut self, children: ChildList) -> Self {
        self.explicit = Some(children);
        self
    }

    /// Adds a keyed child.
    pub fn node_field(mut self, key: impl Into<String>, child: impl IntoChild) -> Self {
        if let Some(child) = self.accept(child) {
            self.keyed.push((key.into(), child));
        }
        self
    }

    /// Sets the complete step-child list, which must not be keyed.
    pub fn stepchildren(mut self, stepchildren: ChildList) -> Self {
        if stepchildren.is_dict() {
            let error = BuildError::KeyedStepchildren {
                class: self.class.full_name(),
                location: self.location,
            };
            self.fail(error);
        } else {
            self.step_explicit = Some(stepchildren);
        }
        self
    }

    /// Appends a step-child.
    pub fn stepchild(mut self, child: impl IntoChild) -> Self {
        if let Some(child) = self.accept(child) {
            self.step_positional.push(child);
        }
        self
    }

    /// Sets an init-record field. `tags` and `node_groups` are checked the
    /// same way as by [`NodeBuilder::tags`] and [`NodeBuilder::node_groups`].
    pub fn field(self, key: &str, value: impl Into<Value>) -> Self {
        match key {
            InitRecord::TAGS => self.tags(value),
            InitRecord::NODE_GROUPS => self.node_groups(value),
            _ if RESERVED_FIELDS.contains(&key) => {
                let error = BuildError::ReservedField {
                    class: self.class.full_name(),
                    field: key.to_string(),
                    location: self.location,
                };
                let mut builder = self;
                builder.fail(error);
                builder
            }
            _ => {
                let mut builder = self;
                builder.fields.insert(key, value);
                builder
            }
        }
    }

    /// Sets the tags: a space-separated string or a list of strings.
    pub fn tags(mut self, tags: impl Into<Value>) -> Self {
        let tags = tags.into();
        let items = match &tags {
            Value::Str(s) => Some(s.split_whitespace().map(Value::from).collect::<Vec<_>>()),
            Value::List(_) => tags
                .string_items()
                .map(|items| items.into_iter().map(Value::from).collect()),
            _ => None,
        };
        match items {
            Some(items) => {
                self.fields.insert(InitRecord::TAGS, Value::List(items));
            }
            None => {
                let error = BuildError::InvalidTags {
                    class: self.class.full_name(),
                    found: tags.to_string(),
                    location: self.location,
                };
                self.fail(error);
            }
        }
        self
    }

    /// Sets the node groups: a single group name or a list of them.
    pub fn node_groups(mut self, groups: impl Into<Value>) -> Self {
        let groups = groups.into();
        match groups.string_items() {
            Some(items) => {
                let items = items.into_iter().map(Value::from).collect();
                self.fields.insert(InitRecord::NODE_GROUPS, Value::List(items));
            }
            None => {
                let error = BuildError::InvalidNodeGroups {
                    class: self.class.full_name(),
                    found: groups.to_string(),
                    location: self.location,
                };
                self.fail(error);
            }
        }
        self
    }

    /// Finishes the definition.
    ///
    /// # Errors
    ///
    /// Returns the first error recorded by the builder, or
    /// [`BuildError::ConflictingChildren`] when children or step-children
    /// were given by more than one source.
    pub fn build(self) -> Result<NodeDef, BuildError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let sources = [
            (!self.positional.is_empty(), "arguments"),
            (self.explicit.is_some(), "'children'"),
            (!self.keyed.is_empty(), "keyword children"),
        ]
        .into_iter()
        .filter_map(|(present, source)| present.then_some(source))
        .collect::<Vec<_>>();
        if sources.len() > 1 {
            return Err(BuildError::ConflictingChildren {
                class: self.class.full_name(),
                sources: sources.join(" and "),
                location: self.location,
            });
        }
        if self.step_explicit.is_some() && !self.step_positional.is_empty() {
            return Err(BuildError::ConflictingChildren {
                class: self.class.full_name(),
                sources: "step-child arguments and 'stepchildren'".to_string(),
                location: self.location,
            });
        }

        let children = if let Some(children) = self.explicit {
            children
        } else if !self.keyed.is_empty() {
            ChildList::keyed(self.keyed)
        } else {
            ChildList::positional(self.positional)
        };
        let stepchildren = self
            .step_explicit
            .unwrap_or_else(|| ChildList::positional(self.step_positional));
        Ok(NodeDef::from_parts(
            self.class,
            children,
            stepchildren,
            self.fields,
        ))
    }
}
