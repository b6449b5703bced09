//! Source object-graph model.
//!
//! A [`GraphNode`] is a node in the remote, dynamically-typed object graph:
//! a globally unique id, a type name (possibly a `:`-joined lineage), and
//! two property maps - declared members known to the node's schema, and
//! dynamic members only discoverable by enumeration at runtime.
//!
//! Property values are a closed tagged union ([`Value`]); all dispatch in
//! the crate is on the tag, never on runtime type inspection.

mod json;

pub use json::node_from_json;

use std::collections::HashMap;

/// A dynamically-typed property value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Explicit null (distinct from an absent property).
    Null,
    /// Boolean scalar.
    Bool(bool),
    /// Integer scalar.
    Int(i64),
    /// Floating-point scalar.
    Float(f64),
    /// String scalar.
    String(String),
    /// Nested graph node.
    Node(Box<GraphNode>),
    /// Ordered sequence of values; nesting depth is unbounded.
    List(Vec<Value>),
}

impl Value {
    /// Name of the value's runtime tag.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::Node(_) => "Node",
            Value::List(_) => "List",
        }
    }

    /// True for Null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for Bool/Int/Float/String.
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Bool(_) | Value::Int(_) | Value::Float(_) | Value::String(_)
        )
    }

    /// Extract as f64, widening integers.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Extract as i64.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Extract as bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract as &str.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Extract as a node reference.
    pub fn as_node(&self) -> Option<&GraphNode> {
        match self {
            Value::Node(n) => Some(n),
            _ => None,
        }
    }

    /// Extract as a list slice.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<GraphNode> for Value {
    fn from(v: GraphNode) -> Self {
        Value::Node(Box::new(v))
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

/// Semantic kind of a node, derived from its type name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// Triangle mesh with packed vertex/face buffers.
    Mesh,
    /// Straight segment between two points.
    Line,
    /// Open or closed point chain.
    Polyline,
    /// Circular arc through start/mid/end points.
    Arc,
    /// Single 3D point.
    Point,
    /// Render material definition.
    Material,
    /// Anything else.
    Other,
}

impl NodeKind {
    /// Parse the kind from a (possibly composite) type name.
    ///
    /// Composite names are a `:`-joined lineage of dot-paths; the leaf
    /// segment of the last lineage entry decides the kind.
    pub fn from_type_name(type_name: &str) -> Self {
        let lineage_leaf = type_name.rsplit(':').next().unwrap_or(type_name);
        let leaf = lineage_leaf.rsplit('.').next().unwrap_or(lineage_leaf);
        match leaf {
            "Mesh" => NodeKind::Mesh,
            "Line" => NodeKind::Line,
            "Polyline" => NodeKind::Polyline,
            "Arc" => NodeKind::Arc,
            "Point" => NodeKind::Point,
            "RenderMaterial" | "Material" => NodeKind::Material,
            _ => NodeKind::Other,
        }
    }

    /// True for kinds that materialize as display geometry.
    pub fn is_display_geometry(self) -> bool {
        matches!(
            self,
            NodeKind::Mesh | NodeKind::Line | NodeKind::Polyline | NodeKind::Arc
        )
    }
}

/// A node in the source object graph.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GraphNode {
    id: String,
    type_name: String,
    declared: HashMap<String, Value>,
    dynamic: HashMap<String, Value>,
}

impl GraphNode {
    /// Create an empty node with an id and type name.
    pub fn new(id: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_name: type_name.into(),
            declared: HashMap::new(),
            dynamic: HashMap::new(),
        }
    }

    /// Globally unique, immutable node id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The node's type name (possibly a composite lineage).
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Semantic kind derived from the type name.
    pub fn kind(&self) -> NodeKind {
        NodeKind::from_type_name(&self.type_name)
    }

    /// Set a declared property.
    pub fn set_declared(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.declared.insert(name.into(), value.into());
    }

    /// Set a dynamic property.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.dynamic.insert(name.into(), value.into());
    }

    /// Builder-style dynamic property setter.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Look up a property, declared members shadowing dynamic ones.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.declared.get(name).or_else(|| self.dynamic.get(name))
    }

    /// Look up a nested node-valued property.
    pub fn get_node(&self, name: &str) -> Option<&GraphNode> {
        self.get(name).and_then(Value::as_node)
    }

    /// Enumerate every property name, declared first.
    ///
    /// Dynamic names shadowed by declared ones are not repeated. The
    /// set of dynamic names can only be discovered this way, never assumed.
    pub fn member_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.declared.keys().map(String::as_str).collect();
        names.extend(
            self.dynamic
                .keys()
                .filter(|k| !self.declared.contains_key(*k))
                .map(String::as_str),
        );
        names
    }

    /// Total number of distinct properties.
    pub fn num_members(&self) -> usize {
        self.member_names().len()
    }
}
