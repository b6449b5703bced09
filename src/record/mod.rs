//! Flat record model - one row of the converted output stream.
//!
//! A [`FlatRecord`] carries a type name, the source node id, an optional
//! parent link, a flat bag of typed attributes with dot-joined hierarchical
//! labels, and at most one geometry payload. Records are built append-only
//! during one traversal pass and never mutated after emission.

use smallvec::SmallVec;

use crate::geom::GeometryPayload;
use crate::graph::Value;

/// Attribute name set when a record could not be fully processed.
pub const REJECTED_ATTR: &str = "REJECTED";

/// Placeholder substituted for spaces in attribute names (U+2423).
const SPACE_SUBSTITUTE: char = '\u{2423}';

/// Declared type of a flat attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttrType {
    /// UTF-8 string.
    String,
    /// 64-bit signed integer.
    Int64,
    /// Boolean.
    Boolean,
    /// 64-bit float.
    Real64,
}

/// A typed flat attribute value.
#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    /// Explicit null carrying its declared type.
    Null(AttrType),
    /// String value.
    Str(String),
    /// Integer value.
    Int(i64),
    /// Boolean value.
    Bool(bool),
    /// Float value.
    Real(f64),
    /// List value, accumulated element by element.
    List(Vec<AttrValue>),
}

impl AttrValue {
    /// Declared type of this value.
    pub fn attr_type(&self) -> AttrType {
        match self {
            AttrValue::Null(t) => *t,
            AttrValue::Str(_) => AttrType::String,
            AttrValue::Int(_) => AttrType::Int64,
            AttrValue::Bool(_) => AttrType::Boolean,
            AttrValue::Real(_) => AttrType::Real64,
            // Lists are typed by their elements; String is the fallback.
            AttrValue::List(items) => items
                .first()
                .map(AttrValue::attr_type)
                .unwrap_or(AttrType::String),
        }
    }

    /// Convert a scalar graph value; None for nodes and lists.
    ///
    /// Graph nulls become string-typed nulls, matching the host
    /// pipeline's null-with-type convention.
    pub fn from_scalar(value: &Value) -> Option<AttrValue> {
        match value {
            Value::Null => Some(AttrValue::Null(AttrType::String)),
            Value::Bool(b) => Some(AttrValue::Bool(*b)),
            Value::Int(i) => Some(AttrValue::Int(*i)),
            Value::Float(f) => Some(AttrValue::Real(*f)),
            Value::String(s) => Some(AttrValue::Str(s.clone())),
            Value::Node(_) | Value::List(_) => None,
        }
    }

    /// Extract as &str.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Extract as f64, widening integers.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            AttrValue::Real(f) => Some(*f),
            AttrValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Extract as a list slice.
    pub fn as_list(&self) -> Option<&[AttrValue]> {
        match self {
            AttrValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Str(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Real(v)
    }
}

/// Remap attribute names to satisfy the host naming constraint.
fn clean_attr_name(name: &str) -> String {
    name.replace(' ', &SPACE_SUBSTITUTE.to_string())
}

/// One flattened output row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlatRecord {
    /// Type name copied from the source node (or synthesized).
    pub type_name: String,
    /// Source node id, or a synthesized id for records with no graph origin.
    pub id: String,
    /// Id of the record whose property spawned this one.
    pub parent_id: Option<String>,
    attrs: SmallVec<[(String, AttrValue); 8]>,
    /// At most one geometry payload per record.
    pub geometry: Option<GeometryPayload>,
}

impl FlatRecord {
    /// Create a record with identity fields only.
    pub fn new(
        type_name: impl Into<String>,
        id: impl Into<String>,
        parent_id: Option<String>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            id: id.into(),
            parent_id,
            attrs: SmallVec::new(),
            geometry: None,
        }
    }

    /// Set an attribute, replacing any previous value under the name.
    ///
    /// Spaces in the name are substituted per the host naming constraint.
    pub fn set(&mut self, name: &str, value: impl Into<AttrValue>) {
        let name = clean_attr_name(name);
        let value = value.into();
        for (k, v) in &mut self.attrs {
            if *k == name {
                *v = value;
                return;
            }
        }
        self.attrs.push((name, value));
    }

    /// Set a typed null attribute.
    pub fn set_null(&mut self, name: &str, attr_type: AttrType) {
        self.set(name, AttrValue::Null(attr_type));
    }

    /// Append to a list-valued attribute, extend-or-create semantics.
    ///
    /// A scalar already stored under the name is promoted to a one-element
    /// list first; existing lists are extended, never overwritten. This
    /// keeps repeated invocation against the same label accumulative.
    pub fn append_list(&mut self, name: &str, value: impl Into<AttrValue>) {
        let name = clean_attr_name(name);
        let value = value.into();
        for (k, v) in &mut self.attrs {
            if *k == name {
                match v {
                    AttrValue::List(items) => items.push(value),
                    scalar => {
                        let prev = std::mem::replace(scalar, AttrValue::List(Vec::new()));
                        *scalar = AttrValue::List(vec![prev, value]);
                    }
                }
                return;
            }
        }
        self.attrs.push((name, AttrValue::List(vec![value])));
    }

    /// Mark the record rejected with a reason.
    pub fn reject(&mut self, reason: impl Into<String>) {
        self.set(REJECTED_ATTR, AttrValue::Str(reason.into()));
    }

    /// True if a rejection reason was set.
    pub fn is_rejected(&self) -> bool {
        self.get(REJECTED_ATTR).is_some()
    }

    /// Look up an attribute by (already cleaned) name.
    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// Number of attributes.
    pub fn num_attrs(&self) -> usize {
        self.attrs.len()
    }

    /// Iterate over `(name, value)` attribute pairs in insertion order.
    pub fn attrs(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v))
    }
}
