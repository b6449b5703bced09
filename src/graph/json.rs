//! Wire-JSON decoding into the graph model.
//!
//! The remote store's wire format is not standardized here; this decoder
//! accepts the common JSON object-dump shape (objects with `id` and
//! `speckle_type`/`type` keys) so the CLI and tests can work from files.

use serde_json::Value as Json;

use crate::util::{Error, Result};

use super::{GraphNode, Value};

/// Decode a JSON document into a graph node tree.
///
/// The top-level value must be a JSON object. Objects without an `id`
/// receive a synthesized one; objects without a type key become `Base`.
pub fn node_from_json(json: &Json) -> Result<GraphNode> {
    let mut synth = 0usize;
    match json {
        Json::Object(_) => Ok(decode_node(json, &mut synth)),
        other => Err(Error::invalid(format!(
            "expected a JSON object at the graph root, got {other}"
        ))),
    }
}

fn decode_node(json: &Json, synth: &mut usize) -> GraphNode {
    let obj = match json.as_object() {
        Some(obj) => obj,
        None => return GraphNode::new(next_synth_id(synth), "Base"),
    };

    let id = obj
        .get("id")
        .and_then(Json::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| next_synth_id(synth));
    let type_name = obj
        .get("speckle_type")
        .or_else(|| obj.get("type"))
        .and_then(Json::as_str)
        .unwrap_or("Base");

    let mut node = GraphNode::new(id, type_name);
    for (key, value) in obj {
        if key == "id" || key == "speckle_type" || key == "type" {
            continue;
        }
        node.set(key.clone(), decode_value(value, synth));
    }
    node
}

fn decode_value(json: &Json, synth: &mut usize) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        Json::String(s) => Value::String(s.clone()),
        Json::Array(items) => {
            Value::List(items.iter().map(|v| decode_value(v, synth)).collect())
        }
        Json::Object(_) => Value::Node(Box::new(decode_node(json, synth))),
    }
}

fn next_synth_id(synth: &mut usize) -> String {
    *synth += 1;
    format!("synthetic-{synth}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeKind;

    #[test]
    fn test_decode_nested_graph() {
        let json: Json = serde_json::from_str(
            r#"{
                "id": "root1",
                "speckle_type": "Objects.BuiltElements.Wall",
                "height": 3.0,
                "flipped": false,
                "tags": ["a", "b"],
                "baseLine": {
                    "id": "line1",
                    "speckle_type": "Objects.Geometry.Line",
                    "units": "mm"
                }
            }"#,
        )
        .unwrap();

        let node = node_from_json(&json).unwrap();
        assert_eq!(node.id(), "root1");
        assert_eq!(node.get("height").and_then(Value::as_float), Some(3.0));
        assert_eq!(node.get("flipped").and_then(Value::as_bool), Some(false));
        assert_eq!(node.get("tags").and_then(Value::as_list).map(<[Value]>::len), Some(2));

        let line = node.get_node("baseLine").unwrap();
        assert_eq!(line.kind(), NodeKind::Line);
        assert_eq!(line.get("units").and_then(Value::as_str), Some("mm"));
    }

    #[test]
    fn test_decode_synthesizes_missing_ids() {
        let json: Json = serde_json::from_str(r#"{"child": {"x": 1}}"#).unwrap();
        let node = node_from_json(&json).unwrap();
        assert!(node.id().starts_with("synthetic-"));
        let child = node.get_node("child").unwrap();
        assert!(child.id().starts_with("synthetic-"));
        assert_ne!(node.id(), child.id());
        assert_eq!(child.type_name(), "Base");
    }

    #[test]
    fn test_decode_rejects_non_object_root() {
        let json: Json = serde_json::from_str("[1, 2]").unwrap();
        assert!(node_from_json(&json).is_err());
    }
}
