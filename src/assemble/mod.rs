//! Record assembler - the inverse, record-to-graph direction.
//!
//! Converts flat records back into graph nodes and aggregates one
//! group's worth of them under a single root node ready for
//! transmission. Unsupported records fail individually (reported by the
//! caller through the rejection mechanism); they never abort a batch.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use glam::DVec3;

use crate::geom::{GeometryPayload, Mesh, Path};
use crate::graph::{GraphNode, Value};
use crate::record::{AttrValue, FlatRecord};
use crate::util::{Error, Result};

/// Attribute naming the typed outbound conversion for a record.
pub const TARGET_TYPE_ATTR: &str = "targetType";

/// Convert one flat record into a graph node.
///
/// Dispatch order: an explicit `targetType` discriminator wins (Mesh,
/// Curve, Plane, Box, Interval); otherwise a geometry payload converts
/// by its shape. A record with neither fails.
pub fn record_to_node(record: &FlatRecord) -> Result<GraphNode> {
    if let Some(target) = record.get(TARGET_TYPE_ATTR).and_then(AttrValue::as_str) {
        return match target {
            "Mesh" => mesh_target(record),
            "Curve" => curve_target(record),
            "Plane" => plane_target(record),
            "Box" => box_target(record),
            "Interval" => interval_target(record),
            other => Err(Error::UnsupportedType(other.to_string())),
        };
    }

    match &record.geometry {
        Some(payload) => Ok(payload_to_node(payload, &record.id)),
        None => Err(Error::other(format!(
            "record {} has no target type and no geometry",
            record.id
        ))),
    }
}

fn mesh_target(record: &FlatRecord) -> Result<GraphNode> {
    match &record.geometry {
        Some(GeometryPayload::Mesh(mesh)) => Ok(mesh_to_node(mesh, &record.id)),
        _ => Err(Error::MissingAttribute("mesh geometry".into())),
    }
}

fn curve_target(record: &FlatRecord) -> Result<GraphNode> {
    match &record.geometry {
        Some(GeometryPayload::Path(path)) => Ok(path_to_node(path, &record.id)),
        _ => Err(Error::MissingAttribute("path geometry".into())),
    }
}

fn plane_target(record: &FlatRecord) -> Result<GraphNode> {
    let origin = point_from_attrs(record, "origin")?;
    let normal = point_from_attrs(record, "normal")?;
    let mut node = GraphNode::new(format!("{}:plane", record.id), "Objects.Geometry.Plane");
    node.set("origin", point_node(origin, &format!("{}:origin", record.id)));
    node.set("normal", point_node(normal, &format!("{}:normal", record.id)));
    node.set("units", "m");
    Ok(node)
}

fn box_target(record: &FlatRecord) -> Result<GraphNode> {
    let min = point_from_attrs(record, "min")?;
    let max = point_from_attrs(record, "max")?;
    let mut node = GraphNode::new(format!("{}:box", record.id), "Objects.Geometry.Box");
    node.set("min", point_node(min, &format!("{}:min", record.id)));
    node.set("max", point_node(max, &format!("{}:max", record.id)));
    node.set("units", "m");
    Ok(node)
}

fn interval_target(record: &FlatRecord) -> Result<GraphNode> {
    let start = real_attr(record, "start")?;
    let end = real_attr(record, "end")?;
    let mut node = GraphNode::new(
        format!("{}:interval", record.id),
        "Objects.Primitive.Interval",
    );
    node.set("start", start);
    node.set("end", end);
    Ok(node)
}

/// Convert a geometry payload into the graph's packed encoding.
fn payload_to_node(payload: &GeometryPayload, base_id: &str) -> GraphNode {
    match payload {
        GeometryPayload::Mesh(mesh) => mesh_to_node(mesh, base_id),
        GeometryPayload::Path(path) => path_to_node(path, base_id),
        GeometryPayload::Aggregate(parts) => {
            let mut node = GraphNode::new(format!("{base_id}:parts"), "Base");
            let converted: Vec<Value> = parts
                .iter()
                .enumerate()
                .map(|(idx, part)| {
                    Value::from(payload_to_node(part, &format!("{base_id}:{idx}")))
                })
                .collect();
            node.set("parts", converted);
            node
        }
    }
}

fn mesh_to_node(mesh: &Mesh, base_id: &str) -> GraphNode {
    let mut vertices = Vec::with_capacity(mesh.vertices.len() * 3);
    for v in &mesh.vertices {
        vertices.extend([Value::Float(v.x), Value::Float(v.y), Value::Float(v.z)]);
    }
    // Face groups re-encode as marker-plus-indices.
    let mut faces = Vec::with_capacity(mesh.faces.len() * 4);
    for [a, b, c] in &mesh.faces {
        faces.extend([
            Value::Int(3),
            Value::Int(*a as i64),
            Value::Int(*b as i64),
            Value::Int(*c as i64),
        ]);
    }

    let mut node = GraphNode::new(format!("{base_id}:mesh"), "Objects.Geometry.Mesh");
    node.set("vertices", vertices);
    node.set("faces", faces);
    node.set("units", "m");
    copy_traits_back(&mesh.traits, &mut node);
    node
}

fn path_to_node(path: &Path, base_id: &str) -> GraphNode {
    // A closed path carries its first point again as the last one;
    // the graph encoding wants the flag instead of the duplicate.
    let mut points: &[DVec3] = &path.points;
    let closed = points.len() > 1 && points.first() == points.last();
    if closed {
        points = &points[..points.len() - 1];
    }

    let mut coords = Vec::with_capacity(points.len() * 3);
    for p in points {
        coords.extend([Value::Float(p.x), Value::Float(p.y), Value::Float(p.z)]);
    }

    let mut node = GraphNode::new(format!("{base_id}:polyline"), "Objects.Geometry.Polyline");
    node.set("value", coords);
    node.set("closed", closed);
    node.set("units", "m");
    copy_traits_back(&path.traits, &mut node);
    node
}

/// Construct a single root node holding one group's converted records.
///
/// The members land under a synthetic list-valued property tagged with
/// the caller's group tag. Inputs are aggregated, never mutated.
pub fn assemble(nodes: Vec<GraphNode>, group_tag: &str) -> GraphNode {
    let mut hasher = DefaultHasher::new();
    group_tag.hash(&mut hasher);
    for node in &nodes {
        node.id().hash(&mut hasher);
    }

    let mut root = GraphNode::new(format!("{:016x}", hasher.finish()), "Base");
    root.set(
        format!("@{group_tag}"),
        Value::List(nodes.into_iter().map(Value::from).collect()),
    );
    root
}

fn point_node(p: DVec3, id: &str) -> GraphNode {
    let mut node = GraphNode::new(id, "Objects.Geometry.Point");
    node.set("x", p.x);
    node.set("y", p.y);
    node.set("z", p.z);
    node.set("units", "m");
    node
}

/// Read a `<prefix>.x/y/z` attribute triple as a point.
fn point_from_attrs(record: &FlatRecord, prefix: &str) -> Result<DVec3> {
    Ok(DVec3::new(
        real_attr(record, &format!("{prefix}.x"))?,
        real_attr(record, &format!("{prefix}.y"))?,
        real_attr(record, &format!("{prefix}.z"))?,
    ))
}

fn real_attr(record: &FlatRecord, name: &str) -> Result<f64> {
    record
        .get(name)
        .and_then(AttrValue::as_real)
        .ok_or_else(|| Error::MissingAttribute(name.to_string()))
}

fn copy_traits_back(traits: &[(String, AttrValue)], node: &mut GraphNode) {
    for (name, value) in traits {
        let value = match value {
            AttrValue::Str(s) => Value::String(s.clone()),
            AttrValue::Int(i) => Value::Int(*i),
            AttrValue::Bool(b) => Value::Bool(*b),
            AttrValue::Real(f) => Value::Float(*f),
            AttrValue::Null(_) | AttrValue::List(_) => continue,
        };
        node.set(name.clone(), value);
    }
}
