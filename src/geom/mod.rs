//! Geometry materialization from packed graph encodings.
//!
//! Reconstructs native geometry (triangle meshes, paths) from the packed
//! numeric buffers carried by display-geometry nodes, resolving render
//! materials through the run's [`AppearanceCache`].
//!
//! Materialization is fail-soft throughout: an unsupported or empty
//! display value yields no payload, never an error.

use glam::DVec3;
use tracing::{debug, warn};

use crate::appearance::{AppearanceCache, AppearanceRef};
use crate::codec::unit_scale;
use crate::graph::{GraphNode, NodeKind, Value};
use crate::record::AttrValue;

/// Number of segments used to tessellate an arc.
const ARC_SEGMENTS: usize = 16;

/// Adjunct per-geometry metadata copied from the source display node.
pub type GeometryTraits = Vec<(String, AttrValue)>;

/// Reconstructed geometry attached to a flat record.
#[derive(Clone, Debug, PartialEq)]
pub enum GeometryPayload {
    /// Triangle mesh.
    Mesh(Mesh),
    /// Open or closed point chain.
    Path(Path),
    /// Container for a multi-part display value; never empty.
    Aggregate(Vec<GeometryPayload>),
}

impl GeometryPayload {
    /// Total number of leaf geometries.
    pub fn num_parts(&self) -> usize {
        match self {
            GeometryPayload::Aggregate(parts) => parts.iter().map(Self::num_parts).sum(),
            _ => 1,
        }
    }
}

/// Triangle mesh with an optional appearance, applied front and back.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    /// Vertex positions.
    pub vertices: Vec<DVec3>,
    /// Triangles as vertex-index triples.
    pub faces: Vec<[u32; 3]>,
    /// Resolved appearance handle, if the source carried a material.
    pub appearance: Option<AppearanceRef>,
    /// Scalar properties copied from the source node.
    pub traits: GeometryTraits,
}

/// Ordered point chain. A closed source curve repeats its first point last.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Path {
    /// Points in order.
    pub points: Vec<DVec3>,
    /// Scalar properties copied from the source node.
    pub traits: GeometryTraits,
}

/// Build a path from an ordered point sequence.
///
/// `closed` appends a copy of the first point; an empty sequence yields
/// an empty path, not an error.
pub fn build_path(points: &[DVec3], closed: bool, scale: f64) -> Path {
    let mut out: Vec<DVec3> = points.iter().map(|p| *p * scale).collect();
    if closed {
        if let Some(first) = out.first().copied() {
            out.push(first);
        }
    }
    Path {
        points: out,
        traits: GeometryTraits::new(),
    }
}

/// Build a mesh from packed vertex and face buffers.
///
/// Vertices are stride-3 float triples. Faces are stride-4 groups whose
/// first element is a face-size marker; elements 1..=3 are the triangle's
/// vertex indices. Markers other than the triangle forms (0 and 3) are
/// reported and decoded as triangles anyway.
pub fn build_mesh(
    vertex_buf: &[f64],
    face_buf: &[i64],
    material: Option<&GraphNode>,
    scale: f64,
    cache: &mut AppearanceCache,
) -> Mesh {
    let mut mesh = Mesh::default();

    if let Some(material) = material {
        mesh.appearance = cache.resolve(material);
    }

    mesh.vertices.reserve(vertex_buf.len() / 3);
    for triple in vertex_buf.chunks_exact(3) {
        mesh.vertices
            .push(DVec3::new(triple[0], triple[1], triple[2]) * scale);
    }

    mesh.faces.reserve(face_buf.len() / 4);
    for group in face_buf.chunks_exact(4) {
        if group[0] != 0 && group[0] != 3 {
            debug!(marker = group[0], "non-triangle face marker, decoding as triangle");
        }
        mesh.faces
            .push([group[1] as u32, group[2] as u32, group[3] as u32]);
    }

    mesh
}

/// Materialize a display value into a geometry payload.
///
/// Dispatches on the runtime shape: a bare geometry node builds directly;
/// a one-element sequence unwraps; a longer sequence becomes an
/// [`GeometryPayload::Aggregate`] of the parts that built successfully.
/// An aggregate with zero parts is suppressed, and empty or null display
/// values yield no payload - both are valid, non-fatal outcomes.
pub fn materialize_display(
    value: &Value,
    inherited_material: Option<&GraphNode>,
    cache: &mut AppearanceCache,
) -> Option<GeometryPayload> {
    match value {
        Value::Null => None,
        Value::Node(node) => materialize_node(node, inherited_material, cache),
        Value::List(items) => match items.len() {
            0 => None,
            1 => materialize_display(&items[0], inherited_material, cache),
            _ => {
                let parts: Vec<GeometryPayload> = items
                    .iter()
                    .filter_map(|item| materialize_display(item, inherited_material, cache))
                    .collect();
                if parts.is_empty() {
                    None
                } else {
                    Some(GeometryPayload::Aggregate(parts))
                }
            }
        },
        other => {
            debug!(value = other.type_name(), "display value is not geometry");
            None
        }
    }
}

/// Build geometry for a single display node.
///
/// The node's own `renderMaterial` takes precedence over one inherited
/// from the owning object. Scalar properties of the node are copied onto
/// the result as traits.
pub fn materialize_node(
    node: &GraphNode,
    inherited_material: Option<&GraphNode>,
    cache: &mut AppearanceCache,
) -> Option<GeometryPayload> {
    let scale = node
        .get("units")
        .and_then(Value::as_str)
        .map(unit_scale)
        .unwrap_or(1.0);
    let material = node.get_node("renderMaterial").or(inherited_material);

    let mut payload = match node.kind() {
        NodeKind::Mesh => Some(GeometryPayload::Mesh(mesh_from_node(
            node, material, scale, cache,
        ))),
        NodeKind::Polyline => polyline_from_node(node, scale).map(GeometryPayload::Path),
        NodeKind::Line => line_from_node(node, scale).map(GeometryPayload::Path),
        NodeKind::Arc => arc_from_node(node, scale).map(GeometryPayload::Path),
        kind => {
            warn!(
                id = node.id(),
                type_name = node.type_name(),
                ?kind,
                "unsupported display geometry kind"
            );
            None
        }
    };

    if let Some(payload) = payload.as_mut() {
        copy_traits(node, payload);
    }
    payload
}

fn mesh_from_node(
    node: &GraphNode,
    material: Option<&GraphNode>,
    scale: f64,
    cache: &mut AppearanceCache,
) -> Mesh {
    let vertices = float_buffer(node, "vertices");
    let faces = int_buffer(node, "faces");
    build_mesh(&vertices, &faces, material, scale, cache)
}

fn polyline_from_node(node: &GraphNode, scale: f64) -> Option<Path> {
    let coords = float_buffer(node, "value");
    let points: Vec<DVec3> = coords
        .chunks_exact(3)
        .map(|c| DVec3::new(c[0], c[1], c[2]))
        .collect();
    let closed = node
        .get("closed")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    Some(build_path(&points, closed, scale))
}

fn line_from_node(node: &GraphNode, scale: f64) -> Option<Path> {
    let start = node.get_node("start").and_then(point_from_node)?;
    let end = node.get_node("end").and_then(point_from_node)?;
    Some(build_path(&[start, end], false, scale))
}

/// Tessellate an arc through its start/mid/end points.
///
/// The circle is fit through the three points; degenerate (collinear)
/// input falls back to the bare three-point path.
fn arc_from_node(node: &GraphNode, scale: f64) -> Option<Path> {
    let a = node.get_node("startPoint").and_then(point_from_node)?;
    let b = node.get_node("midPoint").and_then(point_from_node)?;
    let c = node.get_node("endPoint").and_then(point_from_node)?;

    let u = b - a;
    let v = c - a;
    let n = u.cross(v);
    let n_len_sq = n.length_squared();
    if n_len_sq < f64::EPSILON {
        debug!(id = node.id(), "degenerate arc, emitting chord path");
        return Some(build_path(&[a, b, c], false, scale));
    }

    let center = a + (u.length_squared() * v - v.length_squared() * u).cross(n) / (2.0 * n_len_sq);
    let radius = (a - center).length();
    let e1 = (a - center) / radius;
    let e2 = n.normalize().cross(e1);

    let angle_of = |p: DVec3| -> f64 {
        let d = p - center;
        let theta = d.dot(e2).atan2(d.dot(e1));
        if theta < 0.0 {
            theta + std::f64::consts::TAU
        } else {
            theta
        }
    };

    // Sweep from the start toward the end, flipping direction when the
    // mid point would otherwise fall outside the arc.
    let theta_b = angle_of(b);
    let theta_c = angle_of(c);
    let sweep = if theta_b <= theta_c {
        theta_c
    } else {
        theta_c - std::f64::consts::TAU
    };

    let points: Vec<DVec3> = (0..=ARC_SEGMENTS)
        .map(|i| {
            let t = sweep * i as f64 / ARC_SEGMENTS as f64;
            center + radius * (t.cos() * e1 + t.sin() * e2)
        })
        .collect();
    Some(build_path(&points, false, scale))
}

fn point_from_node(node: &GraphNode) -> Option<DVec3> {
    let x = node.get("x").and_then(Value::as_float)?;
    let y = node.get("y").and_then(Value::as_float)?;
    let z = node.get("z").and_then(Value::as_float)?;
    Some(DVec3::new(x, y, z))
}

/// Read a flat list-valued property as a float buffer.
fn float_buffer(node: &GraphNode, name: &str) -> Vec<f64> {
    match node.get(name).and_then(Value::as_list) {
        Some(items) => items.iter().filter_map(Value::as_float).collect(),
        None => Vec::new(),
    }
}

/// Read a flat list-valued property as an integer buffer.
fn int_buffer(node: &GraphNode, name: &str) -> Vec<i64> {
    match node.get(name).and_then(Value::as_list) {
        Some(items) => items.iter().filter_map(Value::as_int).collect(),
        None => Vec::new(),
    }
}

/// Copy the display node's scalar properties onto the geometry as traits.
///
/// Adjunct metadata on a display node has no home in the owning record's
/// attribute set, so it rides along on the geometry itself.
fn copy_traits(node: &GraphNode, payload: &mut GeometryPayload) {
    let traits = match payload {
        GeometryPayload::Mesh(mesh) => &mut mesh.traits,
        GeometryPayload::Path(path) => &mut path.traits,
        GeometryPayload::Aggregate(_) => return,
    };
    for name in node.member_names() {
        let Some(value) = node.get(name) else { continue };
        if let Some(attr) = AttrValue::from_scalar(value) {
            if !matches!(attr, AttrValue::Null(_)) {
                traits.push((name.to_string(), attr));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64, z: f64) -> DVec3 {
        DVec3::new(x, y, z)
    }

    fn mesh_node(id: &str) -> GraphNode {
        GraphNode::new(id, "Objects.Geometry.Mesh")
            .with(
                "vertices",
                vec![
                    Value::Float(0.0),
                    Value::Float(0.0),
                    Value::Float(0.0),
                    Value::Float(1.0),
                    Value::Float(0.0),
                    Value::Float(0.0),
                    Value::Float(0.0),
                    Value::Float(1.0),
                    Value::Float(0.0),
                ],
            )
            .with(
                "faces",
                vec![
                    Value::Int(3),
                    Value::Int(0),
                    Value::Int(1),
                    Value::Int(2),
                ],
            )
    }

    #[test]
    fn test_build_path_closed_duplicates_first_point() {
        let pts = [p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(1.0, 1.0, 0.0)];
        let closed = build_path(&pts, true, 1.0);
        assert_eq!(closed.points.len(), 4);
        assert_eq!(closed.points[3], closed.points[0]);

        let open = build_path(&pts, false, 1.0);
        assert_eq!(open.points.len(), 3);
    }

    #[test]
    fn test_build_path_empty_is_not_an_error() {
        let path = build_path(&[], true, 1.0);
        assert!(path.points.is_empty());
    }

    #[test]
    fn test_build_path_applies_scale() {
        let path = build_path(&[p(1000.0, 0.0, 0.0)], false, 0.001);
        assert_eq!(path.points[0], p(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_build_mesh_strides() {
        let mut cache = AppearanceCache::new();
        let vertices = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0];
        let faces = [3, 0, 1, 2, 3, 1, 3, 2];
        let mesh = build_mesh(&vertices, &faces, None, 1.0, &mut cache);
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.faces, vec![[0, 1, 2], [1, 3, 2]]);
        assert!(mesh.appearance.is_none());
    }

    #[test]
    fn test_build_mesh_resolves_material() {
        let mut cache = AppearanceCache::new();
        let material = GraphNode::new("m1", "Objects.Other.RenderMaterial")
            .with("diffuse", 0xFFFF_FFFFu32 as i64);
        let mesh = build_mesh(&[0.0; 9], &[3, 0, 1, 2], Some(&material), 1.0, &mut cache);
        assert_eq!(mesh.appearance, Some(0));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_materialize_single_node() {
        let mut cache = AppearanceCache::new();
        let value = Value::from(mesh_node("g1"));
        let payload = materialize_display(&value, None, &mut cache).unwrap();
        assert!(matches!(payload, GeometryPayload::Mesh(_)));
    }

    #[test]
    fn test_materialize_unwraps_singleton_list() {
        let mut cache = AppearanceCache::new();
        let value = Value::List(vec![Value::from(mesh_node("g1"))]);
        let payload = materialize_display(&value, None, &mut cache).unwrap();
        assert!(matches!(payload, GeometryPayload::Mesh(_)));
    }

    #[test]
    fn test_materialize_aggregate() {
        let mut cache = AppearanceCache::new();
        let value = Value::List(vec![
            Value::from(mesh_node("g1")),
            Value::from(mesh_node("g2")),
        ]);
        let payload = materialize_display(&value, None, &mut cache).unwrap();
        assert!(matches!(payload, GeometryPayload::Aggregate(ref parts) if parts.len() == 2));
        assert_eq!(payload.num_parts(), 2);
    }

    #[test]
    fn test_aggregate_with_zero_parts_is_suppressed() {
        let mut cache = AppearanceCache::new();
        // Both elements fail to materialize: not geometry kinds.
        let value = Value::List(vec![
            Value::from(GraphNode::new("x1", "Base")),
            Value::from(GraphNode::new("x2", "Base")),
        ]);
        assert!(materialize_display(&value, None, &mut cache).is_none());
    }

    #[test]
    fn test_materialize_empty_and_null() {
        let mut cache = AppearanceCache::new();
        assert!(materialize_display(&Value::List(vec![]), None, &mut cache).is_none());
        assert!(materialize_display(&Value::Null, None, &mut cache).is_none());
    }

    #[test]
    fn test_own_material_wins_over_inherited() {
        let mut cache = AppearanceCache::new();
        let own = GraphNode::new("own", "Objects.Other.RenderMaterial").with("diffuse", 1i64);
        let inherited =
            GraphNode::new("inh", "Objects.Other.RenderMaterial").with("diffuse", 2i64);
        let node = mesh_node("g1").with("renderMaterial", own);

        let payload =
            materialize_display(&Value::from(node), Some(&inherited), &mut cache).unwrap();
        let GeometryPayload::Mesh(mesh) = payload else {
            panic!("expected mesh");
        };
        let handle = mesh.appearance.unwrap();
        // Only the node's own material was registered.
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(handle).unwrap().diffuse.b, 1.0 / 255.0);
    }

    #[test]
    fn test_scalar_properties_become_traits() {
        let mut cache = AppearanceCache::new();
        let node = mesh_node("g1").with("area", 12.5).with("units", "m");
        let payload = materialize_display(&Value::from(node), None, &mut cache).unwrap();
        let GeometryPayload::Mesh(mesh) = payload else {
            panic!("expected mesh");
        };
        assert!(mesh
            .traits
            .iter()
            .any(|(name, value)| name == "area" && *value == AttrValue::Real(12.5)));
    }

    #[test]
    fn test_polyline_closed_flag() {
        let node = GraphNode::new("pl1", "Objects.Geometry.Polyline")
            .with(
                "value",
                vec![
                    Value::Float(0.0),
                    Value::Float(0.0),
                    Value::Float(0.0),
                    Value::Float(1.0),
                    Value::Float(0.0),
                    Value::Float(0.0),
                    Value::Float(1.0),
                    Value::Float(1.0),
                    Value::Float(0.0),
                ],
            )
            .with("closed", true);
        let path = polyline_from_node(&node, 1.0).unwrap();
        assert_eq!(path.points.len(), 4);
        assert_eq!(path.points[3], path.points[0]);
    }

    #[test]
    fn test_line_from_node() {
        let start = GraphNode::new("p1", "Objects.Geometry.Point")
            .with("x", 0.0)
            .with("y", 0.0)
            .with("z", 0.0);
        let end = GraphNode::new("p2", "Objects.Geometry.Point")
            .with("x", 0.0)
            .with("y", 0.0)
            .with("z", 2.0);
        let node = GraphNode::new("l1", "Objects.Geometry.Line")
            .with("start", start)
            .with("end", end);
        let path = line_from_node(&node, 1.0).unwrap();
        assert_eq!(path.points, vec![p(0.0, 0.0, 0.0), p(0.0, 0.0, 2.0)]);
    }

    #[test]
    fn test_arc_tessellation_hits_endpoints() {
        let point = |id: &str, x: f64, y: f64| {
            GraphNode::new(id, "Objects.Geometry.Point")
                .with("x", x)
                .with("y", y)
                .with("z", 0.0)
        };
        // Quarter circle of radius 1 around the origin.
        let node = GraphNode::new("a1", "Objects.Geometry.Arc")
            .with("startPoint", point("p1", 1.0, 0.0))
            .with(
                "midPoint",
                point("p2", std::f64::consts::FRAC_1_SQRT_2, std::f64::consts::FRAC_1_SQRT_2),
            )
            .with("endPoint", point("p3", 0.0, 1.0));

        let path = arc_from_node(&node, 1.0).unwrap();
        assert_eq!(path.points.len(), ARC_SEGMENTS + 1);
        assert!((path.points[0] - p(1.0, 0.0, 0.0)).length() < 1e-9);
        assert!((path.points[ARC_SEGMENTS] - p(0.0, 1.0, 0.0)).length() < 1e-9);
        // Every sample stays on the unit circle.
        for pt in &path.points {
            assert!((pt.length() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_degenerate_arc_falls_back_to_chord() {
        let point = |id: &str, x: f64| {
            GraphNode::new(id, "Objects.Geometry.Point")
                .with("x", x)
                .with("y", 0.0)
                .with("z", 0.0)
        };
        let node = GraphNode::new("a1", "Objects.Geometry.Arc")
            .with("startPoint", point("p1", 0.0))
            .with("midPoint", point("p2", 1.0))
            .with("endPoint", point("p3", 2.0));
        let path = arc_from_node(&node, 1.0).unwrap();
        assert_eq!(path.points.len(), 3);
    }
}
