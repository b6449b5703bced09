//! End-to-end conversion tests: graph in, records out, graph back.

use std::io::Write;

use graphflat::prelude::*;

fn mesh_node(id: &str, material: Option<GraphNode>) -> GraphNode {
    let mut node = GraphNode::new(id, "Objects.Geometry.Mesh")
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
            vec![Value::Int(3), Value::Int(0), Value::Int(1), Value::Int(2)],
        );
    if let Some(material) = material {
        node.set("renderMaterial", material);
    }
    node
}

fn commit_graph() -> GraphNode {
    let material = GraphNode::new("mat1", "Objects.Other.RenderMaterial")
        .with("name", "concrete")
        .with("diffuse", 0xFF80_8080u32 as i64)
        .with("opacity", 1.0);

    let wall = GraphNode::new("wall1", "Objects.BuiltElements.Wall")
        .with("height", 3.0)
        .with(
            "parameters",
            GraphNode::new("params1", "Base").with("Fire Rating", "2hr"),
        )
        .with(
            "displayValue",
            vec![
                Value::from(mesh_node("wm1", Some(material.clone()))),
                Value::from(mesh_node("wm2", Some(material.clone()))),
            ],
        );

    let floor = GraphNode::new("floor1", "Objects.BuiltElements.Floor")
        .with("displayValue", vec![Value::from(mesh_node("fm1", Some(material)))]);

    GraphNode::new("root1", "Base")
        .with("@walls", vec![Value::from(wall)])
        .with("@floors", vec![Value::from(floor)])
}

#[test]
fn flatten_commit_graph() {
    let root = commit_graph();
    let mut cache = AppearanceCache::new();
    let batch = flatten_node(&root, &mut cache);

    // Root, wall, and floor each become a record; display meshes do not.
    assert_eq!(batch.len(), 3);

    let wall = batch.iter().find(|r| r.id == "wall1").unwrap();
    assert_eq!(wall.parent_id.as_deref(), Some("root1"));
    assert!(matches!(wall.geometry, Some(GeometryPayload::Aggregate(_))));
    assert_eq!(wall.get("height"), Some(&AttrValue::Real(3.0)));
    assert_eq!(
        wall.get("parameters.Fire\u{2423}Rating")
            .and_then(AttrValue::as_str),
        Some("2hr")
    );

    let floor = batch.iter().find(|r| r.id == "floor1").unwrap();
    assert!(matches!(floor.geometry, Some(GeometryPayload::Mesh(_))));

    // One shared material across three meshes registers once.
    assert_eq!(cache.len(), 1);
}

#[test]
fn records_reassemble_into_one_root() {
    let root = commit_graph();
    let mut cache = AppearanceCache::new();
    let batch = flatten_node(&root, &mut cache);

    let mut converted = Vec::new();
    for record in &batch {
        if record.geometry.is_some() {
            converted.push(record_to_node(record).expect("geometry record converts"));
        }
    }
    assert_eq!(converted.len(), 2);

    let assembled = assemble(converted, "features");
    let members = assembled.get("@features").and_then(Value::as_list).unwrap();
    assert_eq!(members.len(), 2);
    // The assembled root is a fresh node, not one of the inputs.
    assert_ne!(assembled.id(), "root1");
}

#[test]
fn flatten_json_dump_from_disk() {
    let dump = r#"{
        "id": "root9",
        "speckle_type": "Base",
        "@elements": [
            {
                "id": "beam1",
                "speckle_type": "Objects.BuiltElements.Beam",
                "length": 4.2,
                "displayValue": [{
                    "id": "bm1",
                    "speckle_type": "Objects.Geometry.Mesh",
                    "vertices": [0, 0, 0, 1, 0, 0, 0, 1, 0],
                    "faces": [3, 0, 1, 2],
                    "units": "mm"
                }]
            }
        ]
    }"#;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(dump.as_bytes()).unwrap();

    let text = std::fs::read_to_string(file.path()).unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    let root = graphflat::graph::node_from_json(&json).unwrap();

    let mut cache = AppearanceCache::new();
    let batch = flatten_node(&root, &mut cache);
    assert_eq!(batch.len(), 2);

    let beam = batch.iter().find(|r| r.id == "beam1").unwrap();
    assert_eq!(beam.get("length"), Some(&AttrValue::Real(4.2)));
    let Some(GeometryPayload::Mesh(mesh)) = &beam.geometry else {
        panic!("expected mesh payload");
    };
    // Millimeter units scale down to meters.
    assert!((mesh.vertices[1].x - 0.001).abs() < 1e-12);
}
