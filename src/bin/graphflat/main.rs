//! graphflat CLI - flatten and inspect object-graph JSON dumps.

use std::env;
use std::fs;
use std::process::ExitCode;

use graphflat::appearance::AppearanceCache;
use graphflat::flatten::flatten_node;
use graphflat::geom::GeometryPayload;
use graphflat::graph::{node_from_json, GraphNode, Value};
use graphflat::record::{AttrValue, FlatRecord};
use graphflat::Result;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    let result = match args.as_slice() {
        ["flatten", file] => cmd_flatten(file, false),
        ["flatten", file, "--json"] => cmd_flatten(file, true),
        ["info", file] => cmd_info(file),
        _ => {
            print_help();
            return ExitCode::FAILURE;
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn print_help() {
    println!("graphflat - object graph to flat record conversion");
    println!();
    println!("Usage:");
    println!("  graphflat-cli flatten <file.json> [--json]   flatten a graph dump");
    println!("  graphflat-cli info <file.json>               summarize a graph dump");
}

fn load_graph(file: &str) -> Result<GraphNode> {
    let text = fs::read_to_string(file)?;
    let json: serde_json::Value = serde_json::from_str(&text)?;
    node_from_json(&json)
}

fn cmd_flatten(file: &str, as_json: bool) -> Result<()> {
    let root = load_graph(file)?;
    let mut cache = AppearanceCache::new();
    let batch = flatten_node(&root, &mut cache);

    if as_json {
        let rows: Vec<serde_json::Value> = batch.iter().map(record_to_json).collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        for record in &batch {
            let parent = record.parent_id.as_deref().unwrap_or("-");
            let geometry = record
                .geometry
                .as_ref()
                .map(describe_geometry)
                .unwrap_or_else(|| "none".to_string());
            println!(
                "{:<40} id={} parent={} attrs={} geometry={}",
                record.type_name,
                record.id,
                parent,
                record.num_attrs(),
                geometry
            );
        }
        println!();
        println!(
            "{} records, {} appearances registered",
            batch.len(),
            cache.len()
        );
    }
    Ok(())
}

fn cmd_info(file: &str) -> Result<()> {
    let root = load_graph(file)?;
    println!("root      {} ({})", root.id(), root.type_name());
    println!("members   {}", root.num_members());

    let mut kinds: Vec<(String, usize)> = Vec::new();
    count_kinds(&root, &mut kinds);
    kinds.sort_by(|a, b| b.1.cmp(&a.1));
    for (type_name, count) in kinds {
        println!("{count:>8}  {type_name}");
    }
    Ok(())
}

/// Tally node type names across the whole graph.
fn count_kinds(node: &GraphNode, kinds: &mut Vec<(String, usize)>) {
    match kinds.iter_mut().find(|(name, _)| name == node.type_name()) {
        Some((_, count)) => *count += 1,
        None => kinds.push((node.type_name().to_string(), 1)),
    }
    for name in node.member_names() {
        if let Some(value) = node.get(name) {
            count_kinds_in_value(value, kinds);
        }
    }
}

fn count_kinds_in_value(value: &Value, kinds: &mut Vec<(String, usize)>) {
    match value {
        Value::Node(child) => count_kinds(child, kinds),
        Value::List(items) => {
            for item in items {
                count_kinds_in_value(item, kinds);
            }
        }
        _ => {}
    }
}

fn describe_geometry(payload: &GeometryPayload) -> String {
    match payload {
        GeometryPayload::Mesh(mesh) => {
            format!("mesh({}v/{}f)", mesh.vertices.len(), mesh.faces.len())
        }
        GeometryPayload::Path(path) => format!("path({}pts)", path.points.len()),
        GeometryPayload::Aggregate(parts) => format!("aggregate({} parts)", parts.len()),
    }
}

fn record_to_json(record: &FlatRecord) -> serde_json::Value {
    let mut obj = serde_json::Map::new();
    obj.insert("type_name".into(), record.type_name.clone().into());
    obj.insert("id".into(), record.id.clone().into());
    if let Some(parent) = &record.parent_id {
        obj.insert("parent_id".into(), parent.clone().into());
    }
    for (name, value) in record.attrs() {
        obj.insert(name.to_string(), attr_to_json(value));
    }
    if let Some(geometry) = &record.geometry {
        obj.insert("geometry".into(), describe_geometry(geometry).into());
    }
    serde_json::Value::Object(obj)
}

fn attr_to_json(value: &AttrValue) -> serde_json::Value {
    match value {
        AttrValue::Null(_) => serde_json::Value::Null,
        AttrValue::Str(s) => s.clone().into(),
        AttrValue::Int(i) => (*i).into(),
        AttrValue::Bool(b) => (*b).into(),
        AttrValue::Real(f) => (*f).into(),
        AttrValue::List(items) => {
            serde_json::Value::Array(items.iter().map(attr_to_json).collect())
        }
    }
}
