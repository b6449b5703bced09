//! Graph flattening engine.
//!
//! Walks an object graph of unknown shape and depth and emits one
//! [`FlatRecord`] per linked node. Per property the engine decides a
//! disposition: inline the scalar, materialize display geometry, fold an
//! object value's descendants into the owning record, or spawn a new
//! linked record for sequence elements that are nodes in their own right.
//!
//! Traversal uses an explicit work-list rather than node-level recursion,
//! so stack depth stays bounded and revisited ids can be detected. Graphs
//! are acyclic by convention; a repeated id is reported and skipped
//! instead of looping.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::appearance::AppearanceCache;
use crate::geom::{materialize_display, materialize_node};
use crate::graph::{GraphNode, Value};
use crate::record::{AttrValue, FlatRecord};

/// Property-name markers that carry display geometry.
const DISPLAY_MARKERS: [&str; 2] = ["displayValue", "displayMesh"];

/// Property-name marker for render materials.
const MATERIAL_MARKER: &str = "renderMaterial";

/// Scheduled traversal of one node.
struct Job<'a> {
    node: &'a GraphNode,
    parent_id: Option<String>,
}

/// Flattens graph nodes into a batch of linked flat records.
///
/// Borrows the run's appearance cache; one flattener serves one batch.
pub struct Flattener<'c> {
    cache: &'c mut AppearanceCache,
    batch: Vec<FlatRecord>,
    visited: HashSet<String>,
}

impl<'c> Flattener<'c> {
    /// Create a flattener over the run's appearance cache.
    pub fn new(cache: &'c mut AppearanceCache) -> Self {
        Self {
            cache,
            batch: Vec::new(),
            visited: HashSet::new(),
        }
    }

    /// Records emitted so far.
    pub fn batch(&self) -> &[FlatRecord] {
        &self.batch
    }

    /// Consume the flattener and take the emitted batch.
    pub fn into_batch(self) -> Vec<FlatRecord> {
        self.batch
    }

    /// Flatten a node and everything reachable from it.
    ///
    /// Emits one record for the node itself plus records for every linked
    /// child discovered along the way. Consumers resolve linkage by id,
    /// not by emission order.
    pub fn flatten<'a>(&mut self, root: &'a GraphNode) {
        let mut work: Vec<Job<'a>> = vec![Job {
            node: root,
            parent_id: None,
        }];

        while let Some(job) = work.pop() {
            if !self.visited.insert(job.node.id().to_string()) {
                warn!(id = job.node.id(), "node id revisited, skipping (cycle or shared reference)");
                continue;
            }

            let mut record = FlatRecord::new(
                job.node.type_name(),
                job.node.id(),
                job.parent_id.clone(),
            );
            let mut inline_chain = vec![job.node.id().to_string()];
            for name in job.node.member_names() {
                self.process_property(name, job.node, &mut record, "", &mut inline_chain, &mut work);
            }
            self.batch.push(record);
        }
    }

    /// Decide the disposition of one property and apply it.
    ///
    /// May set attributes on `record`, attach its geometry payload, append
    /// child records to the batch, or schedule nodes on the work-list.
    fn process_property<'a>(
        &mut self,
        name: &str,
        owner: &'a GraphNode,
        record: &mut FlatRecord,
        prefix: &str,
        inline_chain: &mut Vec<String>,
        work: &mut Vec<Job<'a>>,
    ) {
        let label = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}.{name}")
        };

        // Declared-but-absent properties are simply omitted.
        let Some(value) = owner.get(name) else { return };

        // Display geometry takes precedence over every other disposition;
        // display data never doubles as a scalar attribute.
        if DISPLAY_MARKERS.iter().any(|m| name.contains(m))
            || owner.kind().is_display_geometry()
        {
            if record.geometry.is_none() {
                record.geometry = if owner.kind().is_display_geometry() {
                    materialize_node(owner, None, self.cache)
                } else {
                    materialize_display(value, owner.get_node(MATERIAL_MARKER), self.cache)
                };
            }
            return;
        }

        match value {
            // Object-valued properties fold their descendants' scalars
            // into the owning record instead of spawning a new one.
            Value::Node(child) => {
                if inline_chain.iter().any(|id| id == child.id()) {
                    warn!(id = child.id(), %label, "inline cycle, aborting fold");
                    return;
                }
                inline_chain.push(child.id().to_string());
                for member in child.member_names() {
                    self.process_property(member, child, record, &label, inline_chain, work);
                }
                inline_chain.pop();
            }

            Value::List(items) => {
                if label.contains("displayMesh") || label.contains(MATERIAL_MARKER) {
                    // Already handled by the display rule at a higher level.
                    return;
                }
                for element in items {
                    match element {
                        Value::Null => {}
                        Value::Node(node) if node.kind().is_display_geometry() => {
                            self.child_record(node, owner.id());
                            record.append_list(&label, node.id());
                        }
                        Value::Node(node) => {
                            record.append_list(&label, node.id());
                            work.push(Job {
                                node,
                                parent_id: Some(owner.id().to_string()),
                            });
                        }
                        Value::List(_) => {
                            debug!(%label, "nested list element skipped");
                        }
                        scalar => match AttrValue::from_scalar(scalar) {
                            Some(attr) => record.append_list(&label, attr),
                            None => {
                                warn!(%label, "unable to convert list element");
                                record.append_list(&label, "...");
                            }
                        },
                    }
                }
            }

            scalar => {
                if DISPLAY_MARKERS.iter().any(|m| label.contains(m))
                    || label.contains(MATERIAL_MARKER)
                {
                    return;
                }
                match AttrValue::from_scalar(scalar) {
                    Some(attr) => record.set(&label, attr),
                    None => {
                        // Record is still emitted with a placeholder.
                        warn!(%label, "unable to convert attribute value");
                        record.set(&label, "...");
                    }
                }
            }
        }
    }

    /// Emit a minimal linked record for a geometry element in a sequence.
    ///
    /// Only identity and shape matter to the parent link; the element's
    /// other properties are not walked.
    fn child_record(&mut self, node: &GraphNode, parent_id: &str) {
        let mut record =
            FlatRecord::new(node.type_name(), node.id(), Some(parent_id.to_string()));
        if node.kind().is_display_geometry() {
            record.geometry = materialize_node(node, None, self.cache);
        }
        self.batch.push(record);
    }
}

/// Flatten one root node with a fresh batch over the given cache.
pub fn flatten_node(root: &GraphNode, cache: &mut AppearanceCache) -> Vec<FlatRecord> {
    let mut flattener = Flattener::new(cache);
    flattener.flatten(root);
    flattener.into_batch()
}
