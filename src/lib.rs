//! # graphflat
//!
//! Bidirectional conversion between a remote, dynamically-typed object
//! graph (nodes with named properties, embedded display geometry, and
//! globally unique ids) and a flat stream of typed feature records.
//!
//! ## Modules
//!
//! - [`util`] - Error types
//! - [`codec`] - Scalar conversions (packed colors, linear units)
//! - [`graph`] - Source object-graph model (nodes, dynamic values)
//! - [`record`] - Flat record model (typed attributes, rejection)
//! - [`appearance`] - Run-scoped material deduplication
//! - [`geom`] - Geometry materialization (mesh, path, aggregate)
//! - [`flatten`] - Graph flattening engine
//! - [`assemble`] - Record-to-graph assembly (outbound)
//! - [`pipeline`] - Host lifecycle adapters and remote collaborator traits
//!
//! ## Example
//!
//! ```
//! use graphflat::prelude::*;
//!
//! let wall = GraphNode::new("w1", "Objects.BuiltElements.Wall")
//!     .with("height", 3.0);
//!
//! let mut cache = AppearanceCache::new();
//! let batch = flatten_node(&wall, &mut cache);
//! assert_eq!(batch.len(), 1);
//! ```

pub mod util;
pub mod codec;
pub mod graph;
pub mod record;
pub mod appearance;
pub mod geom;
pub mod flatten;
pub mod assemble;
pub mod pipeline;

// Re-export commonly used types
pub use util::{Error, Result};
pub use graph::{GraphNode, Value};
pub use record::FlatRecord;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{Error, Result};
    pub use crate::appearance::AppearanceCache;
    pub use crate::assemble::{assemble, record_to_node};
    pub use crate::flatten::{flatten_node, Flattener};
    pub use crate::geom::GeometryPayload;
    pub use crate::graph::{GraphNode, NodeKind, Value};
    pub use crate::pipeline::{GraphSource, GraphTransport, RecordStream, TargetRef};
    pub use crate::record::{AttrType, AttrValue, FlatRecord};
}
