//! Appearance registry with per-run material deduplication.
//!
//! Many meshes in one graph reference the same render material by id.
//! The cache registers each distinct material at most once and hands the
//! same opaque handle back to every referencing mesh.
//!
//! One cache instance serves exactly one conversion run; sharing it
//! across runs would let stale handles collide with fresh ones.

use std::collections::HashMap;

use crate::codec::{rgba_from_argb, Rgba};
use crate::graph::{GraphNode, Value};

/// Opaque handle to a registered appearance.
pub type AppearanceRef = u32;

/// A registered appearance with its decoded source fields.
#[derive(Clone, Debug, PartialEq)]
pub struct Appearance {
    /// Optional material name.
    pub name: Option<String>,
    /// Opacity in [0,1].
    pub alpha: f64,
    /// Decoded diffuse color.
    pub diffuse: Rgba,
    /// Diffuse with channels halved.
    pub ambient: Rgba,
    /// Decoded emissive color.
    pub emissive: Rgba,
    /// Metalness mapped onto shininess.
    pub shininess: f64,
}

/// Run-scoped material-id to appearance-handle store.
#[derive(Debug, Default)]
pub struct AppearanceCache {
    appearances: Vec<Appearance>,
    by_material: HashMap<String, AppearanceRef>,
}

impl AppearanceCache {
    /// Create an empty cache for one conversion run.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a render-material node to an appearance handle.
    ///
    /// A material id seen before returns the cached handle with no side
    /// effects; a new id decodes and registers exactly one appearance.
    /// Materials without an id are not registrable and yield None.
    pub fn resolve(&mut self, material: &GraphNode) -> Option<AppearanceRef> {
        if material.id().is_empty() {
            return None;
        }
        if let Some(handle) = self.by_material.get(material.id()) {
            return Some(*handle);
        }

        let diffuse = rgba_from_argb(argb_property(material, "diffuse"));
        let emissive = rgba_from_argb(argb_property(material, "emissive"));

        let appearance = Appearance {
            name: material
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string),
            alpha: material
                .get("opacity")
                .and_then(Value::as_float)
                .unwrap_or(1.0),
            ambient: diffuse.halved(),
            diffuse,
            emissive,
            shininess: material
                .get("metalness")
                .and_then(Value::as_float)
                .unwrap_or(0.0),
        };

        let handle = self.appearances.len() as AppearanceRef;
        self.appearances.push(appearance);
        self.by_material.insert(material.id().to_string(), handle);
        Some(handle)
    }

    /// Look up a registered appearance by handle.
    pub fn get(&self, handle: AppearanceRef) -> Option<&Appearance> {
        self.appearances.get(handle as usize)
    }

    /// Number of registered appearances.
    pub fn len(&self) -> usize {
        self.appearances.len()
    }

    /// True if nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.appearances.is_empty()
    }
}

/// Read a packed ARGB integer property, tolerating the signed wire form.
fn argb_property(material: &GraphNode, name: &str) -> u32 {
    material
        .get(name)
        .and_then(Value::as_int)
        .map(|i| i as u32)
        .unwrap_or(0)
}
