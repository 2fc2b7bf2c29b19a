// src/analyze/cache.rs

//! Cache gate for per-layer analysis reuse
//!
//! The gate decides whether a layer's previously recorded analysis results
//! may be reused. Storage format and fingerprinting belong to the cache
//! store behind the [`LayerCache`] trait; the gate only consumes a lookup
//! keyed by the layer's diff id and the caller's `redo` override. A cache
//! hit skips fresh analysis, never filesystem reconstruction.

use crate::image::Layer;
use crate::inventory::PackageRecord;
use std::collections::HashMap;
use tracing::debug;

/// Cache store capability consumed by the gate
pub trait LayerCache {
    /// Whether a cached result exists for this layer identity
    fn has_cached_result(&self, diff_id: &str) -> bool;

    /// Retrieve the cached package records for this layer identity
    fn load(&self, diff_id: &str) -> Option<Vec<PackageRecord>>;

    /// Record a fresh analysis result for later reuse
    fn store(&mut self, diff_id: &str, records: &[PackageRecord]);
}

/// Whether a layer's cached result may be reused.
///
/// False whenever `redo` is set, false when no cached entry exists, true
/// only when an entry exists and `redo` is unset.
pub fn should_reuse(cache: &dyn LayerCache, layer: &Layer, redo: bool) -> bool {
    !redo && cache.has_cached_result(&layer.diff_id)
}

/// Try to satisfy a layer's analysis from the cache.
///
/// On a hit the layer's package records are populated from the cached entry
/// and its cache-reuse flag is set. A corrupt entry (present but unloadable)
/// is treated exactly like a miss.
pub fn load_from_cache(cache: &dyn LayerCache, layer: &mut Layer, redo: bool) -> bool {
    if !should_reuse(cache, layer, redo) {
        return false;
    }
    match cache.load(&layer.diff_id) {
        Some(records) => {
            debug!(
                "layer {}: reusing cached result ({} packages)",
                layer.layer_index,
                records.len()
            );
            layer.packages = records;
            layer.from_cache = true;
            true
        }
        None => false,
    }
}

/// In-memory cache store, used by tests and for within-run reuse
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: HashMap<String, Vec<PackageRecord>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LayerCache for MemoryCache {
    fn has_cached_result(&self, diff_id: &str) -> bool {
        self.entries.contains_key(diff_id)
    }

    fn load(&self, diff_id: &str) -> Option<Vec<PackageRecord>> {
        self.entries.get(diff_id).cloned()
    }

    fn store(&mut self, diff_id: &str, records: &[PackageRecord]) {
        self.entries.insert(diff_id.to_string(), records.to_vec());
    }
}
