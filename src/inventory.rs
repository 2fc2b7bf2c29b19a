// src/inventory.rs

//! Package records and the master inventory
//!
//! The master list is the sole output artifact of a run: an ordered package
//! inventory accumulated across all layers of one image. Folding happens in
//! strict layer order and keeps the first-seen record for a duplicate
//! (name, version) identity.

use crate::image::Layer;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One software package discovered in the image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    pub name: String,
    pub version: String,
    /// Target architecture, when the package database reports one
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub arch: Option<String>,
    /// Package database the record came from ("deb", "rpm", "apk", ...)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pkg_format: Option<String>,
    /// Index of the layer that introduced this record
    pub origin_layer: usize,
}

impl PackageRecord {
    pub fn new(name: impl Into<String>, version: impl Into<String>, origin_layer: usize) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            arch: None,
            pkg_format: None,
            origin_layer,
        }
    }

    /// Identity under which duplicates are collapsed in the master list
    fn identity(&self) -> (String, String) {
        (self.name.clone(), self.version.clone())
    }
}

/// Ordered package inventory for one image
#[derive(Debug, Default)]
pub struct MasterList {
    records: Vec<PackageRecord>,
    seen: HashSet<(String, String)>,
}

impl MasterList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record unless its identity was already folded in.
    /// Returns whether the record was added.
    pub fn insert(&mut self, record: PackageRecord) -> bool {
        if self.seen.insert(record.identity()) {
            self.records.push(record);
            true
        } else {
            false
        }
    }

    /// Fold a layer's package records into the inventory, preserving the
    /// order they were recorded in
    pub fn fold_layer(&mut self, layer: &Layer) {
        for record in &layer.packages {
            self.insert(record.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PackageRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[PackageRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
