// src/image/mod.rs

//! Container image data model
//!
//! An [`Image`] is an ordered sequence of [`Layer`]s, each backed by a diff
//! tar archive and described by the file changes it introduces. Layers are
//! constructed by the image-loading step before analysis runs and are
//! read-mostly afterwards; the analysis core only appends notices, flips the
//! cache-reuse flag, and attaches package records.

pub mod layout;
pub mod notice;

pub use layout::load_layout;
pub use notice::{Notice, NoticeOrigin, Origins, Severity};

use crate::inventory::PackageRecord;
use std::path::{Path, PathBuf};

/// Marker prefix signaling that a path was deleted in this layer
pub const WHITEOUT_PREFIX: &str = ".wh.";

/// One file added, modified, or removed by a layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChangeRecord {
    /// Base name of the entry (last path component)
    pub name: String,
    /// Layer-relative path of the entry
    pub path: String,
    /// Whether this entry is a whiteout marker
    pub is_whiteout: bool,
}

impl FileChangeRecord {
    /// Build a record from a layer-relative entry path, detecting whiteouts
    /// from the base name
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let name = Path::new(&path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let is_whiteout = name.starts_with(WHITEOUT_PREFIX);
        Self {
            name,
            path,
            is_whiteout,
        }
    }

    /// Name of the path deleted by this whiteout marker, if it is one
    ///
    /// Whiteouts only make sense relative to the cumulative state before the
    /// owning layer is applied; resolving the target against anything else is
    /// a caller bug.
    pub fn whiteout_target(&self) -> Option<&str> {
        if self.is_whiteout {
            self.name.strip_prefix(WHITEOUT_PREFIX)
        } else {
            None
        }
    }
}

/// One incremental filesystem diff in an image
#[derive(Debug, Clone)]
pub struct Layer {
    /// Position of this layer in the image (0-based, application order)
    pub layer_index: usize,
    /// Backing diff archive (tar, optionally gzipped)
    pub tar_path: PathBuf,
    /// Stable content identity of the diff, used as the cache key
    pub diff_id: String,
    /// Files added/modified/removed by this layer
    pub files: Vec<FileChangeRecord>,
    /// Command string recorded as having produced this layer
    pub created_by: Option<String>,
    /// Working directory declared by this layer, if any
    pub workdir: Option<String>,
    /// Environment variable effects declared by this layer (KEY=value)
    pub env: Vec<String>,
    /// Diagnostic/provenance trail for this layer
    pub origins: Origins,
    /// Whether this layer's packages were loaded from a cached result
    pub from_cache: bool,
    /// Package records attributed to this layer
    pub packages: Vec<PackageRecord>,
}

impl Layer {
    pub fn new(layer_index: usize, tar_path: impl Into<PathBuf>, diff_id: impl Into<String>) -> Self {
        Self {
            layer_index,
            tar_path: tar_path.into(),
            diff_id: diff_id.into(),
            files: Vec::new(),
            created_by: None,
            workdir: None,
            env: Vec::new(),
            origins: Origins::new(),
            from_cache: false,
            packages: Vec::new(),
        }
    }

    /// Origin label under which this layer's notices are recorded
    pub fn origin_label(&self) -> String {
        format!("Layer {}", self.layer_index)
    }

    /// An empty layer contributes no file changes and is skipped by analysis
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// An ordered sequence of layers composing one container image
#[derive(Debug, Clone, Default)]
pub struct Image {
    pub layers: Vec<Layer>,
}

impl Image {
    pub fn new(layers: Vec<Layer>) -> Self {
        Self { layers }
    }

    /// Union of all layers' declared environment variables, in declaration
    /// order, with later layers overriding earlier values for the same key.
    ///
    /// Computed once per image analysis run, not per layer.
    pub fn env_vars(&self) -> Vec<String> {
        let mut vars: Vec<String> = Vec::new();
        for layer in &self.layers {
            for decl in &layer.env {
                let key = decl.split('=').next().unwrap_or(decl);
                match vars
                    .iter_mut()
                    .find(|v| v.split('=').next() == Some(key))
                {
                    Some(existing) => *existing = decl.clone(),
                    None => vars.push(decl.clone()),
                }
            }
        }
        vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_change_record_plain_file() {
        let record = FileChangeRecord::new("etc/foo.conf");
        assert_eq!(record.name, "foo.conf");
        assert!(!record.is_whiteout);
        assert_eq!(record.whiteout_target(), None);
    }

    #[test]
    fn test_file_change_record_whiteout() {
        let record = FileChangeRecord::new("etc/.wh.foo.conf");
        assert_eq!(record.name, ".wh.foo.conf");
        assert!(record.is_whiteout);
        assert_eq!(record.whiteout_target(), Some("foo.conf"));
    }

    #[test]
    fn test_layer_origin_label() {
        let layer = Layer::new(3, "/tmp/layer3.tar.gz", "sha256-test");
        assert_eq!(layer.origin_label(), "Layer 3");
    }

    #[test]
    fn test_env_vars_union_with_override() {
        let mut layer0 = Layer::new(0, "l0.tar", "d0");
        layer0.env = vec!["PATH=/usr/bin".to_string(), "LANG=C".to_string()];
        let mut layer1 = Layer::new(1, "l1.tar", "d1");
        layer1.env = vec!["PATH=/usr/local/bin:/usr/bin".to_string()];

        let image = Image::new(vec![layer0, layer1]);
        let envs = image.env_vars();
        assert_eq!(
            envs,
            vec![
                "PATH=/usr/local/bin:/usr/bin".to_string(),
                "LANG=C".to_string()
            ]
        );
    }

    #[test]
    fn test_empty_layer_detection() {
        let mut layer = Layer::new(1, "l1.tar", "d1");
        assert!(layer.is_empty());
        layer.files.push(FileChangeRecord::new("bin/sh"));
        assert!(!layer.is_empty());
    }
}
