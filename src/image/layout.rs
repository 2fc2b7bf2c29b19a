// src/image/layout.rs

//! On-disk image layout loader
//!
//! The analysis core consumes an [`Image`](super::Image) value from an
//! external image loader. For the CLI, that loader is a simple directory
//! layout: an `image.json` manifest next to the layer diff tars it names.
//! This is deliberately not an image-format parser; producing the layout from
//! a registry or docker-save tar is someone else's job.
//!
//! ```json
//! {
//!   "layers": [
//!     { "tar": "layer0.tar.gz", "created_by": "ADD rootfs.tar /" },
//!     { "tar": "layer1.tar.gz", "created_by": "/bin/sh -c apt-get install -y curl" }
//!   ]
//! }
//! ```
//!
//! Per-layer `diff_id` is taken from the manifest when present, otherwise
//! computed as the sha256 of the diff tar. File change records are scanned
//! from the tar entry headers.

use crate::error::{Error, Result};
use crate::image::{FileChangeRecord, Image, Layer};
use crate::rootfs::open_diff_archive;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct LayoutDoc {
    layers: Vec<LayerDoc>,
}

#[derive(Debug, Deserialize)]
struct LayerDoc {
    tar: String,
    #[serde(default)]
    created_by: Option<String>,
    #[serde(default)]
    workdir: Option<String>,
    #[serde(default)]
    env: Vec<String>,
    #[serde(default)]
    diff_id: Option<String>,
}

/// Load an image from a layout directory containing `image.json`
pub fn load_layout(dir: &Path) -> Result<Image> {
    let manifest = dir.join("image.json");
    let data = std::fs::read_to_string(&manifest).map_err(|e| {
        Error::ImageLayout(format!("cannot read {}: {}", manifest.display(), e))
    })?;
    let doc: LayoutDoc = serde_json::from_str(&data)
        .map_err(|e| Error::ImageLayout(format!("malformed image.json: {}", e)))?;

    if doc.layers.is_empty() {
        return Err(Error::ImageLayout("image has no layers".to_string()));
    }

    let mut layers = Vec::with_capacity(doc.layers.len());
    for (index, entry) in doc.layers.into_iter().enumerate() {
        let tar_path = dir.join(&entry.tar);
        if !tar_path.exists() {
            return Err(Error::ImageLayout(format!(
                "layer {} archive not found: {}",
                index,
                tar_path.display()
            )));
        }
        let diff_id = match entry.diff_id {
            Some(id) => id,
            None => sha256_file(&tar_path)?,
        };
        let mut layer = Layer::new(index, &tar_path, diff_id);
        layer.created_by = entry.created_by;
        layer.workdir = entry.workdir;
        layer.env = entry.env;
        layer.files = scan_tar_entries(&tar_path)?;
        debug!(
            "loaded layer {}: {} file changes from {}",
            index,
            layer.files.len(),
            tar_path.display()
        );
        layers.push(layer);
    }
    Ok(Image::new(layers))
}

/// List the file change records of a layer by reading its tar entry headers
pub fn scan_tar_entries(tar_path: &Path) -> Result<Vec<FileChangeRecord>> {
    let mut archive = open_diff_archive(tar_path)?;
    let entries = archive.entries().map_err(|e| Error::Extraction {
        path: tar_path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut records = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::Extraction {
            path: tar_path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let path = entry.path().map_err(|e| Error::Extraction {
            path: tar_path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let path = path.to_string_lossy().trim_end_matches('/').to_string();
        // Directory entries like "./" normalize to empty and carry no change
        if path.is_empty() || path == "." {
            continue;
        }
        records.push(FileChangeRecord::new(path));
    }
    Ok(records)
}

/// Compute the sha256 digest of a file, hex-encoded
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
