// src/rootfs/mod.rs

//! Filesystem work area for layer materialization
//!
//! All merging happens under a single [`WorkArea`]: a scratch root holding
//! the persistent merged directory plus one isolated staging directory per
//! layer. The merged directory is wrapped in an owned [`MergedRoot`] handle
//! created once per image-analysis run and passed by reference into every
//! materialization call, so its lifecycle is explicit rather than implied by
//! filesystem side effects.

pub mod driver;
pub mod materialize;

pub use driver::{NullDriver, OverlayDriver, StorageDriver};
pub use materialize::{FsStrategy, apply_layer, mount_layers, prepare_layers};

use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tar::Archive;
use tempfile::TempDir;
use tracing::debug;
use walkdir::WalkDir;

/// Scratch space for one image-analysis run
#[derive(Debug)]
pub struct WorkArea {
    // Owns the temp dir when no explicit work dir was configured
    _temp: Option<TempDir>,
    root: PathBuf,
}

impl WorkArea {
    /// Create a work area backed by a fresh temporary directory
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir()?;
        let root = temp.path().to_path_buf();
        Ok(Self {
            _temp: Some(temp),
            root,
        })
    }

    /// Create a work area at an explicit path, creating it if needed.
    /// Contents persist after the run for inspection.
    pub fn at(path: &Path) -> Result<Self> {
        fs::create_dir_all(path)?;
        Ok(Self {
            _temp: None,
            root: path.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create (or reuse) the persistent merged directory for this run
    pub fn merged_root(&self) -> Result<MergedRoot> {
        let path = self.root.join("merged");
        fs::create_dir_all(&path)?;
        Ok(MergedRoot { path })
    }

    /// Isolated staging directory for one layer's extracted contents
    pub fn untar_dir(&self, layer_index: usize) -> PathBuf {
        self.root.join("untar").join(format!("layer-{}", layer_index))
    }
}

/// Owned handle over the persistent merged directory
///
/// The merged directory emulates union-mount semantics by physically applying
/// layer diffs in order. It is owned exclusively by the single orchestration
/// flow for the duration of one image's analysis.
#[derive(Debug)]
pub struct MergedRoot {
    path: PathBuf,
}

impl MergedRoot {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the merged directory holds no entries yet
    pub fn is_empty(&self) -> Result<bool> {
        Ok(fs::read_dir(&self.path)?.next().is_none())
    }
}

/// Open a layer diff archive, transparently decoding gzip.
///
/// Detection is by magic bytes rather than extension since diff tars arrive
/// under arbitrary names (`<digest>/layer.tar`, `blobs/sha256/<digest>`, ...).
pub fn open_diff_archive(path: &Path) -> Result<Archive<Box<dyn Read>>> {
    let mut file = File::open(path).map_err(|e| Error::Extraction {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let mut magic = [0u8; 2];
    let n = file.read(&mut magic).map_err(|e| Error::Extraction {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    // Reopen so the decoder sees the stream from the start
    let file = File::open(path).map_err(|e| Error::Extraction {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let reader: Box<dyn Read> = if n == 2 && magic == [0x1F, 0x8B] {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    Ok(Archive::new(reader))
}

/// Extract a layer diff archive into `dest`, replacing any prior contents
pub fn extract_tar(tar_path: &Path, dest: &Path) -> Result<()> {
    if dest.exists() {
        fs::remove_dir_all(dest)?;
    }
    fs::create_dir_all(dest)?;
    let mut archive = open_diff_archive(tar_path)?;
    archive.set_preserve_permissions(true);
    archive.unpack(dest).map_err(|e| Error::Extraction {
        path: tar_path.to_path_buf(),
        reason: e.to_string(),
    })?;
    debug!("extracted {} into {}", tar_path.display(), dest.display());
    Ok(())
}

/// Whether a directory currently holds any entries
pub fn dir_is_empty(path: &Path) -> Result<bool> {
    Ok(fs::read_dir(path)?.next().is_none())
}

/// Remove a path from the merged tree: recursively for directories,
/// as a single file otherwise. Symlinks are removed, never followed.
pub fn remove_path(path: &Path) -> std::io::Result<()> {
    let meta = fs::symlink_metadata(path)?;
    if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Recursively copy `src` over `dst`, overwriting on conflict.
///
/// Regular files, directories, and symlinks are carried over; a conflicting
/// destination entry of a different kind is removed first so the layer's
/// version wins.
pub fn copy_tree(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(|e| {
            std::io::Error::other(format!("walk failed under {}: {}", src.display(), e))
        })?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .expect("walkdir yields paths under its root");
        if rel.as_os_str().is_empty() {
            continue;
        }
        let target = dst.join(rel);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            if let Ok(meta) = fs::symlink_metadata(&target) {
                if !meta.is_dir() {
                    fs::remove_file(&target)?;
                    fs::create_dir_all(&target)?;
                }
            } else {
                fs::create_dir_all(&target)?;
            }
        } else if file_type.is_symlink() {
            let link = fs::read_link(entry.path())?;
            if fs::symlink_metadata(&target).is_ok() {
                remove_path(&target)?;
            }
            std::os::unix::fs::symlink(&link, &target)?;
        } else {
            if let Ok(meta) = fs::symlink_metadata(&target) {
                if meta.is_dir() {
                    fs::remove_dir_all(&target)?;
                } else {
                    fs::remove_file(&target)?;
                }
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
