// src/rootfs/materialize.rs

//! Layer materialization strategies
//!
//! Two mutually exclusive ways of reconstructing the filesystem state through
//! a layer: manually applying diffs (with whiteout deletion replay) into the
//! persistent merged directory, or requesting a read-only union mount from a
//! storage driver. The strategy is chosen once at configuration time and
//! carried as a typed value through the run.

use crate::error::{Error, Result};
use crate::image::Image;
use crate::rootfs::driver::StorageDriver;
use crate::rootfs::{MergedRoot, WorkArea, copy_tree, dir_is_empty, extract_tar, remove_path};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// How cumulative filesystem state is materialized for analysis
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsStrategy {
    /// Apply diffs into the persistent merged directory (the default)
    ManualApply,
    /// Transient per-layer union mount via the named storage driver
    DriverMount(String),
}

impl FsStrategy {
    /// Map the configuration surface's driver selector onto a strategy.
    /// The literal "default" means manual diff-apply; any other name selects
    /// a union mount via that driver.
    pub fn from_driver_name(name: &str) -> Self {
        if name == "default" {
            FsStrategy::ManualApply
        } else {
            FsStrategy::DriverMount(name.to_string())
        }
    }

    pub fn is_manual(&self) -> bool {
        matches!(self, FsStrategy::ManualApply)
    }
}

/// Advance the merged directory to include `top_layer`'s diff.
///
/// Whiteout markers are resolved against the cumulative state of all prior
/// layers, so deletions run before the layer's own additions are copied in.
/// A path deleted and recreated within the same layer therefore ends up
/// present. Failures are fatal; a partially merged directory is not rolled
/// back and must not be resumed.
pub fn apply_layer(
    merged: &MergedRoot,
    work: &WorkArea,
    image: &Image,
    top_layer: usize,
) -> Result<PathBuf> {
    let layer = &image.layers[top_layer];
    let staging = work.untar_dir(top_layer);
    extract_tar(&layer.tar_path, &staging)?;

    for record in &layer.files {
        let Some(target_name) = record.whiteout_target() else {
            continue;
        };
        let parent = Path::new(&record.path).parent().unwrap_or(Path::new(""));
        let delete_target = merged.path().join(parent).join(target_name);
        if delete_target.exists() || delete_target.symlink_metadata().is_ok() {
            debug!(
                "layer {}: whiteout removes {}",
                top_layer,
                delete_target.display()
            );
            remove_path(&delete_target)
                .map_err(|e| Error::filesystem(top_layer, "whiteout delete", e))?;
        } else {
            // Whiteout for a path absent from the merged tree is a no-op
            debug!(
                "layer {}: whiteout target {} not present, skipping",
                top_layer,
                delete_target.display()
            );
        }
        // Drop the marker itself so it is never copied forward
        let marker = staging.join(&record.path);
        if marker.symlink_metadata().is_ok() {
            remove_path(&marker)
                .map_err(|e| Error::filesystem(top_layer, "whiteout marker removal", e))?;
        }
    }

    if !dir_is_empty(&staging)? {
        copy_tree(&staging, merged.path())
            .map_err(|e| Error::filesystem(top_layer, "layer copy", e))?;
    } else {
        debug!("layer {}: nothing to copy after whiteout processing", top_layer);
    }
    Ok(merged.path().to_path_buf())
}

/// Union-mount all layer diffs up to and including `top_layer`
pub fn mount_layers(
    image: &Image,
    top_layer: usize,
    driver: &mut dyn StorageDriver,
) -> Result<PathBuf> {
    let tars: Vec<PathBuf> = image.layers[..=top_layer]
        .iter()
        .map(|l| l.tar_path.clone())
        .collect();
    driver.mount_union(&tars)
}

/// Materialize the filesystem state through `top_layer` using the configured
/// strategy, returning the host path of the materialized root
pub fn prepare_layers(
    image: &Image,
    top_layer: usize,
    strategy: &FsStrategy,
    merged: &MergedRoot,
    work: &WorkArea,
    driver: &mut dyn StorageDriver,
) -> Result<PathBuf> {
    match strategy {
        FsStrategy::ManualApply => apply_layer(merged, work, image, top_layer),
        FsStrategy::DriverMount(name) => {
            if driver.name() != name {
                warn!(
                    "configured driver '{}' served by '{}' implementation",
                    name,
                    driver.name()
                );
            }
            mount_layers(image, top_layer, driver)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_from_driver_name() {
        assert_eq!(FsStrategy::from_driver_name("default"), FsStrategy::ManualApply);
        assert_eq!(
            FsStrategy::from_driver_name("overlay"),
            FsStrategy::DriverMount("overlay".to_string())
        );
        assert!(FsStrategy::from_driver_name("default").is_manual());
        assert!(!FsStrategy::from_driver_name("overlay").is_manual());
    }
}
