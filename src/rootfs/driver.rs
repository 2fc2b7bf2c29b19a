// src/rootfs/driver.rs

//! Storage driver abstraction for union mounts
//!
//! A [`StorageDriver`] presents the ordered layer diffs as one read-only view
//! without physically merging them. Mounts are transient: the orchestrator
//! requests one per analyzed layer and releases it once analysis of that
//! layer finishes. The shipped [`OverlayDriver`] uses the kernel overlay
//! filesystem and therefore needs CAP_SYS_ADMIN; tests substitute their own
//! implementations.

use crate::error::{Error, Result};
use crate::rootfs::extract_tar;
use nix::mount::{MsFlags, mount, umount};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use tracing::{debug, warn};

/// Read-only union-mount capability over ordered layer diffs
pub trait StorageDriver {
    /// Driver name as it appears in the configuration surface
    fn name(&self) -> &str;

    /// Mount the given diff archives (bottom layer first) as one union view
    /// and return the mount point
    fn mount_union(&mut self, layer_tars: &[PathBuf]) -> Result<PathBuf>;

    /// Release the current mount, if any
    fn unmount(&mut self) -> Result<()>;
}

/// Union mounts via the kernel overlay filesystem
///
/// Each layer tar is extracted into its own lower directory, then overlayed
/// read-only with the topmost layer first in `lowerdir`. No upper directory
/// is supplied, so the view cannot be written through.
#[derive(Debug, Default)]
pub struct OverlayDriver {
    // Keeps lower dirs and the mount point alive while mounted
    work: Option<TempDir>,
    mount_point: Option<PathBuf>,
}

impl OverlayDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn driver_error(reason: impl Into<String>) -> Error {
        Error::Driver {
            driver: "overlay".to_string(),
            reason: reason.into(),
        }
    }
}

impl StorageDriver for OverlayDriver {
    fn name(&self) -> &str {
        "overlay"
    }

    fn mount_union(&mut self, layer_tars: &[PathBuf]) -> Result<PathBuf> {
        if layer_tars.is_empty() {
            return Err(Self::driver_error("no layers to mount"));
        }
        self.unmount()?;

        let work = tempfile::tempdir()?;
        let mut lowers: Vec<PathBuf> = Vec::with_capacity(layer_tars.len());
        for (index, tar_path) in layer_tars.iter().enumerate() {
            let lower = work.path().join(format!("layer-{}", index));
            extract_tar(tar_path, &lower)?;
            lowers.push(lower);
        }

        // overlayfs stacks lowerdir entries topmost first
        let lowerdir = lowers
            .iter()
            .rev()
            .map(|p| p.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(":");
        let target = work.path().join("mnt");
        fs::create_dir_all(&target)?;

        let data = format!("lowerdir={}", lowerdir);
        mount(
            Some("overlay"),
            &target,
            Some("overlay"),
            MsFlags::MS_RDONLY,
            Some(data.as_str()),
        )
        .map_err(|e| Self::driver_error(format!("mount failed: {}", e)))?;

        debug!(
            "overlay-mounted {} layers at {}",
            layer_tars.len(),
            target.display()
        );
        self.mount_point = Some(target.clone());
        self.work = Some(work);
        Ok(target)
    }

    fn unmount(&mut self) -> Result<()> {
        if let Some(target) = self.mount_point.take() {
            umount(&target).map_err(|e| Self::driver_error(format!("unmount failed: {}", e)))?;
            debug!("unmounted {}", target.display());
        }
        self.work = None;
        Ok(())
    }
}

impl Drop for OverlayDriver {
    fn drop(&mut self) {
        if self.mount_point.is_some() {
            if let Err(e) = self.unmount() {
                warn!("leaking overlay mount on drop: {}", e);
            }
        }
    }
}

/// Placeholder driver for manual-apply runs, which never union-mount.
/// Any mount request is a configuration bug.
#[derive(Debug, Default)]
pub struct NullDriver;

impl StorageDriver for NullDriver {
    fn name(&self) -> &str {
        "none"
    }

    fn mount_union(&mut self, _layer_tars: &[PathBuf]) -> Result<PathBuf> {
        Err(Error::Driver {
            driver: "none".to_string(),
            reason: "manual diff-apply runs do not union-mount".to_string(),
        })
    }

    fn unmount(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_driver_rejects_mounts() {
        let mut driver = NullDriver;
        let result = driver.mount_union(&[PathBuf::from("/tmp/layer.tar")]);
        assert!(matches!(result, Err(Error::Driver { .. })));
        assert!(driver.unmount().is_ok());
    }

    #[test]
    fn test_overlay_driver_requires_layers() {
        let mut driver = OverlayDriver::new();
        let result = driver.mount_union(&[]);
        assert!(matches!(result, Err(Error::Driver { .. })));
    }

    #[test]
    fn test_unmount_without_mount_is_ok() {
        let mut driver = OverlayDriver::new();
        assert!(driver.unmount().is_ok());
    }
}
