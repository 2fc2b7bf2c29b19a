// src/analyze/shell.rs

//! Best-effort shell detection inside a materialized root
//!
//! Snippet execution needs a shell from the image itself. Detection is
//! re-attempted on each layer until a shell is found, then cached in the
//! analysis context for the rest of the run.

use crate::image::Layer;
use std::path::Path;

/// Shell locations probed inside the image, in preference order
pub const SHELL_CANDIDATES: &[&str] = &[
    "/bin/sh",
    "/bin/bash",
    "/bin/dash",
    "/usr/bin/sh",
    "/usr/bin/bash",
    "/bin/busybox",
];

/// Probe a materialized root for a known shell, returning its in-image path.
///
/// Checks symlink presence rather than resolving targets: inside an extracted
/// root, `/bin/sh -> dash` is a dangling symlink from the host's point of
/// view but a perfectly good shell from the image's.
pub fn find_shell(rootfs: &Path) -> Option<String> {
    for candidate in SHELL_CANDIDATES {
        let host_path = rootfs.join(candidate.trim_start_matches('/'));
        if host_path.symlink_metadata().is_ok() {
            return Some((*candidate).to_string());
        }
    }
    None
}

/// Check a layer's own file change records for a shell, without touching the
/// filesystem
pub fn find_shell_in_layer(layer: &Layer) -> Option<String> {
    for candidate in SHELL_CANDIDATES {
        let relative = candidate.trim_start_matches('/');
        if layer
            .files
            .iter()
            .any(|f| !f.is_whiteout && f.path == relative)
        {
            return Some((*candidate).to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::FileChangeRecord;

    #[test]
    fn test_find_shell_prefers_bin_sh() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("bin")).unwrap();
        std::fs::write(root.path().join("bin/bash"), "").unwrap();
        std::fs::write(root.path().join("bin/sh"), "").unwrap();
        assert_eq!(find_shell(root.path()), Some("/bin/sh".to_string()));
    }

    #[test]
    fn test_find_shell_accepts_dangling_symlink() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("bin")).unwrap();
        std::os::unix::fs::symlink("dash", root.path().join("bin/sh")).unwrap();
        assert_eq!(find_shell(root.path()), Some("/bin/sh".to_string()));
    }

    #[test]
    fn test_find_shell_none_when_absent() {
        let root = tempfile::tempdir().unwrap();
        assert_eq!(find_shell(root.path()), None);
    }

    #[test]
    fn test_find_shell_in_layer_records() {
        let mut layer = Layer::new(0, "l0.tar", "d0");
        layer.files.push(FileChangeRecord::new("bin/sh"));
        assert_eq!(find_shell_in_layer(&layer), Some("/bin/sh".to_string()));

        let empty = Layer::new(1, "l1.tar", "d1");
        assert_eq!(find_shell_in_layer(&empty), None);
    }
}
