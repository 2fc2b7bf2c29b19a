// src/executors/mod.rs

//! Reference analysis executor
//!
//! Queries the package databases left inside a materialized root: the dpkg
//! status file, the apk installed database, and the rpm database (through
//! the host `rpm` binary pointed at the root). This is the executor the CLI
//! wires in; the orchestration core only depends on the
//! [`AnalysisExecutor`](crate::analyze::AnalysisExecutor) trait, so other
//! executors can be substituted freely.

use crate::analyze::context::AnalysisContext;
use crate::analyze::executor::AnalysisExecutor;
use crate::commandlib::{PackageListing, ShellCommand};
use crate::error::{Error, Result};
use crate::image::Layer;
use crate::inventory::PackageRecord;
use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};

/// Executor that reads package databases out of the materialized root
#[derive(Debug, Default)]
pub struct RootQueryExecutor;

impl RootQueryExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl AnalysisExecutor for RootQueryExecutor {
    fn execute_with_binary(
        &mut self,
        layer: &Layer,
        binary: Option<&Path>,
        ctx: &AnalysisContext,
    ) -> Result<Vec<PackageRecord>> {
        // A resolved binary narrows which database to consult; the fallback
        // path probes all of them
        if let Some(binary) = binary {
            let name = binary
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            return match name.as_str() {
                "dpkg" | "dpkg-query" | "apt" | "apt-get" => {
                    query_dpkg_status(&ctx.host_path, layer.layer_index)
                }
                "rpm" | "yum" | "dnf" => query_rpm_database(&ctx.host_path, layer.layer_index),
                "apk" => query_apk_installed(&ctx.host_path, layer.layer_index),
                _ => {
                    debug!("no database query for binary '{}', probing all", name);
                    query_any(&ctx.host_path, layer.layer_index)
                }
            };
        }
        query_any(&ctx.host_path, layer.layer_index)
    }

    fn execute_with_listing(
        &mut self,
        layer: &Layer,
        command: &ShellCommand,
        listing: &PackageListing,
        ctx: &AnalysisContext,
    ) -> Result<Vec<PackageRecord>> {
        debug!(
            "layer {}: querying '{}' database for command '{}'",
            layer.layer_index, listing.format, command.name
        );
        match listing.format.as_str() {
            "deb" => query_dpkg_status(&ctx.host_path, layer.layer_index),
            "rpm" => query_rpm_database(&ctx.host_path, layer.layer_index),
            "apk" => query_apk_installed(&ctx.host_path, layer.layer_index),
            other => Err(Error::CommandLibrary(format!(
                "no executor for listing format '{}'",
                other
            ))),
        }
    }
}

/// Probe every known database, returning the union of what exists
fn query_any(rootfs: &Path, layer_index: usize) -> Result<Vec<PackageRecord>> {
    let mut records = Vec::new();
    records.extend(query_dpkg_status(rootfs, layer_index).unwrap_or_default());
    records.extend(query_apk_installed(rootfs, layer_index).unwrap_or_default());
    records.extend(query_rpm_database(rootfs, layer_index).unwrap_or_default());
    Ok(records)
}

/// Parse `var/lib/dpkg/status` inside the root.
///
/// Only packages whose Status stanza ends in "installed" are reported.
pub fn query_dpkg_status(rootfs: &Path, layer_index: usize) -> Result<Vec<PackageRecord>> {
    let status_path = rootfs.join("var/lib/dpkg/status");
    if !status_path.exists() {
        return Ok(Vec::new());
    }
    debug!("reading dpkg status from {}", status_path.display());
    let data = std::fs::read_to_string(&status_path)?;

    let mut records = Vec::new();
    for stanza in data.split("\n\n") {
        let mut name = None;
        let mut version = None;
        let mut arch = None;
        let mut installed = false;
        for line in stanza.lines() {
            if let Some(value) = line.strip_prefix("Package: ") {
                name = Some(value.trim().to_string());
            } else if let Some(value) = line.strip_prefix("Version: ") {
                version = Some(value.trim().to_string());
            } else if let Some(value) = line.strip_prefix("Architecture: ") {
                arch = Some(value.trim().to_string());
            } else if let Some(value) = line.strip_prefix("Status: ") {
                installed = value.trim().ends_with("installed")
                    && !value.contains("not-installed");
            }
        }
        if let (Some(name), Some(version), true) = (name, version, installed) {
            let mut record = PackageRecord::new(name, version, layer_index);
            record.arch = arch;
            record.pkg_format = Some("deb".to_string());
            records.push(record);
        }
    }
    debug!("dpkg status: {} installed packages", records.len());
    Ok(records)
}

/// Parse `lib/apk/db/installed` inside the root
pub fn query_apk_installed(rootfs: &Path, layer_index: usize) -> Result<Vec<PackageRecord>> {
    let db_path = rootfs.join("lib/apk/db/installed");
    if !db_path.exists() {
        return Ok(Vec::new());
    }
    debug!("reading apk database from {}", db_path.display());
    let data = std::fs::read_to_string(&db_path)?;

    let mut records = Vec::new();
    for stanza in data.split("\n\n") {
        let mut name = None;
        let mut version = None;
        let mut arch = None;
        for line in stanza.lines() {
            if let Some(value) = line.strip_prefix("P:") {
                name = Some(value.trim().to_string());
            } else if let Some(value) = line.strip_prefix("V:") {
                version = Some(value.trim().to_string());
            } else if let Some(value) = line.strip_prefix("A:") {
                arch = Some(value.trim().to_string());
            }
        }
        if let (Some(name), Some(version)) = (name, version) {
            let mut record = PackageRecord::new(name, version, layer_index);
            record.arch = arch;
            record.pkg_format = Some("apk".to_string());
            records.push(record);
        }
    }
    debug!("apk database: {} installed packages", records.len());
    Ok(records)
}

/// Query the rpm database inside the root via the host `rpm` binary
pub fn query_rpm_database(rootfs: &Path, layer_index: usize) -> Result<Vec<PackageRecord>> {
    // rpmdb location moved over the years; check both
    let has_db = rootfs.join("var/lib/rpm").exists() || rootfs.join("usr/lib/sysimage/rpm").exists();
    if !has_db {
        return Ok(Vec::new());
    }

    let output = Command::new("rpm")
        .arg("-qa")
        .arg("--root")
        .arg(rootfs)
        .arg("--qf")
        .arg("%{NAME}|%{VERSION}-%{RELEASE}|%{ARCH}\n")
        .output();
    let output = match output {
        Ok(output) => output,
        Err(e) => {
            warn!("rpm database present but 'rpm' not runnable on host: {}", e);
            return Ok(Vec::new());
        }
    };
    if !output.status.success() {
        warn!(
            "rpm query failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        return Ok(Vec::new());
    }

    let mut records = Vec::new();
    for line in String::from_utf8_lossy(&output.stdout).lines() {
        let mut parts = line.splitn(3, '|');
        let (Some(name), Some(version)) = (parts.next(), parts.next()) else {
            continue;
        };
        let mut record = PackageRecord::new(name, version, layer_index);
        record.arch = parts.next().map(str::to_string);
        record.pkg_format = Some("rpm".to_string());
        records.push(record);
    }
    debug!("rpm database: {} installed packages", records.len());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const DPKG_STATUS: &str = "\
Package: curl
Status: install ok installed
Version: 8.5.0-2
Architecture: amd64

Package: removed-pkg
Status: deinstall ok config-files
Version: 1.0
Architecture: amd64

Package: libssl3
Status: install ok installed
Version: 3.1.4-2
Architecture: amd64
";

    const APK_INSTALLED: &str = "\
P:musl
V:1.2.4-r2
A:x86_64

P:busybox
V:1.36.1-r15
A:x86_64
";

    #[test]
    fn test_query_dpkg_status_filters_removed() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("var/lib/dpkg")).unwrap();
        fs::write(root.path().join("var/lib/dpkg/status"), DPKG_STATUS).unwrap();

        let records = query_dpkg_status(root.path(), 2).unwrap();
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["curl", "libssl3"]);
        assert_eq!(records[0].version, "8.5.0-2");
        assert_eq!(records[0].arch.as_deref(), Some("amd64"));
        assert_eq!(records[0].pkg_format.as_deref(), Some("deb"));
        assert_eq!(records[0].origin_layer, 2);
    }

    #[test]
    fn test_query_dpkg_status_absent_database() {
        let root = tempfile::tempdir().unwrap();
        assert!(query_dpkg_status(root.path(), 0).unwrap().is_empty());
    }

    #[test]
    fn test_query_apk_installed() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("lib/apk/db")).unwrap();
        fs::write(root.path().join("lib/apk/db/installed"), APK_INSTALLED).unwrap();

        let records = query_apk_installed(root.path(), 0).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "musl");
        assert_eq!(records[0].version, "1.2.4-r2");
        assert_eq!(records[1].pkg_format.as_deref(), Some("apk"));
    }

    #[test]
    fn test_query_rpm_without_database_is_empty() {
        let root = tempfile::tempdir().unwrap();
        assert!(query_rpm_database(root.path(), 0).unwrap().is_empty());
    }
}
