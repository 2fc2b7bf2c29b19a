// tests/common/mod.rs

//! Shared fixtures and mock collaborators for integration tests.

use flate2::Compression;
use flate2::write::GzEncoder;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use strata::analyze::{AnalysisContext, AnalysisExecutor};
use strata::commandlib::{PackageListing, ShellCommand};
use strata::image::layout::{scan_tar_entries, sha256_file};
use strata::rootfs::StorageDriver;
use strata::{Error, Layer, PackageRecord, Result};

/// An entry for a fixture layer tar: a path and its file contents.
/// Paths ending in '/' become directory entries.
pub type TarEntry<'a> = (&'a str, &'a str);

/// Build a gzipped layer diff tar at `dir/name` with the given entries.
pub fn build_layer_tar(dir: &Path, name: &str, entries: &[TarEntry]) -> PathBuf {
    let tar_path = dir.join(name);
    let file = File::create(&tar_path).unwrap();
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for (path, content) in entries {
        let mut header = tar::Header::new_gnu();
        if let Some(dir_path) = path.strip_suffix('/') {
            header.set_entry_type(tar::EntryType::Directory);
            header.set_size(0);
            header.set_mode(0o755);
            builder
                .append_data(&mut header, format!("{}/", dir_path), std::io::empty())
                .unwrap();
        } else {
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            builder
                .append_data(&mut header, *path, content.as_bytes())
                .unwrap();
        }
    }

    let encoder = builder.into_inner().unwrap();
    encoder.finish().unwrap();
    tar_path
}

/// Build a [`Layer`] from a fixture tar, scanning its file change records
/// the way the layout loader does.
pub fn layer_from_tar(layer_index: usize, tar_path: &Path) -> Layer {
    let diff_id = sha256_file(tar_path).unwrap();
    let mut layer = Layer::new(layer_index, tar_path, diff_id);
    layer.files = scan_tar_entries(tar_path).unwrap();
    layer
}

/// Executor returning canned records and recording every dispatch.
#[derive(Debug, Default)]
pub struct MockExecutor {
    /// Returned by the binary/base-state path
    pub base_records: Vec<PackageRecord>,
    /// Returned by the listing path, keyed by listing format
    pub listing_records: HashMap<String, Vec<PackageRecord>>,
    /// Binary paths seen by `execute_with_binary` (None = base fallback)
    pub binary_calls: Vec<Option<PathBuf>>,
    /// (command name, listing format) pairs seen by `execute_with_listing`
    pub listing_calls: Vec<(String, String)>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn stamp(records: &[PackageRecord], layer_index: usize) -> Vec<PackageRecord> {
        records
            .iter()
            .cloned()
            .map(|mut r| {
                r.origin_layer = layer_index;
                r
            })
            .collect()
    }
}

impl AnalysisExecutor for MockExecutor {
    fn execute_with_binary(
        &mut self,
        layer: &Layer,
        binary: Option<&Path>,
        _ctx: &AnalysisContext,
    ) -> Result<Vec<PackageRecord>> {
        self.binary_calls.push(binary.map(Path::to_path_buf));
        Ok(Self::stamp(&self.base_records, layer.layer_index))
    }

    fn execute_with_listing(
        &mut self,
        layer: &Layer,
        command: &ShellCommand,
        listing: &PackageListing,
        _ctx: &AnalysisContext,
    ) -> Result<Vec<PackageRecord>> {
        self.listing_calls
            .push((command.name.clone(), listing.format.clone()));
        let records = self
            .listing_records
            .get(&listing.format)
            .cloned()
            .unwrap_or_default();
        Ok(Self::stamp(&records, layer.layer_index))
    }
}

/// Executor whose every dispatch fails, for exercising the recoverable
/// error path.
#[derive(Debug, Default)]
pub struct FailingExecutor;

impl AnalysisExecutor for FailingExecutor {
    fn execute_with_binary(
        &mut self,
        _layer: &Layer,
        _binary: Option<&Path>,
        _ctx: &AnalysisContext,
    ) -> Result<Vec<PackageRecord>> {
        Err(Error::Io(std::io::Error::other("package database unreadable")))
    }

    fn execute_with_listing(
        &mut self,
        _layer: &Layer,
        _command: &ShellCommand,
        _listing: &PackageListing,
        _ctx: &AnalysisContext,
    ) -> Result<Vec<PackageRecord>> {
        Err(Error::Io(std::io::Error::other("package database unreadable")))
    }
}

/// Driver that pretends to mount by pointing at a fixed directory.
#[derive(Debug)]
pub struct MockDriver {
    pub mount_point: PathBuf,
    pub mount_calls: Vec<usize>,
    pub unmount_calls: usize,
}

impl MockDriver {
    pub fn new(mount_point: impl Into<PathBuf>) -> Self {
        Self {
            mount_point: mount_point.into(),
            mount_calls: Vec::new(),
            unmount_calls: 0,
        }
    }
}

impl StorageDriver for MockDriver {
    fn name(&self) -> &str {
        "mock"
    }

    fn mount_union(&mut self, layer_tars: &[PathBuf]) -> Result<PathBuf> {
        self.mount_calls.push(layer_tars.len());
        Ok(self.mount_point.clone())
    }

    fn unmount(&mut self) -> Result<()> {
        self.unmount_calls += 1;
        Ok(())
    }
}
