// src/analyze/mod.rs

//! Layer analysis orchestration
//!
//! Walks the layers of an image strictly in order, reconstructing cumulative
//! filesystem state as it goes and folding each layer's package records into
//! the master inventory. Per layer: propagate the working directory, skip
//! empty layers with a warning notice, consult the cache gate, run fresh
//! analysis on a miss, re-apply the diff under the manual strategy (the cache
//! only ever skips analysis, never filesystem reconstruction), then fold.
//!
//! Everything here is sequential by design: layer N's merged state and
//! context are preconditions for layer N+1, and the merged directory is a
//! single shared mutable resource with no isolation between layers.

pub mod cache;
pub mod context;
pub mod executor;
pub mod shell;

pub use cache::{LayerCache, MemoryCache, load_from_cache, should_reuse};
pub use context::AnalysisContext;
pub use executor::AnalysisExecutor;

use crate::commandlib::{CommandLibrary, Resolution, split_created_by};
use crate::error::Result;
use crate::image::{Image, Notice, Severity};
use crate::inventory::{MasterList, PackageRecord};
use crate::rootfs::{FsStrategy, MergedRoot, StorageDriver, WorkArea, apply_layer, prepare_layers};
use tracing::{debug, info, warn};

/// Notice recorded for layers that contribute no file changes
pub const EMPTY_LAYER_NOTICE: &str = "Empty layer. Nothing to analyze.";

/// Configuration surface consumed by the orchestrator
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Filesystem materialization strategy, fixed for the whole run
    pub strategy: FsStrategy,
    /// Force fresh analysis on every layer regardless of cache state
    pub redo: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            strategy: FsStrategy::ManualApply,
            redo: false,
        }
    }
}

/// External collaborators the orchestrator drives
pub struct Collaborators<'a> {
    pub library: &'a dyn CommandLibrary,
    pub executor: &'a mut dyn AnalysisExecutor,
    pub cache: &'a mut dyn LayerCache,
    pub driver: &'a mut dyn StorageDriver,
}

/// Analyze all layers of an image, folding package records into `master`.
///
/// Layer 0 is materialized manually up front (regardless of the configured
/// strategy) so the run starts from a usable merged root; remaining layers
/// are visited strictly in increasing index order. On success the master
/// list and the per-layer notice trails are fully populated; a fatal
/// filesystem error aborts the whole run identifying the layer and
/// operation that failed.
pub fn analyze_layers(
    image: &mut Image,
    ctx: &mut AnalysisContext,
    master: &mut MasterList,
    opts: &AnalysisOptions,
    collab: &mut Collaborators<'_>,
    work: &WorkArea,
    merged: &MergedRoot,
) -> Result<()> {
    if image.layers.is_empty() {
        return Ok(());
    }

    bootstrap_first_layer(image, ctx, opts, collab, work, merged)?;
    master.fold_layer(&image.layers[0]);

    // Environment variables are an image-wide property, computed once
    ctx.envs = image.env_vars();

    let mut curr = 1;
    while curr < image.layers.len() {
        if let Some(workdir) = image.layers[curr].workdir.clone() {
            ctx.workdir = Some(workdir);
        }
        let origin = image.layers[curr].origin_label();

        if image.layers[curr].is_empty() {
            warn!("layer {}: {}", curr, EMPTY_LAYER_NOTICE);
            image.layers[curr]
                .origins
                .add_notice(&origin, Notice::new(EMPTY_LAYER_NOTICE, Severity::Warning));
            curr += 1;
            continue;
        }

        if !cache::load_from_cache(&*collab.cache, &mut image.layers[curr], opts.redo) {
            fresh_analysis(image, curr, ctx, opts, collab, work, merged)?;
        }

        // The merged directory must track every layer even when analysis was
        // cached, or later layers would resolve whiteouts against stale state
        if opts.strategy.is_manual() {
            apply_layer(merged, work, image, curr)?;
        }

        master.fold_layer(&image.layers[curr]);
        curr += 1;
    }
    Ok(())
}

/// Materialize and analyze layer 0 before entering the main loop.
///
/// The first layer is always applied with the manual strategy, even when a
/// union-mount driver is configured, so the persistent merged directory is
/// guaranteed a non-empty starting root. Driver-mounted runs still include
/// layer 0 in their mount sets; the two materializations coexist.
fn bootstrap_first_layer(
    image: &mut Image,
    ctx: &mut AnalysisContext,
    opts: &AnalysisOptions,
    collab: &mut Collaborators<'_>,
    work: &WorkArea,
    merged: &MergedRoot,
) -> Result<()> {
    if merged.is_empty()? {
        apply_layer(merged, work, image, 0)?;
    }
    ctx.host_path = merged.path().to_path_buf();
    if let Some(workdir) = image.layers[0].workdir.clone() {
        ctx.workdir = Some(workdir);
    }
    if ctx.shell.is_none() {
        ctx.shell = shell::find_shell(merged.path());
    }

    if cache::load_from_cache(&*collab.cache, &mut image.layers[0], opts.redo) {
        return Ok(());
    }

    let origin = image.layers[0].origin_label();
    let created_by = image.layers[0]
        .created_by
        .clone()
        .unwrap_or_else(|| "unknown".to_string());
    image.layers[0].origins.add_notice(
        &origin,
        Notice::new(format!("Layer created by: {}", created_by), Severity::Info),
    );

    // The base layer has no install commands to replay; go straight to
    // known base-state extraction. A failed extraction must not be cached,
    // or every later run would reuse the empty result instead of retrying.
    match collab.executor.execute_with_binary(&image.layers[0], None, ctx) {
        Ok(records) => {
            info!("layer 0: base extraction found {} packages", records.len());
            image.layers[0].packages = records.clone();
            collab.cache.store(&image.layers[0].diff_id, &records);
        }
        Err(e) => {
            image.layers[0]
                .origins
                .add_notice(&origin, Notice::new(e.to_string(), Severity::Error));
        }
    }
    Ok(())
}

/// Run a full fresh analysis for one layer: record provenance, detect a
/// shell if still missing, materialize state through this layer, resolve the
/// commands that created it, and dispatch each to the executor.
fn fresh_analysis(
    image: &mut Image,
    curr: usize,
    ctx: &mut AnalysisContext,
    opts: &AnalysisOptions,
    collab: &mut Collaborators<'_>,
    work: &WorkArea,
    merged: &MergedRoot,
) -> Result<()> {
    let origin = image.layers[curr].origin_label();
    let created_by = image.layers[curr]
        .created_by
        .clone()
        .unwrap_or_else(|| "unknown".to_string());
    image.layers[curr].origins.add_notice(
        &origin,
        Notice::new(format!("Layer created by: {}", created_by), Severity::Info),
    );

    // Shell detection is best-effort and re-attempted until one is found
    if ctx.shell.is_none() {
        ctx.shell = shell::find_shell_in_layer(&image.layers[curr]);
    }

    let target = prepare_layers(
        image,
        curr,
        &opts.strategy,
        merged,
        work,
        &mut *collab.driver,
    )?;
    ctx.host_path = target;
    if ctx.shell.is_none() {
        ctx.shell = shell::find_shell(&ctx.host_path);
        if ctx.shell.is_none() {
            warn!("layer {}: no shell found in image filesystem yet", curr);
        }
    }

    let commands = split_created_by(&created_by);
    let mut collected: Vec<PackageRecord> = Vec::new();
    let mut notices: Vec<Notice> = Vec::new();
    let mut dispatch_failed = false;

    if commands.is_empty() {
        // No commands could be extracted from the layer metadata; fall back
        // to extracting what we know about the base state
        debug!("layer {}: no commands in metadata, using base extraction", curr);
        match collab
            .executor
            .execute_with_binary(&image.layers[curr], None, ctx)
        {
            Ok(records) => collected.extend(records),
            Err(e) => {
                dispatch_failed = true;
                notices.push(Notice::new(e.to_string(), Severity::Error));
            }
        }
    } else {
        for command in &commands {
            match collab.library.lookup(&command.name) {
                Resolution::DirectBinary(binary) => {
                    match collab.executor.execute_with_binary(
                        &image.layers[curr],
                        Some(binary.as_path()),
                        ctx,
                    ) {
                        Ok(records) => collected.extend(records),
                        Err(e) => {
                            dispatch_failed = true;
                            notices.push(Notice::new(e.to_string(), Severity::Error));
                        }
                    }
                }
                Resolution::StructuredListing(listing) => {
                    match collab.executor.execute_with_listing(
                        &image.layers[curr],
                        command,
                        &listing,
                        ctx,
                    ) {
                        Ok(records) => collected.extend(records),
                        Err(e) => {
                            dispatch_failed = true;
                            notices.push(Notice::new(e.to_string(), Severity::Error));
                        }
                    }
                }
                Resolution::Unknown => {
                    notices.push(Notice::new(
                        format!("No known package retrieval method for '{}'", command.name),
                        Severity::Info,
                    ));
                    match collab.executor.execute_with_binary(
                        &image.layers[curr],
                        None,
                        ctx,
                    ) {
                        Ok(records) => collected.extend(records),
                        Err(e) => {
                            dispatch_failed = true;
                            notices.push(Notice::new(e.to_string(), Severity::Error));
                        }
                    }
                }
            }
        }
    }

    for notice in notices {
        image.layers[curr].origins.add_notice(&origin, notice);
    }
    image.layers[curr].packages = collected;
    // A run with failed dispatches is incomplete; caching it would make the
    // failure permanent on every later run instead of retried
    if dispatch_failed {
        debug!("layer {}: executor failures, result not cached", curr);
    } else {
        let records = image.layers[curr].packages.clone();
        collab.cache.store(&image.layers[curr].diff_id, &records);
    }

    // Driver-backed mounts are transient per layer, unlike the persistent
    // merged directory
    if !opts.strategy.is_manual() {
        collab.driver.unmount()?;
    }
    Ok(())
}
