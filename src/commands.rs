// src/commands.rs
//! Command handlers for the strata CLI

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;
use strata::analyze::{AnalysisOptions, Collaborators, MemoryCache, analyze_layers};
use strata::commandlib::split_created_by;
use strata::executors::RootQueryExecutor;
use strata::image::NoticeOrigin;
use strata::rootfs::{FsStrategy, NullDriver, OverlayDriver, StorageDriver, WorkArea};
use strata::{AnalysisContext, CommandLibrary, Image, MasterList, PackageRecord, TomlCommandLibrary};
use tracing::info;

/// JSON report handed to external tooling
#[derive(Serialize)]
struct Report<'a> {
    packages: &'a [PackageRecord],
    layers: Vec<LayerReport<'a>>,
}

#[derive(Serialize)]
struct LayerReport<'a> {
    layer_index: usize,
    created_by: Option<&'a str>,
    from_cache: bool,
    package_count: usize,
    notices: Vec<&'a NoticeOrigin>,
}

fn load_library(command_lib: Option<&Path>) -> Result<TomlCommandLibrary> {
    match command_lib {
        Some(path) => TomlCommandLibrary::from_path(path)
            .with_context(|| format!("loading command library {}", path.display())),
        None => Ok(TomlCommandLibrary::builtin()),
    }
}

pub fn cmd_analyze(
    layout: &Path,
    driver: &str,
    redo: bool,
    work_dir: Option<&Path>,
    command_lib: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let mut image = strata::image::load_layout(layout)
        .with_context(|| format!("loading image layout {}", layout.display()))?;
    info!("analyzing image with {} layers", image.layers.len());

    let library = load_library(command_lib)?;
    let mut executor = RootQueryExecutor::new();
    let mut cache = MemoryCache::new();
    let strategy = FsStrategy::from_driver_name(driver);

    // The merged root lives for exactly this run; an explicit work dir keeps
    // it around afterwards for inspection
    let work = match work_dir {
        Some(path) => WorkArea::at(path)?,
        None => WorkArea::new()?,
    };
    let merged = work.merged_root()?;

    let mut overlay;
    let mut null_driver;
    let driver_impl: &mut dyn StorageDriver = if strategy.is_manual() {
        null_driver = NullDriver;
        &mut null_driver
    } else {
        overlay = OverlayDriver::new();
        &mut overlay
    };

    let mut ctx = AnalysisContext::new();
    let mut master = MasterList::new();
    let opts = AnalysisOptions { strategy, redo };
    let mut collab = Collaborators {
        library: &library,
        executor: &mut executor,
        cache: &mut cache,
        driver: driver_impl,
    };

    analyze_layers(
        &mut image,
        &mut ctx,
        &mut master,
        &opts,
        &mut collab,
        &work,
        &merged,
    )?;

    let report = build_report(&image, &master);
    let json = serde_json::to_string_pretty(&report)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            println!(
                "Wrote inventory of {} packages to {}",
                master.len(),
                path.display()
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn build_report<'a>(image: &'a Image, master: &'a MasterList) -> Report<'a> {
    let layers = image
        .layers
        .iter()
        .map(|layer| LayerReport {
            layer_index: layer.layer_index,
            created_by: layer.created_by.as_deref(),
            from_cache: layer.from_cache,
            package_count: layer.packages.len(),
            notices: layer.origins.iter().collect(),
        })
        .collect();
    Report {
        packages: master.records(),
        layers,
    }
}

pub fn cmd_commands(layout: &Path, command_lib: Option<&Path>) -> Result<()> {
    let image = strata::image::load_layout(layout)
        .with_context(|| format!("loading image layout {}", layout.display()))?;
    let library = load_library(command_lib)?;

    for layer in &image.layers {
        let created_by = layer.created_by.as_deref().unwrap_or("<none>");
        println!("Layer {}: {}", layer.layer_index, created_by);
        let commands = split_created_by(layer.created_by.as_deref().unwrap_or(""));
        if commands.is_empty() {
            println!("  (no commands; base-state extraction applies)");
            continue;
        }
        for command in commands {
            let route = match library.lookup(&command.name) {
                strata::Resolution::DirectBinary(path) => format!("binary {}", path.display()),
                strata::Resolution::StructuredListing(listing) => {
                    format!("listing ({})", listing.format)
                }
                strata::Resolution::Unknown => "unknown".to_string(),
            };
            println!("  {} {} -> {}", command.name, command.args.join(" "), route);
        }
    }
    Ok(())
}
