// src/lib.rs

//! Strata — layer-by-layer package inventory for container images
//!
//! Reconstructs the cumulative filesystem state of a layered container image
//! one layer at a time and determines which software packages each layer
//! introduced, by resolving the commands that produced the layer into
//! package-manager-specific retrieval strategies. Nothing is ever executed
//! from the image itself.
//!
//! # Architecture
//!
//! - `image`: layers, file change records, notice trails
//! - `rootfs`: merged-root work area, manual diff-apply with whiteout
//!   replay, union-mount storage drivers
//! - `commandlib`: command knowledge base and `created_by` resolution
//! - `analyze`: cache gate, analysis context, the layer orchestrator
//! - `executors`: reference executor reading package databases out of the
//!   materialized root
//! - `inventory`: the ordered master package list

pub mod analyze;
pub mod commandlib;
mod error;
pub mod executors;
pub mod image;
pub mod inventory;
pub mod rootfs;

pub use analyze::{AnalysisContext, AnalysisOptions, Collaborators, analyze_layers};
pub use commandlib::{CommandLibrary, PackageListing, Resolution, TomlCommandLibrary};
pub use error::{Error, Result};
pub use image::{FileChangeRecord, Image, Layer, Notice, Origins, Severity};
pub use inventory::{MasterList, PackageRecord};
pub use rootfs::{FsStrategy, MergedRoot, StorageDriver, WorkArea};
