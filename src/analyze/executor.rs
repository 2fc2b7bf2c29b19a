// src/analyze/executor.rs

//! Analysis executor capability
//!
//! Executors turn a materialized filesystem into package records. The
//! orchestrator decides when and with what arguments to invoke them; how a
//! package manager is actually queried lives behind this trait (see
//! `crate::executors` for the shipped implementation and the test suite for
//! mocks). Executor failures are recoverable: the orchestrator records them
//! as error notices on the layer and moves on.

use crate::commandlib::{PackageListing, ShellCommand};
use crate::error::Result;
use crate::image::Layer;
use crate::inventory::PackageRecord;
use crate::analyze::context::AnalysisContext;
use std::path::Path;

/// Package-listing capability invoked per layer
pub trait AnalysisExecutor {
    /// Generic extraction path. `binary` is the package-manager binary the
    /// command resolved to, or `None` when falling back to known base-state
    /// extraction because no commands could be resolved.
    fn execute_with_binary(
        &mut self,
        layer: &Layer,
        binary: Option<&Path>,
        ctx: &AnalysisContext,
    ) -> Result<Vec<PackageRecord>>;

    /// Structured extraction path: retrieve package information for one
    /// resolved command using the listing's snippets.
    fn execute_with_listing(
        &mut self,
        layer: &Layer,
        command: &ShellCommand,
        listing: &PackageListing,
        ctx: &AnalysisContext,
    ) -> Result<Vec<PackageRecord>>;
}
