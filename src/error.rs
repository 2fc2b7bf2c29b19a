// src/error.rs

//! Error types for the strata library
//!
//! Filesystem failures during layer materialization are fatal for the whole
//! image analysis: once the merged root is inconsistent, no downstream layer
//! can be trusted. Those variants carry the layer index and the operation
//! that failed so callers can report exactly where the run died.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for strata operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while materializing and analyzing image layers
#[derive(Debug, Error)]
pub enum Error {
    /// Fatal filesystem failure while materializing a layer
    #[error("filesystem operation '{op}' failed for layer {layer}: {source}")]
    Filesystem {
        layer: usize,
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// Failed to extract a layer diff archive
    #[error("failed to extract archive '{path}': {reason}")]
    Extraction { path: PathBuf, reason: String },

    /// Storage driver failure (mount/unmount)
    #[error("storage driver '{driver}' error: {reason}")]
    Driver { driver: String, reason: String },

    /// The image layout on disk is malformed or incomplete
    #[error("invalid image layout: {0}")]
    ImageLayout(String),

    /// The command knowledge base could not be loaded
    #[error("command library error: {0}")]
    CommandLibrary(String),

    /// I/O error outside of layer materialization
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Wrap an I/O error as a fatal materialization failure for a layer
    pub fn filesystem(layer: usize, op: &'static str, source: std::io::Error) -> Self {
        Self::Filesystem { layer, op, source }
    }
}
