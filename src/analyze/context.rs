// src/analyze/context.rs

//! Per-run analysis context
//!
//! One [`AnalysisContext`] is created per image-analysis run, threaded
//! explicitly through the orchestrator call chain, and discarded at the end.
//! Sticky fields (shell, workdir) are overwritten in place only when a new
//! value is discovered. Transient per-command values (resolved binary,
//! resolved listing) are deliberately not fields here; they live as return
//! values of the resolution step so stale values cannot leak into the next
//! command's resolution.

use std::path::PathBuf;

/// Mutable state threaded through the analysis of one image
#[derive(Debug, Default)]
pub struct AnalysisContext {
    /// Shell binary found inside the image; persists across layers once set
    pub shell: Option<String>,
    /// Host path of the currently materialized filesystem root
    pub host_path: PathBuf,
    /// Environment variables for the whole image, computed once per run
    pub envs: Vec<String>,
    /// Working directory declared by the most recent layer that set one
    pub workdir: Option<String>,
}

impl AnalysisContext {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_starts_unset() {
        let ctx = AnalysisContext::new();
        assert!(ctx.shell.is_none());
        assert!(ctx.workdir.is_none());
        assert!(ctx.envs.is_empty());
        assert_eq!(ctx.host_path, PathBuf::new());
    }
}
