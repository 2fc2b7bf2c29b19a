// src/image/notice.rs

//! Diagnostic notices attached to image layers
//!
//! Each layer carries an append-only trail of notices grouped by an origin
//! label (e.g. "Layer 3"). Notices record provenance and diagnostics for
//! reporting; they never drive control flow and are never mutated or removed
//! once added.

use serde::Serialize;

/// Severity of a notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// An immutable (message, severity) pair
#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    message: String,
    severity: Severity,
}

impl Notice {
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            severity,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }
}

/// Notices grouped under a named origin label
#[derive(Debug, Clone, Serialize)]
pub struct NoticeOrigin {
    pub origin: String,
    pub notices: Vec<Notice>,
}

/// Append-only collection of notice origins for one layer
#[derive(Debug, Clone, Default, Serialize)]
pub struct Origins {
    origins: Vec<NoticeOrigin>,
}

impl Origins {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a notice under the given origin label, creating the origin on
    /// first use
    pub fn add_notice(&mut self, origin: &str, notice: Notice) {
        match self.origins.iter_mut().find(|o| o.origin == origin) {
            Some(existing) => existing.notices.push(notice),
            None => self.origins.push(NoticeOrigin {
                origin: origin.to_string(),
                notices: vec![notice],
            }),
        }
    }

    /// All notices recorded under an origin label
    pub fn notices_for(&self, origin: &str) -> &[Notice] {
        self.origins
            .iter()
            .find(|o| o.origin == origin)
            .map(|o| o.notices.as_slice())
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = &NoticeOrigin> {
        self.origins.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }
}
