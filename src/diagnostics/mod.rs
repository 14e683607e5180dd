//! Diagnostics collected during compilation
//!
//! Non-fatal conditions (an unterminated tie, a pedal release with no press)
//! leave the model in a defined best-effort state and are reported here
//! rather than aborting the run. Fatal conditions are `Err` returns and never
//! appear in this collection.

use serde::{Deserialize, Serialize};

/// Severity level for collected diagnostics
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Warning,
    Info,
}

/// A diagnostic anchored to a position in the score
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    /// Kind identifier (e.g., "unterminated_tie", "unmatched_pedal_up")
    pub kind: String,
    /// Document bar number, when the condition has one
    pub measure: Option<u32>,
    /// Score-absolute tick, when the condition has one
    pub tick: Option<u64>,
    /// Human-readable message
    pub message: String,
}

/// Collection of diagnostics for an entire score
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Diagnostics {
    pub items: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create empty diagnostics
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Add a diagnostic
    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    /// Record a warning and echo it through the `log` facade.
    pub fn warn(
        &mut self,
        kind: impl Into<String>,
        measure: Option<u32>,
        tick: Option<u64>,
        message: impl Into<String>,
    ) {
        let kind = kind.into();
        let message = message.into();
        match (measure, tick) {
            (Some(m), Some(t)) => log::warn!("[{}] measure {} tick {}: {}", kind, m, t, message),
            (Some(m), None) => log::warn!("[{}] measure {}: {}", kind, m, message),
            (None, Some(t)) => log::warn!("[{}] tick {}: {}", kind, t, message),
            (None, None) => log::warn!("[{}] {}", kind, message),
        }
        self.items.push(Diagnostic {
            severity: DiagnosticSeverity::Warning,
            kind,
            measure,
            tick,
            message,
        });
    }

    /// Diagnostics of one kind, for inspection after a run.
    pub fn of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a Diagnostic> {
        self.items.iter().filter(move |d| d.kind == kind)
    }

    pub fn has_warnings(&self) -> bool {
        self.items
            .iter()
            .any(|d| d.severity == DiagnosticSeverity::Warning)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}
