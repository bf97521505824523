//! Structured diagnostic messages with severity, codes, and context.

use crate::code::DiagnosticCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a diagnostic affects the outcome of a run.
///
/// Hard failures (bad input files, infeasible placements, unreachable
/// sinks) surface as typed errors at the subsystem boundary, so most
/// diagnostics report degraded-but-usable results: a routing returned
/// with unresolved congestion, timing that was not met. `Error` is
/// reserved for results the caller must not use.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum Severity {
    /// Context the user may want (a bound OPIN, a stage summary).
    Note,
    /// The result stands but is degraded; rerunning with different
    /// parameters may help.
    Warning,
    /// The stage's result is unusable.
    Error,
}

impl Severity {
    /// Returns `true` if this severity is [`Error`](Severity::Error).
    pub fn is_error(self) -> bool {
        self == Severity::Error
    }

    /// Whether the pipeline should exit nonzero after reporting.
    ///
    /// Warnings deliberately do not: a congested routing is still written
    /// out so the user can inspect it and retry.
    pub fn stops_pipeline(self) -> bool {
        self.is_error()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Note => write!(f, "note"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A structured diagnostic message.
///
/// Diagnostics are the primary mechanism for reporting warnings and notes to
/// the user. Each diagnostic includes a severity level, a unique code, the
/// main message, an optional context string naming the entity it concerns
/// (a net, a block, a routing resource), and explanatory footnotes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity level of this diagnostic.
    pub severity: Severity,
    /// The unique code identifying the type of diagnostic.
    pub code: DiagnosticCode,
    /// The main diagnostic message.
    pub message: String,
    /// The name of the entity this diagnostic concerns, if any.
    pub context: Option<String>,
    /// Explanatory footnotes (e.g., "note: ...").
    pub notes: Vec<String>,
}

impl Diagnostic {
    /// Creates a new error diagnostic with the given code and message.
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    /// Creates a new warning diagnostic with the given code and message.
    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    /// Creates a new note diagnostic with the given code and message.
    pub fn note(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Note, code, message)
    }

    fn new(severity: Severity, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            context: None,
            notes: Vec::new(),
        }
    }

    /// Sets the context entity name of this diagnostic.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Adds a footnote to this diagnostic.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}
