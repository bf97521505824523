//! Diagnostic accumulator for the sequential pipeline.

use crate::diagnostic::Diagnostic;

/// Accumulates diagnostics across the pipeline stages.
///
/// The engine is single-threaded: stages run one after another and no
/// operation suspends, so the sink is a plain vector with a running error
/// count. Stages emit as they go; the CLI drains and renders the backlog
/// once per run.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
}

impl DiagnosticSink {
    /// Creates a new empty diagnostic sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits a diagnostic into the sink.
    pub fn emit(&mut self, diag: Diagnostic) {
        if diag.severity.is_error() {
            self.error_count += 1;
        }
        self.diagnostics.push(diag);
    }

    /// Returns `true` if any error-severity diagnostics have been emitted.
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// Returns the number of error-severity diagnostics emitted so far.
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    /// Takes all accumulated diagnostics, leaving the sink empty.
    ///
    /// The error count is not reset; it tracks the whole run.
    pub fn take_all(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    /// The accumulated diagnostics, oldest first.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{Category, DiagnosticCode};

    fn make_error() -> Diagnostic {
        Diagnostic::error(DiagnosticCode::new(Category::Routing, 101), "test error")
    }

    fn make_warning() -> Diagnostic {
        Diagnostic::warning(DiagnosticCode::new(Category::Routing, 201), "test warning")
    }

    #[test]
    fn empty_sink() {
        let mut sink = DiagnosticSink::new();
        assert!(!sink.has_errors());
        assert_eq!(sink.error_count(), 0);
        assert!(sink.take_all().is_empty());
    }

    #[test]
    fn emit_error() {
        let mut sink = DiagnosticSink::new();
        sink.emit(make_error());
        assert!(sink.has_errors());
        assert_eq!(sink.error_count(), 1);
    }

    #[test]
    fn emit_warning_not_error() {
        let mut sink = DiagnosticSink::new();
        sink.emit(make_warning());
        assert!(!sink.has_errors());
        assert_eq!(sink.diagnostics().len(), 1);
    }

    #[test]
    fn emission_order_is_kept() {
        let mut sink = DiagnosticSink::new();
        sink.emit(make_warning());
        sink.emit(make_error());
        let all = sink.take_all();
        assert_eq!(all.len(), 2);
        assert!(!all[0].severity.is_error());
        assert!(all[1].severity.is_error());
    }

    #[test]
    fn take_all_drains_but_keeps_count() {
        let mut sink = DiagnosticSink::new();
        sink.emit(make_error());
        sink.emit(make_warning());
        assert_eq!(sink.take_all().len(), 2);
        assert!(sink.take_all().is_empty());
        // The count survives the drain; it tracks the whole run.
        assert_eq!(sink.error_count(), 1);
    }
}
