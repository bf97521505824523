//! Terminal rendering of accumulated diagnostics.

use crate::diagnostic::Diagnostic;

/// Renders a single diagnostic into a terminal-style string.
///
/// Produces output like:
/// ```text
/// warning[R020]: routing did not converge after 100 iterations
///   --> net data_bus[3]
///    = note: 17 overused routing resources remain
/// ```
pub fn render(diag: &Diagnostic) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "{}[{}]: {}\n",
        diag.severity, diag.code, diag.message
    ));

    if let Some(context) = &diag.context {
        out.push_str(&format!("  --> {context}\n"));
    }

    for note in &diag.notes {
        out.push_str(&format!("   = note: {note}\n"));
    }

    out
}

/// Renders every diagnostic in the slice to stderr.
pub fn render_to_stderr(diagnostics: &[Diagnostic]) {
    for diag in diagnostics {
        eprint!("{}", render(diag));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{Category, DiagnosticCode};

    #[test]
    fn render_minimal() {
        let d = Diagnostic::warning(DiagnosticCode::new(Category::Routing, 20), "congested");
        let text = render(&d);
        assert_eq!(text, "warning[R020]: congested\n");
    }

    #[test]
    fn render_with_context_and_notes() {
        let d = Diagnostic::error(DiagnosticCode::new(Category::Routing, 1), "sink unreachable")
            .with_context("net clk / pin ff_3.D")
            .with_note("queue exhausted");
        let text = render(&d);
        assert!(text.starts_with("error[R001]: sink unreachable\n"));
        assert!(text.contains("  --> net clk / pin ff_3.D\n"));
        assert!(text.contains("   = note: queue exhausted\n"));
    }

    #[test]
    fn render_empty_slice_ok() {
        render_to_stderr(&[]);
    }
}
