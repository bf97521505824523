//! Diagnostic reporting for the Fabric place-and-route engine.
//!
//! Subsystems report warnings and notes through a shared [`DiagnosticSink`];
//! the CLI renders accumulated diagnostics to stderr at the end of each
//! stage. The engine runs its stages strictly one after another, so the
//! sink is a plain in-order accumulator. Unlike a compiler front end there
//! is no source text to annotate: a diagnostic carries an optional
//! free-form context string (a net name, a routing-resource description)
//! instead of spans.

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod renderer;
pub mod sink;

pub use code::{Category, DiagnosticCode};
pub use diagnostic::{Diagnostic, Severity};
pub use renderer::render_to_stderr;
pub use sink::DiagnosticSink;
