//! Shared infrastructure for the Fabric place-and-route engine.
//!
//! Provides the [`FabricResult`] type used by all fallible internal
//! operations and the [`Stopwatch`] used for stage runtime reporting.

#![warn(missing_docs)]

pub mod result;
pub mod stopwatch;

pub use result::{FabricResult, InternalError};
pub use stopwatch::Stopwatch;
