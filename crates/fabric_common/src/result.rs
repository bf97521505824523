//! Common result and error types for the Fabric engine.

/// The standard result type for fallible internal operations.
///
/// `Err` indicates an unrecoverable internal error (a bug in Fabric), not a
/// user-facing error. User errors carry their own typed errors at the
/// subsystem boundary (architecture load, netlist parse, placement,
/// routing) and are rendered by the CLI.
pub type FabricResult<T> = Result<T, InternalError>;

/// An internal error indicating a bug in Fabric, not a user input problem.
///
/// These errors should never occur during normal operation. If one does
/// occur, an invariant of the engine has been violated.
#[derive(Debug, thiserror::Error)]
#[error("internal error: {message}")]
pub struct InternalError {
    /// Description of the internal error.
    pub message: String,
}

impl InternalError {
    /// Creates a new internal error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for InternalError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_format() {
        let err = InternalError::new("occupancy underflow");
        assert_eq!(format!("{err}"), "internal error: occupancy underflow");
    }

    #[test]
    fn ok_path() {
        let r: FabricResult<i32> = Ok(7);
        assert_eq!(r.ok(), Some(7));
    }

    #[test]
    fn from_string() {
        let err: InternalError = "from string".to_string().into();
        assert_eq!(err.message, "from string");
    }
}
