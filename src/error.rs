//! Error types for the rotation pipeline.

/// Top-level error type for the profile rotation system.
///
/// Each variant corresponds to one failure class of the update cycle.
/// Every stage maps its own failures into exactly one class, so the
/// orchestrator only ever inspects the stage-level outcome, never a
/// nested cause chain.
#[derive(Debug, thiserror::Error)]
pub enum RotationError {
    /// Missing or invalid configuration, or an unreadable schedule file.
    #[error("config error: {0}")]
    Config(String),

    /// The endpoint failed its health check; nothing stateful was attempted.
    #[error("liveness error: {0}")]
    Liveness(String),

    /// The service rejected the login credentials.
    #[error("auth error: {0}")]
    Auth(String),

    /// Blob retrieval or media classification failed.
    #[error("fetch error: {0}")]
    Fetch(String),

    /// The conditional write was rejected: the record changed between
    /// read and write. Terminal for the cycle; never retried blindly.
    #[error("conflict error: {0}")]
    Conflict(String),

    /// Generic network or service failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RotationError {
    /// Process exit code for this failure class.
    ///
    /// The binary exits with these codes so external monitoring can
    /// distinguish failure classes without parsing the log stream.
    /// `0` is reserved for success (including "no entry this hour").
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Io(_) => 1,
            Self::Liveness(_) => 2,
            Self::Auth(_) => 3,
            Self::Fetch(_) => 4,
            Self::Conflict(_) => 5,
            Self::Transport(_) => 6,
        }
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, RotationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_class_and_message() {
        let err = RotationError::Conflict("record changed under us".into());
        assert_eq!(err.to_string(), "conflict error: record changed under us");

        let err = RotationError::Liveness("HTTP 503".into());
        assert_eq!(err.to_string(), "liveness error: HTTP 503");
    }

    #[test]
    fn exit_codes_are_distinct_per_class() {
        let errors = [
            RotationError::Config("x".into()),
            RotationError::Liveness("x".into()),
            RotationError::Auth("x".into()),
            RotationError::Fetch("x".into()),
            RotationError::Conflict("x".into()),
            RotationError::Transport("x".into()),
        ];
        let codes: Vec<i32> = errors.iter().map(RotationError::exit_code).collect();
        assert_eq!(codes, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn io_errors_map_to_config_code() {
        let err = RotationError::from(std::io::Error::other("boom"));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RotationError>();
    }
}
