//! Error types for session-facing operations.

use thiserror::Error;

/// Errors surfaced by the client session when writing account data.
///
/// Index queries never fail; this error only travels through the
/// best-effort write-back path, where it is logged and dropped.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// The session could not reach the server.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The server rejected the write.
    #[error("write rejected: {0}")]
    Rejected(String),
}

impl SessionError {
    /// Get a static error code string for diagnostics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Rejected(_) => "rejected",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(SessionError::Transport("timeout".into()).error_code(), "transport");
        assert_eq!(SessionError::Rejected("denied".into()).error_code(), "rejected");
    }

    #[test]
    fn test_display() {
        let err = SessionError::Transport("connection reset".into());
        assert_eq!(err.to_string(), "transport failure: connection reset");
    }
}
