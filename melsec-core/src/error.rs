use std::time::Duration;
use thiserror::Error;

/// Main error type for MELSEC client operations
///
/// The enum is `Clone` on purpose: a single failed connect attempt is shared
/// by every caller that joined it, so the same error value must be deliverable
/// to all of them. Transport causes are therefore carried as strings rather
/// than as `std::io::Error`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MelsecError {
    #[error("Connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    #[error("Connect failed: {0}")]
    ConnectFailure(String),

    #[error("Write failed: {0}")]
    WriteFailure(String),

    #[error("Request timed out after {0:?}")]
    RequestTimeout(Duration),

    #[error("Connection fault: {0}")]
    ConnectionFault(String),

    #[error("Frame invalid: {0}")]
    FrameInvalid(String),
}

/// Result type alias for MELSEC client operations
pub type MelsecResult<T> = Result<T, MelsecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MelsecError::ConnectionFault("peer reset".to_string());
        assert_eq!(err.to_string(), "Connection fault: peer reset");

        let err = MelsecError::RequestTimeout(Duration::from_millis(200));
        assert!(err.to_string().contains("200ms"));
    }

    #[test]
    fn test_error_clone() {
        let err = MelsecError::ConnectFailure("refused".to_string());
        assert_eq!(err.clone(), err);
    }
}
