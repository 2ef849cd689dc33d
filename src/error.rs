//! Error types for distknn.
//!
//! Every failure in a run is reported through a single [`KnnError`] carrying a
//! status-style [`ErrorCode`], a message, and the rank that failed when the
//! failure came from the transport layer.

use std::fmt;
use thiserror::Error;

/// Error codes for the failure classes of a prediction run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Bad input: malformed file, wrong dimensions, wrong query length.
    InvalidArgument,
    /// A value outside its permitted range (e.g. k > n).
    OutOfRange,
    /// An operation invoked in a state where it is not allowed.
    FailedPrecondition,
    /// A peer stopped responding or hung up.
    Unavailable,
    /// A message or merged result is incomplete or corrupt.
    DataLoss,
    /// Internal error.
    Internal,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::InvalidArgument => write!(f, "INVALID_ARGUMENT"),
            ErrorCode::OutOfRange => write!(f, "OUT_OF_RANGE"),
            ErrorCode::FailedPrecondition => write!(f, "FAILED_PRECONDITION"),
            ErrorCode::Unavailable => write!(f, "UNAVAILABLE"),
            ErrorCode::DataLoss => write!(f, "DATA_LOSS"),
            ErrorCode::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// Main error type for distknn operations.
#[derive(Error, Debug, Clone)]
pub struct KnnError {
    code: ErrorCode,
    message: String,
    rank: Option<usize>,
}

impl KnnError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            rank: None,
        }
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Get the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Rank of the process the error is attributed to, if any.
    pub fn rank(&self) -> Option<usize> {
        self.rank
    }

    /// Attribute this error to a rank. An existing attribution is kept.
    pub fn at_rank(mut self, rank: usize) -> Self {
        self.rank.get_or_insert(rank);
        self
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgument, msg)
    }

    /// Create an out of range error.
    pub fn out_of_range(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::OutOfRange, msg)
    }

    /// Create a failed precondition error.
    pub fn failed_precondition(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::FailedPrecondition, msg)
    }

    /// Create an unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unavailable, msg)
    }

    /// Create a data loss error.
    pub fn data_loss(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::DataLoss, msg)
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, msg)
    }

    /// True for errors raised while talking to another rank.
    pub fn is_transport(&self) -> bool {
        matches!(self.code, ErrorCode::Unavailable | ErrorCode::DataLoss) && self.rank.is_some()
    }
}

impl fmt::Display for KnnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rank {
            Some(rank) => write!(f, "{} (rank {}): {}", self.code, rank, self.message),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

impl From<std::io::Error> for KnnError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionReset => Self::unavailable(err.to_string()),
            _ => Self::internal(format!("I/O error: {err}")),
        }
    }
}

impl From<bincode::Error> for KnnError {
    fn from(err: bincode::Error) -> Self {
        Self::data_loss(format!("undecodable message: {err}"))
    }
}

/// Result type alias for distknn operations.
pub type Result<T> = std::result::Result<T, KnnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = KnnError::invalid_argument("bad value");
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
        assert_eq!(err.message(), "bad value");
        assert_eq!(err.rank(), None);
    }

    #[test]
    fn test_constructors_set_codes() {
        let cases = [
            (KnnError::invalid_argument("x"), ErrorCode::InvalidArgument),
            (KnnError::out_of_range("x"), ErrorCode::OutOfRange),
            (KnnError::failed_precondition("x"), ErrorCode::FailedPrecondition),
            (KnnError::unavailable("x"), ErrorCode::Unavailable),
            (KnnError::data_loss("x"), ErrorCode::DataLoss),
            (KnnError::internal("x"), ErrorCode::Internal),
        ];
        for (err, code) in cases {
            assert_eq!(err.code(), code);
        }
    }

    #[test]
    fn test_error_display_with_rank() {
        let err = KnnError::data_loss("short reply").at_rank(3);
        let display = format!("{}", err);
        assert!(display.contains("DATA_LOSS"));
        assert!(display.contains("rank 3"));
        assert!(display.contains("short reply"));
        assert!(err.is_transport());
    }

    #[test]
    fn test_at_rank_keeps_first_attribution() {
        let err = KnnError::unavailable("gone").at_rank(2).at_rank(0);
        assert_eq!(err.rank(), Some(2));
    }

    #[test]
    fn test_io_eof_maps_to_unavailable() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: KnnError = io.into();
        assert_eq!(err.code(), ErrorCode::Unavailable);
    }
}
