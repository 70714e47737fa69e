use thiserror::Error;

/// Main error type for MC PLC operations
///
/// The first four variants form the request/link taxonomy: link-open failures
/// stay inside the connection state machine, the other three always reach the
/// submitter of a read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum McError {
    #[error("Link open failure: {0}")]
    LinkOpenFailure(String),

    #[error("Connection not available")]
    ConnectionUnavailable,

    #[error("Read operation timed out")]
    ReadTimeout,

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Too many listeners (limit {0})")]
    TooManyListeners(usize),

    #[error("Session closed")]
    SessionClosed,
}

impl McError {
    /// Build a codec error from anything printable
    pub fn codec(message: impl Into<String>) -> Self {
        McError::Codec(message.into())
    }

    /// Whether this error should count as a lost link when it completes a read
    pub fn is_connection_loss(&self) -> bool {
        match self {
            McError::ConnectionUnavailable | McError::ReadTimeout => true,
            McError::Codec(message) => crate::classify_error(message).is_connection_loss(),
            _ => false,
        }
    }
}

/// Result type alias for MC PLC operations
pub type McResult<T> = Result<T, McError>;
