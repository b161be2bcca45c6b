use std::time::Duration;

/// Errors from sending-side socket operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// TCP or socket I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame encoding or decoding error.
    #[error("protocol error: {0}")]
    Protocol(#[from] cd11_rs_protocol::Cd11Error),

    /// Operation exceeded the configured timeout duration.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// Peer closed the connection.
    #[error("disconnected")]
    Disconnected,

    /// Operation attempted on a socket that is not connected.
    #[error("not connected")]
    NotConnected,
}

/// Convenience alias for `Result<T, ClientError>`.
pub type Result<T> = std::result::Result<T, ClientError>;
