#[derive(Debug, thiserror::Error)]
pub enum ReceiverError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("protocol error: {0}")]
    Protocol(#[from] cd11_rs_protocol::Cd11Error),
    #[error("port {0} is already registered")]
    PortAlreadyRegistered(u16),
    #[error("consumer for station {0} never reached the running state")]
    NeverStarted(String),
    #[error("failed to clear gap state for {station}: {source}")]
    GapStateClear {
        station: String,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ReceiverError>;
