use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("can't find a Prologix adapter")]
    NotFound,

    #[error(transparent)]
    Serial(#[from] serialport::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The overall read bound ran out before a terminator arrived.
    #[error("no terminated response after {waited:?} ({received} bytes received)")]
    Timeout { waited: Duration, received: usize },

    #[error("read cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("adapter connection is closed")]
    Closed,
}
