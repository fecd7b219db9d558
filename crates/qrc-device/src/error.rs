/// Errors returned by device requests before or instead of any line I/O.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// Transport-level error while opening or configuring the line.
    #[error("transport error: {0}")]
    Transport(#[from] qrc_transport::TransportError),

    /// A request argument is out of range; nothing was sent.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The worker thread has exited and can no longer accept requests.
    #[error("transport worker is not running")]
    NotRunning,

    /// The worker thread could not be spawned.
    #[error("worker I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DeviceError>;
