/// Errors that can occur while opening or driving a serial line.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The descriptor is empty or names a line that cannot be opened.
    #[error("line {descriptor:?} unavailable: {reason}")]
    LineUnavailable { descriptor: String, reason: String },

    /// The line exists but is already claimed by another process.
    #[error("line {descriptor:?} is busy")]
    LineBusy { descriptor: String },

    /// The requested baud rate index is outside the supported table.
    #[error("baud rate index {0} out of range (0-7)")]
    InvalidBaudIndex(usize),

    /// Reconfiguring an open line failed.
    #[error("failed to configure line: {0}")]
    Configure(String),

    /// Enumerating serial lines failed.
    #[error("failed to enumerate lines: {0}")]
    Enumerate(String),

    /// An I/O error occurred on the line.
    #[error("line I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
