/// Errors that can occur while decoding a candidate frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The frame is shorter than 5 bytes or has an even length.
    #[error("invalid frame size ({len} bytes)")]
    Size { len: usize },

    /// A byte carries the wrong tag nibble for its position.
    #[error("unexpected tag at offset {offset}")]
    Tag { offset: usize },

    /// The transmitted checksum does not match the recomputed one.
    #[error("checksum mismatch (expected {expected:#04x}, got {actual:#04x})")]
    Checksum { expected: u8, actual: u8 },
}

pub type Result<T> = std::result::Result<T, FrameError>;
