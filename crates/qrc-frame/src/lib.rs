//! Nibble-tagged framing for the Quest Room Control serial protocol.
//!
//! Every frame on the wire is laid out as:
//! - One start byte, `0x80 | address`
//! - The command byte, split into two tagged nibble bytes
//! - Each payload byte, split the same way
//! - An additive checksum, split the same way
//!
//! The tag in each byte's high nibble makes the stream self-synchronizing:
//! a reader can always find the next start byte and the next checksum byte.

pub mod codec;
pub mod command;
pub mod error;
pub mod parser;

pub use codec::{
    decode, encode, encode_frame, encoded_len, is_silent_address, Packet, MAX_ADDRESS,
    MIN_FRAME_LEN,
};
pub use command::command_name;
pub use error::{FrameError, Result};
pub use parser::{parse_next, ParseErrorKind, ParseOutcome, StreamParser};
