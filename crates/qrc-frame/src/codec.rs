use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Start byte marker. The low nibble carries the address.
pub const START: u8 = 0x80;

/// Highest device address that fits in the start byte.
pub const MAX_ADDRESS: u8 = 0x0F;

/// Marks the byte carrying the high nibble of a value.
const HIGH_HALF: u8 = 0x40;

/// Value type tags.
const TYPE_COMMAND: u8 = 0x00;
const TYPE_DATA: u8 = 0x10;
const TYPE_CHECKSUM: u8 = 0x20;

/// Top nibble of every encoded byte: start flag, half flag and value type.
pub const TAG_MASK: u8 = 0xF0;

const NIBBLE_MASK: u8 = 0x0F;

/// Start byte, two command bytes, two checksum bytes.
pub const MIN_FRAME_LEN: usize = 5;

/// A decoded protocol packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Device address (0-15).
    pub address: u8,
    /// Command or ticket code.
    pub command: u8,
    /// The decoded payload.
    pub payload: Bytes,
}

impl Packet {
    /// Create a new packet.
    pub fn new(address: u8, command: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            address,
            command,
            payload: payload.into(),
        }
    }

    /// The number of bytes this packet occupies on the wire.
    pub fn wire_size(&self) -> usize {
        encoded_len(self.payload.len())
    }
}

/// Returns true for the broadcast/reserved addresses that never reply.
pub fn is_silent_address(address: u8) -> bool {
    let address = address & MAX_ADDRESS;
    address == 0 || address == MAX_ADDRESS
}

/// Wire length of a frame carrying `payload_len` payload bytes.
pub fn encoded_len(payload_len: usize) -> usize {
    1 + 2 * (1 + payload_len + 1)
}

fn put_value(dst: &mut BytesMut, value_type: u8, value: u8) {
    dst.put_u8(HIGH_HALF | value_type | (value >> 4));
    dst.put_u8(value_type | (value & NIBBLE_MASK));
}

/// Encode a request frame into `dst`.
///
/// Wire format:
/// ```text
/// ┌────────────┬──────────────┬──────────────────┬──────────────┐
/// │ Start (1B) │ Command (2B) │ Payload (2B each) │ Checksum (2B) │
/// │ 0x80|addr  │ 0x4c 0x0c    │ 0x5d 0x1d         │ 0x6s 0x2s     │
/// └────────────┴──────────────┴──────────────────┴──────────────┘
/// ```
///
/// The checksum is the sum, modulo 256, of every byte written before it,
/// start byte included. Bits of `address` above the low nibble are ignored.
pub fn encode_frame(address: u8, command: u8, payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(encoded_len(payload.len()));
    let begin = dst.len();

    dst.put_u8(START | (address & MAX_ADDRESS));
    put_value(dst, TYPE_COMMAND, command);
    for &byte in payload {
        put_value(dst, TYPE_DATA, byte);
    }

    let checksum = checksum(&dst[begin..]);
    put_value(dst, TYPE_CHECKSUM, checksum);
}

/// Encode a request frame into a fresh buffer.
pub fn encode(address: u8, command: u8, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(encoded_len(payload.len()));
    encode_frame(address, command, payload, &mut buf);
    buf.freeze()
}

fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Join a high/low byte pair, checking both tags.
///
/// On a tag mismatch the error carries the offset of the offending pair.
fn take_value(frame: &[u8], offset: usize, value_type: u8) -> Result<u8> {
    let (high, low) = (frame[offset], frame[offset + 1]);
    if high & TAG_MASK != HIGH_HALF | value_type {
        return Err(FrameError::Tag { offset });
    }
    if low & TAG_MASK != value_type {
        return Err(FrameError::Tag { offset: offset + 1 });
    }
    Ok(((high & NIBBLE_MASK) << 4) | (low & NIBBLE_MASK))
}

/// Decode one complete candidate frame.
///
/// Checks run in a fixed order: size, command tags, checksum tags, payload
/// tags, then the checksum value. The start byte's upper bits are not
/// validated; only its low nibble is read as the address.
pub fn decode(frame: &[u8]) -> Result<Packet> {
    let len = frame.len();
    if len < MIN_FRAME_LEN || len % 2 == 0 {
        return Err(FrameError::Size { len });
    }

    let address = frame[0] & MAX_ADDRESS;
    let command = take_value(frame, 1, TYPE_COMMAND)?;
    let actual = take_value(frame, len - 2, TYPE_CHECKSUM)?;

    let mut payload = BytesMut::with_capacity((len - MIN_FRAME_LEN) / 2);
    for offset in (3..len - 2).step_by(2) {
        payload.put_u8(take_value(frame, offset, TYPE_DATA)?);
    }

    let expected = checksum(&frame[..len - 2]);
    if expected != actual {
        return Err(FrameError::Checksum { expected, actual });
    }

    Ok(Packet {
        address,
        command,
        payload: payload.freeze(),
    })
}
