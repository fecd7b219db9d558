//! Decoding of reply payloads into domain values.
//!
//! Short payloads are zero-padded and extra bytes beyond a value's width
//! are ignored, so every decoder is total.

use qrc_frame::{command, Packet};

use crate::event::{DeviceState, Event};

pub const KEY_COUNT: usize = 18;
pub const SLIDER_COUNT: usize = 8;
pub const ENCODER_COUNT: usize = 4;
pub const SENSOR_COUNT: usize = 2;

/// Length of a full GetState reply.
pub const STATE_LEN: usize = 24;

/// Clamped sub-slice: out-of-range parts simply come back shorter or empty.
fn mid(data: &[u8], pos: usize, len: usize) -> &[u8] {
    let start = pos.min(data.len());
    let end = pos.saturating_add(len).min(data.len());
    &data[start..end]
}

/// Keys packed LSB first: bit 0 of byte 0 is key 0.
pub fn decode_keys(data: &[u8]) -> [bool; KEY_COUNT] {
    let mut keys = [false; KEY_COUNT];
    for (i, key) in keys.iter_mut().enumerate() {
        if let Some(byte) = data.get(i / 8) {
            *key = byte & (1 << (i % 8)) != 0;
        }
    }
    keys
}

pub fn decode_sliders(data: &[u8]) -> [u8; SLIDER_COUNT] {
    let mut sliders = [0u8; SLIDER_COUNT];
    let src = mid(data, 0, SLIDER_COUNT);
    sliders[..src.len()].copy_from_slice(src);
    sliders
}

/// Four little-endian 16-bit counters.
pub fn decode_encoders(data: &[u8]) -> [u16; ENCODER_COUNT] {
    let mut raw = [0u8; ENCODER_COUNT * 2];
    let src = mid(data, 0, raw.len());
    raw[..src.len()].copy_from_slice(src);

    let mut encoders = [0u16; ENCODER_COUNT];
    for (value, chunk) in encoders.iter_mut().zip(raw.chunks_exact(2)) {
        *value = u16::from_le_bytes([chunk[0], chunk[1]]);
    }
    encoders
}

pub fn decode_sensors(data: &[u8]) -> [u8; SENSOR_COUNT] {
    let mut sensors = [0u8; SENSOR_COUNT];
    let src = mid(data, 0, SENSOR_COUNT);
    sensors[..src.len()].copy_from_slice(src);
    sensors
}

/// Split a GetState payload: keys, sliders, encoders, sensors, sticky keys.
pub fn decode_state(data: &[u8]) -> DeviceState {
    DeviceState {
        keys: decode_keys(mid(data, 0, 3)),
        sliders: decode_sliders(mid(data, 3, 8)),
        encoders: decode_encoders(mid(data, 11, 8)),
        sensors: decode_sensors(mid(data, 19, 2)),
        sticky_keys: decode_keys(mid(data, 21, 3)),
    }
}

/// Map a reply packet onto its typed event.
pub fn decode_reply(packet: &Packet) -> Event {
    let address = packet.address;
    let data = packet.payload.as_ref();
    match packet.command {
        command::HELLO => Event::Hello { address },
        command::SET_BAUDRATE => Event::BaudrateAck { address },
        command::GET_KEYS => Event::Keys {
            address,
            keys: decode_keys(data),
        },
        command::GET_SLIDERS => Event::Sliders {
            address,
            sliders: decode_sliders(data),
        },
        command::GET_ENCODERS => Event::Encoders {
            address,
            encoders: decode_encoders(data),
        },
        command::GET_SENSORS => Event::Sensors {
            address,
            sensors: decode_sensors(data),
        },
        command::GET_STIKY_KEYS => Event::StikyKeys {
            address,
            keys: decode_keys(data),
        },
        command::GET_STATE => Event::State {
            address,
            state: decode_state(data),
        },
        code if command::is_ticket(code) => match code {
            command::SUCCESS => Event::TicketSuccess { address },
            _ => Event::TicketUnknown { address },
        },
        other => Event::RawReply {
            address,
            command: other,
            payload: packet.payload.clone(),
        },
    }
}
