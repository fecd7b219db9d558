//! Payload builders for LED and relay commands.

use crate::error::{DeviceError, Result};

/// Plain on/off LEDs on a controller.
pub const LED_COUNT: usize = 80;

/// Smart RGB LEDs on a controller.
pub const SMART_LED_COUNT: usize = 32;

/// 12-bit brightness channels: three per smart LED.
pub const SMART_LED_CHANNELS: usize = SMART_LED_COUNT * 3;

/// Largest 12-bit channel value.
pub const CHANNEL_MAX: u16 = 0x0FFF;

pub const RELAY_COUNT: usize = 4;

/// Smart LED drivers addressed by SetSpecificSmartLeds8, eight LEDs each.
pub const DRIVER_COUNT: u8 = 4;

/// Driver halves addressed by SetSpecificSmartLeds4, four LEDs each.
pub const DRIVER_HALF_COUNT: u8 = 8;

/// Colour channel within a smart LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Red = 0,
    Green = 1,
    Blue = 2,
}

/// Bitset for SetLeds. LED `i` is bit `i % 8` of byte `i / 8`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedBits {
    bits: [u8; LED_COUNT / 8],
}

impl LedBits {
    pub fn new() -> Self {
        Self::default()
    }

    /// All LEDs listed in `on` lit, the rest dark. Out-of-range indices are ignored.
    pub fn with_on(on: impl IntoIterator<Item = usize>) -> Self {
        let mut leds = Self::new();
        for index in on {
            leds.set(index, true);
        }
        leds
    }

    pub fn get(&self, index: usize) -> bool {
        index < LED_COUNT && self.bits[index / 8] & (1 << (index % 8)) != 0
    }

    /// Out-of-range indices are ignored.
    pub fn set(&mut self, index: usize, on: bool) {
        if index >= LED_COUNT {
            return;
        }
        let mask = 1 << (index % 8);
        if on {
            self.bits[index / 8] |= mask;
        } else {
            self.bits[index / 8] &= !mask;
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }
}

/// 12-bit channel buffer for SetSmartLeds.
///
/// Channels are packed back to front: channel 95 occupies the first twelve
/// bits of the payload and channel 0 the last twelve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmartLedBuffer {
    data: [u8; SMART_LED_CHANNELS * 3 / 2],
}

impl Default for SmartLedBuffer {
    fn default() -> Self {
        Self {
            data: [0; SMART_LED_CHANNELS * 3 / 2],
        }
    }
}

impl SmartLedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel index for `color` of smart LED `led`.
    pub fn channel(led: usize, color: Color) -> usize {
        led * 3 + color as usize
    }

    /// Byte offset and whether the value starts mid-byte.
    fn locate(index: usize) -> Option<(usize, bool)> {
        if index >= SMART_LED_CHANNELS {
            return None;
        }
        let nibble = (SMART_LED_CHANNELS - index - 1) * 3;
        Some((nibble / 2, nibble % 2 == 1))
    }

    pub fn get(&self, index: usize) -> u16 {
        let Some((byte, mid_byte)) = Self::locate(index) else {
            return 0;
        };
        let word = u16::from_be_bytes([self.data[byte], self.data[byte + 1]]);
        if mid_byte {
            word & CHANNEL_MAX
        } else {
            word >> 4
        }
    }

    /// Set a channel; values above 12 bits are clamped. Out-of-range indices are ignored.
    pub fn set(&mut self, index: usize, value: u16) {
        let Some((byte, mid_byte)) = Self::locate(index) else {
            return;
        };
        let value = value.min(CHANNEL_MAX);
        if mid_byte {
            self.data[byte] = (self.data[byte] & 0xF0) | (value >> 8) as u8;
            self.data[byte + 1] = value as u8;
        } else {
            self.data[byte] = (value >> 4) as u8;
            self.data[byte + 1] = ((value << 4) as u8) | (self.data[byte + 1] & 0x0F);
        }
    }

    pub fn set_rgb(&mut self, led: usize, r: u16, g: u16, b: u16) {
        self.set(Self::channel(led, Color::Red), r);
        self.set(Self::channel(led, Color::Green), g);
        self.set(Self::channel(led, Color::Blue), b);
    }

    /// Every channel set to `value`.
    pub fn fill(&mut self, value: u16) {
        for index in 0..SMART_LED_CHANNELS {
            self.set(index, value);
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Relay outputs for SetRelay. Relay `i` is bit `4 + i`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayMask(u8);

impl RelayMask {
    pub const NONE: Self = Self(0x00);
    pub const RELAY_0: u8 = 0x10;
    pub const RELAY_1: u8 = 0x20;
    pub const RELAY_2: u8 = 0x40;
    pub const RELAY_3: u8 = 0x80;

    pub fn from_bits(bits: u8) -> Self {
        Self(bits & 0xF0)
    }

    pub fn with_on(on: impl IntoIterator<Item = usize>) -> Self {
        let mut mask = Self::NONE;
        for index in on {
            mask.set(index, true);
        }
        mask
    }

    pub fn get(self, index: usize) -> bool {
        index < RELAY_COUNT && self.0 & (0x10 << index) != 0
    }

    /// Out-of-range indices are ignored.
    pub fn set(&mut self, index: usize, on: bool) {
        if index >= RELAY_COUNT {
            return;
        }
        let mask = 0x10 << index;
        if on {
            self.0 |= mask;
        } else {
            self.0 &= !mask;
        }
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

/// Pack 12-bit values two per three bytes, high nibble first.
///
/// A trailing odd value takes a byte and a half; the final low nibble is zero.
pub fn pack_channels(values: &[u16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len().div_ceil(2) * 3);
    for pair in values.chunks(2) {
        let a = pair[0].min(CHANNEL_MAX);
        out.push((a >> 4) as u8);
        match pair.get(1) {
            Some(&b) => {
                let b = b.min(CHANNEL_MAX);
                out.push((((a & 0x0F) << 4) | (b >> 8)) as u8);
                out.push(b as u8);
            }
            None => out.push(((a & 0x0F) << 4) as u8),
        }
    }
    out
}

/// Payload for SetSpecificSmartLed: LED number, then each colour as two
/// bytes carrying the low twelve bits.
pub fn smart_led_payload(led: u8, r: u16, g: u16, b: u16) -> Result<Vec<u8>> {
    if usize::from(led) >= SMART_LED_COUNT {
        return Err(DeviceError::InvalidParameter(format!(
            "smart LED {led} out of range (0-{})",
            SMART_LED_COUNT - 1
        )));
    }
    let mut payload = Vec::with_capacity(7);
    payload.push(led);
    for value in [r, g, b] {
        let value = value.min(CHANNEL_MAX);
        payload.push((value >> 8) as u8);
        payload.push(value as u8);
    }
    Ok(payload)
}

/// Payload for SetSpecificSmartLeds8: driver index, then 24 packed channels.
pub fn group8_payload(driver: u8, values: &[u16; 24]) -> Result<Vec<u8>> {
    if driver >= DRIVER_COUNT {
        return Err(DeviceError::InvalidParameter(format!(
            "smart LED driver {driver} out of range (0-{})",
            DRIVER_COUNT - 1
        )));
    }
    let mut payload = vec![driver];
    payload.extend(pack_channels(values));
    Ok(payload)
}

/// Payload for SetSpecificSmartLeds4: driver half index, then 12 packed channels.
pub fn group4_payload(half: u8, values: &[u16; 12]) -> Result<Vec<u8>> {
    if half >= DRIVER_HALF_COUNT {
        return Err(DeviceError::InvalidParameter(format!(
            "smart LED driver half {half} out of range (0-{})",
            DRIVER_HALF_COUNT - 1
        )));
    }
    let mut payload = vec![half];
    payload.extend(pack_channels(values));
    Ok(payload)
}
