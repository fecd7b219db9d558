//! Command opcodes.
//!
//! 0x00-0x0F are general commands, 0x10-0x1F set outputs on the device,
//! 0x20-0x2F read inputs back, and 0x80 and above are tickets sent by the
//! device in reply.

/// Ping; the device answers with a success ticket.
pub const HELLO: u8 = 0x00;

/// Switch the line rate. Payload is one baud table index (0-7).
pub const SET_BAUDRATE: u8 = 0x01;

/// Set the plain on/off LEDs. Payload is an 80-bit bitset.
pub const SET_LEDS: u8 = 0x10;

/// Set all smart LED channels, 12 bits each.
pub const SET_SMART_LEDS: u8 = 0x11;

/// Set the text shown on the LCD.
pub const SET_TEXT: u8 = 0x12;

/// Set the relay outputs. Payload is a single mask byte.
pub const SET_RELAY: u8 = 0x13;

/// Set eight smart LEDs of one driver (0-3): driver index + 36 bytes.
pub const SET_SPECIFIC_SMART_LEDS_8: u8 = 0x14;

/// Set four smart LEDs of one driver half (0-7): half index + 18 bytes.
pub const SET_SPECIFIC_SMART_LEDS_4: u8 = 0x15;

/// Set one smart LED (0-31) from three 16-bit brightness values.
pub const SET_SPECIFIC_SMART_LED: u8 = 0x16;

/// Read the 18 keys, 3 bytes LSB first.
pub const GET_KEYS: u8 = 0x20;

/// Read the 8 ADC channels, one byte each.
pub const GET_SLIDERS: u8 = 0x21;

/// Read the 4 encoder counters, 16-bit little endian.
pub const GET_ENCODERS: u8 = 0x22;

/// Read the 2 capacitive sensors.
pub const GET_SENSORS: u8 = 0x23;

/// Read the latched ("sticky") keys, same layout as keys.
pub const GET_STIKY_KEYS: u8 = 0x24;

/// Read keys, sliders, encoders, sensors and sticky keys in one 24-byte reply.
pub const GET_STATE: u8 = 0x2F;

/// Ticket: the device accepted the request.
pub const SUCCESS: u8 = 0x80;

/// Ticket: the device did not recognise the command.
pub const UNKNOWN: u8 = 0x81;

/// Returns a human-readable name for a command code.
pub fn command_name(code: u8) -> &'static str {
    match code {
        HELLO => "HELLO",
        SET_BAUDRATE => "SET_BAUDRATE",
        SET_LEDS => "SET_LEDS",
        SET_SMART_LEDS => "SET_SMART_LEDS",
        SET_TEXT => "SET_TEXT",
        SET_RELAY => "SET_RELAY",
        SET_SPECIFIC_SMART_LEDS_8 => "SET_SPECIFIC_SMART_LEDS_8",
        SET_SPECIFIC_SMART_LEDS_4 => "SET_SPECIFIC_SMART_LEDS_4",
        SET_SPECIFIC_SMART_LED => "SET_SPECIFIC_SMART_LED",
        GET_KEYS => "GET_KEYS",
        GET_SLIDERS => "GET_SLIDERS",
        GET_ENCODERS => "GET_ENCODERS",
        GET_SENSORS => "GET_SENSORS",
        GET_STIKY_KEYS => "GET_STIKY_KEYS",
        GET_STATE => "GET_STATE",
        SUCCESS => "SUCCESS",
        UNKNOWN => "UNKNOWN",
        _ => "UNASSIGNED",
    }
}

/// Returns true for device tickets.
pub fn is_ticket(code: u8) -> bool {
    code == SUCCESS || code == UNKNOWN
}
