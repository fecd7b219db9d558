//! Quest Room Control serial toolkit.
//!
//! Drives the keys, sliders, encoders, sensors, LEDs and relays of Quest
//! Room Control boards over a serial line.
//!
//! # Crate Structure
//!
//! - [`transport`] - Serial line access and enumeration
//! - [`frame`] - Nibble-tagged frame codec and stream parser
//! - [`device`] - Transport worker, typed dispatcher and events

/// Re-export transport types.
pub mod transport {
    pub use qrc_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use qrc_frame::*;
}

/// Re-export device types.
pub mod device {
    pub use qrc_device::*;
}

pub use qrc_device::{CommandDispatcher, DeviceError, Event, EventStream};
