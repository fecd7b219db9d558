//! Serial line access for Quest Room Control devices.
//!
//! This is the lowest layer of qrc. It knows how to open, configure and
//! enumerate serial lines, and exposes them through the [`SerialLine`] trait
//! so upper layers can run against real ports or test doubles alike.

pub mod config;
pub mod error;
pub mod serial;
pub mod traits;

pub use config::{
    baud_rate_for_index, LineConfig, BAUD_RATES, DEFAULT_BAUD_RATE, DEFAULT_POLL_INTERVAL,
};
pub use error::{Result, TransportError};
pub use serial::{available_lines, LineInfo, SystemConnector, SystemLine};
pub use traits::{Connector, SerialLine};
