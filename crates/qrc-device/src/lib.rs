//! Typed request/reply access to Quest Room Control devices.
//!
//! A [`CommandDispatcher`] owns a [`TransportWorker`], a dedicated thread that
//! holds the serial line and runs one exchange at a time: encode, write,
//! then poll for a reply until it arrives or the reply timeout elapses.
//! Results come back as [`Event`]s on any number of [`EventStream`]s.
//!
//! ```no_run
//! use std::time::Duration;
//! use qrc_device::{CommandDispatcher, Event};
//!
//! let dispatcher = CommandDispatcher::system()?;
//! let events = dispatcher.subscribe()?;
//! dispatcher.open("/dev/ttyUSB0")?;
//! dispatcher.get_state(1)?;
//! while let Some(event) = events.recv_timeout(Duration::from_secs(1)) {
//!     if let Event::State { state, .. } = &event {
//!         println!("{:?}", state.keys);
//!     }
//!     if event.ends_exchange() {
//!         break;
//!     }
//! }
//! # Ok::<(), qrc_device::DeviceError>(())
//! ```

pub mod dispatcher;
pub mod error;
pub mod event;
pub mod leds;
pub mod reply;
pub mod worker;

#[cfg(test)]
mod testing;

pub use dispatcher::{CommandDispatcher, EventStream};
pub use error::{DeviceError, Result};
pub use event::{DeviceState, Event, Outcome};
pub use leds::{pack_channels, LedBits, RelayMask, SmartLedBuffer};
pub use worker::{ConnectionState, Exchange, TransportWorker, WorkerConfig};
