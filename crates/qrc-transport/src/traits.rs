use std::io::{Read, Write};

use crate::config::LineConfig;
use crate::error::Result;

/// An open, configured serial line.
///
/// Reads are expected to block for at most the configured poll interval and
/// then fail with `TimedOut` (or `WouldBlock`) when nothing arrived.
pub trait SerialLine: Read + Write + Send {
    /// Name of the underlying line, for diagnostics.
    fn name(&self) -> &str;

    /// Change the line speed in place.
    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()>;

    /// Number of received bytes that can be read without blocking.
    fn bytes_to_read(&mut self) -> Result<usize>;
}

/// Opens serial lines by descriptor.
///
/// The worker holds one connector for its lifetime and calls it on every
/// explicit open and on lazy reopen after a line failure.
pub trait Connector: Send {
    /// Open `descriptor` with the given configuration.
    fn open(&self, descriptor: &str, config: &LineConfig) -> Result<Box<dyn SerialLine>>;
}
