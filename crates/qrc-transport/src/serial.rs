use std::io::{self, Read, Write};

use serde::Serialize;
use serialport::{DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};

use crate::config::LineConfig;
use crate::error::{Result, TransportError};
use crate::traits::{Connector, SerialLine};

/// A serial line backed by the operating system.
pub struct SystemLine {
    name: String,
    port: Box<dyn SerialPort>,
}

impl SystemLine {
    /// Open `descriptor` at the configured rate with 8N1 framing.
    pub fn open(descriptor: &str, config: &LineConfig) -> Result<Self> {
        if descriptor.is_empty() {
            return Err(TransportError::LineUnavailable {
                descriptor: String::new(),
                reason: "empty line descriptor".to_string(),
            });
        }

        let port = serialport::new(descriptor, config.baud_rate)
            .data_bits(DataBits::Eight)
            .stop_bits(StopBits::One)
            .parity(Parity::None)
            .flow_control(FlowControl::None)
            .timeout(config.poll_interval)
            .open()
            .map_err(|e| open_error(descriptor, e))?;

        tracing::debug!(line = descriptor, baud = config.baud_rate, "line opened");

        Ok(Self {
            name: descriptor.to_string(),
            port,
        })
    }
}

fn open_error(descriptor: &str, err: serialport::Error) -> TransportError {
    let busy = match err.kind {
        serialport::ErrorKind::Io(kind) => kind == io::ErrorKind::ResourceBusy,
        _ => false,
    } || err.description.to_ascii_lowercase().contains("busy");

    if busy {
        TransportError::LineBusy {
            descriptor: descriptor.to_string(),
        }
    } else {
        TransportError::LineUnavailable {
            descriptor: descriptor.to_string(),
            reason: err.description,
        }
    }
}

impl Read for SystemLine {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SystemLine {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl SerialLine for SystemLine {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        self.port
            .set_baud_rate(baud_rate)
            .map_err(|e| TransportError::Configure(e.description))?;
        tracing::debug!(line = %self.name, baud = baud_rate, "line rate changed");
        Ok(())
    }

    fn bytes_to_read(&mut self) -> Result<usize> {
        let available = self.port.bytes_to_read().map_err(line_io_error)?;
        Ok(available as usize)
    }
}

/// Failures on an open line surface as I/O errors.
fn line_io_error(err: serialport::Error) -> TransportError {
    TransportError::Io(err.into())
}

impl std::fmt::Debug for SystemLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemLine").field("name", &self.name).finish()
    }
}

/// Connector that opens real serial lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConnector;

impl Connector for SystemConnector {
    fn open(&self, descriptor: &str, config: &LineConfig) -> Result<Box<dyn SerialLine>> {
        Ok(Box::new(SystemLine::open(descriptor, config)?))
    }
}

/// A serial line found on the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineInfo {
    pub name: String,
    pub kind: String,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
}

impl LineInfo {
    /// Name for display, preferring the product string when the host provides one.
    pub fn description(&self) -> String {
        match (&self.manufacturer, &self.product) {
            (Some(m), Some(p)) => format!("{m} {p}"),
            (None, Some(p)) => p.clone(),
            (Some(m), None) => m.clone(),
            (None, None) => self.kind.clone(),
        }
    }
}

/// Enumerate the serial lines visible on this host.
///
/// On macOS only the `/dev/cu.*` calling units are listed; their `/dev/tty.*`
/// twins block on open waiting for carrier detect.
pub fn available_lines() -> Result<Vec<LineInfo>> {
    let ports =
        serialport::available_ports().map_err(|e| TransportError::Enumerate(e.description))?;

    Ok(ports
        .into_iter()
        .filter(|_p| {
            #[cfg(target_os = "macos")]
            {
                !_p.port_name.starts_with("/dev/tty.")
            }
            #[cfg(not(target_os = "macos"))]
            {
                true
            }
        })
        .map(|p| {
            let (kind, manufacturer, product, serial_number, vid, pid) = match p.port_type {
                SerialPortType::UsbPort(info) => (
                    "usb",
                    info.manufacturer,
                    info.product,
                    info.serial_number,
                    Some(info.vid),
                    Some(info.pid),
                ),
                SerialPortType::BluetoothPort => ("bluetooth", None, None, None, None, None),
                SerialPortType::PciPort => ("pci", None, None, None, None, None),
                SerialPortType::Unknown => ("unknown", None, None, None, None, None),
            };
            LineInfo {
                name: p.port_name,
                kind: kind.to_string(),
                manufacturer,
                product,
                serial_number,
                vid,
                pid,
            }
        })
        .collect())
}
