use std::fmt;
use std::io;

use qrc_device::{DeviceError, Event};
use qrc_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(USAGE, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound | io::ErrorKind::BrokenPipe => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Io(source) => io_error(context, source),
        TransportError::InvalidBaudIndex(_) => CliError::usage(format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn device_error(context: &str, err: DeviceError) -> CliError {
    match err {
        DeviceError::Transport(err) => transport_error(context, err),
        DeviceError::Io(source) => io_error(context, source),
        DeviceError::InvalidParameter(_) => CliError::usage(format!("{context}: {err}")),
        DeviceError::NotRunning => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}

/// Process exit code for the event that ended an exchange.
pub fn event_code(event: &Event) -> i32 {
    match event {
        Event::Timeout { .. } => TIMEOUT,
        Event::ParseError { .. } => DATA_INVALID,
        Event::Error(_) => TRANSPORT_ERROR,
        Event::Busy { .. } | Event::Cancelled { .. } | Event::TicketUnknown { .. } => FAILURE,
        _ => SUCCESS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qrc_frame::ParseErrorKind;

    #[test]
    fn event_codes() {
        assert_eq!(event_code(&Event::Hello { address: 1 }), SUCCESS);
        assert_eq!(event_code(&Event::TicketSuccess { address: 1 }), SUCCESS);
        assert_eq!(
            event_code(&Event::ReplySilent {
                address: 0,
                command: 0x01
            }),
            SUCCESS
        );
        assert_eq!(
            event_code(&Event::Timeout {
                address: 1,
                command: 0x18,
                payload: Default::default()
            }),
            TIMEOUT
        );
        assert_eq!(
            event_code(&Event::ParseError {
                kind: ParseErrorKind::Checksum,
                bytes: Default::default()
            }),
            DATA_INVALID
        );
        assert_eq!(event_code(&Event::Error("gone".into())), TRANSPORT_ERROR);
        assert_eq!(event_code(&Event::TicketUnknown { address: 2 }), FAILURE);
    }

    #[test]
    fn device_errors_map_to_codes() {
        let err = device_error(
            "open failed",
            DeviceError::Transport(TransportError::LineUnavailable {
                descriptor: "/dev/x".into(),
                reason: "No such file or directory".into(),
            }),
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
        assert!(err.message.starts_with("open failed: "));

        let err = device_error("request", DeviceError::InvalidParameter("led 40".into()));
        assert_eq!(err.code, USAGE);

        let err = device_error("request", DeviceError::NotRunning);
        assert_eq!(err.code, INTERNAL);

        let err = io_error(
            "open",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.code, PERMISSION_DENIED);
    }
}
