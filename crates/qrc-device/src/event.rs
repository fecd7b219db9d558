use bytes::Bytes;
use qrc_frame::{command_name, Packet, ParseErrorKind};
use serde::Serialize;

use crate::reply::{self, ENCODER_COUNT, KEY_COUNT, SENSOR_COUNT, SLIDER_COUNT};

/// What the transport worker reports for each exchange and line transition.
///
/// Every `Execute` ends in exactly one terminal outcome: `ReplySilent`,
/// `Reply`, `Timeout`, a non-skip `ParseError`, `Error`, `Busy` (for the
/// rejected request) or `Cancelled`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The line was opened.
    Started,
    /// The line was closed or lost.
    Stopped,
    /// Line-level failure: open, write shortfall, I/O error, or no line.
    Error(String),
    /// Garbage was skipped or a candidate frame was rejected.
    ParseError { kind: ParseErrorKind, bytes: Bytes },
    /// Request to a silent address was written; no reply will follow.
    ReplySilent { address: u8, command: u8 },
    /// A well-formed reply frame.
    Reply(Packet),
    /// No reply within the reply timeout.
    Timeout { address: u8, command: u8, payload: Bytes },
    /// A request arrived while another was pending and was rejected.
    Busy { address: u8, command: u8 },
    /// The pending exchange was abandoned by close or shutdown.
    Cancelled { address: u8, command: u8, payload: Bytes },
}

/// Snapshot of every input on a device, as returned by GetState.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceState {
    pub keys: [bool; KEY_COUNT],
    pub sliders: [u8; SLIDER_COUNT],
    pub encoders: [u16; ENCODER_COUNT],
    pub sensors: [u8; SENSOR_COUNT],
    pub sticky_keys: [bool; KEY_COUNT],
}

/// Typed event delivered to dispatcher subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Started,
    Stopped,
    Error(String),
    ParseError { kind: ParseErrorKind, bytes: Bytes },
    ReplySilent { address: u8, command: u8 },
    TicketSuccess { address: u8 },
    TicketUnknown { address: u8 },
    /// Reply that has no typed decoding (set-command echoes, unknown codes).
    RawReply { address: u8, command: u8, payload: Bytes },
    Timeout { address: u8, command: u8, payload: Bytes },
    Busy { address: u8, command: u8 },
    Cancelled { address: u8, command: u8, payload: Bytes },
    Hello { address: u8 },
    BaudrateAck { address: u8 },
    Keys { address: u8, keys: [bool; KEY_COUNT] },
    Sliders { address: u8, sliders: [u8; SLIDER_COUNT] },
    Encoders { address: u8, encoders: [u16; ENCODER_COUNT] },
    Sensors { address: u8, sensors: [u8; SENSOR_COUNT] },
    StikyKeys { address: u8, keys: [bool; KEY_COUNT] },
    State { address: u8, state: DeviceState },
}

impl Event {
    /// Short stable name, used for output and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Stopped => "stopped",
            Self::Error(_) => "error",
            Self::ParseError { .. } => "parse_error",
            Self::ReplySilent { .. } => "reply_silent",
            Self::TicketSuccess { .. } => "ticket_success",
            Self::TicketUnknown { .. } => "ticket_unknown",
            Self::RawReply { .. } => "raw_reply",
            Self::Timeout { .. } => "timeout",
            Self::Busy { .. } => "busy",
            Self::Cancelled { .. } => "cancelled",
            Self::Hello { .. } => "hello",
            Self::BaudrateAck { .. } => "baudrate_ack",
            Self::Keys { .. } => "keys",
            Self::Sliders { .. } => "sliders",
            Self::Encoders { .. } => "encoders",
            Self::Sensors { .. } => "sensors",
            Self::StikyKeys { .. } => "stiky_keys",
            Self::State { .. } => "state",
        }
    }

    /// Device address the event refers to, if any.
    pub fn address(&self) -> Option<u8> {
        match self {
            Self::Started | Self::Stopped | Self::Error(_) | Self::ParseError { .. } => None,
            Self::ReplySilent { address, .. }
            | Self::TicketSuccess { address }
            | Self::TicketUnknown { address }
            | Self::RawReply { address, .. }
            | Self::Timeout { address, .. }
            | Self::Busy { address, .. }
            | Self::Cancelled { address, .. }
            | Self::Hello { address }
            | Self::BaudrateAck { address }
            | Self::Keys { address, .. }
            | Self::Sliders { address, .. }
            | Self::Encoders { address, .. }
            | Self::Sensors { address, .. }
            | Self::StikyKeys { address, .. }
            | Self::State { address, .. } => Some(*address),
        }
    }

    /// True if this event is the terminal outcome of the pending exchange.
    ///
    /// `Busy` answers a rejected request; the pending exchange keeps running.
    pub fn ends_exchange(&self) -> bool {
        match self {
            Self::Started | Self::Stopped | Self::Busy { .. } => false,
            Self::ParseError { kind, .. } => *kind != ParseErrorKind::Skipped,
            _ => true,
        }
    }

    /// True for outcomes that mean the request did not get its answer.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::Error(_)
                | Self::ParseError { .. }
                | Self::Timeout { .. }
                | Self::Busy { .. }
                | Self::Cancelled { .. }
                | Self::TicketUnknown { .. }
        )
    }

    /// One-line human-readable summary.
    pub fn summary(&self) -> String {
        match self {
            Self::Started => "line opened".to_string(),
            Self::Stopped => "line closed".to_string(),
            Self::Error(message) => message.clone(),
            Self::ParseError { kind, bytes } => {
                format!("{kind} error over {} byte(s): {}", bytes.len(), hex(bytes))
            }
            Self::ReplySilent { address, command } => {
                format!("{} sent to silent address {address}", command_name(*command))
            }
            Self::TicketSuccess { address } => format!("device {address} accepted the request"),
            Self::TicketUnknown { address } => {
                format!("device {address} did not recognise the command")
            }
            Self::RawReply {
                address,
                command,
                payload,
            } => format!(
                "device {address} replied {} ({command:#04x}): {}",
                command_name(*command),
                hex(payload)
            ),
            Self::Timeout {
                address, command, ..
            } => format!("no reply from {address} to {}", command_name(*command)),
            Self::Busy { address, command } => format!(
                "{} to {address} rejected: another request is pending",
                command_name(*command)
            ),
            Self::Cancelled {
                address, command, ..
            } => format!("{} to {address} cancelled", command_name(*command)),
            Self::Hello { address } => format!("device {address} says hello"),
            Self::BaudrateAck { address } => format!("device {address} acknowledged baud rate"),
            Self::Keys { keys, .. } => format!("keys {}", bits(keys)),
            Self::Sliders { sliders, .. } => format!("sliders {sliders:?}"),
            Self::Encoders { encoders, .. } => format!("encoders {encoders:?}"),
            Self::Sensors { sensors, .. } => format!("sensors {sensors:?}"),
            Self::StikyKeys { keys, .. } => format!("sticky keys {}", bits(keys)),
            Self::State { state, .. } => format!(
                "keys {} sliders {:?} encoders {:?} sensors {:?} sticky {}",
                bits(&state.keys),
                state.sliders,
                state.encoders,
                state.sensors,
                bits(&state.sticky_keys)
            ),
        }
    }
}

impl From<Outcome> for Event {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Started => Self::Started,
            Outcome::Stopped => Self::Stopped,
            Outcome::Error(message) => Self::Error(message),
            Outcome::ParseError { kind, bytes } => Self::ParseError { kind, bytes },
            Outcome::ReplySilent { address, command } => Self::ReplySilent { address, command },
            Outcome::Reply(packet) => reply::decode_reply(&packet),
            Outcome::Timeout {
                address,
                command,
                payload,
            } => Self::Timeout {
                address,
                command,
                payload,
            },
            Outcome::Busy { address, command } => Self::Busy { address, command },
            Outcome::Cancelled {
                address,
                command,
                payload,
            } => Self::Cancelled {
                address,
                command,
                payload,
            },
        }
    }
}

/// Space-separated lowercase hex.
pub fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Keys as a string of `0`/`1`, key 0 first.
pub fn bits(keys: &[bool]) -> String {
    keys.iter().map(|&k| if k { '1' } else { '0' }).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use qrc_frame::command;

    #[test]
    fn skipped_bytes_do_not_end_an_exchange() {
        let skipped = Event::ParseError {
            kind: ParseErrorKind::Skipped,
            bytes: Bytes::from_static(&[1]),
        };
        let tag = Event::ParseError {
            kind: ParseErrorKind::Tag,
            bytes: Bytes::from_static(&[1]),
        };
        assert!(!skipped.ends_exchange());
        assert!(tag.ends_exchange());
        assert!(!Event::Started.ends_exchange());
        assert!(Event::ReplySilent { address: 0, command: 0 }.ends_exchange());
    }

    #[test]
    fn busy_does_not_end_the_pending_exchange() {
        let busy = Event::Busy {
            address: 2,
            command: command::GET_SLIDERS,
        };
        assert!(!busy.ends_exchange());
        assert!(busy.is_failure());
    }

    #[test]
    fn reply_outcome_is_decoded() {
        let packet = Packet::new(3, command::SUCCESS, Bytes::new());
        assert_eq!(
            Event::from(Outcome::Reply(packet)),
            Event::TicketSuccess { address: 3 }
        );
    }

    #[test]
    fn summaries() {
        assert_eq!(hex(&[0x81, 0x0a]), "81 0a");
        assert_eq!(bits(&[true, false, true]), "101");
        let event = Event::Timeout {
            address: 2,
            command: command::GET_KEYS,
            payload: Bytes::new(),
        };
        assert_eq!(event.summary(), "no reply from 2 to GET_KEYS");
        assert_eq!(event.address(), Some(2));
        assert!(event.is_failure());
    }
}
