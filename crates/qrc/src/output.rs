use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use qrc_device::event::hex;
use qrc_device::Event;
use qrc_frame::command_name;
use qrc_transport::LineInfo;
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct EventOutput<'a> {
    event: &'a str,
    address: Option<u8>,
    summary: String,
    #[serde(skip_serializing_if = "Value::is_null")]
    data: Value,
    timestamp: String,
}

pub fn print_event(event: &Event, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = EventOutput {
                event: event.name(),
                address: event.address(),
                summary: event.summary(),
                data: event_data(event),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["EVENT", "ADDRESS", "DETAIL"]);
            for (name, detail) in event_rows(event) {
                table.add_row(vec![
                    name,
                    event
                        .address()
                        .map(|a| a.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    detail,
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => match event.address() {
            Some(address) => println!(
                "event={} address={} {}",
                event.name(),
                address,
                event.summary()
            ),
            None => println!("event={} {}", event.name(), event.summary()),
        },
    }
}

/// Structured payload of an event for JSON output.
fn event_data(event: &Event) -> Value {
    match event {
        Event::Keys { keys, .. } | Event::StikyKeys { keys, .. } => json!({ "keys": keys }),
        Event::Sliders { sliders, .. } => json!({ "sliders": sliders }),
        Event::Encoders { encoders, .. } => json!({ "encoders": encoders }),
        Event::Sensors { sensors, .. } => json!({ "sensors": sensors }),
        Event::State { state, .. } => serde_json::to_value(state).unwrap_or(Value::Null),
        Event::RawReply {
            command, payload, ..
        }
        | Event::Timeout {
            command, payload, ..
        }
        | Event::Cancelled {
            command, payload, ..
        } => json!({
            "command": command,
            "command_name": command_name(*command),
            "payload": hex(payload),
        }),
        Event::Busy { command, .. } | Event::ReplySilent { command, .. } => json!({
            "command": command,
            "command_name": command_name(*command),
        }),
        Event::ParseError { kind, bytes } => json!({
            "kind": kind.as_str(),
            "bytes": hex(bytes),
        }),
        Event::Error(message) => json!({ "message": message }),
        _ => Value::Null,
    }
}

/// Table rows; GetState is split into one row per input group.
fn event_rows(event: &Event) -> Vec<(String, String)> {
    match event {
        Event::State { state, .. } => vec![
            ("keys".to_string(), qrc_device::event::bits(&state.keys)),
            ("sliders".to_string(), format!("{:?}", state.sliders)),
            ("encoders".to_string(), format!("{:?}", state.encoders)),
            ("sensors".to_string(), format!("{:?}", state.sensors)),
            (
                "sticky_keys".to_string(),
                qrc_device::event::bits(&state.sticky_keys),
            ),
        ],
        _ => vec![(event.name().to_string(), event.summary())],
    }
}

#[derive(Serialize)]
struct PortsOutput<'a> {
    ports: &'a [LineInfo],
    timestamp: String,
}

pub fn print_lines(lines: &[LineInfo], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = PortsOutput {
                ports: lines,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PORT", "TYPE", "DESCRIPTION", "VID:PID", "SERIAL"]);
            for line in lines {
                table.add_row(vec![
                    line.name.clone(),
                    line.kind.clone(),
                    line.description(),
                    usb_id(line),
                    line.serial_number.clone().unwrap_or_default(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            if lines.is_empty() {
                println!("no serial ports found");
            }
            for line in lines {
                println!("{} ({}) {}", line.name, line.kind, line.description());
            }
        }
    }
}

fn usb_id(line: &LineInfo) -> String {
    match (line.vid, line.pid) {
        (Some(vid), Some(pid)) => format!("{vid:04x}:{pid:04x}"),
        _ => String::new(),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
