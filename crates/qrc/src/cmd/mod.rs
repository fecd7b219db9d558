use std::time::Duration;

use clap::{ArgGroup, Args, Subcommand, ValueEnum};

use crate::exit::{CliError, CliResult};
use crate::output::OutputFormat;

pub mod ports;
pub mod request;
pub mod version;
pub mod watch;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List serial ports on this host.
    Ports,
    /// Ping a device.
    Hello(TargetArgs),
    /// Read inputs from a device.
    Get(GetArgs),
    /// Set the 80 plain LEDs.
    SetLeds(SetLedsArgs),
    /// Set all 32 smart LEDs at once.
    SetSmartLeds(SetSmartLedsArgs),
    /// Set one smart LED.
    SmartLed(SmartLedArgs),
    /// Set the smart LEDs of one driver (8 LEDs) or driver half (4 LEDs).
    SmartLedGroup(SmartLedGroupArgs),
    /// Switch the relays.
    SetRelays(SetRelaysArgs),
    /// Send text to a device display.
    SetText(SetTextArgs),
    /// Switch every device on the line, and the line itself, to a new rate.
    SetBaudrate(SetBaudrateArgs),
    /// Poll a device repeatedly and print each reply.
    Watch(WatchArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Ports => ports::run(format),
        Command::Hello(args) => request::hello(args, format),
        Command::Get(args) => request::get(args, format),
        Command::SetLeds(args) => request::set_leds(args, format),
        Command::SetSmartLeds(args) => request::set_smart_leds(args, format),
        Command::SmartLed(args) => request::smart_led(args, format),
        Command::SmartLedGroup(args) => request::smart_led_group(args, format),
        Command::SetRelays(args) => request::set_relays(args, format),
        Command::SetText(args) => request::set_text(args, format),
        Command::SetBaudrate(args) => request::set_baudrate(args, format),
        Command::Watch(args) => watch::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct LineArgs {
    /// Serial port to open (e.g. /dev/ttyUSB0, COM3).
    #[arg(env = "QRC_PORT")]
    pub port: String,
    /// How long to wait for the exchange to finish (e.g. 2s, 500ms).
    #[arg(long, default_value = "2s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct TargetArgs {
    #[command(flatten)]
    pub line: LineArgs,
    /// Device address. 0 and 15 are written to but never reply.
    #[arg(long, short = 'a', default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=15))]
    pub address: u8,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum GetKind {
    Keys,
    Sliders,
    Encoders,
    Sensors,
    StikyKeys,
    State,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Which inputs to read.
    pub what: GetKind,
    #[command(flatten)]
    pub target: TargetArgs,
}

#[derive(Args, Debug)]
pub struct SetLedsArgs {
    #[command(flatten)]
    pub target: TargetArgs,
    /// LEDs to switch on (0-79, comma-separated). All others go off.
    #[arg(long, value_delimiter = ',')]
    pub on: Vec<usize>,
}

#[derive(Args, Debug)]
pub struct SetSmartLedsArgs {
    #[command(flatten)]
    pub target: TargetArgs,
    /// Value (0-4095) for every channel before --set is applied.
    #[arg(long, default_value_t = 0)]
    pub fill: u16,
    /// Individual channel values as CHANNEL=VALUE (channel 0-95, repeatable).
    #[arg(long = "set", value_name = "CHANNEL=VALUE")]
    pub channels: Vec<String>,
}

#[derive(Args, Debug)]
pub struct SmartLedArgs {
    #[command(flatten)]
    pub target: TargetArgs,
    /// LED number (0-31).
    #[arg(long)]
    pub led: u8,
    /// Red, green and blue values (0-4095).
    #[arg(long, value_delimiter = ',', value_name = "R,G,B")]
    pub rgb: Vec<u16>,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("group").required(true).args(["driver", "half"])))]
pub struct SmartLedGroupArgs {
    #[command(flatten)]
    pub target: TargetArgs,
    /// Driver (0-3); takes 24 values.
    #[arg(long)]
    pub driver: Option<u8>,
    /// Driver half (0-7); takes 12 values.
    #[arg(long)]
    pub half: Option<u8>,
    /// Channel values in R,G,B order per LED (0-4095, comma-separated).
    #[arg(long, value_delimiter = ',', required = true)]
    pub values: Vec<u16>,
}

#[derive(Args, Debug)]
pub struct SetRelaysArgs {
    #[command(flatten)]
    pub target: TargetArgs,
    /// Relays to close (0-3, comma-separated). All others open.
    #[arg(long, value_delimiter = ',')]
    pub on: Vec<usize>,
}

#[derive(Args, Debug)]
pub struct SetTextArgs {
    #[command(flatten)]
    pub target: TargetArgs,
    /// Text to send.
    #[arg(long)]
    pub text: String,
}

#[derive(Args, Debug)]
pub struct SetBaudrateArgs {
    #[command(flatten)]
    pub line: LineArgs,
    /// New rate in bits per second.
    #[arg(long)]
    pub rate: u32,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Which inputs to poll.
    pub what: GetKind,
    #[command(flatten)]
    pub target: TargetArgs,
    /// Delay between polls (e.g. 500ms, 1s).
    #[arg(long, default_value = "500ms")]
    pub interval: String,
    /// Stop after N polls.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::usage(format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::usage("duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
