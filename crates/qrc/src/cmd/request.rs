//! One-shot request subcommands: open the line, send one request, print the
//! event that ends the exchange.

use std::time::Duration;

use qrc_device::event::hex;
use qrc_device::leds::{LED_COUNT, RELAY_COUNT, SMART_LED_CHANNELS};
use qrc_device::{CommandDispatcher, Event, EventStream, LedBits, RelayMask, SmartLedBuffer};
use qrc_frame::ParseErrorKind;
use qrc_transport::BAUD_RATES;

use crate::cmd::{
    parse_duration, GetArgs, GetKind, LineArgs, SetBaudrateArgs, SetLedsArgs, SetRelaysArgs,
    SetSmartLedsArgs, SetTextArgs, SmartLedArgs, SmartLedGroupArgs, TargetArgs,
};
use crate::exit::{device_error, event_code, CliError, CliResult, TIMEOUT};
use crate::output::{print_event, OutputFormat};

/// An open line with a subscription taken before the open.
pub struct Session {
    dispatcher: CommandDispatcher,
    events: EventStream,
    timeout: Duration,
}

impl Session {
    pub fn open(line: &LineArgs) -> CliResult<Self> {
        let timeout = parse_duration(&line.timeout)?;
        let dispatcher =
            CommandDispatcher::system().map_err(|e| device_error("worker start failed", e))?;
        let events = dispatcher
            .subscribe()
            .map_err(|e| device_error("subscribe failed", e))?;
        dispatcher
            .open(&line.port)
            .map_err(|e| device_error(&format!("open {} failed", line.port), e))?;

        Ok(Self {
            dispatcher,
            events,
            timeout,
        })
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    /// Wait for the event that ends the exchange just queued.
    pub fn finish(&self) -> CliResult<Event> {
        let mut terminal = None;
        for event in self.events.until_exchange_end(self.timeout) {
            if event.ends_exchange() {
                terminal = Some(event);
            } else {
                log_event(&event);
            }
        }
        terminal.ok_or_else(|| {
            CliError::new(
                TIMEOUT,
                format!("exchange did not finish within {:?}", self.timeout),
            )
        })
    }
}

/// Log events that do not end an exchange.
pub fn log_event(event: &Event) {
    match event {
        Event::ParseError { kind, bytes } if *kind == ParseErrorKind::Skipped => {
            tracing::warn!(count = bytes.len(), bytes = %hex(bytes), "skipped line noise");
        }
        Event::Started => tracing::debug!("line opened"),
        Event::Stopped => tracing::info!("line closed"),
        other => tracing::debug!(event = other.name(), "{}", other.summary()),
    }
}

/// Open the line, run `send` and report the outcome.
fn exchange<F>(target: &TargetArgs, format: OutputFormat, send: F) -> CliResult<i32>
where
    F: FnOnce(&CommandDispatcher, u8) -> qrc_device::Result<()>,
{
    let session = Session::open(&target.line)?;
    send(session.dispatcher(), target.address)
        .map_err(|e| device_error("request failed", e))?;
    let event = session.finish()?;
    print_event(&event, format);
    Ok(event_code(&event))
}

/// Queue the GetX request for `what`.
pub fn send_get(
    dispatcher: &CommandDispatcher,
    what: GetKind,
    address: u8,
) -> qrc_device::Result<()> {
    match what {
        GetKind::Keys => dispatcher.get_keys(address),
        GetKind::Sliders => dispatcher.get_sliders(address),
        GetKind::Encoders => dispatcher.get_encoders(address),
        GetKind::Sensors => dispatcher.get_sensors(address),
        GetKind::StikyKeys => dispatcher.get_stiky_keys(address),
        GetKind::State => dispatcher.get_state(address),
    }
}

pub fn hello(args: TargetArgs, format: OutputFormat) -> CliResult<i32> {
    exchange(&args, format, |d, address| d.hello(address))
}

pub fn get(args: GetArgs, format: OutputFormat) -> CliResult<i32> {
    let what = args.what;
    exchange(&args.target, format, |d, address| send_get(d, what, address))
}

pub fn set_leds(args: SetLedsArgs, format: OutputFormat) -> CliResult<i32> {
    let leds = led_bits(&args.on)?;
    exchange(&args.target, format, |d, address| d.set_leds(address, &leds))
}

pub fn set_smart_leds(args: SetSmartLedsArgs, format: OutputFormat) -> CliResult<i32> {
    let leds = smart_leds(args.fill, &args.channels)?;
    exchange(&args.target, format, |d, address| {
        d.set_smart_leds(address, &leds)
    })
}

pub fn smart_led(args: SmartLedArgs, format: OutputFormat) -> CliResult<i32> {
    let [r, g, b] = <[u16; 3]>::try_from(args.rgb.as_slice())
        .map_err(|_| CliError::usage("--rgb takes exactly three values: R,G,B"))?;
    let led = args.led;
    exchange(&args.target, format, |d, address| {
        d.set_smart_led(address, led, r, g, b)
    })
}

pub fn smart_led_group(args: SmartLedGroupArgs, format: OutputFormat) -> CliResult<i32> {
    match (args.driver, args.half) {
        (Some(driver), _) => {
            let values = <[u16; 24]>::try_from(args.values.as_slice())
                .map_err(|_| CliError::usage("--driver takes exactly 24 values"))?;
            exchange(&args.target, format, |d, address| {
                d.set_smart_led_group8(address, driver, &values)
            })
        }
        (None, Some(half)) => {
            let values = <[u16; 12]>::try_from(args.values.as_slice())
                .map_err(|_| CliError::usage("--half takes exactly 12 values"))?;
            exchange(&args.target, format, |d, address| {
                d.set_smart_led_group4(address, half, &values)
            })
        }
        (None, None) => Err(CliError::usage("one of --driver or --half is required")),
    }
}

pub fn set_relays(args: SetRelaysArgs, format: OutputFormat) -> CliResult<i32> {
    if let Some(relay) = args.on.iter().find(|&&r| r >= RELAY_COUNT) {
        return Err(CliError::usage(format!(
            "relay {relay} out of range (0-{})",
            RELAY_COUNT - 1
        )));
    }
    let relays = RelayMask::with_on(args.on.iter().copied());
    exchange(&args.target, format, |d, address| d.set_relays(address, relays))
}

pub fn set_text(args: SetTextArgs, format: OutputFormat) -> CliResult<i32> {
    if args.text.is_empty() {
        return Err(CliError::usage("--text must not be empty"));
    }
    exchange(&args.target, format, |d, address| {
        d.set_text(address, args.text.as_bytes())
    })
}

pub fn set_baudrate(args: SetBaudrateArgs, format: OutputFormat) -> CliResult<i32> {
    let index = baud_index(args.rate)?;
    let session = Session::open(&args.line)?;
    session
        .dispatcher()
        .set_baudrate(index)
        .map_err(|e| device_error("request failed", e))?;
    let event = session.finish()?;
    print_event(&event, format);
    Ok(event_code(&event))
}

fn baud_index(rate: u32) -> CliResult<usize> {
    BAUD_RATES.iter().position(|&r| r == rate).ok_or_else(|| {
        let rates: Vec<String> = BAUD_RATES.iter().map(u32::to_string).collect();
        CliError::usage(format!(
            "unsupported rate {rate}; choose one of {}",
            rates.join(", ")
        ))
    })
}

fn led_bits(on: &[usize]) -> CliResult<LedBits> {
    if let Some(led) = on.iter().find(|&&i| i >= LED_COUNT) {
        return Err(CliError::usage(format!(
            "LED {led} out of range (0-{})",
            LED_COUNT - 1
        )));
    }
    Ok(LedBits::with_on(on.iter().copied()))
}

fn smart_leds(fill: u16, assignments: &[String]) -> CliResult<SmartLedBuffer> {
    let mut leds = SmartLedBuffer::new();
    leds.fill(fill);
    for assignment in assignments {
        let (channel, value) = assignment
            .split_once('=')
            .ok_or_else(|| CliError::usage(format!("expected CHANNEL=VALUE, got {assignment}")))?;
        let channel: usize = channel
            .trim()
            .parse()
            .map_err(|_| CliError::usage(format!("invalid channel in {assignment}")))?;
        let value: u16 = value
            .trim()
            .parse()
            .map_err(|_| CliError::usage(format!("invalid value in {assignment}")))?;
        if channel >= SMART_LED_CHANNELS {
            return Err(CliError::usage(format!(
                "channel {channel} out of range (0-{})",
                SMART_LED_CHANNELS - 1
            )));
        }
        leds.set(channel, value);
    }
    Ok(leds)
}
