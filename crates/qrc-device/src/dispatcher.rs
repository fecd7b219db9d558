use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::{Duration, Instant};

use bytes::Bytes;
use qrc_frame::{command, MAX_ADDRESS};
use qrc_transport::{baud_rate_for_index, Connector, SystemConnector, BAUD_RATES};

use crate::error::{DeviceError, Result};
use crate::event::{Event, Outcome};
use crate::leds::{
    group4_payload, group8_payload, smart_led_payload, LedBits, RelayMask, SmartLedBuffer,
};
use crate::worker::{ConnectionState, Exchange, TransportWorker, WorkerConfig};

/// Address SetBaudrate is broadcast on.
const BROADCAST_ADDRESS: u8 = 0;

/// Typed request API over a [`TransportWorker`].
///
/// Every request method validates its arguments, queues one exchange and
/// returns immediately; the result arrives as an [`Event`] on each
/// [`EventStream`].
pub struct CommandDispatcher {
    worker: TransportWorker,
}

impl CommandDispatcher {
    /// Create a dispatcher whose worker opens lines through `connector`.
    pub fn new(connector: Box<dyn Connector>, config: WorkerConfig) -> Result<Self> {
        Ok(Self {
            worker: TransportWorker::spawn(connector, config)?,
        })
    }

    /// Create a dispatcher for real serial lines with default settings.
    pub fn system() -> Result<Self> {
        Self::new(Box::new(SystemConnector), WorkerConfig::default())
    }

    pub fn open(&self, descriptor: &str) -> Result<()> {
        self.worker.open(descriptor)
    }

    pub fn close(&self) -> Result<()> {
        self.worker.close()
    }

    pub fn state(&self) -> Result<ConnectionState> {
        self.worker.state()
    }

    /// Subscribe to events for every request queued after this call.
    pub fn subscribe(&self) -> Result<EventStream> {
        Ok(EventStream {
            outcomes: self.worker.subscribe()?,
        })
    }

    fn request(&self, address: u8, command: u8, payload: impl Into<Bytes>) -> Result<()> {
        check_address(address)?;
        self.worker.execute(Exchange::new(address, command, payload))
    }

    pub fn hello(&self, address: u8) -> Result<()> {
        self.request(address, command::HELLO, Bytes::new())
    }

    /// Broadcast a new line rate (index into the baud table) and switch the
    /// local line to it once the request is written.
    pub fn set_baudrate(&self, index: usize) -> Result<()> {
        let baud_rate = baud_rate_for_index(index).map_err(|_| {
            DeviceError::InvalidParameter(format!(
                "baud rate index {index} out of range (0-{})",
                BAUD_RATES.len() - 1
            ))
        })?;
        let exchange = Exchange::new(BROADCAST_ADDRESS, command::SET_BAUDRATE, vec![index as u8])
            .with_baud_after(baud_rate);
        self.worker.execute(exchange)
    }

    pub fn set_leds(&self, address: u8, leds: &LedBits) -> Result<()> {
        self.request(address, command::SET_LEDS, leds.as_bytes().to_vec())
    }

    pub fn set_smart_leds(&self, address: u8, leds: &SmartLedBuffer) -> Result<()> {
        self.request(address, command::SET_SMART_LEDS, leds.as_bytes().to_vec())
    }

    /// Set one smart LED (0-31). Channel values are clamped to 12 bits.
    pub fn set_smart_led(&self, address: u8, led: u8, r: u16, g: u16, b: u16) -> Result<()> {
        let payload = smart_led_payload(led, r, g, b)?;
        self.request(address, command::SET_SPECIFIC_SMART_LED, payload)
    }

    /// Set the eight smart LEDs of one driver (0-3), 24 channel values.
    pub fn set_smart_led_group8(&self, address: u8, driver: u8, values: &[u16; 24]) -> Result<()> {
        let payload = group8_payload(driver, values)?;
        self.request(address, command::SET_SPECIFIC_SMART_LEDS_8, payload)
    }

    /// Set the four smart LEDs of one driver half (0-7), 12 channel values.
    pub fn set_smart_led_group4(&self, address: u8, half: u8, values: &[u16; 12]) -> Result<()> {
        let payload = group4_payload(half, values)?;
        self.request(address, command::SET_SPECIFIC_SMART_LEDS_4, payload)
    }

    pub fn set_text(&self, address: u8, text: &[u8]) -> Result<()> {
        self.request(address, command::SET_TEXT, text.to_vec())
    }

    pub fn set_relays(&self, address: u8, relays: RelayMask) -> Result<()> {
        self.request(address, command::SET_RELAY, vec![relays.bits()])
    }

    pub fn get_keys(&self, address: u8) -> Result<()> {
        self.request(address, command::GET_KEYS, Bytes::new())
    }

    pub fn get_sliders(&self, address: u8) -> Result<()> {
        self.request(address, command::GET_SLIDERS, Bytes::new())
    }

    pub fn get_encoders(&self, address: u8) -> Result<()> {
        self.request(address, command::GET_ENCODERS, Bytes::new())
    }

    pub fn get_sensors(&self, address: u8) -> Result<()> {
        self.request(address, command::GET_SENSORS, Bytes::new())
    }

    pub fn get_stiky_keys(&self, address: u8) -> Result<()> {
        self.request(address, command::GET_STIKY_KEYS, Bytes::new())
    }

    pub fn get_state(&self, address: u8) -> Result<()> {
        self.request(address, command::GET_STATE, Bytes::new())
    }
}

fn check_address(address: u8) -> Result<()> {
    if address > MAX_ADDRESS {
        return Err(DeviceError::InvalidParameter(format!(
            "address {address} out of range (0-{MAX_ADDRESS})"
        )));
    }
    Ok(())
}

/// Typed events for one subscriber.
///
/// Ends (returns `None` from [`recv`](Self::recv)) once the worker is gone.
pub struct EventStream {
    outcomes: Receiver<Outcome>,
}

impl EventStream {
    /// Block for the next event.
    pub fn recv(&self) -> Option<Event> {
        self.outcomes.recv().ok().map(Event::from)
    }

    /// Block for the next event for at most `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Event> {
        match self.outcomes.recv_timeout(timeout) {
            Ok(outcome) => Some(outcome.into()),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn try_recv(&self) -> Option<Event> {
        match self.outcomes.try_recv() {
            Ok(outcome) => Some(outcome.into()),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Collect events up to and including the one that ends the current
    /// exchange. Stops early if `timeout` passes first.
    pub fn until_exchange_end(&self, timeout: Duration) -> Vec<Event> {
        let deadline = Instant::now() + timeout;
        let mut events = Vec::new();
        while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
            let Some(event) = self.recv_timeout(remaining) else {
                break;
            };
            let done = event.ends_exchange();
            events.push(event);
            if done {
                break;
            }
        }
        events
    }
}

impl Iterator for EventStream {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        self.recv()
    }
}
