use std::io::{self, ErrorKind};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::Bytes;
use qrc_frame::{encode, is_silent_address, ParseOutcome, StreamParser};
use qrc_transport::{Connector, LineConfig, SerialLine, TransportError, DEFAULT_BAUD_RATE};
use serde::Serialize;

use crate::error::{DeviceError, Result};
use crate::event::Outcome;

/// Time allowed for a reply, measured from the end of the request write.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_millis(350);

const READ_CHUNK_SIZE: usize = 256;

/// Configuration for the transport worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Deadline for a terminal reply after a request is written. Default: 350 ms.
    pub reply_timeout: Duration,
    /// Parameters for every line the worker opens. The poll interval bounds
    /// how long the worker can go without checking for new requests.
    pub line: LineConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            line: LineConfig::default(),
        }
    }
}

/// Line state as seen by the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Closed,
    Opening,
    Open,
}

/// One request/reply exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub address: u8,
    pub command: u8,
    pub payload: Bytes,
    /// Line rate to switch to once the exchange succeeds.
    pub baud_after: Option<u32>,
}

impl Exchange {
    pub fn new(address: u8, command: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            address,
            command,
            payload: payload.into(),
            baud_after: None,
        }
    }

    pub fn with_baud_after(mut self, baud_rate: u32) -> Self {
        self.baud_after = Some(baud_rate);
        self
    }
}

enum Request {
    Open {
        descriptor: String,
        reply: Sender<std::result::Result<(), TransportError>>,
    },
    Close,
    Execute(Exchange),
    Subscribe(Sender<Outcome>),
    State(Sender<ConnectionState>),
    Shutdown,
}

#[derive(Debug, thiserror::Error)]
enum LineFault {
    #[error("write shortfall: wrote {written} of {expected} bytes")]
    WriteShortfall { written: usize, expected: usize },

    #[error("line I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Line(#[from] TransportError),
}

/// Handle to the thread that owns the serial line.
///
/// Requests are queued over a channel and handled strictly one at a time.
/// Dropping the handle shuts the thread down and waits for it.
pub struct TransportWorker {
    requests: Sender<Request>,
    thread: Option<JoinHandle<()>>,
}

impl TransportWorker {
    /// Start a worker that opens lines through `connector`.
    pub fn spawn(connector: Box<dyn Connector>, config: WorkerConfig) -> Result<Self> {
        let (requests, inbox) = mpsc::channel();
        let worker = Worker {
            connector,
            config,
            inbox,
            subscribers: Vec::new(),
            line: None,
            descriptor: None,
            baud_rate: DEFAULT_BAUD_RATE,
            parser: StreamParser::new(),
            state: ConnectionState::Closed,
        };
        let thread = thread::Builder::new()
            .name("qrc-worker".to_string())
            .spawn(move || worker.run())?;

        Ok(Self {
            requests,
            thread: Some(thread),
        })
    }

    fn send(&self, request: Request) -> Result<()> {
        self.requests
            .send(request)
            .map_err(|_| DeviceError::NotRunning)
    }

    /// Open `descriptor` at the default rate, closing any line already open.
    ///
    /// Blocks until the worker has tried; a pending exchange is cancelled first.
    pub fn open(&self, descriptor: &str) -> Result<()> {
        let (reply, result) = mpsc::channel();
        self.send(Request::Open {
            descriptor: descriptor.to_string(),
            reply,
        })?;
        result.recv().map_err(|_| DeviceError::NotRunning)??;
        Ok(())
    }

    /// Close the line. Safe when already closed.
    pub fn close(&self) -> Result<()> {
        self.send(Request::Close)
    }

    /// Queue an exchange. Its outcome arrives on the subscriptions.
    pub fn execute(&self, exchange: Exchange) -> Result<()> {
        self.send(Request::Execute(exchange))
    }

    /// Register a new outcome subscription.
    pub fn subscribe(&self) -> Result<Receiver<Outcome>> {
        let (tx, rx) = mpsc::channel();
        self.send(Request::Subscribe(tx))?;
        Ok(rx)
    }

    /// Current line state, after every request queued before this call.
    pub fn state(&self) -> Result<ConnectionState> {
        let (tx, rx) = mpsc::channel();
        self.send(Request::State(tx))?;
        rx.recv().map_err(|_| DeviceError::NotRunning)
    }
}

impl Drop for TransportWorker {
    fn drop(&mut self) {
        let _ = self.requests.send(Request::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("transport worker panicked");
            }
        }
    }
}

struct Worker {
    connector: Box<dyn Connector>,
    config: WorkerConfig,
    inbox: Receiver<Request>,
    subscribers: Vec<Sender<Outcome>>,
    line: Option<Box<dyn SerialLine>>,
    /// Descriptor of the last explicit open; kept across line failures for lazy reopen.
    descriptor: Option<String>,
    baud_rate: u32,
    parser: StreamParser,
    state: ConnectionState,
}

impl Worker {
    fn run(mut self) {
        tracing::debug!("transport worker started");
        let mut deferred = None;
        loop {
            let request = match deferred.take() {
                Some(request) => request,
                None => match self.inbox.recv() {
                    Ok(request) => request,
                    Err(_) => break,
                },
            };

            match request {
                Request::Open { descriptor, reply } => {
                    let _ = reply.send(self.open(descriptor));
                }
                Request::Close => self.close(),
                Request::Execute(exchange) => deferred = self.execute(exchange),
                Request::Subscribe(tx) => self.subscribers.push(tx),
                Request::State(tx) => {
                    let _ = tx.send(self.state);
                }
                Request::Shutdown => break,
            }
        }
        self.close();
        tracing::debug!("transport worker stopped");
    }

    fn emit(&mut self, outcome: Outcome) {
        tracing::trace!(?outcome, "outcome");
        self.subscribers.retain(|tx| tx.send(outcome.clone()).is_ok());
    }

    fn open(&mut self, descriptor: String) -> std::result::Result<(), TransportError> {
        self.close();
        self.state = ConnectionState::Opening;
        self.baud_rate = DEFAULT_BAUD_RATE;

        match self.connect(&descriptor) {
            Ok(()) => {
                self.descriptor = Some(descriptor);
                Ok(())
            }
            Err(err) => {
                self.emit(Outcome::Stopped);
                Err(err)
            }
        }
    }

    /// Open the line at the current rate. Emits `Started` or `Error`.
    fn connect(&mut self, descriptor: &str) -> std::result::Result<(), TransportError> {
        let config = LineConfig {
            baud_rate: self.baud_rate,
            ..self.config.line.clone()
        };
        match self.connector.open(descriptor, &config) {
            Ok(line) => {
                tracing::info!(line = line.name(), baud = self.baud_rate, "line open");
                self.line = Some(line);
                self.parser.clear();
                self.state = ConnectionState::Open;
                self.emit(Outcome::Started);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(line = descriptor, error = %err, "failed to open line");
                self.state = ConnectionState::Closed;
                self.emit(Outcome::Error(err.to_string()));
                Err(err)
            }
        }
    }

    fn close(&mut self) {
        self.descriptor = None;
        self.parser.clear();
        if let Some(line) = self.line.take() {
            tracing::info!(line = line.name(), "line closed");
            self.state = ConnectionState::Closed;
            self.emit(Outcome::Stopped);
        }
        self.state = ConnectionState::Closed;
    }

    /// Drop the line after an I/O failure, keeping the descriptor for lazy reopen.
    fn fail_line(&mut self, fault: LineFault) {
        tracing::warn!(error = %fault, "line failure");
        self.emit(Outcome::Error(fault.to_string()));
        if self.line.take().is_some() {
            self.state = ConnectionState::Closed;
            self.emit(Outcome::Stopped);
        }
    }

    /// Run one exchange to its terminal outcome.
    ///
    /// Returns a control request that interrupted the exchange, to be
    /// handled next by the main loop.
    fn execute(&mut self, exchange: Exchange) -> Option<Request> {
        if self.line.is_none() {
            let Some(descriptor) = self.descriptor.clone() else {
                self.emit(Outcome::Error("line not open".to_string()));
                return None;
            };
            self.state = ConnectionState::Opening;
            if self.connect(&descriptor).is_err() {
                return None;
            }
        }

        let frame = encode(exchange.address, exchange.command, &exchange.payload);
        tracing::debug!(
            address = exchange.address,
            command = exchange.command,
            len = frame.len(),
            "request"
        );
        match self.write_frame(&frame) {
            Ok(()) => {}
            Err(fault @ LineFault::WriteShortfall { .. }) => {
                tracing::warn!(error = %fault, "request aborted");
                self.emit(Outcome::Error(fault.to_string()));
                return None;
            }
            Err(fault) => {
                self.fail_line(fault);
                return None;
            }
        }

        // The reply window opens once the request has been written out.
        let dispatched = Instant::now();
        let deadline = dispatched + self.config.reply_timeout;

        if is_silent_address(exchange.address) {
            self.emit(Outcome::ReplySilent {
                address: exchange.address,
                command: exchange.command,
            });
            self.apply_baud(exchange.baud_after);
            return None;
        }

        loop {
            if let Some(interrupt) = self.drain_inbox(&exchange) {
                self.emit(Outcome::Cancelled {
                    address: exchange.address,
                    command: exchange.command,
                    payload: exchange.payload.clone(),
                });
                return Some(interrupt);
            }

            // Past the deadline only bytes already waiting on the line count.
            let expired = Instant::now() >= deadline;
            let polled = if expired {
                self.drain_line()
            } else {
                self.poll_line()
            };
            let received = match polled {
                Ok(received) => received,
                Err(fault) => {
                    self.fail_line(fault);
                    return None;
                }
            };
            if !expired && received > 0 && Instant::now() > deadline {
                break;
            }

            loop {
                match self.parser.next_outcome() {
                    ParseOutcome::NeedMoreData => break,
                    ParseOutcome::Success(packet) => {
                        tracing::debug!(
                            address = packet.address,
                            command = packet.command,
                            len = packet.payload.len(),
                            "reply"
                        );
                        self.emit(Outcome::Reply(packet));
                        self.apply_baud(exchange.baud_after);
                        return None;
                    }
                    outcome => {
                        let terminal = outcome.is_terminal();
                        if let Some((kind, bytes)) = outcome.error() {
                            self.emit(Outcome::ParseError {
                                kind,
                                bytes: bytes.clone(),
                            });
                        }
                        if terminal {
                            return None;
                        }
                    }
                }
            }

            if expired {
                break;
            }
        }

        tracing::debug!(
            address = exchange.address,
            command = exchange.command,
            elapsed_ms = dispatched.elapsed().as_millis() as u64,
            "reply timeout"
        );
        self.emit(Outcome::Timeout {
            address: exchange.address,
            command: exchange.command,
            payload: exchange.payload,
        });
        None
    }

    /// Handle requests that arrived while an exchange is pending.
    ///
    /// Further exchanges are rejected as busy. Open, close and shutdown
    /// interrupt the pending exchange and are returned.
    fn drain_inbox(&mut self, pending: &Exchange) -> Option<Request> {
        loop {
            match self.inbox.try_recv() {
                Ok(Request::Execute(other)) => {
                    tracing::debug!(
                        address = other.address,
                        command = other.command,
                        pending = pending.command,
                        "request rejected, exchange pending"
                    );
                    self.emit(Outcome::Busy {
                        address: other.address,
                        command: other.command,
                    });
                }
                Ok(Request::Subscribe(tx)) => self.subscribers.push(tx),
                Ok(Request::State(tx)) => {
                    let _ = tx.send(self.state);
                }
                Ok(interrupt) => return Some(interrupt),
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => return Some(Request::Shutdown),
            }
        }
    }

    fn write_frame(&mut self, frame: &[u8]) -> std::result::Result<(), LineFault> {
        let Some(line) = self.line.as_mut() else {
            return Err(LineFault::Io(io::Error::from(ErrorKind::NotConnected)));
        };

        let mut offset = 0usize;
        while offset < frame.len() {
            match line.write(&frame[offset..]) {
                Ok(0) => break,
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::TimedOut => break,
                Err(err) => return Err(LineFault::Io(err)),
            }
        }
        if offset < frame.len() {
            return Err(LineFault::WriteShortfall {
                written: offset,
                expected: frame.len(),
            });
        }

        loop {
            match line.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(LineFault::Io(err)),
            }
        }
    }

    /// Wait up to one poll interval for bytes and append them to the parser.
    fn poll_line(&mut self) -> std::result::Result<usize, LineFault> {
        let Some(line) = self.line.as_mut() else {
            return Err(LineFault::Io(io::Error::from(ErrorKind::NotConnected)));
        };

        let mut chunk = [0u8; READ_CHUNK_SIZE];
        match line.read(&mut chunk) {
            Ok(0) => {
                thread::sleep(self.config.line.poll_interval);
                Ok(0)
            }
            Ok(n) => {
                tracing::trace!(len = n, "received");
                self.parser.extend(&chunk[..n]);
                Ok(n)
            }
            Err(err) if is_idle(&err) => Ok(0),
            Err(err) => Err(LineFault::Io(err)),
        }
    }

    /// Take only the bytes the line already holds, without waiting.
    fn drain_line(&mut self) -> std::result::Result<usize, LineFault> {
        let Some(line) = self.line.as_mut() else {
            return Err(LineFault::Io(io::Error::from(ErrorKind::NotConnected)));
        };

        let available = line.bytes_to_read()?;
        if available == 0 {
            return Ok(0);
        }
        let mut chunk = vec![0u8; available];
        match line.read(&mut chunk) {
            Ok(n) => {
                tracing::trace!(len = n, "received at deadline");
                self.parser.extend(&chunk[..n]);
                Ok(n)
            }
            Err(err) if is_idle(&err) => Ok(0),
            Err(err) => Err(LineFault::Io(err)),
        }
    }

    fn apply_baud(&mut self, baud_after: Option<u32>) {
        let (Some(baud_rate), Some(line)) = (baud_after, self.line.as_mut()) else {
            return;
        };
        match line.set_baud_rate(baud_rate) {
            Ok(()) => {
                tracing::info!(baud = baud_rate, "line rate switched");
                self.baud_rate = baud_rate;
            }
            Err(err) => {
                tracing::warn!(
                    baud = baud_rate,
                    current = self.baud_rate,
                    error = %err,
                    "failed to switch line rate"
                );
            }
        }
    }
}

fn is_idle(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
    )
}
