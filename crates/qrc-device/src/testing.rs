//! In-memory serial lines for worker and dispatcher tests.

use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use qrc_transport::{Connector, LineConfig, SerialLine, TransportError};

#[derive(Debug, Default)]
struct Control {
    write_limit: Option<usize>,
    fail_reads: bool,
    fail_baud: bool,
    flush_delay: Option<Duration>,
    opened_at: Option<u32>,
}

/// Line handed to the worker. Reads block for one poll interval.
pub(crate) struct MockLine {
    name: String,
    incoming: Receiver<Vec<u8>>,
    pending: VecDeque<u8>,
    written: Sender<Vec<u8>>,
    bauds: Sender<u32>,
    poll: Duration,
    control: Arc<Mutex<Control>>,
}

/// The device end of a [`MockLine`].
pub(crate) struct Remote {
    to_host: Sender<Vec<u8>>,
    from_host: Receiver<Vec<u8>>,
    bauds: Receiver<u32>,
    control: Arc<Mutex<Control>>,
}

fn line_pair() -> (MockLine, Remote) {
    let (to_host, incoming) = mpsc::channel();
    let (written, from_host) = mpsc::channel();
    let (baud_tx, bauds) = mpsc::channel();
    let control = Arc::new(Mutex::new(Control::default()));
    let line = MockLine {
        name: String::new(),
        incoming,
        pending: VecDeque::new(),
        written,
        bauds: baud_tx,
        poll: Duration::from_millis(25),
        control: Arc::clone(&control),
    };
    let remote = Remote {
        to_host,
        from_host,
        bauds,
        control,
    };
    (line, remote)
}

impl Remote {
    /// Queue bytes for the host to read.
    pub(crate) fn reply(&self, bytes: &[u8]) {
        self.to_host.send(bytes.to_vec()).unwrap();
    }

    pub(crate) fn next_written(&self, timeout: Duration) -> Option<Vec<u8>> {
        self.from_host.recv_timeout(timeout).ok()
    }

    pub(crate) fn next_baud(&self, timeout: Duration) -> Option<u32> {
        self.bauds.recv_timeout(timeout).ok()
    }

    /// Accept only `limit` more bytes; later writes report zero bytes written.
    pub(crate) fn limit_writes(&self, limit: usize) {
        self.control.lock().unwrap().write_limit = Some(limit);
    }

    pub(crate) fn fail_reads(&self) {
        self.control.lock().unwrap().fail_reads = true;
    }

    pub(crate) fn fail_baud_changes(&self) {
        self.control.lock().unwrap().fail_baud = true;
    }

    /// Make every flush block for `delay`, like a drain on a slow line.
    pub(crate) fn delay_flush(&self, delay: Duration) {
        self.control.lock().unwrap().flush_delay = Some(delay);
    }

    /// Rate the line was opened at, if it was opened.
    pub(crate) fn opened_at(&self) -> Option<u32> {
        self.control.lock().unwrap().opened_at
    }
}

impl Read for MockLine {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.control.lock().unwrap().fail_reads {
            return Err(io::Error::new(ErrorKind::BrokenPipe, "device unplugged"));
        }
        if self.pending.is_empty() {
            match self.incoming.recv_timeout(self.poll) {
                Ok(bytes) => self.pending.extend(bytes),
                Err(RecvTimeoutError::Timeout) => return Err(ErrorKind::TimedOut.into()),
                Err(RecvTimeoutError::Disconnected) => {
                    thread::sleep(self.poll);
                    return Err(ErrorKind::TimedOut.into());
                }
            }
        }
        let n = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MockLine {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut control = self.control.lock().unwrap();
        let limit = control.write_limit;
        let n = match limit {
            Some(limit) => {
                let n = limit.min(buf.len());
                control.write_limit = Some(limit - n);
                n
            }
            None => buf.len(),
        };
        if n > 0 {
            let _ = self.written.send(buf[..n].to_vec());
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        let delay = self.control.lock().unwrap().flush_delay;
        if let Some(delay) = delay {
            thread::sleep(delay);
        }
        Ok(())
    }
}

impl SerialLine for MockLine {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> qrc_transport::Result<()> {
        if self.control.lock().unwrap().fail_baud {
            return Err(TransportError::Configure("rate not supported".to_string()));
        }
        let _ = self.bauds.send(baud_rate);
        Ok(())
    }

    fn bytes_to_read(&mut self) -> qrc_transport::Result<usize> {
        while let Ok(bytes) = self.incoming.try_recv() {
            self.pending.extend(bytes);
        }
        Ok(self.pending.len())
    }
}

/// Hands out prepared lines in order. `"busy"` is always reported busy.
pub(crate) struct MockConnector {
    lines: Mutex<VecDeque<MockLine>>,
}

impl MockConnector {
    pub(crate) fn empty() -> Self {
        Self {
            lines: Mutex::new(VecDeque::new()),
        }
    }

    pub(crate) fn single() -> (Self, Remote) {
        let (line, remote) = line_pair();
        let connector = Self::empty();
        connector.lines.lock().unwrap().push_back(line);
        (connector, remote)
    }

    /// Two lines: the first open gets the first, the next (re)open the second.
    pub(crate) fn pair() -> (Self, Remote, Remote) {
        let (first, first_remote) = line_pair();
        let (second, second_remote) = line_pair();
        let connector = Self::empty();
        connector.lines.lock().unwrap().extend([first, second]);
        (connector, first_remote, second_remote)
    }
}

impl Connector for MockConnector {
    fn open(
        &self,
        descriptor: &str,
        config: &LineConfig,
    ) -> qrc_transport::Result<Box<dyn SerialLine>> {
        if descriptor == "busy" {
            return Err(TransportError::LineBusy {
                descriptor: descriptor.to_string(),
            });
        }
        let Some(mut line) = self.lines.lock().unwrap().pop_front() else {
            return Err(TransportError::LineUnavailable {
                descriptor: descriptor.to_string(),
                reason: "no such line".to_string(),
            });
        };
        line.name = descriptor.to_string();
        line.poll = config.poll_interval;
        line.control.lock().unwrap().opened_at = Some(config.baud_rate);
        Ok(Box::new(line))
    }
}
