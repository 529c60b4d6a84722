// src/io/serial/transport.rs
//
// Serial transport handle: open/close lifecycle, blocking writes, and a
// background read loop that delivers newline-terminated UTF-8 records.
//
// State machine:
//   Closed --open()--> Open --start_read_loop()--> Reading --close()--> Closed
//
// The read loop runs on its own thread and calls `on_line` from there; hosts
// marshal onto their UI thread themselves. Per-record faults (bad UTF-8,
// oversize lines, transient read errors) are logged and skipped.

use std::io::{ErrorKind, Read, Write};
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::framer::{LineFramer, LineRecord, DEFAULT_MAX_LINE_LENGTH};
use super::link::{Connector, SerialLink, SystemConnector, DEFAULT_READ_TIMEOUT};
use super::utils::describe_framing;
use crate::io::error::{OpenError, ReadLoopError, SendError, WriteError};
use crate::protocol::{Command, CommandPacket};

const READ_CHUNK: usize = 256;

// ============================================================================
// Types
// ============================================================================

/// Lifecycle state of a transport handle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkState {
    Closed,
    Open,
    /// Open with the read loop running
    Reading,
}

/// State shared with the read loop. A fresh instance is created on every open,
/// so a worker left over from a previous session can never see a new link.
struct Shared {
    open: AtomicBool,
    link: Mutex<Option<Box<dyn SerialLink>>>,
    /// Writers blocked on `link`; the read loop steps aside while non-zero
    pending_writes: AtomicUsize,
}

impl Shared {
    fn new(link: Option<Box<dyn SerialLink>>) -> Self {
        Shared {
            open: AtomicBool::new(link.is_some()),
            link: Mutex::new(link),
            pending_writes: AtomicUsize::new(0),
        }
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Serial Transport
// ============================================================================

/// One serial connection to the board, exclusively owned by the host.
pub struct SerialTransport {
    device: String,
    baud_rate: u32,
    read_timeout: Duration,
    max_line_length: usize,
    connector: Arc<dyn Connector>,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

/// Open `device` at `baud_rate` (8-N-1) and return the live handle.
pub fn open(device: &str, baud_rate: u32) -> Result<SerialTransport, OpenError> {
    let mut transport = SerialTransport::new(device, baud_rate);
    transport.open()?;
    Ok(transport)
}

impl SerialTransport {
    /// Closed handle for a system serial port.
    pub fn new(device: impl Into<String>, baud_rate: u32) -> Self {
        Self::with_connector(device, baud_rate, Arc::new(SystemConnector))
    }

    /// Closed handle that opens its link through `connector`.
    pub fn with_connector(
        device: impl Into<String>,
        baud_rate: u32,
        connector: Arc<dyn Connector>,
    ) -> Self {
        SerialTransport {
            device: device.into(),
            baud_rate,
            read_timeout: DEFAULT_READ_TIMEOUT,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            connector,
            shared: Arc::new(Shared::new(None)),
            worker: None,
        }
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn with_max_line_length(mut self, max_line_length: usize) -> Self {
        self.max_line_length = max_line_length;
        self
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Claim the device. Fails if it is missing, busy, or not accessible.
    pub fn open(&mut self) -> Result<(), OpenError> {
        if self.is_open() {
            return Err(OpenError::AlreadyOpen {
                device: self.device.clone(),
            });
        }
        if self.baud_rate == 0 {
            return Err(OpenError::InvalidBaudRate(self.baud_rate));
        }

        // Reap a worker that gave up on a poisoned link
        self.stop_worker();

        let link = self
            .connector
            .connect(&self.device, self.baud_rate, self.read_timeout)
            .map_err(|e| {
                tlog!("[serial:{}] Open failed: {}", self.device, e);
                e
            })?;

        self.shared = Arc::new(Shared::new(Some(link)));

        tlog!(
            "[serial:{}] Opened at {} (read timeout {:?})",
            self.device,
            describe_framing(self.baud_rate),
            self.read_timeout
        );
        Ok(())
    }

    /// Release the device and stop the read loop. Closing a closed handle is a no-op.
    pub fn close(&mut self) {
        let was_open = self.shared.open.swap(false, Ordering::SeqCst);

        self.stop_worker();

        let mut guard = match self.shared.link.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.take();
        drop(guard);

        if was_open {
            tlog!("[serial:{}] Closed", self.device);
        }
    }

    pub fn is_open(&self) -> bool {
        self.shared.is_open()
    }

    pub fn state(&self) -> LinkState {
        if !self.is_open() {
            return LinkState::Closed;
        }
        match self.worker {
            Some(ref handle) if !handle.is_finished() => LinkState::Reading,
            _ => LinkState::Open,
        }
    }

    /// Transmit `bytes`. Blocks for at most one read timeout while the read loop holds the link.
    pub fn write(&self, bytes: &[u8]) -> Result<(), WriteError> {
        if !self.is_open() {
            return Err(WriteError::Closed);
        }
        self.shared.pending_writes.fetch_add(1, Ordering::SeqCst);
        let guard = self.shared.link.lock();
        self.shared.pending_writes.fetch_sub(1, Ordering::SeqCst);

        let mut guard = guard.map_err(|_| WriteError::Poisoned)?;
        let link = guard.as_mut().ok_or(WriteError::Closed)?;
        link.write_all(bytes)?;
        link.flush()?;
        Ok(())
    }

    /// Encode `command` and transmit it, returning the packet that went out.
    pub fn send(&self, command: Command) -> Result<CommandPacket, SendError> {
        let packet = command.encode()?;
        self.write(packet.as_bytes())?;
        tlog!("[serial:{}] Sent {} ({})", self.device, command, packet);
        Ok(packet)
    }

    /// Start the background read loop. `on_line` runs on the loop's thread,
    /// once per decoded record, with the line ending stripped.
    pub fn start_read_loop<F>(&mut self, on_line: F) -> Result<(), ReadLoopError>
    where
        F: FnMut(String) + Send + 'static,
    {
        if !self.is_open() {
            return Err(ReadLoopError::Closed);
        }
        if self.worker.is_some() {
            return Err(ReadLoopError::AlreadyRunning);
        }

        let reader = ReadLoop {
            device: self.device.clone(),
            shared: self.shared.clone(),
            framer: LineFramer::new(self.max_line_length),
            read_timeout: self.read_timeout,
        };

        let handle = thread::Builder::new()
            .name("uartlink-read".to_string())
            .spawn(move || reader.run(on_line))
            .map_err(|e| ReadLoopError::Spawn(e.to_string()))?;

        self.worker = Some(handle);
        Ok(())
    }

    fn stop_worker(&mut self) {
        let Some(handle) = self.worker.take() else {
            return;
        };
        // close() from inside on_line: the loop sees the cleared flag once the callback returns
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            tlog!("[serial:{}] Read loop panicked", self.device);
        }
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.close();
    }
}

// ============================================================================
// Read Loop
// ============================================================================

struct ReadLoop {
    device: String,
    shared: Arc<Shared>,
    framer: LineFramer,
    read_timeout: Duration,
}

impl ReadLoop {
    fn run<F: FnMut(String)>(mut self, mut on_line: F) {
        let mut buf = [0u8; READ_CHUNK];
        let mut delivered: u64 = 0;
        let mut skipped: u64 = 0;
        let mut at_eof = false;

        tlog!("[serial:{}] Read loop started", self.device);

        let reason = loop {
            if !self.shared.is_open() {
                break "closed";
            }
            while self.shared.pending_writes.load(Ordering::SeqCst) > 0 {
                thread::yield_now();
            }

            let read_result = match self.shared.link.lock() {
                Ok(mut guard) => match guard.as_mut() {
                    Some(link) => link.read(&mut buf),
                    None => break "closed",
                },
                Err(e) => {
                    tlog!("[serial:{}] Link mutex poisoned in read loop: {}", self.device, e);
                    // Nothing more can be read; report the handle closed so it can be reopened
                    self.shared.open.store(false, Ordering::SeqCst);
                    break "error";
                }
            };

            match read_result {
                Ok(0) => {
                    // Only close() ends the loop; keep polling in case data resumes
                    if !at_eof {
                        at_eof = true;
                        tlog!("[serial:{}] End of stream, waiting for data", self.device);
                    }
                    thread::sleep(self.read_timeout);
                }
                Ok(n) => {
                    at_eof = false;
                    for record in self.framer.feed(&buf[..n]) {
                        if !self.shared.is_open() {
                            break;
                        }
                        match record {
                            LineRecord::Line(bytes) => match String::from_utf8(bytes) {
                                Ok(text) => {
                                    delivered += 1;
                                    on_line(text);
                                }
                                Err(e) => {
                                    skipped += 1;
                                    tlog!(
                                        "[serial:{}] Skipping non-UTF-8 record: {}",
                                        self.device,
                                        hex::encode_upper(e.as_bytes())
                                    );
                                }
                            },
                            LineRecord::Overflow { discarded } => {
                                skipped += 1;
                                tlog!(
                                    "[serial:{}] Skipping oversize record ({} bytes)",
                                    self.device,
                                    discarded
                                );
                            }
                        }
                    }
                }
                Err(ref e)
                    if matches!(
                        e.kind(),
                        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                    ) => {}
                Err(e) => {
                    if !self.shared.is_open() {
                        break "closed";
                    }
                    skipped += 1;
                    tlog!("[serial:{}] Read error, continuing: {}", self.device, e);
                    thread::sleep(self.read_timeout);
                }
            }
        };

        tlog!(
            "[serial:{}] Read loop ended ({}): {} lines delivered, {} records skipped",
            self.device,
            reason,
            delivered,
            skipped
        );
    }
}

// ============================================================================
// Tests
// ============================================================================
