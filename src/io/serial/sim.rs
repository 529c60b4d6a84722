// src/io/serial/sim.rs
//
// In-process stand-in for the board firmware, for running hosts without hardware.
//
// Behaves like the firmware on the other end of the cable:
// - incoming bytes go through the sync-hunting packet decoder and drive three
//   PWM duties and the LED
// - every 100 ms a `#|<pot1>|<pot2>|` line is emitted; the pots sweep as
//   triangle waves

use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;

use super::link::{Connector, SerialLink};
use crate::io::error::OpenError;
use crate::protocol::{Command, PacketDecoder, Telemetry};

pub const REPORT_INTERVAL: Duration = Duration::from_millis(100);

const POT1_PERIOD_MS: u128 = 4_000;
const POT2_PERIOD_MS: u128 = 7_000;

// ============================================================================
// Board State
// ============================================================================

/// What the simulated firmware has been told so far
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BoardState {
    /// PWM duty per channel, 0..=100
    pub pwm: [u8; 3],
    pub led: bool,
    /// Packets applied
    pub accepted: u64,
    /// Packets dropped by the decoder
    pub rejected: u64,
}

impl BoardState {
    fn apply(&mut self, command: Command) {
        match command {
            Command::Channel { channel, value } => self.pwm[channel.index()] = value,
            Command::Led(on) => self.led = on,
        }
        self.accepted += 1;
    }
}

// ============================================================================
// Simulated Board
// ============================================================================

pub struct SimulatedBoard {
    state: Arc<Mutex<BoardState>>,
    decoder: PacketDecoder,
    started: Instant,
    next_report: Instant,
    read_timeout: Duration,
    outgoing: VecDeque<u8>,
}

impl SimulatedBoard {
    pub fn new(read_timeout: Duration) -> Self {
        Self::with_state(Arc::new(Mutex::new(BoardState::default())), read_timeout)
    }

    pub fn with_state(state: Arc<Mutex<BoardState>>, read_timeout: Duration) -> Self {
        let now = Instant::now();
        SimulatedBoard {
            state,
            decoder: PacketDecoder::new(),
            started: now,
            next_report: now + REPORT_INTERVAL,
            read_timeout,
            outgoing: VecDeque::new(),
        }
    }

    pub fn state(&self) -> BoardState {
        match self.state.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn telemetry(&self) -> Telemetry {
        let elapsed = self.started.elapsed().as_millis();
        Telemetry {
            first: triangle(elapsed, POT1_PERIOD_MS),
            second: triangle(elapsed, POT2_PERIOD_MS),
        }
    }

    /// Queue the next report if it is due, waiting up to one read timeout for it.
    fn poll_report(&mut self) -> bool {
        let now = Instant::now();
        if now < self.next_report {
            let wait = (self.next_report - now).min(self.read_timeout);
            std::thread::sleep(wait);
            if Instant::now() < self.next_report {
                return false;
            }
        }

        let line = format!("{}\n", self.telemetry());
        self.outgoing.extend(line.as_bytes());

        self.next_report += REPORT_INTERVAL;
        // Don't burst to catch up after a stall
        let now = Instant::now();
        if self.next_report < now {
            self.next_report = now + REPORT_INTERVAL;
        }
        true
    }
}

/// Triangle wave in 0..=100 over `period_ms`
fn triangle(elapsed_ms: u128, period_ms: u128) -> i32 {
    let half = period_ms / 2;
    let phase = elapsed_ms % period_ms;
    let level = if phase < half {
        phase * 100 / half
    } else {
        (period_ms - phase) * 100 / half
    };
    level.min(100) as i32
}

impl Read for SimulatedBoard {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.outgoing.is_empty() && !self.poll_report() {
            return Err(std::io::Error::new(ErrorKind::TimedOut, "operation timed out"));
        }

        let n = buf.len().min(self.outgoing.len());
        for (slot, byte) in buf.iter_mut().zip(self.outgoing.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for SimulatedBoard {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let results = self.decoder.feed(buf);
        if results.is_empty() {
            return Ok(buf.len());
        }

        let mut state = self
            .state
            .lock()
            .map_err(|_| std::io::Error::new(ErrorKind::Other, "board state poisoned"))?;
        for result in results {
            match result {
                Ok(command) => {
                    tlog!("[sim] Board applied {}", command);
                    state.apply(command);
                }
                Err(e) => {
                    tlog!("[sim] Board dropped packet: {}", e);
                    state.rejected += 1;
                }
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

// ============================================================================
// Connector
// ============================================================================

/// Connector that hands out simulated boards sharing one observable state
#[derive(Clone, Default)]
pub struct SimConnector {
    state: Arc<Mutex<BoardState>>,
}

impl SimConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the board as the firmware sees it
    pub fn board_state(&self) -> BoardState {
        match self.state.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Connector for SimConnector {
    fn connect(
        &self,
        device: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<Box<dyn SerialLink>, OpenError> {
        tlog!("[sim] Simulated board attached as {} ({} baud)", device, baud_rate);
        Ok(Box::new(SimulatedBoard::with_state(
            self.state.clone(),
            read_timeout,
        )))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::serial::transport::SerialTransport;
    use crate::protocol::{encode_channel_command, encode_led_command, Channel};
    use std::sync::mpsc;

    #[test]
    fn test_triangle_wave() {
        assert_eq!(triangle(0, 4_000), 0);
        assert_eq!(triangle(1_000, 4_000), 50);
        assert_eq!(triangle(2_000, 4_000), 100);
        assert_eq!(triangle(3_000, 4_000), 50);
        assert_eq!(triangle(4_000, 4_000), 0);
    }

    #[test]
    fn test_board_applies_packets() {
        let mut board = SimulatedBoard::new(Duration::from_millis(10));
        board
            .write_all(encode_channel_command(2, 64).unwrap().as_bytes())
            .unwrap();
        board.write_all(encode_led_command(true).as_bytes()).unwrap();

        let state = board.state();
        assert_eq!(state.pwm, [0, 64, 0]);
        assert!(state.led);
        assert_eq!(state.accepted, 2);
        assert_eq!(state.rejected, 0);
    }

    #[test]
    fn test_board_handles_split_packets_and_noise() {
        let mut board = SimulatedBoard::new(Duration::from_millis(10));
        let packet = encode_channel_command(3, 99).unwrap();
        board.write_all(&[0x00, 0xFF]).unwrap();
        board.write_all(&packet.as_bytes()[..2]).unwrap();
        board.write_all(&packet.as_bytes()[2..]).unwrap();
        board.write_all(&[0xA5, 0x5A, 0x02, 0x90, 0x01]).unwrap();

        let state = board.state();
        assert_eq!(state.pwm[2], 99);
        assert_eq!(state.accepted, 1);
        assert_eq!(state.rejected, 1);
    }

    #[test]
    fn test_board_reports_telemetry() {
        let mut board = SimulatedBoard::new(Duration::from_millis(200));
        let mut buf = [0u8; 64];
        let n = board.read(&mut buf).expect("read failed");
        let text = std::str::from_utf8(&buf[..n]).expect("utf8");
        assert!(text.ends_with("|\n"));
        let telemetry = Telemetry::parse(text).expect("parse failed");
        assert!((0..=100).contains(&telemetry.first));
        assert!((0..=100).contains(&telemetry.second));
    }

    #[test]
    fn test_board_times_out_between_reports() {
        let mut board = SimulatedBoard::new(Duration::from_millis(5));
        let mut buf = [0u8; 64];
        let err = board.read(&mut buf).expect_err("expected timeout");
        assert_eq!(err.kind(), ErrorKind::TimedOut);
    }

    #[test]
    fn test_transport_against_simulated_board() {
        let connector = Arc::new(SimConnector::new());
        let mut transport =
            SerialTransport::with_connector("sim", 115200, connector.clone())
                .with_read_timeout(Duration::from_millis(20));
        transport.open().expect("open failed");

        let (tx, rx) = mpsc::channel();
        transport
            .start_read_loop(move |line| {
                let _ = tx.send(line);
            })
            .expect("start failed");

        let line = rx
            .recv_timeout(Duration::from_secs(2))
            .expect("no telemetry");
        assert!(Telemetry::parse(&line).is_ok());

        transport
            .send(Command::Channel {
                channel: Channel::One,
                value: 25,
            })
            .expect("send failed");
        transport.send(Command::Led(true)).expect("send failed");
        transport.close();

        let state = connector.board_state();
        assert_eq!(state.pwm, [25, 0, 0]);
        assert!(state.led);
    }
}
