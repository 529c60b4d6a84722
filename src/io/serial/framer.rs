// src/io/serial/framer.rs
//
// Newline framing for the telemetry stream.
// Bytes arrive in arbitrary chunks; records are emitted once their `\n` is seen.

/// Default upper bound for a single record, excluding the terminator
pub const DEFAULT_MAX_LINE_LENGTH: usize = 256;

const LINE_END: u8 = b'\n';
const CARRIAGE_RETURN: u8 = b'\r';

// =============================================================================
// Types
// =============================================================================

/// One unit of framer output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineRecord {
    /// Complete record with the line ending stripped (not yet UTF-8 checked)
    Line(Vec<u8>),
    /// A record ran past the length limit and was discarded up to its newline
    Overflow { discarded: usize },
}

// =============================================================================
// Line Framer
// =============================================================================

/// Splits a byte stream on `\n`, stripping an optional trailing `\r`.
/// Empty records are skipped.
#[derive(Debug)]
pub struct LineFramer {
    buffer: Vec<u8>,
    max_length: usize,
    /// Bytes dropped from the current oversize record, 0 when not overflowing
    discarding: usize,
}

impl LineFramer {
    pub fn new(max_length: usize) -> Self {
        LineFramer {
            buffer: Vec::with_capacity(max_length.min(DEFAULT_MAX_LINE_LENGTH)),
            max_length: max_length.max(1),
            discarding: 0,
        }
    }

    /// Feed bytes and collect every record they complete.
    pub fn feed(&mut self, data: &[u8]) -> Vec<LineRecord> {
        let mut records = Vec::new();

        for &byte in data {
            if byte == LINE_END {
                if self.discarding > 0 {
                    records.push(LineRecord::Overflow {
                        discarded: self.discarding,
                    });
                    self.discarding = 0;
                    continue;
                }

                if self.buffer.last() == Some(&CARRIAGE_RETURN) {
                    self.buffer.pop();
                }
                if !self.buffer.is_empty() {
                    records.push(LineRecord::Line(self.buffer.drain(..).collect()));
                }
                continue;
            }

            if self.discarding > 0 {
                self.discarding += 1;
                continue;
            }

            self.buffer.push(byte);

            // Leave room for a `\r` that belongs to the line ending
            let limit = self.max_length.saturating_add(1);
            if self.buffer.len() > limit || (self.buffer.len() == limit && byte != CARRIAGE_RETURN)
            {
                self.discarding = self.buffer.len();
                self.buffer.clear();
            }
        }

        records
    }

    /// Bytes held for the record currently being assembled
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Drop any partial record.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.discarding = 0;
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        LineFramer::new(DEFAULT_MAX_LINE_LENGTH)
    }
}

// =============================================================================
// Tests
// =============================================================================
