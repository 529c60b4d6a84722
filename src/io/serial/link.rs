// src/io/serial/link.rs
//
// Byte-stream abstraction under the transport.
// A real port, the simulated board and test doubles all look the same to the read loop.

use std::io::{Read, Write};
use std::time::Duration;

use super::utils::port_builder;
use crate::io::error::OpenError;

/// Default read timeout. Bounds how long close() waits for the worker to notice.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(50);

// ============================================================================
// Traits
// ============================================================================

/// Bidirectional byte stream to the board.
///
/// `read` must return within the link's read timeout, reporting
/// `ErrorKind::TimedOut` (or `WouldBlock`) when nothing arrived.
pub trait SerialLink: Read + Write + Send {}

impl<T: Read + Write + Send + ?Sized> SerialLink for T {}

/// Opens links by device name.
pub trait Connector: Send + Sync {
    fn connect(
        &self,
        device: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<Box<dyn SerialLink>, OpenError>;
}

// ============================================================================
// System Ports
// ============================================================================

/// Connector backed by the operating system's serial ports
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemConnector;

impl Connector for SystemConnector {
    fn connect(
        &self,
        device: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<Box<dyn SerialLink>, OpenError> {
        let port = port_builder(device, baud_rate, read_timeout)
            .open()
            .map_err(|e| OpenError::from_serialport(device, e))?;

        // Stale bytes from before we attached would surface as a garbage first record
        if let Err(e) = port.clear(serialport::ClearBuffer::Input) {
            tlog!("[serial] Could not clear input buffer on {}: {}", device, e);
        }

        Ok(Box::new(port))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_device_is_open_error() {
        let result = SystemConnector.connect(
            "/dev/uartlink-does-not-exist",
            115200,
            DEFAULT_READ_TIMEOUT,
        );
        assert!(matches!(
            result,
            Err(OpenError::NotFound { .. }) | Err(OpenError::Unavailable { .. })
        ));
    }

    #[test]
    fn test_byte_buffers_are_links() {
        fn accepts(_: Box<dyn SerialLink>) {}
        accepts(Box::new(std::io::Cursor::new(Vec::<u8>::new())));
    }
}
