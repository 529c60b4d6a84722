// src/io/error.rs
//
// Error taxonomy for the serial link.
//
// Connection and configuration failures are surfaced to the caller as typed
// errors. Per-record read/decode faults inside the read loop never reach the
// caller; they are logged and the record is skipped.

use thiserror::Error;

use crate::protocol::InvalidValueError;

// ============================================================================
// Transport Errors
// ============================================================================

/// The serial device could not be claimed.
#[derive(Debug, Error)]
pub enum OpenError {
    #[error("serial device {device} not found")]
    NotFound { device: String },

    #[error("permission denied opening {device}")]
    PermissionDenied { device: String },

    #[error("invalid baud rate {0}")]
    InvalidBaudRate(u32),

    #[error("transport is already open on {device}")]
    AlreadyOpen { device: String },

    #[error("failed to open {device}: {reason}")]
    Unavailable { device: String, reason: String },
}

impl OpenError {
    /// Map a `serialport` failure for `device` onto the taxonomy.
    pub fn from_serialport(device: &str, err: serialport::Error) -> Self {
        let device = device.to_string();
        match err.kind() {
            serialport::ErrorKind::NoDevice => OpenError::NotFound { device },
            serialport::ErrorKind::Io(std::io::ErrorKind::NotFound) => {
                OpenError::NotFound { device }
            }
            serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
                OpenError::PermissionDenied { device }
            }
            _ => OpenError::Unavailable {
                device,
                reason: err.description,
            },
        }
    }
}

/// A write could not be delivered to the device.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("transport is closed")]
    Closed,

    #[error("serial write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("serial link lock poisoned")]
    Poisoned,
}

/// The background read loop could not be started.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReadLoopError {
    #[error("transport is closed")]
    Closed,

    #[error("read loop is already running")]
    AlreadyRunning,

    #[error("failed to spawn read loop: {0}")]
    Spawn(String),
}

/// A command could not be encoded or delivered.
#[derive(Debug, Error)]
pub enum SendError {
    #[error(transparent)]
    InvalidValue(#[from] InvalidValueError),

    #[error(transparent)]
    Write(#[from] WriteError),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_device_maps_to_not_found() {
        let err = serialport::Error::new(serialport::ErrorKind::NoDevice, "gone");
        assert!(matches!(
            OpenError::from_serialport("COM9", err),
            OpenError::NotFound { ref device } if device == "COM9"
        ));
    }

    #[test]
    fn test_io_kinds_map() {
        let err = serialport::Error::new(
            serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied),
            "denied",
        );
        assert!(matches!(
            OpenError::from_serialport("/dev/ttyACM0", err),
            OpenError::PermissionDenied { .. }
        ));

        let err = serialport::Error::new(
            serialport::ErrorKind::Io(std::io::ErrorKind::NotFound),
            "missing",
        );
        assert!(matches!(
            OpenError::from_serialport("/dev/ttyACM0", err),
            OpenError::NotFound { .. }
        ));
    }

    #[test]
    fn test_other_errors_keep_driver_message() {
        let err = serialport::Error::new(serialport::ErrorKind::Unknown, "device busy");
        let mapped = OpenError::from_serialport("COM5", err);
        assert_eq!(mapped.to_string(), "failed to open COM5: device busy");
    }

    #[test]
    fn test_write_error_from_io() {
        let err: WriteError = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe").into();
        assert!(matches!(err, WriteError::Io(_)));
    }
}
