//! Serial link to an STM32 board.
//!
//! The board streams two analog readings as `#|a|b|` text lines and accepts
//! 5-byte command packets that set three PWM channels and an LED. This crate
//! provides the transport (open/close, blocking writes, a background line
//! reader) and the packet encoder; hosts bring their own UI and subscribe a
//! callback to the read loop.

#[macro_use]
pub mod logging;

pub mod io;
pub mod protocol;
pub mod settings;

pub use io::error::{OpenError, ReadLoopError, SendError, WriteError};
pub use io::serial::{
    find_board_port, list_ports, open, BoardState, Connector, LinkState, SerialLink, SerialPortInfo,
    SerialTransport, SimConnector, SystemConnector,
};
pub use protocol::{
    encode_channel_command, encode_led_command, Channel, Command, CommandPacket,
    InvalidValueError, Telemetry, TelemetryError,
};
pub use settings::{LinkSettings, SettingsError};
