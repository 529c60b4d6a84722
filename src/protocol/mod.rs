// src/protocol/mod.rs
//
// Wire formats spoken with the board.
// Commands travel host -> board as 5-byte packets; telemetry travels board -> host as text lines.

pub mod command;
pub mod telemetry;

pub use command::{
    encode_channel_command, encode_led_command, Channel, Command, CommandPacket,
    InvalidValueError, PacketDecoder, PacketError,
};
pub use telemetry::{Telemetry, TelemetryError};
