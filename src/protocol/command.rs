// src/protocol/command.rs
//
// Host-to-board command packets.
//
// Packet format (5 bytes, fixed):
//   A5 5A 02 <code> <value>
//
//   code 0x80/0x81/0x82  PWM channel 1/2/3, value 0..=100 (duty percent)
//   code 0x84            on-board LED, value 0 or 1

use std::fmt;
use thiserror::Error;

// ============================================================================
// Constants
// ============================================================================

pub const SYNC_1: u8 = 0xA5;
pub const SYNC_2: u8 = 0x5A;
/// Payload length byte: code + value
pub const PAYLOAD_LEN: u8 = 0x02;
pub const PACKET_LEN: usize = 5;

pub const CODE_CHANNEL_1: u8 = 0x80;
pub const CODE_CHANNEL_2: u8 = 0x81;
pub const CODE_CHANNEL_3: u8 = 0x82;
pub const CODE_LED: u8 = 0x84;

pub const MAX_CHANNEL_VALUE: u8 = 100;

// ============================================================================
// Errors
// ============================================================================

/// A command argument is outside what the board accepts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidValueError {
    #[error("channel {0} does not exist (expected 1, 2 or 3)")]
    Channel(u8),

    #[error("channel value {0} out of range (0..=100)")]
    Value(u8),
}

/// Bytes that do not form a valid command packet.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("packet must be 5 bytes, got {0}")]
    Length(usize),

    #[error("bad sync marker {0:02X} {1:02X}")]
    Sync(u8, u8),

    #[error("unexpected payload length {0}")]
    PayloadLength(u8),

    #[error("unknown command code 0x{0:02X}")]
    UnknownCode(u8),

    #[error("value {value} out of range for code 0x{code:02X}")]
    Value { code: u8, value: u8 },
}

// ============================================================================
// Types
// ============================================================================

/// One of the board's three PWM outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    One,
    Two,
    Three,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::One, Channel::Two, Channel::Three];

    pub fn code(self) -> u8 {
        match self {
            Channel::One => CODE_CHANNEL_1,
            Channel::Two => CODE_CHANNEL_2,
            Channel::Three => CODE_CHANNEL_3,
        }
    }

    /// 1-based channel number
    pub fn number(self) -> u8 {
        match self {
            Channel::One => 1,
            Channel::Two => 2,
            Channel::Three => 3,
        }
    }

    /// 0-based index, handy for arrays of channel state
    pub fn index(self) -> usize {
        self.number() as usize - 1
    }

    fn from_code(code: u8) -> Option<Channel> {
        match code {
            CODE_CHANNEL_1 => Some(Channel::One),
            CODE_CHANNEL_2 => Some(Channel::Two),
            CODE_CHANNEL_3 => Some(Channel::Three),
            _ => None,
        }
    }
}

impl TryFrom<u8> for Channel {
    type Error = InvalidValueError;

    fn try_from(number: u8) -> Result<Self, Self::Error> {
        match number {
            1 => Ok(Channel::One),
            2 => Ok(Channel::Two),
            3 => Ok(Channel::Three),
            n => Err(InvalidValueError::Channel(n)),
        }
    }
}

/// A logical command for the board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Set a PWM channel's duty, 0..=100
    Channel { channel: Channel, value: u8 },
    /// Switch the on-board LED
    Led(bool),
}

impl Command {
    /// Build the wire packet, validating the value range.
    pub fn encode(&self) -> Result<CommandPacket, InvalidValueError> {
        match *self {
            Command::Channel { channel, value } => {
                if value > MAX_CHANNEL_VALUE {
                    return Err(InvalidValueError::Value(value));
                }
                Ok(CommandPacket::from_parts(channel.code(), value))
            }
            Command::Led(on) => Ok(CommandPacket::from_parts(CODE_LED, on as u8)),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Channel { channel, value } => {
                write!(f, "channel {} = {}", channel.number(), value)
            }
            Command::Led(on) => write!(f, "led {}", if *on { "on" } else { "off" }),
        }
    }
}

/// An encoded 5-byte packet. Only constructible through validated encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandPacket([u8; PACKET_LEN]);

impl CommandPacket {
    fn from_parts(code: u8, value: u8) -> Self {
        CommandPacket([SYNC_1, SYNC_2, PAYLOAD_LEN, code, value])
    }

    pub fn as_bytes(&self) -> &[u8; PACKET_LEN] {
        &self.0
    }

    pub fn to_bytes(self) -> [u8; PACKET_LEN] {
        self.0
    }

    /// Parse a complete packet back into its command.
    pub fn decode(bytes: &[u8]) -> Result<Command, PacketError> {
        if bytes.len() != PACKET_LEN {
            return Err(PacketError::Length(bytes.len()));
        }
        if bytes[0] != SYNC_1 || bytes[1] != SYNC_2 {
            return Err(PacketError::Sync(bytes[0], bytes[1]));
        }
        if bytes[2] != PAYLOAD_LEN {
            return Err(PacketError::PayloadLength(bytes[2]));
        }
        decode_payload(bytes[3], bytes[4])
    }
}

impl AsRef<[u8]> for CommandPacket {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for CommandPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.0))
    }
}

fn decode_payload(code: u8, value: u8) -> Result<Command, PacketError> {
    if code == CODE_LED {
        return match value {
            0 => Ok(Command::Led(false)),
            1 => Ok(Command::Led(true)),
            _ => Err(PacketError::Value { code, value }),
        };
    }
    let channel = Channel::from_code(code).ok_or(PacketError::UnknownCode(code))?;
    if value > MAX_CHANNEL_VALUE {
        return Err(PacketError::Value { code, value });
    }
    Ok(Command::Channel { channel, value })
}

// ============================================================================
// Encoder
// ============================================================================

/// Encode a channel duty command. `channel` is 1, 2 or 3; `value` 0..=100.
pub fn encode_channel_command(channel: u8, value: u8) -> Result<CommandPacket, InvalidValueError> {
    let channel = Channel::try_from(channel)?;
    Command::Channel { channel, value }.encode()
}

/// Encode an LED on/off command.
pub fn encode_led_command(on: bool) -> CommandPacket {
    CommandPacket::from_parts(CODE_LED, on as u8)
}

// ============================================================================
// Streaming Decoder
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    Sync1,
    Sync2,
    Length,
    Code,
    Value { code: u8 },
}

/// Byte-at-a-time decoder for the board side of the link.
///
/// Hunts for `A5 5A`, then takes the length, code and value bytes. Invalid
/// packets are reported and the hunt restarts at the next byte.
#[derive(Debug)]
pub struct PacketDecoder {
    state: DecodeState,
}

impl PacketDecoder {
    pub fn new() -> Self {
        PacketDecoder {
            state: DecodeState::Sync1,
        }
    }

    /// Feed one byte; returns a result when a packet completes.
    pub fn push(&mut self, byte: u8) -> Option<Result<Command, PacketError>> {
        match self.state {
            DecodeState::Sync1 => {
                if byte == SYNC_1 {
                    self.state = DecodeState::Sync2;
                }
                None
            }
            DecodeState::Sync2 => {
                self.state = match byte {
                    SYNC_2 => DecodeState::Length,
                    SYNC_1 => DecodeState::Sync2,
                    _ => DecodeState::Sync1,
                };
                None
            }
            DecodeState::Length => {
                if byte == PAYLOAD_LEN {
                    self.state = DecodeState::Code;
                    None
                } else {
                    self.state = DecodeState::Sync1;
                    Some(Err(PacketError::PayloadLength(byte)))
                }
            }
            DecodeState::Code => {
                self.state = DecodeState::Value { code: byte };
                None
            }
            DecodeState::Value { code } => {
                self.state = DecodeState::Sync1;
                Some(decode_payload(code, byte))
            }
        }
    }

    /// Feed a chunk and collect every completed result.
    pub fn feed(&mut self, data: &[u8]) -> Vec<Result<Command, PacketError>> {
        data.iter().filter_map(|&b| self.push(b)).collect()
    }
}

impl Default for PacketDecoder {
    fn default() -> Self {
        PacketDecoder::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
