// src/io/serial/mod.rs
//
// Serial link to the board.
//
// Features:
// - Open/close lifecycle over a named port at 8-N-1
// - Background read loop delivering newline-terminated UTF-8 records
// - Blocking writes of command packets
// - Simulated board for running without hardware

pub mod framer;
pub mod link;
pub mod sim;
pub mod transport;
pub mod utils;

pub use framer::{LineFramer, LineRecord, DEFAULT_MAX_LINE_LENGTH};
pub use link::{Connector, SerialLink, SystemConnector, DEFAULT_READ_TIMEOUT};
pub use sim::{BoardState, SimConnector, SimulatedBoard};
pub use transport::{open, LinkState, SerialTransport};
pub use utils::{find_board_port, list_ports, SerialPortInfo, ST_VID};
