// src/io/serial/utils.rs
//
// Port settings and enumeration helpers for the serialport crate.
// The board link is always 8-N-1 without flow control.

use serde::Serialize;
use serialport::{DataBits, FlowControl, Parity, SerialPortBuilder, StopBits};
use std::time::Duration;

// ============================================================================
// Types
// ============================================================================

/// STMicroelectronics USB vendor ID, used by the ST-LINK virtual COM port
pub const ST_VID: u16 = 0x0483;

/// Information about an available serial port
#[derive(Clone, Debug, Serialize)]
pub struct SerialPortInfo {
    pub port_name: String,
    pub port_type: String,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
    pub vid: Option<u16>,
    pub pid: Option<u16>,
}

impl SerialPortInfo {
    /// Whether this looks like an ST-LINK VCP, i.e. a board we can talk to
    pub fn is_board(&self) -> bool {
        self.vid == Some(ST_VID)
    }
}

// ============================================================================
// Port Settings
// ============================================================================

/// Builder for `device` at `baud_rate` with 8-N-1 framing and the given read timeout
pub fn port_builder(device: &str, baud_rate: u32, read_timeout: Duration) -> SerialPortBuilder {
    serialport::new(device, baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(read_timeout)
}

/// Short framing label for log lines, e.g. `115200 8-N-1`
pub fn describe_framing(baud_rate: u32) -> String {
    format!("{} 8-N-1", baud_rate)
}

// ============================================================================
// Enumeration
// ============================================================================

/// List available serial ports, ST-LINK boards first.
///
/// On macOS only /dev/cu.* devices are listed; the matching /dev/tty.* nodes
/// block on open waiting for carrier detect.
pub fn list_ports() -> serialport::Result<Vec<SerialPortInfo>> {
    let mut ports: Vec<SerialPortInfo> = serialport::available_ports()?
        .into_iter()
        .filter(|p| listable(&p.port_name))
        .map(|p| to_port_info(p.port_name, p.port_type))
        .collect();
    sort_boards_first(&mut ports);
    Ok(ports)
}

/// Name of the first attached ST-LINK port, if any
pub fn find_board_port() -> serialport::Result<Option<String>> {
    Ok(list_ports()?
        .into_iter()
        .find(SerialPortInfo::is_board)
        .map(|p| p.port_name))
}

fn listable(port_name: &str) -> bool {
    !(cfg!(target_os = "macos") && port_name.starts_with("/dev/tty."))
}

fn sort_boards_first(ports: &mut [SerialPortInfo]) {
    ports.sort_by(|a, b| {
        b.is_board()
            .cmp(&a.is_board())
            .then_with(|| a.port_name.cmp(&b.port_name))
    });
}

fn to_port_info(port_name: String, port_type: serialport::SerialPortType) -> SerialPortInfo {
    let kind = match port_type {
        serialport::SerialPortType::UsbPort(usb) => {
            return SerialPortInfo {
                port_name,
                port_type: "USB".to_string(),
                manufacturer: usb.manufacturer,
                product: usb.product,
                serial_number: usb.serial_number,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
            };
        }
        serialport::SerialPortType::BluetoothPort => "Bluetooth",
        serialport::SerialPortType::PciPort => "PCI",
        serialport::SerialPortType::Unknown => "Unknown",
    };
    SerialPortInfo {
        port_name,
        port_type: kind.to_string(),
        manufacturer: None,
        product: None,
        serial_number: None,
        vid: None,
        pid: None,
    }
}

// ============================================================================
// Tests
// ============================================================================
