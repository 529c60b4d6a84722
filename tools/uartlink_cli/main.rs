// tools/uartlink_cli/main.rs
//
// Host for the board link: port listing, a line monitor with console
// commands, one-shot command sending, and a terminal dashboard.

mod dashboard;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use uartlink_lib::logging;
use uartlink_lib::{
    find_board_port, list_ports, tlog, Channel, Command, Connector, LinkSettings, SerialTransport, SimConnector,
    SystemConnector, Telemetry,
};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

const AUTO_DEVICE: &str = "auto";

#[derive(Parser)]
#[command(name = "uartlink", version, about = "Talk to the STM32 board over its serial link")]
struct Cli {
    /// Settings file (TOML). Defaults to <config dir>/uartlink/settings.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Serial device, e.g. COM5 or /dev/ttyACM0; `auto` picks the first ST-LINK
    #[arg(short, long, global = true)]
    port: Option<String>,

    /// Baud rate
    #[arg(short, long, global = true)]
    baud: Option<u32>,

    /// Talk to a built-in simulated board instead of a serial port
    #[arg(long, global = true)]
    simulate: bool,

    /// Also write logs to a timestamped file in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// List available serial ports
    Ports {
        #[arg(long)]
        json: bool,
    },
    /// Print incoming lines; type commands (`ch 1 50`, `led on`, `quit`) on stdin
    Monitor {
        /// One JSON object per line
        #[arg(long)]
        json: bool,
    },
    /// Send one command and exit
    Send {
        #[command(subcommand)]
        command: SendCommand,
    },
    /// Full-screen dashboard with telemetry gauges and channel sliders
    Dashboard,
}

#[derive(Subcommand)]
enum SendCommand {
    /// Set a PWM channel (1-3) to a value (0-100)
    Channel { channel: u8, value: u8 },
    /// Switch the LED
    Led {
        #[arg(value_enum)]
        state: LedState,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LedState {
    On,
    Off,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tlog!("[cli] {}", e);
            logging::stop_file_logging();
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> CliResult<()> {
    if let CliCommand::Ports { json } = cli.command {
        return print_ports(json);
    }

    let settings = load_settings(&cli)?;
    if let Some(ref dir) = settings.log_dir {
        logging::init_file_logging(dir)?;
    }

    let connector: Arc<dyn Connector> = if cli.simulate {
        Arc::new(SimConnector::new())
    } else {
        Arc::new(SystemConnector)
    };
    let mut transport = settings.transport(connector);
    transport.open()?;

    let result = match cli.command {
        CliCommand::Ports { .. } => Ok(()),
        CliCommand::Monitor { json } => monitor(&mut transport, json),
        CliCommand::Send { command } => send_once(&transport, command),
        CliCommand::Dashboard => dashboard::run(&mut transport),
    };

    transport.close();
    logging::stop_file_logging();
    result
}

fn load_settings(cli: &Cli) -> CliResult<LinkSettings> {
    let mut settings = match cli.config {
        Some(ref path) => LinkSettings::load(path)?,
        None => match LinkSettings::default_path() {
            Some(path) => LinkSettings::load_or_default(&path)?,
            None => LinkSettings::default(),
        },
    };

    if let Some(ref port) = cli.port {
        settings.device = port.clone();
    }
    if let Some(baud) = cli.baud {
        settings.baud_rate = baud;
    }
    if cli.log_dir.is_some() {
        settings.log_dir = cli.log_dir.clone();
    }
    if settings.device == AUTO_DEVICE && !cli.simulate {
        settings.device = find_board_port()?.ok_or("no ST-LINK board attached")?;
        tlog!("[cli] Using board at {}", settings.device);
    }
    settings.validate()?;
    Ok(settings)
}

// ============================================================================
// Ports
// ============================================================================

fn print_ports(json: bool) -> CliResult<()> {
    let ports = list_ports()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ports)?);
        return Ok(());
    }

    if ports.is_empty() {
        println!("No serial ports found");
        return Ok(());
    }
    for p in ports {
        let ids = match (p.vid, p.pid) {
            (Some(vid), Some(pid)) => format!(" {:04X}:{:04X}", vid, pid),
            _ => String::new(),
        };
        let product = p.product.as_deref().unwrap_or("");
        let marker = if p.is_board() { "*" } else { " " };
        println!("{} {:<24} {:<9}{} {}", marker, p.port_name, p.port_type, ids, product);
    }
    Ok(())
}

// ============================================================================
// Send
// ============================================================================

fn send_once(transport: &SerialTransport, command: SendCommand) -> CliResult<()> {
    let command = match command {
        SendCommand::Channel { channel, value } => Command::Channel {
            channel: Channel::try_from(channel)?,
            value,
        },
        SendCommand::Led { state } => Command::Led(matches!(state, LedState::On)),
    };
    let packet = transport.send(command)?;
    println!("sent {} [{}]", command, packet);
    Ok(())
}

// ============================================================================
// Monitor
// ============================================================================

#[derive(Serialize)]
struct LineRecord<'a> {
    time: String,
    line: &'a str,
    telemetry: Option<Telemetry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConsoleCommand {
    Send(Command),
    Help,
    Quit,
}

const CONSOLE_HELP: &str = "commands: ch <1-3> <0-100> | led <on|off> | help | quit";

fn parse_console_command(input: &str) -> Result<Option<ConsoleCommand>, String> {
    let words: Vec<&str> = input.split_whitespace().collect();
    let command = match words.as_slice() {
        [] => return Ok(None),
        ["q"] | ["quit"] | ["exit"] => ConsoleCommand::Quit,
        ["help"] | ["?"] => ConsoleCommand::Help,
        ["ch", channel, value] | ["channel", channel, value] => {
            let channel: u8 = channel
                .parse()
                .map_err(|_| format!("bad channel: {}", channel))?;
            let value: u8 = value.parse().map_err(|_| format!("bad value: {}", value))?;
            let channel = Channel::try_from(channel).map_err(|e| e.to_string())?;
            ConsoleCommand::Send(Command::Channel { channel, value })
        }
        ["led", "on"] | ["led", "1"] => ConsoleCommand::Send(Command::Led(true)),
        ["led", "off"] | ["led", "0"] => ConsoleCommand::Send(Command::Led(false)),
        _ => return Err(format!("unknown command: {}", input.trim())),
    };
    Ok(Some(command))
}

fn monitor(transport: &mut SerialTransport, json: bool) -> CliResult<()> {
    transport.start_read_loop(move |line| {
        let telemetry = Telemetry::parse(&line).ok();
        if json {
            let record = LineRecord {
                time: chrono::Local::now().to_rfc3339(),
                line: &line,
                telemetry,
            };
            match serde_json::to_string(&record) {
                Ok(text) => println!("{}", text),
                Err(e) => tlog!("[monitor] Failed to encode line: {}", e),
            }
        } else {
            match telemetry {
                Some(t) => println!("{:<16} pot1={:>3} pot2={:>3}", line, t.first, t.second),
                None => println!("{}", line),
            }
        }
    })?;

    tlog!("[monitor] {}", CONSOLE_HELP);

    let stdin = std::io::stdin();
    for input in stdin.lock().lines() {
        let input = input?;
        match parse_console_command(&input) {
            Ok(None) => {}
            Ok(Some(ConsoleCommand::Quit)) => break,
            Ok(Some(ConsoleCommand::Help)) => eprintln!("{}", CONSOLE_HELP),
            Ok(Some(ConsoleCommand::Send(command))) => {
                if let Err(e) = transport.send(command) {
                    eprintln!("send failed: {}", e);
                }
            }
            Err(e) => eprintln!("{} ({})", e, CONSOLE_HELP),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_channel_command() {
        assert_eq!(
            parse_console_command("ch 2 75"),
            Ok(Some(ConsoleCommand::Send(Command::Channel {
                channel: Channel::Two,
                value: 75
            })))
        );
        assert_eq!(
            parse_console_command("  channel 1 0 "),
            Ok(Some(ConsoleCommand::Send(Command::Channel {
                channel: Channel::One,
                value: 0
            })))
        );
    }

    #[test]
    fn test_parse_led_command() {
        assert_eq!(
            parse_console_command("led on"),
            Ok(Some(ConsoleCommand::Send(Command::Led(true))))
        );
        assert_eq!(
            parse_console_command("led 0"),
            Ok(Some(ConsoleCommand::Send(Command::Led(false))))
        );
    }

    #[test]
    fn test_parse_control_commands() {
        assert_eq!(parse_console_command(""), Ok(None));
        assert_eq!(parse_console_command("quit"), Ok(Some(ConsoleCommand::Quit)));
        assert_eq!(parse_console_command("?"), Ok(Some(ConsoleCommand::Help)));
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_console_command("ch 4 10").is_err());
        assert!(parse_console_command("ch 1 abc").is_err());
        assert!(parse_console_command("led maybe").is_err());
        assert!(parse_console_command("reboot").is_err());
    }

    #[test]
    fn test_cli_parses_global_options() {
        let cli = Cli::try_parse_from([
            "uartlink", "--simulate", "-p", "COM3", "send", "channel", "3", "40",
        ])
        .expect("parse failed");
        assert!(cli.simulate);
        assert_eq!(cli.port.as_deref(), Some("COM3"));
        assert!(matches!(
            cli.command,
            CliCommand::Send {
                command: SendCommand::Channel { channel: 3, value: 40 }
            }
        ));
    }
}
