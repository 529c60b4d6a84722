// tools/uartlink_cli/dashboard.rs
//
// Terminal dashboard: two telemetry gauges, three channel sliders, LED toggle.
//
// Lines arrive on the read loop's thread and are handed to the UI thread over
// an mpsc channel; all UI state lives on the UI thread.

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::layout::{Constraint, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Gauge, Paragraph};
use ratatui::{DefaultTerminal, Frame};
use std::sync::mpsc;
use std::time::Duration;

use uartlink_lib::logging;
use uartlink_lib::{tlog, Channel, Command, SerialTransport, Telemetry};

use crate::CliResult;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const COARSE_STEP: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    None,
    Send(Command),
    Quit,
}

struct App {
    device: String,
    telemetry: Option<Telemetry>,
    last_line: String,
    lines_seen: u64,
    sliders: [u8; 3],
    selected: usize,
    led: bool,
    status: String,
}

impl App {
    fn new(device: &str) -> Self {
        App {
            device: device.to_string(),
            telemetry: None,
            last_line: String::new(),
            lines_seen: 0,
            sliders: [0; 3],
            selected: 0,
            led: false,
            status: "connected".to_string(),
        }
    }

    fn on_line(&mut self, line: String) {
        self.lines_seen += 1;
        // Lines that aren't telemetry keep the last good reading
        if let Ok(t) = Telemetry::parse(&line) {
            self.telemetry = Some(t);
        }
        self.last_line = line;
    }

    fn on_key(&mut self, code: KeyCode) -> Action {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
            KeyCode::Up => {
                self.selected = self.selected.saturating_sub(1);
                Action::None
            }
            KeyCode::Down => {
                self.selected = (self.selected + 1).min(Channel::ALL.len() - 1);
                Action::None
            }
            KeyCode::Left => self.adjust(-1),
            KeyCode::Right => self.adjust(1),
            KeyCode::PageDown => self.adjust(-(COARSE_STEP as i16)),
            KeyCode::PageUp => self.adjust(COARSE_STEP as i16),
            KeyCode::Char(' ') => {
                self.led = !self.led;
                Action::Send(Command::Led(self.led))
            }
            _ => Action::None,
        }
    }

    /// Move the selected slider; only a real change produces a packet
    fn adjust(&mut self, delta: i16) -> Action {
        let current = self.sliders[self.selected];
        let next = (current as i16 + delta).clamp(0, 100) as u8;
        if next == current {
            return Action::None;
        }
        self.sliders[self.selected] = next;
        Action::Send(Command::Channel {
            channel: Channel::ALL[self.selected],
            value: next,
        })
    }

    fn render(&self, frame: &mut Frame) {
        let rows = Layout::vertical([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(3),
        ])
        .split(frame.area());

        let (pot1, pot2) = match self.telemetry {
            Some(t) => (t.first, t.second),
            None => (0, 0),
        };
        frame.render_widget(telemetry_gauge("Pot 1", pot1), rows[0]);
        frame.render_widget(telemetry_gauge("Pot 2", pot2), rows[1]);

        for (i, channel) in Channel::ALL.iter().enumerate() {
            let selected = i == self.selected;
            let title = format!(
                "{} Channel {} ",
                if selected { ">" } else { " " },
                channel.number()
            );
            let colour = if selected { Color::Yellow } else { Color::Blue };
            let gauge = Gauge::default()
                .block(Block::bordered().title(title))
                .gauge_style(Style::new().fg(colour))
                .percent(self.sliders[i] as u16)
                .label(format!("{}", self.sliders[i]));
            frame.render_widget(gauge, rows[2 + i]);
        }

        let led_style = if self.led {
            Style::new().fg(Color::Green).add_modifier(Modifier::BOLD)
        } else {
            Style::new().fg(Color::DarkGray)
        };
        let led = Paragraph::new(Line::styled(
            if self.led { "ON" } else { "OFF" },
            led_style,
        ))
        .block(Block::bordered().title(" LED "));
        frame.render_widget(led, rows[5]);

        let footer = Paragraph::new(vec![
            Line::from(format!(
                "{} | {} lines | last: {}",
                self.device, self.lines_seen, self.last_line
            )),
            Line::from(self.status.clone()),
            Line::from("Up/Down select  Left/Right +/-1  PgUp/PgDn +/-10  Space LED  q quit"),
        ])
        .block(Block::bordered().title(" uartlink "));
        frame.render_widget(footer, rows[6]);
    }
}

fn telemetry_gauge(title: &str, value: i32) -> Gauge<'static> {
    Gauge::default()
        .block(Block::bordered().title(format!(" {} ", title)))
        .gauge_style(Style::new().fg(Color::Cyan))
        .percent(Telemetry::percent(value))
        .label(format!("{}", value))
}

pub fn run(transport: &mut SerialTransport) -> CliResult<()> {
    let (tx, rx) = mpsc::channel::<String>();
    transport.start_read_loop(move |line| {
        let _ = tx.send(line);
    })?;

    // stderr logging would tear the screen; file logging continues
    logging::set_console_logging(false);
    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, transport, &rx);
    ratatui::restore();
    logging::set_console_logging(true);

    result
}

fn event_loop(
    terminal: &mut DefaultTerminal,
    transport: &SerialTransport,
    rx: &mpsc::Receiver<String>,
) -> CliResult<()> {
    let mut app = App::new(transport.device());

    loop {
        while let Ok(line) = rx.try_recv() {
            app.on_line(line);
        }

        terminal.draw(|frame| app.render(frame))?;

        if !event::poll(POLL_INTERVAL)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match app.on_key(key.code) {
            Action::None => {}
            Action::Quit => return Ok(()),
            Action::Send(command) => {
                app.status = match transport.send(command) {
                    Ok(packet) => format!("sent {} [{}]", command, packet),
                    Err(e) => {
                        tlog!("[dashboard] Send failed: {}", e);
                        format!("send failed: {}", e)
                    }
                };
            }
        }
    }
}
