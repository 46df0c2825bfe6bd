//! Plain ANSI rendering of the public call board, redrawn by `queuecall run`.

use crate::arrival::channel::ConnectionState;
use crate::arrival::event::ArrivalEvent;
use crate::display::DisplaySnapshot;
use crate::poll::ClinicBoard;
use std::fmt::{self, Write as _};
use std::io::{self, Write};

const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// History rows shown on the board; the rest is only in `status --json`.
const HISTORY_ROWS: usize = 5;

/// Everything the board shows at one instant.
#[derive(Debug, Clone, Copy)]
pub struct BoardView<'a> {
    pub connection: ConnectionState,
    pub display: &'a DisplaySnapshot,
    pub clinic: Option<&'a ClinicBoard>,
    pub scroll_offset: usize,
    pub viewport_rows: usize,
}

struct Palette {
    enabled: bool,
}

impl Palette {
    fn paint(&self, code: &str, text: &str) -> String {
        if self.enabled {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }
}

/// Renders the board. `color = false` yields plain text.
pub fn render_board(view: &BoardView<'_>, color: bool) -> String {
    let p = Palette { enabled: color };
    let mut out = String::new();
    // Writing into a String cannot fail
    write_board(&mut out, &p, view).ok();
    out
}

fn write_board(out: &mut String, p: &Palette, view: &BoardView<'_>) -> fmt::Result {
    let link = match view.connection {
        ConnectionState::Connected => p.paint(GREEN, "● live"),
        ConnectionState::Connecting => p.paint(YELLOW, "○ connecting"),
        ConnectionState::Disconnected => p.paint(RED, "○ disconnected"),
    };
    writeln!(out, "{}  {}", p.paint(BOLD, "PHARMACY PICKUP"), link)?;
    out.push('\n');

    writeln!(out, "{}", p.paint(DIM, "Now calling"))?;
    match &view.display.current {
        Some(event) => writeln!(out, "  {}", p.paint(BOLD, &describe(event)))?,
        None => writeln!(out, "  {}", p.paint(DIM, "-"))?,
    }
    out.push('\n');

    writeln!(out, "{}", p.paint(DIM, "Waiting"))?;
    if view.display.waiting.is_empty() {
        writeln!(out, "  {}", p.paint(DIM, "-"))?;
    }
    for event in &view.display.waiting {
        writeln!(out, "  {}", describe(event))?;
    }
    out.push('\n');

    writeln!(out, "{}", p.paint(DIM, "Recently called"))?;
    for event in view.display.history.iter().take(HISTORY_ROWS) {
        writeln!(
            out,
            "  {}  {}",
            p.paint(DIM, &event.received_at.format("%H:%M").to_string()),
            describe(event)
        )?;
    }

    if let Some(board) = view.clinic {
        out.push('\n');
        write_clinic(out, p, board, view.scroll_offset, view.viewport_rows)?;
    }
    Ok(())
}

fn write_clinic(
    out: &mut String,
    p: &Palette,
    board: &ClinicBoard,
    offset: usize,
    viewport: usize,
) -> fmt::Result {
    writeln!(out, "{}", p.paint(BOLD, "CLINIC QUEUE"))?;
    match &board.status {
        Some(status) => {
            let serving = status.serving().unwrap_or("-");
            write!(out, "  Serving {}", p.paint(BOLD, serving))?;
            if let Some(doctor) = status.current_doctor.as_deref().filter(|d| !d.is_empty()) {
                write!(out, "  {}", doctor)?;
            }
            writeln!(out, "  ({} of {} remaining)", status.remaining, status.total)?;
        }
        None => writeln!(out, "  {}", p.paint(DIM, "waiting for first update"))?,
    }
    if let Some(error) = &board.last_error {
        writeln!(out, "  {}", p.paint(YELLOW, &format!("stale: {}", error)))?;
    }

    for entry in board.roster.iter().skip(offset).take(viewport) {
        let marker = if entry.is_waiting { " " } else { "✓" };
        writeln!(
            out,
            "  {} {:<6} {:<24} {}",
            marker,
            entry.queue_code,
            entry.patient_name,
            p.paint(DIM, &entry.time)
        )?;
    }
    Ok(())
}

fn describe(event: &ArrivalEvent) -> String {
    let mut text = event.identifier.clone();
    if !event.subject_name.is_empty() {
        text.push_str("  ");
        text.push_str(&event.subject_name);
    }
    text
}

/// Clears the terminal and draws the board on stdout.
pub fn redraw(view: &BoardView<'_>) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    write!(stdout, "{}{}", CLEAR_SCREEN, render_board(view, true))?;
    stdout.flush()
}
