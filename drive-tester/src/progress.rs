//! Live per-drive progress lines, rewritten in place.

use crossterm::cursor::{MoveToNextLine, MoveToPreviousLine};
use crossterm::style::{Print, Stylize};
use crossterm::terminal::{Clear, ClearType};
use crossterm::QueueableCommand;
use drive_core::status::{State, Status};
use drive_core::supervisor::ProgressView;
use std::io::Write;

/// `   <path> (<serial>): <message>`, coloured by state.
pub fn status_line(device: &str, status: &Status, color: bool) -> String {
    let line = format!(
        "   {} ({}): {}",
        device, status.serial_number, status.message
    );
    if !color {
        return line;
    }
    match status.state {
        State::Done => line.green().to_string(),
        State::Error => line.red().to_string(),
        State::Running => line,
    }
}

/// One terminal line per drive.
pub struct ConsoleSections<W: Write> {
    out: W,
    devices: Vec<String>,
}

impl<W: Write> ConsoleSections<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            devices: Vec::new(),
        }
    }

    fn rewrite(&mut self, index: usize, line: &str) -> std::io::Result<()> {
        let up = (self.devices.len() - index) as u16;
        self.out
            .queue(MoveToPreviousLine(up))?
            .queue(Clear(ClearType::CurrentLine))?
            .queue(Print(line))?
            .queue(MoveToNextLine(up))?;
        self.out.flush()
    }
}

impl<W: Write> ProgressView for ConsoleSections<W> {
    fn started(&mut self, devices: &[String]) {
        self.devices = devices.to_vec();
        for device in devices {
            let _ = writeln!(self.out, "   {}: Testing ...", device);
        }
        let _ = self.out.flush();
    }

    fn update(&mut self, device: &str, status: &Status) {
        let Some(index) = self.devices.iter().position(|d| d == device) else {
            return;
        };
        let line = status_line(device, status, true);
        if let Err(e) = self.rewrite(index, &line) {
            log::debug!("Unable to refresh progress line: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_line_plain() {
        let mut status = Status::with(State::Running, "Checking bad blocks");
        status.set_serial_number(Some("WD-1"));
        assert_eq!(
            status_line("/dev/sdb", &status, false),
            "   /dev/sdb (WD-1): Checking bad blocks"
        );
        assert_eq!(
            status_line("/dev/sdb", &status, true),
            "   /dev/sdb (WD-1): Checking bad blocks"
        );
    }

    #[test]
    fn status_line_colours_outcomes() {
        let done = status_line("/dev/sdb", &Status::with(State::Done, "OK"), true);
        let error = status_line("/dev/sdb", &Status::with(State::Error, "No serial number"), true);
        assert!(done.contains("   /dev/sdb (): OK"));
        assert!(error.contains("   /dev/sdb (): No serial number"));
        if std::env::var_os("NO_COLOR").is_none() {
            assert!(done.starts_with('\u{1b}'));
            assert!(error.starts_with('\u{1b}'));
        }
    }

    #[test]
    fn sections_print_placeholder_then_rewrite() {
        let mut view = ConsoleSections::new(Vec::new());
        view.started(&["/dev/sdb".to_string(), "/dev/sdc".to_string()]);
        view.update("/dev/sdc", &Status::with(State::Running, "Getting parted info"));
        view.update("/dev/sdx", &Status::with(State::Running, "ignored"));

        let out = String::from_utf8(view.out).unwrap();
        assert!(out.starts_with("   /dev/sdb: Testing ...\n   /dev/sdc: Testing ...\n"));
        assert!(out.contains("   /dev/sdc (): Getting parted info"));
        assert!(!out.contains("ignored"));
    }
}
