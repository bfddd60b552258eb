//! `list` subcommand: table of detected drives.

use anyhow::Result;
use crossterm::style::Stylize;
use drive_core::config::Config;
use drive_core::discovery::{discover_drives, system_drives};
use drive_core::lock::is_locked_elsewhere;
use drive_hal::{LinuxHal, ProbeOps};
use std::io::IsTerminal;
use std::path::Path;

const HEADERS: [&str; 4] = ["Device path", "Rotates", "Status", "Serial number"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveState {
    System,
    Testing,
    Ready,
}

impl DriveState {
    fn label(self) -> &'static str {
        match self {
            DriveState::System => "System",
            DriveState::Testing => "Testing",
            DriveState::Ready => "Ready",
        }
    }

    fn paint(self, text: String) -> String {
        match self {
            DriveState::System => text.red().to_string(),
            DriveState::Testing => text.yellow().to_string(),
            DriveState::Ready => text.green().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveRow {
    pub path: String,
    /// `True`, `False` or `Undefined` when the media type cannot be read.
    pub rotates: &'static str,
    pub state: DriveState,
    pub serial: String,
}

pub fn run(config: &Config) -> Result<i32> {
    let hal = LinuxHal::new().with_sys_block_dir(config.sys_block_dir.clone());
    let system = system_drives(&config.mountinfo_path)?;
    let rows: Vec<DriveRow> = discover_drives(&config.sys_block_dir)?
        .into_iter()
        .map(|d| {
            let path = d.dev_path.display().to_string();
            drive_row(&hal, &config.lock_dir, &system, path)
        })
        .collect();

    print!("{}", render_table(&rows, std::io::stdout().is_terminal()));
    Ok(0)
}

fn drive_row(hal: &dyn ProbeOps, lock_dir: &Path, system: &[String], path: String) -> DriveRow {
    let disk = Path::new(&path);
    let serial = hal.serial_number(disk).ok().flatten().unwrap_or_default();
    let rotates = match hal.is_solid_state(disk) {
        Ok(false) => "True",
        Ok(true) => "False",
        Err(_) => "Undefined",
    };
    let state = if system.contains(&path) {
        DriveState::System
    } else if is_locked_elsewhere(lock_dir, &path).unwrap_or(false) {
        DriveState::Testing
    } else {
        DriveState::Ready
    };
    DriveRow {
        path,
        rotates,
        state,
        serial,
    }
}

pub fn render_table(rows: &[DriveRow], color: bool) -> String {
    let cells: Vec<[String; 4]> = rows
        .iter()
        .map(|r| {
            [
                r.path.clone(),
                r.rotates.to_string(),
                r.state.label().to_string(),
                r.serial.clone(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &cells {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.len());
        }
    }

    let border = {
        let mut line = String::from("+");
        for w in widths {
            line.push_str(&"-".repeat(w + 2));
            line.push('+');
        }
        line.push('\n');
        line
    };

    let mut out = border.clone();
    out.push('|');
    for (header, w) in HEADERS.iter().zip(widths) {
        out.push_str(&format!(" {:<w$} |", header));
    }
    out.push('\n');
    out.push_str(&border);

    for (row, cells) in rows.iter().zip(&cells) {
        out.push('|');
        for (i, (cell, w)) in cells.iter().zip(widths).enumerate() {
            let padded = format!("{:<w$}", cell);
            let padded = if color && i == 2 {
                row.state.paint(padded)
            } else {
                padded
            };
            out.push_str(&format!(" {} |", padded));
        }
        out.push('\n');
    }
    out.push_str(&border);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use drive_core::lock::DeviceLock;
    use drive_hal::{FakeDevice, FakeHal};
    use tempfile::tempdir;

    #[test]
    fn render_table_aligns_columns() {
        let rows = vec![
            DriveRow {
                path: "/dev/sda".to_string(),
                rotates: "False",
                state: DriveState::System,
                serial: "S3Z1NB0K".to_string(),
            },
            DriveRow {
                path: "/dev/sdb".to_string(),
                rotates: "Undefined",
                state: DriveState::Ready,
                serial: String::new(),
            },
        ];
        let table = render_table(&rows, false);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(
            lines[1],
            "| Device path | Rotates   | Status | Serial number |"
        );
        assert_eq!(
            lines[3],
            "| /dev/sda    | False     | System | S3Z1NB0K      |"
        );
        assert!(lines.iter().all(|l| l.len() == lines[0].len()));
    }

    #[test]
    fn drive_row_reports_state_and_media() {
        let tmp = tempdir().unwrap();
        let hal = FakeHal::new();
        hal.set_device("/dev/sda", FakeDevice::new("SYS").solid_state());
        hal.set_device("/dev/sdb", FakeDevice::new("BUSY"));
        hal.set_device("/dev/sdc", FakeDevice::without_serial().missing());

        let system = vec!["/dev/sda".to_string()];
        let mut busy = DeviceLock::new(tmp.path(), "/dev/sdb");
        assert!(busy.acquire(false).unwrap());

        let a = drive_row(&hal, tmp.path(), &system, "/dev/sda".to_string());
        assert_eq!((a.state, a.rotates, a.serial.as_str()), (DriveState::System, "False", "SYS"));
        let b = drive_row(&hal, tmp.path(), &system, "/dev/sdb".to_string());
        assert_eq!((b.state, b.rotates), (DriveState::Testing, "True"));
        let c = drive_row(&hal, tmp.path(), &system, "/dev/sdc".to_string());
        assert_eq!((c.state, c.rotates, c.serial.as_str()), (DriveState::Ready, "Undefined", ""));
    }
}
