//! Process-wide logger setup.
//!
//! Stdout belongs to the live progress view, so logs go to a file or stderr.

use env_logger::Target;
use std::fs;
use std::io;
use std::path::Path;

pub const LOG_DIR: &str = "/var/log/drive-tester";
pub const LOG_FILE: &str = "drive-tester.log";

fn file_target(dir: &Path) -> io::Result<Target> {
    fs::create_dir_all(dir)?;
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(LOG_FILE))?;
    Ok(Target::Pipe(Box::new(file)))
}

/// Initialise logging once per process (supervisor and each worker).
///
/// Falls back to stderr when the log file cannot be opened (permissions, readonly FS).
/// Calling it twice is harmless.
pub fn init() {
    let target = file_target(Path::new(LOG_DIR)).unwrap_or(Target::Stderr);

    let _ = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_timestamp_millis()
        .target(target)
        .try_init();
}
