//! Persist the output of every diagnostic step.
//!
//! Layout: `<root>/<serial>/<YYYYmmdd-HHMMSS>/<label>.{stdout,stderr,exitcode,time}`.
//! The serial number is reported by the drive and is escaped into a single path component.

use crate::events::EventSubscriber;
use anyhow::{Context, Result};
use drive_hal::StepEvent;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the outputs of one pipeline run.
    pub fn run_dir(&self, event: &StepEvent) -> PathBuf {
        self.root
            .join(path_component(&event.context.serial_number))
            .join(event.context.started_at.format("%Y%m%d-%H%M%S").to_string())
    }

    pub fn store(&self, event: &StepEvent) -> Result<PathBuf> {
        let dir = self.run_dir(event);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

        let label = &event.context.label;
        let record = &event.record;
        let exit_code = record
            .exit_code
            .map(|c| c.to_string())
            .unwrap_or_default();
        let files = [
            ("stdout", record.stdout.clone()),
            ("stderr", record.stderr.clone()),
            ("exitcode", exit_code),
            ("time", format!("{:.3}", record.elapsed.as_secs_f64())),
        ];
        for (ext, content) in files {
            let path = dir.join(format!("{label}.{ext}"));
            fs::write(&path, content)
                .with_context(|| format!("Failed to write step output: {}", path.display()))?;
        }
        Ok(dir)
    }
}

/// `%`, `/` and NUL are percent-escaped, as is a leading `.`. Empty becomes `unknown`.
fn path_component(raw: &str) -> String {
    if raw.is_empty() {
        return "unknown".to_string();
    }
    let mut out = String::with_capacity(raw.len());
    for (i, c) in raw.chars().enumerate() {
        match c {
            '%' => out.push_str("%25"),
            '/' => out.push_str("%2F"),
            '\0' => out.push_str("%00"),
            '.' if i == 0 => out.push_str("%2E"),
            c => out.push(c),
        }
    }
    out
}

impl EventSubscriber for FileStorage {
    fn name(&self) -> &str {
        "file-storage"
    }

    fn on_step_completed(&self, event: &StepEvent) -> Result<()> {
        self.store(event).map(|_| ())
    }
}
