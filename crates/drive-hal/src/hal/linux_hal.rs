//! Linux HAL implementation driving the real diagnostic utilities.

use super::{
    DiagnosticOps, NoopObserver, ProbeOps, ProcessOps, ProcessRecord, StepContext, StepEvent,
    StepObserver, SystemProcess,
};
use crate::{HalError, HalResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_SYS_BLOCK_DIR: &str = "/sys/block";

const SERIAL_TIMEOUT: Duration = Duration::from_secs(120);
const PARTED_TIMEOUT: Duration = Duration::from_secs(120);
const SMARTCTL_TIMEOUT: Duration = Duration::from_secs(120);
const BADBLOCKS_TIMEOUT: Duration = Duration::from_secs(10 * 24 * 60 * 60);
const FSTRIM_TIMEOUT: Duration = Duration::from_secs(60 * 60);

static BADBLOCKS_SUMMARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Pass completed, ([0-9]+) bad blocks found\.").expect("valid badblocks regex")
});

/// Real HAL implementation for Linux systems.
#[derive(Clone)]
pub struct LinuxHal<P = SystemProcess> {
    process: P,
    sys_block_dir: PathBuf,
    observer: Arc<dyn StepObserver>,
}

impl LinuxHal<SystemProcess> {
    pub fn new() -> Self {
        Self::with_process(SystemProcess)
    }
}

impl Default for LinuxHal<SystemProcess> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: ProcessOps> LinuxHal<P> {
    pub fn with_process(process: P) -> Self {
        Self {
            process,
            sys_block_dir: PathBuf::from(DEFAULT_SYS_BLOCK_DIR),
            observer: Arc::new(NoopObserver),
        }
    }

    /// Root used for `queue/rotational` lookups (normally `/sys/block`).
    pub fn with_sys_block_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.sys_block_dir = dir.into();
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn StepObserver>) -> Self {
        self.observer = observer;
        self
    }

    fn run_step(
        &self,
        disk: &Path,
        ctx: &StepContext,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> HalResult<ProcessRecord> {
        let record = self.process.run(program, args, timeout)?;
        self.observer.step_completed(&StepEvent {
            disk: disk.display().to_string(),
            context: ctx.clone(),
            record: record.clone(),
        });
        Ok(record)
    }
}

fn device_name(disk: &Path) -> HalResult<String> {
    disk.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| HalError::DeviceNotFound(disk.display().to_string()))
}

/// Third line of `sdparm --page=sn` output holds the serial number.
fn parse_serial_number(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .nth(2)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_bad_blocks(output: &str) -> Option<u64> {
    BADBLOCKS_SUMMARY
        .captures(output)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

impl<P: ProcessOps> ProbeOps for LinuxHal<P> {
    fn serial_number(&self, disk: &Path) -> HalResult<Option<String>> {
        let disk_arg = disk.to_string_lossy();
        let record = self
            .process
            .run("sdparm", &["--page=sn", &disk_arg], SERIAL_TIMEOUT)?;
        if !record.success() {
            return Err(record.failure());
        }
        Ok(parse_serial_number(&record.stdout))
    }

    fn is_solid_state(&self, disk: &Path) -> HalResult<bool> {
        let name = device_name(disk)?;
        let rotational = self
            .sys_block_dir
            .join(name)
            .join("queue")
            .join("rotational");
        let value = fs::read_to_string(&rotational)
            .map_err(|_| HalError::DeviceNotFound(disk.display().to_string()))?;
        Ok(!value.trim_start().starts_with('1'))
    }
}

impl<P: ProcessOps> DiagnosticOps for LinuxHal<P> {
    fn partition_info(&self, disk: &Path, ctx: &StepContext) -> HalResult<String> {
        let disk_arg = disk.to_string_lossy();
        let record = self.run_step(
            disk,
            ctx,
            "parted",
            &["--machine", &disk_arg, "print"],
            PARTED_TIMEOUT,
        )?;
        if !record.success() {
            return Err(record.failure());
        }
        Ok(record.stdout)
    }

    fn health_info(&self, disk: &Path, ctx: &StepContext) -> HalResult<Option<String>> {
        let disk_arg = disk.to_string_lossy();
        let record = self.run_step(
            disk,
            ctx,
            "smartctl",
            &["--all", &disk_arg],
            SMARTCTL_TIMEOUT,
        )?;
        // smartctl exit status is a bit mask; bit 0 means the command line could not be
        // parsed or the device could not be opened. Other bits report disk health, which
        // the stored output already captures.
        match record.exit_code {
            Some(code) if code & 0x1 == 0 => {}
            _ => return Err(record.failure()),
        }
        if record.stdout.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(record.stdout))
    }

    fn scan_bad_blocks(
        &self,
        disk: &Path,
        write_mode: bool,
        ctx: &StepContext,
    ) -> HalResult<u64> {
        let disk_arg = disk.to_string_lossy();
        let mode = if write_mode { "-wve150" } else { "-ve150" };
        let record = self.run_step(
            disk,
            ctx,
            "badblocks",
            &[mode, "-b8192", &disk_arg],
            BADBLOCKS_TIMEOUT,
        )?;
        if !record.success() {
            return Err(record.failure());
        }
        let combined = format!("{}{}", record.stdout, record.stderr);
        parse_bad_blocks(&combined).ok_or_else(|| {
            HalError::Parse(format!(
                "badblocks summary missing for {}",
                disk.display()
            ))
        })
    }

    fn trim(&self, disk: &Path, ctx: &StepContext) -> HalResult<()> {
        let disk_arg = disk.to_string_lossy();
        let record = self.run_step(disk, ctx, "fstrim", &[&disk_arg], FSTRIM_TIMEOUT)?;
        if !record.success() {
            return Err(record.failure());
        }
        Ok(())
    }
}
