//! Fake HAL implementation for testing.
//!
//! This implementation records all operations without executing them,
//! allowing for CI-safe testing without root privileges or real hardware.
//! Each disk can be scripted with a [`FakeDevice`].

use super::{
    DiagnosticOps, NoopObserver, ProbeOps, ProcessRecord, StepContext, StepEvent, StepObserver,
};
use crate::{HalError, HalResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Operation records for testing and verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    SerialNumber {
        disk: PathBuf,
    },
    IsSolidState {
        disk: PathBuf,
    },
    PartitionInfo {
        disk: PathBuf,
        label: String,
    },
    HealthInfo {
        disk: PathBuf,
        label: String,
    },
    ScanBadBlocks {
        disk: PathBuf,
        write_mode: bool,
        label: String,
    },
    Trim {
        disk: PathBuf,
        label: String,
    },
}

impl Operation {
    pub fn disk(&self) -> &Path {
        match self {
            Operation::SerialNumber { disk }
            | Operation::IsSolidState { disk }
            | Operation::PartitionInfo { disk, .. }
            | Operation::HealthInfo { disk, .. }
            | Operation::ScanBadBlocks { disk, .. }
            | Operation::Trim { disk, .. } => disk,
        }
    }

    /// Step label, for operations that are pipeline steps.
    pub fn label(&self) -> Option<&str> {
        match self {
            Operation::PartitionInfo { label, .. }
            | Operation::HealthInfo { label, .. }
            | Operation::ScanBadBlocks { label, .. }
            | Operation::Trim { label, .. } => Some(label),
            Operation::SerialNumber { .. } | Operation::IsSolidState { .. } => None,
        }
    }
}

/// Scripted behaviour of one fake disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeDevice {
    pub serial: Option<String>,
    pub solid_state: bool,
    /// `is_solid_state` fails with `DeviceNotFound`.
    pub missing: bool,
    pub bad_blocks: u64,
    /// Label of a step whose process exits nonzero.
    pub failing_step: Option<String>,
    pub step_delay: Duration,
}

impl Default for FakeDevice {
    fn default() -> Self {
        Self {
            serial: Some("FAKE-SERIAL".to_string()),
            solid_state: false,
            missing: false,
            bad_blocks: 0,
            failing_step: None,
            step_delay: Duration::ZERO,
        }
    }
}

impl FakeDevice {
    pub fn new(serial: impl Into<String>) -> Self {
        Self {
            serial: Some(serial.into()),
            ..Self::default()
        }
    }

    pub fn without_serial() -> Self {
        Self {
            serial: None,
            ..Self::default()
        }
    }

    pub fn solid_state(mut self) -> Self {
        self.solid_state = true;
        self
    }

    pub fn missing(mut self) -> Self {
        self.missing = true;
        self
    }

    pub fn bad_blocks(mut self, count: u64) -> Self {
        self.bad_blocks = count;
        self
    }

    pub fn failing_step(mut self, label: impl Into<String>) -> Self {
        self.failing_step = Some(label.into());
        self
    }

    pub fn step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }
}

/// Shared state for FakeHal operations.
#[derive(Debug, Clone, Default)]
struct FakeHalState {
    /// All operations that were recorded
    operations: Vec<Operation>,
    /// Scripted disks; unknown disks behave like `FakeDevice::default()`.
    devices: HashMap<PathBuf, FakeDevice>,
}

/// Fake HAL implementation that records operations without executing them.
///
/// This is designed for testing and CI environments where real diagnostics
/// would fail or be destructive.
#[derive(Clone)]
pub struct FakeHal {
    state: Arc<Mutex<FakeHalState>>,
    observer: Arc<dyn StepObserver>,
}

impl Default for FakeHal {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeHal {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeHalState::default())),
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn StepObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Script the behaviour of `disk`.
    pub fn set_device(&self, disk: impl Into<PathBuf>, device: FakeDevice) {
        self.state.lock().unwrap().devices.insert(disk.into(), device);
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<Operation> {
        self.state.lock().unwrap().operations.clone()
    }

    /// Recorded operations touching `disk`.
    pub fn operations_for(&self, disk: impl AsRef<Path>) -> Vec<Operation> {
        let disk = disk.as_ref();
        self.operations()
            .into_iter()
            .filter(|op| op.disk() == disk)
            .collect()
    }

    /// Get the number of operations recorded.
    pub fn operation_count(&self) -> usize {
        self.state.lock().unwrap().operations.len()
    }

    /// Check if a specific operation was recorded.
    pub fn has_operation(&self, check: impl Fn(&Operation) -> bool) -> bool {
        self.state.lock().unwrap().operations.iter().any(check)
    }

    /// Clear all recorded operations.
    pub fn clear(&self) {
        self.state.lock().unwrap().operations.clear();
    }

    fn device(&self, disk: &Path) -> FakeDevice {
        self.state
            .lock()
            .unwrap()
            .devices
            .get(disk)
            .cloned()
            .unwrap_or_default()
    }

    fn record_operation(&self, op: Operation) {
        self.state.lock().unwrap().operations.push(op);
    }

    /// Simulate running the process behind a labelled step.
    fn run_step(
        &self,
        disk: &Path,
        ctx: &StepContext,
        program: &str,
        stdout: String,
    ) -> HalResult<ProcessRecord> {
        let device = self.device(disk);
        if !device.step_delay.is_zero() {
            std::thread::sleep(device.step_delay);
        }

        let failing = device.failing_step.as_deref() == Some(ctx.label.as_str());
        let record = ProcessRecord {
            program: program.to_string(),
            args: vec![disk.display().to_string()],
            stdout,
            stderr: if failing {
                format!("{}: simulated failure", program)
            } else {
                String::new()
            },
            exit_code: Some(if failing { 1 } else { 0 }),
            elapsed: device.step_delay,
        };

        log::info!("FAKE HAL: {} {} ({})", program, disk.display(), ctx.label);
        self.observer.step_completed(&StepEvent {
            disk: disk.display().to_string(),
            context: ctx.clone(),
            record: record.clone(),
        });

        if failing {
            return Err(record.failure());
        }
        Ok(record)
    }
}

impl ProbeOps for FakeHal {
    fn serial_number(&self, disk: &Path) -> HalResult<Option<String>> {
        self.record_operation(Operation::SerialNumber {
            disk: disk.to_path_buf(),
        });
        Ok(self.device(disk).serial)
    }

    fn is_solid_state(&self, disk: &Path) -> HalResult<bool> {
        self.record_operation(Operation::IsSolidState {
            disk: disk.to_path_buf(),
        });
        let device = self.device(disk);
        if device.missing {
            return Err(HalError::DeviceNotFound(disk.display().to_string()));
        }
        Ok(device.solid_state)
    }
}

impl DiagnosticOps for FakeHal {
    fn partition_info(&self, disk: &Path, ctx: &StepContext) -> HalResult<String> {
        self.record_operation(Operation::PartitionInfo {
            disk: disk.to_path_buf(),
            label: ctx.label.clone(),
        });
        let record = self.run_step(disk, ctx, "parted", "BYT;\n".to_string())?;
        Ok(record.stdout)
    }

    fn health_info(&self, disk: &Path, ctx: &StepContext) -> HalResult<Option<String>> {
        self.record_operation(Operation::HealthInfo {
            disk: disk.to_path_buf(),
            label: ctx.label.clone(),
        });
        let record = self.run_step(
            disk,
            ctx,
            "smartctl",
            "SMART overall-health self-assessment test result: PASSED\n".to_string(),
        )?;
        Ok(Some(record.stdout))
    }

    fn scan_bad_blocks(
        &self,
        disk: &Path,
        write_mode: bool,
        ctx: &StepContext,
    ) -> HalResult<u64> {
        self.record_operation(Operation::ScanBadBlocks {
            disk: disk.to_path_buf(),
            write_mode,
            label: ctx.label.clone(),
        });
        let count = self.device(disk).bad_blocks;
        self.run_step(
            disk,
            ctx,
            "badblocks",
            format!("Pass completed, {} bad blocks found.\n", count),
        )?;
        Ok(count)
    }

    fn trim(&self, disk: &Path, ctx: &StepContext) -> HalResult<()> {
        self.record_operation(Operation::Trim {
            disk: disk.to_path_buf(),
            label: ctx.label.clone(),
        });
        self.run_step(disk, ctx, "fstrim", String::new())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    fn ctx(label: &str) -> StepContext {
        StepContext::new(label, "SN", Local::now())
    }

    #[test]
    fn fake_hal_records_operations_per_disk() {
        let hal = FakeHal::new();
        let disk = Path::new("/dev/sdb");

        hal.serial_number(disk).unwrap();
        hal.partition_info(disk, &ctx("parted")).unwrap();
        hal.partition_info(Path::new("/dev/sdc"), &ctx("parted"))
            .unwrap();

        assert_eq!(hal.operation_count(), 3);
        assert_eq!(hal.operations_for(disk).len(), 2);
        assert!(hal.has_operation(|op| matches!(op, Operation::SerialNumber { .. })));
    }

    #[test]
    fn fake_hal_uses_scripted_device() {
        let hal = FakeHal::new();
        let disk = Path::new("/dev/sdd");
        hal.set_device(disk, FakeDevice::new("SN-D").solid_state().bad_blocks(7));

        assert_eq!(hal.serial_number(disk).unwrap().as_deref(), Some("SN-D"));
        assert!(hal.is_solid_state(disk).unwrap());
        assert_eq!(
            hal.scan_bad_blocks(disk, false, &ctx("badblocks")).unwrap(),
            7
        );
    }

    #[test]
    fn fake_hal_failing_step_returns_command_failed() {
        let hal = FakeHal::new();
        let disk = Path::new("/dev/sde");
        hal.set_device(disk, FakeDevice::default().failing_step("fstrim"));

        let err = hal.trim(disk, &ctx("fstrim")).unwrap_err();
        assert!(matches!(err, HalError::CommandFailed { code: Some(1), .. }));
        assert!(hal.partition_info(disk, &ctx("parted")).is_ok());
    }

    #[test]
    fn fake_hal_missing_device_fails_media_probe() {
        let hal = FakeHal::new();
        let disk = Path::new("/dev/sdf");
        hal.set_device(disk, FakeDevice::default().missing());
        let err = hal.is_solid_state(disk).unwrap_err();
        assert!(matches!(err, HalError::DeviceNotFound(_)));
    }

    #[test]
    fn fake_hal_can_clear() {
        let hal = FakeHal::new();
        hal.serial_number(Path::new("/dev/sdb")).unwrap();
        assert_eq!(hal.operation_count(), 1);
        hal.clear();
        assert_eq!(hal.operation_count(), 0);
    }
}
