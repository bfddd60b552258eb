//! Diagnostic worker: runs the step pipeline for one device.
//!
//! Progress is published to the status cache before every step. Step failures end
//! the pipeline with an ERROR status; they never escape `Worker::run` as errors.

use crate::events::{DeviceEvent, EventBus};
use crate::lock::DeviceLock;
use crate::status::{State, Status};
use crate::status_cache::StatusCache;
use chrono::{DateTime, Local};
use drive_hal::{DriveHal, HalResult, StepContext};
use std::path::{Path, PathBuf};

pub const MSG_ALREADY_RUNNING: &str = "Already running";
pub const MSG_NO_SERIAL: &str = "No serial number";
pub const MSG_OK: &str = "OK";

const MSG_PARTED: &str = "Getting parted info";
const MSG_SMARTCTL: &str = "Storing smartctl info";
const MSG_BADBLOCKS: &str = "Checking bad blocks";
const MSG_FSTRIM: &str = "Running fstrim";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerOptions {
    /// Use destructive write-mode scanning on solid-state drives too.
    pub force_ssd_writes: bool,
    pub lock_dir: PathBuf,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            force_ssd_writes: false,
            lock_dir: std::env::temp_dir(),
        }
    }
}

pub struct Worker<'a> {
    device: String,
    hal: &'a dyn DriveHal,
    cache: &'a StatusCache,
    events: EventBus,
    options: WorkerOptions,
}

impl<'a> Worker<'a> {
    pub fn new(
        device: impl Into<String>,
        hal: &'a dyn DriveHal,
        cache: &'a StatusCache,
        options: WorkerOptions,
    ) -> Self {
        Self {
            device: device.into(),
            hal,
            cache,
            events: EventBus::new(),
            options,
        }
    }

    /// Receives the device-completion event.
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    /// Run the whole pipeline and return the final status.
    pub fn run(&self) -> Status {
        let mut status = Status::new();
        log::info!("Worker started for {}", self.device);

        let mut lock = DeviceLock::new(&self.options.lock_dir, &self.device);
        match lock.acquire(false) {
            Ok(true) => {
                self.run_locked(&mut status);
                lock.release();
            }
            Ok(false) => {
                log::info!("{} is already under test", self.device);
                self.publish(&mut status, State::Done, MSG_ALREADY_RUNNING);
            }
            Err(e) => {
                log::error!("Unable to lock {}: {}", self.device, e);
                self.publish(&mut status, State::Error, format!("Unable to lock drive: {e}"));
            }
        }

        self.events.publish_device(&DeviceEvent {
            device: self.device.clone(),
            status: status.clone(),
        });
        log::info!(
            "Worker finished for {}: {:?} {}",
            self.device,
            status.state,
            status.message
        );
        status
    }

    fn run_locked(&self, status: &mut Status) {
        let path = Path::new(&self.device);
        let serial = match self.hal.serial_number(path) {
            Ok(Some(serial)) => serial,
            Ok(None) => {
                self.publish(status, State::Error, MSG_NO_SERIAL);
                return;
            }
            Err(e) => {
                self.publish(status, State::Error, e.to_string());
                return;
            }
        };
        status.set_serial_number(Some(&serial));

        match self.run_steps(status, path, &serial, Local::now()) {
            Ok(()) => self.publish(status, State::Done, MSG_OK),
            Err(e) => {
                log::error!("{}: {}", self.device, e);
                self.publish(status, State::Error, e.to_string());
            }
        }
    }

    fn run_steps(
        &self,
        status: &mut Status,
        path: &Path,
        serial: &str,
        started_at: DateTime<Local>,
    ) -> HalResult<()> {
        let ctx = |label: &str| StepContext::new(label, serial, started_at);

        let solid_state = self.hal.is_solid_state(path)?;
        let write_mode = !solid_state || self.options.force_ssd_writes;

        self.publish(status, State::Running, MSG_PARTED);
        self.hal.partition_info(path, &ctx("parted"))?;

        self.publish(status, State::Running, MSG_SMARTCTL);
        self.hal.health_info(path, &ctx("smartctl"))?;

        self.publish(status, State::Running, MSG_BADBLOCKS);
        let bad_blocks = self
            .hal
            .scan_bad_blocks(path, write_mode, &ctx("badblocks"))?;
        if bad_blocks != 0 {
            // Keep going: later diagnostics are still worth storing.
            self.publish(
                status,
                State::Error,
                format!("{} bad blocks found", bad_blocks),
            );
        }

        self.publish(status, State::Running, MSG_SMARTCTL);
        self.hal.health_info(path, &ctx("smartctl.badblocks"))?;

        if solid_state {
            self.publish(status, State::Running, MSG_FSTRIM);
            self.hal.trim(path, &ctx("fstrim"))?;

            self.publish(status, State::Running, MSG_SMARTCTL);
            self.hal.health_info(path, &ctx("smartctl.fstrim"))?;
        }
        Ok(())
    }

    fn publish(&self, status: &mut Status, state: State, message: impl Into<String>) {
        status.update(state, message);
        if let Err(e) = self.cache.set_status(&self.device, status) {
            log::warn!("Unable to publish status for {}: {}", self.device, e);
        }
    }
}
