//! Supervisor: one worker process per device, progress collected by polling.

use crate::errors::TesterError;
use crate::status::{State, Status};
use crate::status_cache::StatusCache;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// A launched worker.
pub trait WorkerHandle: Send {
    fn is_running(&mut self) -> bool;
}

impl WorkerHandle for Child {
    fn is_running(&mut self) -> bool {
        match self.try_wait() {
            Ok(None) => true,
            Ok(Some(_)) => false,
            Err(e) => {
                log::warn!("Unable to query worker {}: {}", self.id(), e);
                false
            }
        }
    }
}

/// Starts the worker for one device.
pub trait WorkerLauncher {
    fn launch(&self, device: &str, cache: &StatusCache) -> anyhow::Result<Box<dyn WorkerHandle>>;
}

/// Re-executes a binary with the hidden `worker` subcommand.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    config: Option<PathBuf>,
    force_ssd_writes: bool,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            config: None,
            force_ssd_writes: false,
        }
    }

    /// Launcher for the currently running executable.
    pub fn current_exe() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }

    pub fn with_config(mut self, config: Option<PathBuf>) -> Self {
        self.config = config;
        self
    }

    pub fn with_force_ssd_writes(mut self, force: bool) -> Self {
        self.force_ssd_writes = force;
        self
    }

    pub fn command(&self, device: &str, cache_path: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(config) = &self.config {
            cmd.arg("--config").arg(config);
        }
        cmd.arg("worker").arg("--cache").arg(cache_path);
        if self.force_ssd_writes {
            cmd.arg("--force-ssd-writes");
        }
        cmd.arg(device)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        cmd
    }
}

impl WorkerLauncher for ProcessLauncher {
    fn launch(&self, device: &str, cache: &StatusCache) -> anyhow::Result<Box<dyn WorkerHandle>> {
        let child = self.command(device, cache.path()).spawn()?;
        log::info!("Worker for {} started (pid {})", device, child.id());
        Ok(Box::new(child))
    }
}

/// Live view of per-device progress.
pub trait ProgressView {
    fn started(&mut self, _devices: &[String]) {}
    fn update(&mut self, device: &str, status: &Status);
    fn finished(&mut self, _results: &BTreeMap<String, Status>) {}
}

/// Progress view that shows nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressView for NoProgress {
    fn update(&mut self, _device: &str, _status: &Status) {}
}

pub struct Supervisor<'a, L: WorkerLauncher> {
    launcher: L,
    cache: &'a StatusCache,
    poll_interval: Duration,
}

impl<'a, L: WorkerLauncher> Supervisor<'a, L> {
    pub fn new(launcher: L, cache: &'a StatusCache) -> Self {
        Self {
            launcher,
            cache,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Test every device in parallel and wait for all workers to exit.
    ///
    /// Devices whose worker never published anything are absent from the result.
    pub fn run_all(
        &self,
        devices: &[String],
        view: &mut dyn ProgressView,
    ) -> Result<BTreeMap<String, Status>, TesterError> {
        if devices.len() > self.cache.capacity() {
            return Err(TesterError::Infrastructure(format!(
                "Status cache holds {} drives, {} requested",
                self.cache.capacity(),
                devices.len()
            )));
        }

        let mut results = BTreeMap::new();
        let mut tracked: Vec<(String, Box<dyn WorkerHandle>)> = Vec::new();

        // Launch logging must precede the view's rows; the view rewrites them in place.
        for device in devices {
            match self.launcher.launch(device, self.cache) {
                Ok(handle) => tracked.push((device.clone(), handle)),
                Err(e) => {
                    log::error!("Unable to start worker for {}: {:#}", device, e);
                    let status = Status::with(State::Error, format!("Unable to start worker: {e:#}"));
                    results.insert(device.clone(), status);
                }
            }
        }

        view.started(devices);
        for (device, status) in &results {
            view.update(device, status);
        }

        while !tracked.is_empty() {
            std::thread::sleep(self.poll_interval);

            // Liveness first: a status written right before exit is still read below.
            let alive: Vec<bool> = tracked
                .iter_mut()
                .map(|(_, handle)| handle.is_running())
                .collect();

            for (device, _) in &tracked {
                if let Some(status) = self.cache.get_status(device) {
                    view.update(device, &status);
                    results.insert(device.clone(), status);
                }
            }

            tracked = tracked
                .into_iter()
                .zip(alive)
                .filter_map(|(entry, alive)| {
                    if !alive {
                        log::debug!("Worker for {} exited", entry.0);
                    }
                    alive.then_some(entry)
                })
                .collect();
        }

        view.finished(&results);
        Ok(results)
    }
}
