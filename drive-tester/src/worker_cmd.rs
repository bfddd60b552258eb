//! Hidden `worker` subcommand: one process per tested drive.

use anyhow::{Context, Result};
use drive_core::config::Config;
use drive_core::events::{EventBus, LogSubscriber};
use drive_core::storage::FileStorage;
use drive_core::worker::{Worker, WorkerOptions};
use drive_core::StatusCache;
use drive_hal::LinuxHal;
use std::path::Path;
use std::sync::Arc;

pub fn run(config: &Config, cache: &Path, force_ssd_writes: bool, device: &str) -> Result<i32> {
    let cache = StatusCache::attach(cache).context("worker cannot reach the status cache")?;

    let events = EventBus::new()
        .with(Arc::new(FileStorage::new(config.storage_dir.clone())))
        .with(Arc::new(LogSubscriber));
    let hal = LinuxHal::new()
        .with_sys_block_dir(config.sys_block_dir.clone())
        .with_observer(Arc::new(events.clone()));

    let options = WorkerOptions {
        force_ssd_writes,
        lock_dir: config.lock_dir.clone(),
    };
    Worker::new(device, &hal, &cache, options)
        .with_events(events)
        .run();
    Ok(0)
}
