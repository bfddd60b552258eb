//! Event fan-out for step, device and run completion.
//!
//! Delivery is fire-and-forget: a failing subscriber is logged and skipped.

use crate::status::Status;
use drive_hal::{StepEvent, StepObserver};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One device finished its run (whatever the outcome).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEvent {
    pub device: String,
    pub status: Status,
}

/// The whole supervised run finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunEvent {
    pub results: BTreeMap<String, Status>,
}

pub trait EventSubscriber: Send + Sync {
    fn name(&self) -> &str;

    fn on_step_completed(&self, _event: &StepEvent) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_device_completed(&self, _event: &DeviceEvent) -> anyhow::Result<()> {
        Ok(())
    }

    fn on_run_completed(&self, _event: &RunEvent) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Vec<Arc<dyn EventSubscriber>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, subscriber: Arc<dyn EventSubscriber>) {
        self.subscribers.push(subscriber);
    }

    pub fn with(mut self, subscriber: Arc<dyn EventSubscriber>) -> Self {
        self.subscribe(subscriber);
        self
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    pub fn publish_step(&self, event: &StepEvent) {
        self.deliver("step", |s| s.on_step_completed(event));
    }

    pub fn publish_device(&self, event: &DeviceEvent) {
        self.deliver("device", |s| s.on_device_completed(event));
    }

    pub fn publish_run(&self, event: &RunEvent) {
        self.deliver("run", |s| s.on_run_completed(event));
    }

    fn deliver(&self, kind: &str, f: impl Fn(&dyn EventSubscriber) -> anyhow::Result<()>) {
        for subscriber in &self.subscribers {
            if let Err(e) = f(subscriber.as_ref()) {
                log::warn!(
                    "Subscriber {} failed on {} event: {:#}",
                    subscriber.name(),
                    kind,
                    e
                );
            }
        }
    }
}

impl StepObserver for EventBus {
    fn step_completed(&self, event: &StepEvent) {
        self.publish_step(event);
    }
}

/// Writes every event to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSubscriber;

impl EventSubscriber for LogSubscriber {
    fn name(&self) -> &str {
        "log"
    }

    fn on_step_completed(&self, event: &StepEvent) -> anyhow::Result<()> {
        log::info!(
            "{} [{}] {}: exit={:?} time={:.3}s",
            event.disk,
            event.context.serial_number,
            event.context.label,
            event.record.exit_code,
            event.record.elapsed.as_secs_f64()
        );
        Ok(())
    }

    fn on_device_completed(&self, event: &DeviceEvent) -> anyhow::Result<()> {
        log::info!(
            "{} ({}) finished: {:?} {}",
            event.device,
            event.status.serial_number,
            event.status.state,
            event.status.message
        );
        Ok(())
    }

    fn on_run_completed(&self, event: &RunEvent) -> anyhow::Result<()> {
        let failed = event.results.values().filter(|s| s.is_error()).count();
        log::info!(
            "Run finished: {} drive(s), {} failed",
            event.results.len(),
            failed
        );
        Ok(())
    }
}
