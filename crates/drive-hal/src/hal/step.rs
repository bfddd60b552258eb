//! Step context and step-completion notifications.

use super::ProcessRecord;
use chrono::{DateTime, Local};

/// Identifies one pipeline step for output persistence and notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepContext {
    pub label: String,
    pub serial_number: String,
    /// Start of the whole pipeline run; shared by all steps of one run.
    pub started_at: DateTime<Local>,
}

impl StepContext {
    pub fn new(
        label: impl Into<String>,
        serial_number: impl Into<String>,
        started_at: DateTime<Local>,
    ) -> Self {
        Self {
            label: label.into(),
            serial_number: serial_number.into(),
            started_at,
        }
    }
}

/// Emitted after a labelled step's process ran to an exit status.
#[derive(Debug, Clone)]
pub struct StepEvent {
    pub disk: String,
    pub context: StepContext,
    pub record: ProcessRecord,
}

/// Receiver of step-completion events. Delivery is fire-and-forget.
pub trait StepObserver: Send + Sync {
    fn step_completed(&self, event: &StepEvent);
}

/// Observer that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl StepObserver for NoopObserver {
    fn step_completed(&self, _event: &StepEvent) {}
}
