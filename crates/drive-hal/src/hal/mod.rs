//! HAL trait definitions and implementations.
//!
//! This module defines the core traits for drive diagnostics and provides
//! both real (LinuxHal) and fake (FakeHal) implementations.

pub mod diagnostic_ops;
pub mod fake_hal;
pub mod linux_hal;
pub mod probe_ops;
pub mod process_ops;
pub mod step;

pub use diagnostic_ops::DiagnosticOps;
pub use fake_hal::{FakeDevice, FakeHal, Operation};
pub use linux_hal::LinuxHal;
pub use probe_ops::ProbeOps;
pub use process_ops::{ProcessOps, ProcessRecord, SystemProcess};
pub use step::{NoopObserver, StepContext, StepEvent, StepObserver};

/// Complete HAL combining all operation traits a diagnostic worker needs.
pub trait DriveHal: ProbeOps + DiagnosticOps + Send + Sync {}

/// Automatically implement DriveHal for any type implementing all required traits.
impl<T> DriveHal for T where T: ProbeOps + DiagnosticOps + Send + Sync {}
