//! drive-tester Hardware Abstraction Layer (HAL).
//!
//! Diagnostic tools (`sdparm`, `parted`, `smartctl`, `badblocks`, `fstrim`) and the
//! sysfs/procfs reads are "world-touching" and live here, so the worker pipeline can be
//! exercised against [`FakeHal`] without root privileges or real disks.

pub mod error;
pub mod hal;
pub mod path;
pub mod procfs;
pub mod sysfs;

pub use error::{HalError, HalResult};
pub use hal::*;
