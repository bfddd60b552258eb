//! drive-tester core library.
//!
//! Status tracking, the cross-process status cache, per-device locks, the diagnostic
//! worker and the supervisor that runs one worker process per drive. Output
//! persistence, notifications, discovery, configuration and logging live here too.

pub mod cli;
pub mod config;
pub mod discovery;
pub mod errors;
pub mod events;
pub mod lock;
pub mod logging;
pub mod notify;
pub mod report;
pub mod status;
pub mod status_cache;
pub mod storage;
pub mod supervisor;
pub mod worker;

pub use errors::{CacheError, TesterError};
pub use status::{State, Status};
pub use status_cache::StatusCache;
