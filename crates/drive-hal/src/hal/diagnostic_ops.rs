//! Diagnostic and maintenance steps run against one disk.
//!
//! Every operation takes a [`StepContext`]; implementations notify their step observer once
//! the underlying process has exited, whatever its exit code.

use super::StepContext;
use crate::HalResult;
use std::path::Path;

pub trait DiagnosticOps {
    /// Machine-readable partition table listing.
    fn partition_info(&self, disk: &Path, ctx: &StepContext) -> HalResult<String>;

    /// SMART report. `Ok(None)` when the tool ran but produced nothing.
    fn health_info(&self, disk: &Path, ctx: &StepContext) -> HalResult<Option<String>>;

    /// Scan the surface and return the number of bad blocks found.
    ///
    /// `write_mode` selects the destructive write-pattern test.
    fn scan_bad_blocks(&self, disk: &Path, write_mode: bool, ctx: &StepContext)
        -> HalResult<u64>;

    /// Discard unused blocks.
    fn trim(&self, disk: &Path, ctx: &StepContext) -> HalResult<()>;
}
