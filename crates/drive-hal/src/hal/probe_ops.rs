//! Device probing operations (identity, media type).

use crate::HalResult;
use std::path::Path;

/// Probing operations trait.
pub trait ProbeOps {
    /// Stable device identity. `Ok(None)` when the device reports no serial number.
    fn serial_number(&self, disk: &Path) -> HalResult<Option<String>>;

    /// `true` for non-rotational media. Fails with `DeviceNotFound` if the device has no
    /// readable queue information.
    fn is_solid_state(&self, disk: &Path) -> HalResult<bool>;
}
