//! Drive discovery, system-drive detection and drive argument validation.

use crate::errors::TesterError;
use anyhow::{Context, Result};
use drive_hal::path::parent_disk;
use drive_hal::procfs::mountinfo::{parse_mountinfo, sources_mounted_at};
use drive_hal::sysfs::block::{scan_block_devices_in, BlockDeviceInfo};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

/// Mount points whose backing disks are never tested.
pub const SYSTEM_MOUNT_POINTS: &[&str] = &["/", "/boot", "/boot/efi"];

static DRIVE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^sd[a-z]+$").expect("valid drive name regex"));
static DRIVE_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/dev/sd[a-z]+$").expect("valid drive path regex"));

/// Whole `sd*` disks with a nonzero size, sorted by name.
pub fn discover_drives(sys_block_dir: &Path) -> Result<Vec<BlockDeviceInfo>> {
    let devices = scan_block_devices_in(sys_block_dir)
        .with_context(|| format!("failed to scan {}", sys_block_dir.display()))?;
    Ok(devices
        .into_iter()
        .filter(|d| DRIVE_NAME.is_match(&d.name))
        .collect())
}

/// Disks backing `/`, `/boot` and `/boot/efi`.
pub fn system_drives(mountinfo_path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(mountinfo_path)
        .with_context(|| format!("failed to read {}", mountinfo_path.display()))?;
    Ok(system_drives_from(&content))
}

pub fn system_drives_from(mountinfo: &str) -> Vec<String> {
    let entries = parse_mountinfo(mountinfo);
    let mut disks: Vec<String> = sources_mounted_at(&entries, SYSTEM_MOUNT_POINTS)
        .into_iter()
        .filter(|source| source.starts_with("/dev/"))
        .map(|source| parent_disk(&source))
        .collect();
    disks.sort();
    disks.dedup();
    disks
}

pub fn is_valid_drive_path(path: &str) -> bool {
    DRIVE_PATH.is_match(path)
}

/// Work out which drives to test.
///
/// Requested drives must be well-formed existing `sd` disks and must not be system
/// drives. With `auto_detect`, every discovered non-system drive is added. Order is
/// preserved and duplicates are dropped.
pub fn select_drives(
    requested: &[String],
    auto_detect: bool,
    discovered: &[String],
    system: &[String],
    exists: impl Fn(&Path) -> bool,
) -> Result<Vec<String>, TesterError> {
    for drive in requested {
        if !is_valid_drive_path(drive) || !exists(Path::new(drive)) {
            return Err(TesterError::InvalidDrive(drive.clone()));
        }
    }
    if let Some(drive) = requested.iter().find(|d| system.contains(d)) {
        return Err(TesterError::SystemDrive(drive.clone()));
    }

    let mut selected: Vec<String> = Vec::new();
    let auto = discovered
        .iter()
        .filter(|_| auto_detect)
        .filter(|d| !system.contains(d));
    for drive in requested.iter().chain(auto) {
        if !selected.contains(drive) {
            selected.push(drive.clone());
        }
    }

    if selected.is_empty() {
        return Err(TesterError::NoDrives);
    }
    Ok(selected)
}
