//! Helpers related to block devices in sysfs.

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// Reads the block device size from `/sys/block/<dev>/size`.
///
/// The `size` file is expressed in 512-byte sectors.
pub fn block_device_size_bytes(sys_block_dev_dir: &Path) -> Result<u64> {
    let sectors_str = fs::read_to_string(sys_block_dev_dir.join("size"))?;
    let sectors: u64 = sectors_str.trim().parse()?;
    Ok(sectors.saturating_mul(512))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDeviceInfo {
    pub name: String,
    pub dev_path: PathBuf,
    pub size_bytes: u64,
}

/// Block devices below `sys_block_root` with a nonzero size, sorted by name.
pub fn scan_block_devices_in(sys_block_root: &Path) -> Result<Vec<BlockDeviceInfo>> {
    let mut out = Vec::new();
    let entries = fs::read_dir(sys_block_root)?;
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if should_skip_block_device(&name) {
            continue;
        }
        let sysfs_path = sys_block_root.join(&name);
        let size_bytes = match block_device_size_bytes(&sysfs_path) {
            Ok(v) => v,
            Err(_) => continue,
        };
        if size_bytes == 0 {
            continue;
        }

        let dev_path = PathBuf::from("/dev").join(&name);
        out.push(BlockDeviceInfo {
            name,
            dev_path,
            size_bytes,
        });
    }
    out.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(out)
}

fn should_skip_block_device(name: &str) -> bool {
    // Ephemeral / virtual devices are never test candidates.
    name.starts_with("loop")
        || name.starts_with("ram")
        || name.starts_with("zram")
        || name.starts_with("dm-")
        || name.starts_with("md")
        || name.starts_with("sr")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn block_device_size_bytes_reads_sectors() {
        let tmp = tempdir().unwrap();
        fs::write(tmp.path().join("size"), "8\n").unwrap();
        assert_eq!(block_device_size_bytes(tmp.path()).unwrap(), 4096);
    }

    #[test]
    fn scan_block_devices_in_skips_virtual_and_empty() {
        let tmp = tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("sdb")).unwrap();
        fs::write(tmp.path().join("sdb/size"), "8\n").unwrap();
        fs::create_dir_all(tmp.path().join("sda")).unwrap();
        fs::write(tmp.path().join("sda/size"), "16\n").unwrap();
        fs::create_dir_all(tmp.path().join("loop0")).unwrap();
        fs::write(tmp.path().join("loop0/size"), "8\n").unwrap();
        fs::create_dir_all(tmp.path().join("sdc")).unwrap();
        fs::write(tmp.path().join("sdc/size"), "0\n").unwrap();

        let disks = scan_block_devices_in(tmp.path()).unwrap();
        assert_eq!(disks.len(), 2);
        assert_eq!(disks[0].name, "sda");
        assert_eq!(disks[0].size_bytes, 8192);
        assert_eq!(disks[1].dev_path, PathBuf::from("/dev/sdb"));
        assert_eq!(disks[1].size_bytes, 4096);
    }
}
