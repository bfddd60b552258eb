//! Parsing helpers for `/proc/self/mountinfo` (and similar mountinfo files).

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountInfo {
    pub mount_point: PathBuf,
    /// Mount source (e.g. `/dev/sda3`); absent for malformed lines.
    pub source: Option<String>,
}

pub fn parse_mountinfo(content: &str) -> Vec<MountInfo> {
    content
        .lines()
        .filter_map(|line| {
            // mountinfo format:
            //   <pre fields...> <mount point> <...> - <fstype> <source> <superopts>
            let mut parts = line.split(" - ");
            let pre = parts.next()?;
            let pre_fields: Vec<&str> = pre.split_whitespace().collect();
            if pre_fields.len() < 5 {
                return None;
            }
            let mount_point = unescape_mount_path(pre_fields[4]);
            let source = parts
                .next()
                .and_then(|post| post.split_whitespace().nth(1))
                .map(unescape_mount_path);
            Some(MountInfo {
                mount_point: PathBuf::from(mount_point),
                source,
            })
        })
        .collect()
}

/// Sources of the mounts whose mount point is one of `mount_points`, de-duplicated.
pub fn sources_mounted_at(entries: &[MountInfo], mount_points: &[&str]) -> Vec<String> {
    let mut sources: Vec<String> = entries
        .iter()
        .filter(|e| {
            mount_points
                .iter()
                .any(|mp| e.mount_point.as_os_str() == std::ffi::OsStr::new(mp))
        })
        .filter_map(|e| e.source.clone())
        .collect();
    sources.sort();
    sources.dedup();
    sources
}

pub fn unescape_mount_path(raw: &str) -> String {
    raw.replace("\\040", " ")
        .replace("\\011", "\t")
        .replace("\\012", "\n")
        .replace("\\134", "\\")
}
