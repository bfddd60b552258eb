//! Block device path helpers.

/// Whole disk of a partition: `/dev/sda3` -> `/dev/sda`, `/dev/nvme0n1p2` -> `/dev/nvme0n1`.
///
/// nvme and mmcblk partitions carry a `p` before the partition number. Paths without a partition suffix are returned unchanged.
pub fn parent_disk(partition: &str) -> String {
    if partition.contains("nvme") || partition.contains("mmcblk") {
        let trimmed = partition.trim_end_matches(|c: char| c.is_ascii_digit());
        return match trimmed.strip_suffix('p') {
            Some(disk) if trimmed.len() < partition.len() => disk.to_string(),
            _ => partition.to_string(),
        };
    }
    partition
        .trim_end_matches(|c: char| c.is_ascii_digit())
        .to_string()
}
