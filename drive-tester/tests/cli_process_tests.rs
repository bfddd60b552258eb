use drive_core::lock::DeviceLock;
use drive_core::supervisor::{NoProgress, ProcessLauncher, Supervisor};
use drive_core::{State, StatusCache};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tempfile::tempdir;

const BIN: &str = env!("CARGO_BIN_EXE_drive-tester");

fn write_config(dir: &Path) -> PathBuf {
    let mountinfo = dir.join("mountinfo");
    fs::write(&mountinfo, "36 28 8:3 / / rw - ext4 /dev/sda3 rw\n").unwrap();
    let sys_block = dir.join("block");
    fs::create_dir_all(&sys_block).unwrap();

    let config = dir.join("config.toml");
    fs::write(
        &config,
        format!(
            "lock_dir = {:?}\ncache_dir = {:?}\nstorage_dir = {:?}\nsys_block_dir = {:?}\nmountinfo_path = {:?}\n",
            dir.display().to_string(),
            dir.display().to_string(),
            dir.join("out").display().to_string(),
            sys_block.display().to_string(),
            mountinfo.display().to_string(),
        ),
    )
    .unwrap();
    config
}

#[test]
fn worker_process_reports_locked_drive_as_already_running() {
    let tmp = tempdir().unwrap();
    let config = write_config(tmp.path());
    let cache = StatusCache::create(tmp.path(), 2).unwrap();

    let mut held = DeviceLock::new(tmp.path(), "/dev/sdy");
    assert!(held.acquire(false).unwrap());

    let launcher = ProcessLauncher::new(BIN).with_config(Some(config));
    let results = Supervisor::new(launcher, &cache)
        .with_poll_interval(Duration::from_millis(20))
        .run_all(&["/dev/sdy".to_string()], &mut NoProgress)
        .expect("supervised run");

    let status = &results["/dev/sdy"];
    assert_eq!(status.state, State::Done);
    assert_eq!(status.message, "Already running");
}

#[test]
fn invalid_drive_argument_exits_with_3() {
    let tmp = tempdir().unwrap();
    let config = write_config(tmp.path());
    let status = Command::new(BIN)
        .arg("--config")
        .arg(&config)
        .args(["test", "/dev/sdb1"])
        .output()
        .unwrap()
        .status;
    assert_eq!(status.code(), Some(3));
}

#[test]
fn no_drives_prints_help_and_exits_with_1() {
    let tmp = tempdir().unwrap();
    let config = write_config(tmp.path());
    let output = Command::new(BIN)
        .arg("--config")
        .arg(&config)
        .args(["test", "--auto-detect"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stdout).contains("--force-ssd-writes"));
}

#[test]
fn list_with_no_drives_prints_empty_table() {
    let tmp = tempdir().unwrap();
    let config = write_config(tmp.path());
    let output = Command::new(BIN)
        .arg("--config")
        .arg(&config)
        .arg("list")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Device path"));
    assert!(stdout.contains("Serial number"));
}
