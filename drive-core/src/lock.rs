//! Per-device advisory locks.
//!
//! A device under test holds an exclusive `flock` on
//! `<lock_dir>/drive_tester<escaped path>.lock`. The kernel drops the lock when the
//! holding process exits, so stale lock files are harmless.

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Lock file for `device` inside `lock_dir`.
///
/// `%` and `/` are percent-escaped, which keeps distinct device paths on distinct files.
pub fn lock_file_path(lock_dir: &Path, device: &str) -> PathBuf {
    let mut name = String::from("drive_tester");
    for c in device.chars() {
        match c {
            '%' => name.push_str("%25"),
            '/' => name.push_str("%2F"),
            c => name.push(c),
        }
    }
    name.push_str(".lock");
    lock_dir.join(name)
}

pub struct DeviceLock {
    device: String,
    path: PathBuf,
    held: Option<Flock<File>>,
}

impl std::fmt::Debug for DeviceLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceLock")
            .field("device", &self.device)
            .field("path", &self.path)
            .field("held", &self.held.is_some())
            .finish()
    }
}

impl DeviceLock {
    pub fn new(lock_dir: &Path, device: &str) -> Self {
        Self {
            device: device.to_string(),
            path: lock_file_path(lock_dir, device),
            held: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_held(&self) -> bool {
        self.held.is_some()
    }

    /// Take the lock. With `blocking == false`, returns `Ok(false)` at once when another
    /// holder has it. Acquiring a lock this handle already holds returns `Ok(true)`.
    pub fn acquire(&mut self, blocking: bool) -> io::Result<bool> {
        if self.held.is_some() {
            return Ok(true);
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        let arg = if blocking {
            FlockArg::LockExclusive
        } else {
            FlockArg::LockExclusiveNonblock
        };

        match Flock::lock(file, arg) {
            Ok(lock) => {
                log::debug!("Lock acquired for {} ({})", self.device, self.path.display());
                self.held = Some(lock);
                Ok(true)
            }
            Err((_, Errno::EWOULDBLOCK)) => Ok(false),
            Err((_, errno)) => Err(io::Error::from(errno)),
        }
    }

    pub fn release(&mut self) {
        if let Some(lock) = self.held.take() {
            if let Err((_, errno)) = lock.unlock() {
                log::warn!("Unable to unlock {}: {}", self.path.display(), errno);
            }
            log::debug!("Lock released for {}", self.device);
        }
    }
}

impl Drop for DeviceLock {
    fn drop(&mut self) {
        self.release();
    }
}

/// Whether another holder currently has the lock for `device`.
///
/// Checks with a shared, non-blocking `flock` on the existing lock file and never creates
/// one. A worker whose exclusive acquire lands inside that short check still sees the
/// device as busy and reports it as already running.
pub fn is_locked_elsewhere(lock_dir: &Path, device: &str) -> io::Result<bool> {
    let path = lock_file_path(lock_dir, device);
    let file = match File::open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    match Flock::lock(file, FlockArg::LockSharedNonblock) {
        Ok(_shared) => Ok(false),
        Err((_, Errno::EWOULDBLOCK)) => Ok(true),
        Err((_, errno)) => Err(io::Error::from(errno)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::tempdir;

    #[test]
    fn lock_file_path_escapes_separators() {
        let path = lock_file_path(Path::new("/tmp"), "/dev/sdb");
        assert_eq!(path, PathBuf::from("/tmp/drive_tester%2Fdev%2Fsdb.lock"));
    }

    #[test]
    fn lock_file_paths_do_not_collide() {
        let devices = ["/dev/sdb", "/dev_sdb", "_dev_sdb", "/dev%2Fsdb", "/dev/sd/b"];
        let paths: HashSet<_> = devices
            .iter()
            .map(|d| lock_file_path(Path::new("/tmp"), d))
            .collect();
        assert_eq!(paths.len(), devices.len());
    }

    #[test]
    fn second_nonblocking_acquire_fails() {
        let dir = tempdir().unwrap();
        let mut first = DeviceLock::new(dir.path(), "/dev/sdb");
        let mut second = DeviceLock::new(dir.path(), "/dev/sdb");

        assert!(first.acquire(false).unwrap());
        assert!(!second.acquire(false).unwrap());
        assert!(is_locked_elsewhere(dir.path(), "/dev/sdb").unwrap());

        first.release();
        assert!(second.acquire(false).unwrap());
        assert!(second.is_held());
    }

    #[test]
    fn exactly_one_concurrent_acquire_wins() {
        let dir = tempdir().unwrap();
        let lock_dir = dir.path().to_path_buf();
        let barrier = std::sync::Arc::new(std::sync::Barrier::new(2));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let lock_dir = lock_dir.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    let mut lock = DeviceLock::new(&lock_dir, "/dev/sdc");
                    barrier.wait();
                    let won = lock.acquire(false).unwrap();
                    // Hold until both sides have tried.
                    std::thread::sleep(std::time::Duration::from_millis(100));
                    won
                })
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 1);
    }

    #[test]
    fn drop_releases_lock() {
        let dir = tempdir().unwrap();
        {
            let mut lock = DeviceLock::new(dir.path(), "/dev/sdd");
            assert!(lock.acquire(true).unwrap());
        }
        assert!(!is_locked_elsewhere(dir.path(), "/dev/sdd").unwrap());
    }

    #[test]
    fn checking_an_unused_device_leaves_no_lock_file() {
        let dir = tempdir().unwrap();
        assert!(!is_locked_elsewhere(dir.path(), "/dev/sde").unwrap());
        assert!(!lock_file_path(dir.path(), "/dev/sde").exists());
    }

    #[test]
    fn check_does_not_leave_the_device_locked() {
        let dir = tempdir().unwrap();
        let mut lock = DeviceLock::new(dir.path(), "/dev/sdf");
        assert!(lock.acquire(false).unwrap());
        lock.release();

        assert!(!is_locked_elsewhere(dir.path(), "/dev/sdf").unwrap());
        assert!(lock.acquire(false).unwrap());
        assert!(is_locked_elsewhere(dir.path(), "/dev/sdf").unwrap());
    }

    #[test]
    fn different_devices_do_not_contend() {
        let dir = tempdir().unwrap();
        let mut a = DeviceLock::new(dir.path(), "/dev/sdb");
        let mut b = DeviceLock::new(dir.path(), "/dev/sdc");
        assert!(a.acquire(false).unwrap());
        assert!(b.acquire(false).unwrap());
    }
}
