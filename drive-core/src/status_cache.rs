//! Cross-process status cache.
//!
//! A fixed-size memory-mapped file split into slots, one per device key. The
//! supervisor creates it, workers attach to it by path. Every operation holds the
//! in-process mutex and an exclusive `flock` on the backing file.
//!
//! Layout:
//! ```text
//! header  [magic "DTSC"][version u32][slot count u32][slot size u32]
//! slot    [flag u8][reserved u8][key len u16][value len u32][key ..248][value ..3840]
//! ```
//! All integers are little endian.

use crate::errors::CacheError;
use crate::status::Status;
use memmap2::{MmapMut, MmapOptions};
use nix::fcntl::{Flock, FlockArg};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tempfile::TempPath;

const MAGIC: &[u8; 4] = b"DTSC";
const LAYOUT_VERSION: u32 = 1;
const HEADER_LEN: usize = 16;

pub const SLOT_LEN: usize = 4096;
const SLOT_HEADER_LEN: usize = 8;
const VALUE_OFFSET: usize = 256;
pub const MAX_KEY_LEN: usize = VALUE_OFFSET - SLOT_HEADER_LEN;
pub const MAX_VALUE_LEN: usize = SLOT_LEN - VALUE_OFFSET;

const SLOT_FREE: u8 = 0;
const SLOT_USED: u8 = 1;

pub const FILE_PREFIX: &str = "drive-tester-shm";

pub struct StatusCache {
    path: PathBuf,
    file: File,
    map: Mutex<MmapMut>,
    slots: usize,
    /// Present on the creating handle only; unlinks the file on drop.
    owner: Option<TempPath>,
}

impl std::fmt::Debug for StatusCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusCache")
            .field("path", &self.path)
            .field("slots", &self.slots)
            .field("owner", &self.owner.is_some())
            .finish()
    }
}

impl StatusCache {
    /// Create a new cache with `slots` entries in `dir`.
    pub fn create(dir: &Path, slots: usize) -> Result<Self, CacheError> {
        let create_err = |source| CacheError::Create {
            dir: dir.display().to_string(),
            source,
        };

        let named = tempfile::Builder::new()
            .prefix(FILE_PREFIX)
            .tempfile_in(dir)
            .map_err(create_err)?;
        let (file, temp_path) = named.into_parts();

        let slots = slots.max(1);
        let len = HEADER_LEN + slots * SLOT_LEN;
        file.set_len(len as u64).map_err(create_err)?;

        // SAFETY: the file is private to this cache until its path is handed to
        // workers; all access to the mapping goes through `locked`.
        let mut map = unsafe { MmapOptions::new().len(len).map_mut(&file) }.map_err(create_err)?;
        map[0..4].copy_from_slice(MAGIC);
        map[4..8].copy_from_slice(&LAYOUT_VERSION.to_le_bytes());
        map[8..12].copy_from_slice(&(slots as u32).to_le_bytes());
        map[12..16].copy_from_slice(&(SLOT_LEN as u32).to_le_bytes());
        map.flush().map_err(create_err)?;

        let path = temp_path.to_path_buf();
        log::info!("Status cache created: {} ({} slots)", path.display(), slots);
        Ok(Self {
            path,
            file,
            map: Mutex::new(map),
            slots,
            owner: Some(temp_path),
        })
    }

    /// Attach to a cache created by another process.
    pub fn attach(path: &Path) -> Result<Self, CacheError> {
        let attach_err = |source| CacheError::Attach {
            path: path.display().to_string(),
            source,
        };
        let layout_err = || CacheError::Layout(path.display().to_string());

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(attach_err)?;
        let len = file.metadata().map_err(attach_err)?.len() as usize;
        if len < HEADER_LEN {
            return Err(layout_err());
        }

        // SAFETY: see `create`; concurrent writers are serialized by flock.
        let map = unsafe { MmapOptions::new().len(len).map_mut(&file) }.map_err(attach_err)?;
        if &map[0..4] != MAGIC
            || read_u32(&map, 4) != LAYOUT_VERSION
            || read_u32(&map, 12) as usize != SLOT_LEN
        {
            return Err(layout_err());
        }
        let slots = read_u32(&map, 8) as usize;
        if slots == 0 || len < HEADER_LEN + slots * SLOT_LEN {
            return Err(layout_err());
        }

        Ok(Self {
            path: path.to_path_buf(),
            file,
            map: Mutex::new(map),
            slots,
            owner: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn capacity(&self) -> usize {
        self.slots
    }

    /// Store `status` under `key`, replacing any previous value.
    pub fn set_status(&self, key: &str, status: &Status) -> Result<(), CacheError> {
        let key = key.as_bytes();
        if key.len() > MAX_KEY_LEN {
            return Err(CacheError::KeyTooLong(key.len()));
        }
        let value = status.to_json()?.into_bytes();
        if value.len() > MAX_VALUE_LEN {
            return Err(CacheError::EntryTooLarge(value.len()));
        }

        let slots = self.slots;
        self.locked(|map| {
            let index = find_slot(map, slots, key)
                .or_else(|| (0..slots).find(|&i| slot_key(map, i).is_none()))
                .ok_or(CacheError::Full(slots))?;

            let base = slot_offset(index);
            let slot = &mut map[base..base + SLOT_LEN];
            slot[0] = SLOT_FREE;
            slot[2..4].copy_from_slice(&(key.len() as u16).to_le_bytes());
            slot[4..8].copy_from_slice(&(value.len() as u32).to_le_bytes());
            slot[SLOT_HEADER_LEN..SLOT_HEADER_LEN + key.len()].copy_from_slice(key);
            slot[VALUE_OFFSET..VALUE_OFFSET + value.len()].copy_from_slice(&value);
            slot[0] = SLOT_USED;
            Ok(())
        })?
    }

    /// Take the status stored under `key`, removing it from the cache.
    ///
    /// Returns `None` when there is no entry, when the entry cannot be parsed, or when
    /// the cache cannot be locked.
    pub fn get_status(&self, key: &str) -> Option<Status> {
        let slots = self.slots;
        let taken = self.locked(|map| {
            let index = find_slot(map, slots, key.as_bytes())?;
            let base = slot_offset(index);
            let value_len = read_u32(map, base + 4) as usize;
            let raw = map[base + VALUE_OFFSET..base + VALUE_OFFSET + value_len].to_vec();
            map[base] = SLOT_FREE;
            Some(raw)
        });

        let raw = match taken {
            Ok(raw) => raw?,
            Err(e) => {
                log::warn!("Status cache read for {} failed: {}", key, e);
                return None;
            }
        };
        match std::str::from_utf8(&raw)
            .ok()
            .and_then(|s| Status::from_json(s).ok())
        {
            Some(status) => Some(status),
            None => {
                log::debug!("Dropping unreadable status cache entry for {}", key);
                None
            }
        }
    }

    fn locked<R>(&self, f: impl FnOnce(&mut MmapMut) -> R) -> Result<R, CacheError> {
        let mut map = self.map.lock().unwrap_or_else(PoisonError::into_inner);
        let lock_file = self.file.try_clone()?;
        let flock = Flock::lock(lock_file, FlockArg::LockExclusive)
            .map_err(|(_, errno)| CacheError::Lock(errno))?;
        let out = f(&mut map);
        drop(flock);
        Ok(out)
    }
}

fn slot_offset(index: usize) -> usize {
    HEADER_LEN + index * SLOT_LEN
}

fn read_u32(map: &[u8], at: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&map[at..at + 4]);
    u32::from_le_bytes(bytes)
}

fn read_u16(map: &[u8], at: usize) -> u16 {
    let mut bytes = [0u8; 2];
    bytes.copy_from_slice(&map[at..at + 2]);
    u16::from_le_bytes(bytes)
}

/// Key of an occupied, well-formed slot.
fn slot_key(map: &[u8], index: usize) -> Option<&[u8]> {
    let base = slot_offset(index);
    if map[base] != SLOT_USED {
        return None;
    }
    let key_len = read_u16(map, base + 2) as usize;
    let value_len = read_u32(map, base + 4) as usize;
    if key_len > MAX_KEY_LEN || value_len > MAX_VALUE_LEN {
        return None;
    }
    Some(&map[base + SLOT_HEADER_LEN..base + SLOT_HEADER_LEN + key_len])
}

fn find_slot(map: &[u8], slots: usize, key: &[u8]) -> Option<usize> {
    (0..slots).find(|&i| slot_key(map, i) == Some(key))
}
