//! Persistent slot stores.
//!
//! Both stores hold a fixed-size byte image; each slot address names the
//! first of four little-endian bytes of an `i32`.
//!
//! - [`FileSlotStore`] commits the whole image with write-temp, fsync, rename.
//! - [`MemorySlotStore`] keeps the image in memory and can be told to fail
//!   commits. Clones share the same image.

use parking_lot::Mutex;
use rotor_common::consts::SLOT_WIDTH;
use rotor_common::hal::driver::{HalError, SlotStore};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

fn slot_range(slot: u16, capacity: usize) -> Option<std::ops::Range<usize>> {
    let start = slot as usize;
    let end = start + SLOT_WIDTH;
    (end <= capacity).then_some(start..end)
}

fn decode(image: &[u8], slot: u16) -> i32 {
    match slot_range(slot, image.len()) {
        Some(r) => {
            let mut bytes = [0u8; SLOT_WIDTH];
            bytes.copy_from_slice(&image[r]);
            i32::from_le_bytes(bytes)
        }
        None => 0,
    }
}

fn encode(image: &mut [u8], slot: u16, value: i32) -> bool {
    match slot_range(slot, image.len()) {
        Some(r) => {
            image[r].copy_from_slice(&value.to_le_bytes());
            true
        }
        None => false,
    }
}

// ─── File Store ─────────────────────────────────────────────────────

/// Slot image persisted to a file.
#[derive(Debug)]
pub struct FileSlotStore {
    path: PathBuf,
    image: Vec<u8>,
}

impl FileSlotStore {
    /// Open (or lazily create) the image at `path`.
    ///
    /// A missing file yields an all-zero image. A file of the wrong size is
    /// truncated or zero-padded to `capacity`.
    ///
    /// # Errors
    /// Returns `HalError::PersistenceError` when an existing file cannot be read.
    pub fn open(path: impl AsRef<Path>, capacity: usize) -> Result<Self, HalError> {
        let path = path.as_ref().to_path_buf();
        let mut image = match fs::read(&path) {
            Ok(bytes) => {
                debug!(path = %path.display(), len = bytes.len(), "Loaded slot image");
                bytes
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "Slot image missing, starting from zeros");
                Vec::new()
            }
            Err(e) => {
                return Err(HalError::PersistenceError(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )));
            }
        };
        if image.len() != capacity {
            if !image.is_empty() {
                warn!(
                    path = %path.display(),
                    found = image.len(),
                    capacity,
                    "Slot image size mismatch, resizing"
                );
            }
            image.resize(capacity, 0);
        }
        Ok(Self { path, image })
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn commit(&self) -> Result<(), HalError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                HalError::PersistenceError(format!("Failed to create directory: {e}"))
            })?;
        }
        let tmp = self.path.with_extension("tmp");
        let mut file = File::create(&tmp)
            .map_err(|e| HalError::PersistenceError(format!("Failed to create image: {e}")))?;
        file.write_all(&self.image)
            .map_err(|e| HalError::PersistenceError(format!("Failed to write image: {e}")))?;
        // Data must be on disk before the rename makes it the live image.
        file.sync_all()
            .map_err(|e| HalError::PersistenceError(format!("Failed to sync image: {e}")))?;
        drop(file);
        fs::rename(&tmp, &self.path)
            .map_err(|e| HalError::PersistenceError(format!("Failed to commit image: {e}")))
    }
}

impl SlotStore for FileSlotStore {
    fn capacity(&self) -> usize {
        self.image.len()
    }

    fn read_i32(&self, slot: u16) -> i32 {
        decode(&self.image, slot)
    }

    fn write_i32(&mut self, slot: u16, value: i32) -> bool {
        if !encode(&mut self.image, slot, value) {
            return false;
        }
        match self.commit() {
            Ok(()) => true,
            Err(e) => {
                warn!(slot, value, "Slot commit failed: {e}");
                false
            }
        }
    }
}

// ─── Memory Store ───────────────────────────────────────────────────

#[derive(Debug)]
struct MemoryImage {
    image: Vec<u8>,
    fail_commits: bool,
    commits: u64,
}

/// In-memory slot image for simulation and tests.
#[derive(Debug, Clone)]
pub struct MemorySlotStore {
    inner: Arc<Mutex<MemoryImage>>,
}

impl MemorySlotStore {
    /// All-zero image of `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryImage {
                image: vec![0; capacity],
                fail_commits: false,
                commits: 0,
            })),
        }
    }

    /// Make subsequent commits report failure (the image is still updated).
    pub fn set_fail_commits(&self, fail: bool) {
        self.inner.lock().fail_commits = fail;
    }

    /// Number of successful commits.
    pub fn commits(&self) -> u64 {
        self.inner.lock().commits
    }

    /// Seed a slot without counting a commit.
    pub fn preload(&self, slot: u16, value: i32) -> bool {
        encode(&mut self.inner.lock().image, slot, value)
    }
}

impl SlotStore for MemorySlotStore {
    fn capacity(&self) -> usize {
        self.inner.lock().image.len()
    }

    fn read_i32(&self, slot: u16) -> i32 {
        decode(&self.inner.lock().image, slot)
    }

    fn write_i32(&mut self, slot: u16, value: i32) -> bool {
        let mut inner = self.inner.lock();
        if !encode(&mut inner.image, slot, value) {
            return false;
        }
        if inner.fail_commits {
            warn!(slot, value, "Slot commit failed (injected)");
            return false;
        }
        inner.commits += 1;
        true
    }
}
