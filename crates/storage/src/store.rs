use std::collections::{BTreeMap, BTreeSet};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// The filesystem operations naming and dedup need. Kept narrow so the
/// namer can run against an in-memory store in tests.
pub trait DocumentStore: Send + Sync {
    fn exists(&self, path: &Path) -> bool;
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;
    /// Write only if nothing is at `path`; fails with `AlreadyExists` otherwise.
    fn create_new(&self, path: &Path, data: &[u8]) -> io::Result<()>;
    /// Write, replacing whatever is at `path`.
    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()>;

    /// Byte-for-byte comparison of the stored file with `data`.
    fn same_content(&self, path: &Path, data: &[u8]) -> io::Result<bool> {
        Ok(self.read(path)? == data)
    }
}

// ── Disk ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy)]
pub struct FsStore;

impl DocumentStore for FsStore {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn create_new(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        file.write_all(data)?;
        file.sync_all()
    }

    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        std::fs::write(path, data)
    }

    /// Streams the stored file in chunks (constant memory).
    fn same_content(&self, path: &Path, data: &[u8]) -> io::Result<bool> {
        let mut file = File::open(path)?;
        if file.metadata()?.len() != data.len() as u64 {
            return Ok(false);
        }
        let mut buf = [0u8; 8192];
        let mut offset = 0;
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            let end = offset + n;
            if end > data.len() || buf[..n] != data[offset..end] {
                return Ok(false);
            }
            offset = end;
        }
        Ok(offset == data.len())
    }
}

// ── Memory (tests, dry runs) ──────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryStore {
    files: Mutex<BTreeMap<PathBuf, Vec<u8>>>,
    dirs: Mutex<BTreeSet<PathBuf>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn files(&self) -> MutexGuard<'_, BTreeMap<PathBuf, Vec<u8>>> {
        self.files.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed a file, as if another process had written it.
    pub fn insert(&self, path: impl Into<PathBuf>, data: impl Into<Vec<u8>>) {
        self.files().insert(path.into(), data.into());
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.files().keys().cloned().collect()
    }

    pub fn has_dir(&self, path: &Path) -> bool {
        self.dirs.lock().unwrap_or_else(|e| e.into_inner()).contains(path)
    }
}

impl DocumentStore for MemoryStore {
    fn exists(&self, path: &Path) -> bool {
        self.files().contains_key(path)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.files()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut dirs = self.dirs.lock().unwrap_or_else(|e| e.into_inner());
        for ancestor in path.ancestors().filter(|a| !a.as_os_str().is_empty()) {
            dirs.insert(ancestor.to_path_buf());
        }
        Ok(())
    }

    fn create_new(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let mut files = self.files();
        if files.contains_key(path) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                path.display().to_string(),
            ));
        }
        files.insert(path.to_path_buf(), data.to_vec());
        Ok(())
    }

    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        self.files().insert(path.to_path_buf(), data.to_vec());
        Ok(())
    }
}
