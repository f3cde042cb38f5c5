//! In-memory content store.
//!
//! Holds objects in a map and counts the operations performed on it, which
//! makes cache behaviour observable in tests. A second map stands in for a
//! remote cache: objects seeded there are "substituted" on first
//! `ensure_present`.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::{ContentStore, IngestionMethod, StoreError, StorePath};
use crate::hash::{Hash, HashAlgorithm};

type Objects = HashMap<StorePath, Vec<u8>>;

/// A content store that never touches the filesystem.
#[derive(Debug)]
pub struct MemoryStore {
    store_dir: PathBuf,
    objects: Mutex<Objects>,
    remote: Mutex<Objects>,
    probes: AtomicUsize,
    writes: AtomicUsize,
    substitutions: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store whose paths render under `store_dir`.
    pub fn new(store_dir: impl Into<PathBuf>) -> Self {
        Self {
            store_dir: store_dir.into(),
            objects: Mutex::new(HashMap::new()),
            remote: Mutex::new(HashMap::new()),
            probes: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            substitutions: AtomicUsize::new(0),
        }
    }

    /// Place `bytes` in the simulated remote cache under `name`.
    pub fn seed_remote(&self, name: &str, bytes: &[u8]) -> Result<StorePath, StoreError> {
        let path = self.compute_path(name, &Hash::sha256(bytes), IngestionMethod::Flat)?;
        lock(&self.remote).insert(path.clone(), bytes.to_vec());
        Ok(path)
    }

    /// Overwrite a local object without any hashing, simulating corruption.
    pub fn corrupt(&self, path: &StorePath, bytes: &[u8]) {
        lock(&self.objects).insert(path.clone(), bytes.to_vec());
    }

    /// Whether `path` is present locally.
    pub fn contains(&self, path: &StorePath) -> bool {
        lock(&self.objects).contains_key(path)
    }

    /// Number of locally present objects.
    pub fn len(&self) -> usize {
        lock(&self.objects).len()
    }

    /// Whether the store holds no local objects.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls to `ensure_present` so far.
    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    /// Calls to `write_from_stream` so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Objects pulled from the simulated remote so far.
    pub fn substitution_count(&self) -> usize {
        self.substitutions.load(Ordering::SeqCst)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new("/nix/store")
    }
}

impl ContentStore for MemoryStore {
    fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    fn ensure_present(&self, path: &StorePath) -> Result<(), StoreError> {
        self.probes.fetch_add(1, Ordering::SeqCst);

        if self.contains(path) {
            return Ok(());
        }

        let remote = lock(&self.remote).get(path).cloned();
        match remote {
            Some(bytes) => {
                self.substitutions.fetch_add(1, Ordering::SeqCst);
                lock(&self.objects).insert(path.clone(), bytes);
                Ok(())
            }
            None => Err(StoreError::NotValid(self.location(path).display().to_string())),
        }
    }

    fn write_from_stream(
        &self,
        source: &mut dyn Read,
        name: &str,
        method: IngestionMethod,
        algorithm: HashAlgorithm,
        repair: bool,
    ) -> Result<StorePath, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if algorithm != HashAlgorithm::Sha256 {
            return Err(StoreError::UnsupportedAlgorithm(algorithm));
        }

        let mut bytes = Vec::new();
        source
            .read_to_end(&mut bytes)
            .map_err(|e| StoreError::io(&self.store_dir, e))?;

        let path = self.compute_path(name, &Hash::sha256(&bytes), method)?;
        let mut objects = lock(&self.objects);
        if repair || !objects.contains_key(&path) {
            objects.insert(path.clone(), bytes);
        }
        Ok(path)
    }

    fn read_artifact(&self, path: &StorePath) -> Result<Vec<u8>, StoreError> {
        lock(&self.objects)
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::NotValid(self.location(path).display().to_string()))
    }
}

/// A poisoned map is still structurally sound; keep using it.
fn lock(m: &Mutex<Objects>) -> MutexGuard<'_, Objects> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
