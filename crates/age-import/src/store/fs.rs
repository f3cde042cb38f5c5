//! Filesystem-backed content store.
//!
//! Objects are plain read-only files named `<digest>-<name>` directly under
//! the store root. Writes go to a uniquely named sibling temp file and are
//! renamed into place, so concurrent writers of the same object converge on
//! identical bytes and a reader never observes a partial object.
//!
//! Substituters are additional directories holding objects under the same
//! base names (for example a shared mount populated by another machine).
//! A substituted object is admitted only if its content hashes back to the
//! requested path.

use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use super::{ContentStore, IngestionMethod, StoreError, StorePath};
use crate::hash::{Hash, HashAlgorithm};

const COPY_BUF_SIZE: usize = 64 * 1024;

/// A content store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
    substituters: Vec<PathBuf>,
}

impl FsStore {
    /// Open (and create if needed) a store rooted at `root`.
    ///
    /// The root is canonicalized: store path digests cover the store
    /// directory, so every spelling of one directory must yield one path.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the directory cannot be created or resolved.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| StoreError::io(&root, e))?;
        let root = fs::canonicalize(&root).map_err(|e| StoreError::io(&root, e))?;
        Ok(Self {
            root,
            substituters: Vec::new(),
        })
    }

    /// Add a substituter directory, consulted in insertion order.
    pub fn with_substituter(mut self, dir: impl Into<PathBuf>) -> Self {
        self.substituters.push(dir.into());
        self
    }

    /// Configured substituter directories.
    pub fn substituters(&self) -> &[PathBuf] {
        &self.substituters
    }

    fn is_valid(&self, path: &StorePath) -> bool {
        self.location(path).is_file()
    }

    fn substitute(&self, path: &StorePath) -> Result<(), StoreError> {
        let base = path.to_string();

        for dir in &self.substituters {
            let candidate = dir.join(&base);
            let bytes = match fs::read(&candidate) {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => {
                    log::debug!("substituter {} unreadable: {e}", dir.display());
                    continue;
                }
            };

            let actual = Hash::sha256(&bytes);
            let expected = self.compute_path(path.name(), &actual, IngestionMethod::Flat)?;
            if expected != *path {
                return Err(StoreError::SubstituteMismatch {
                    path: candidate.display().to_string(),
                    actual: actual.to_sri(),
                });
            }

            log::info!("substituted '{}' from {}", base, dir.display());
            self.commit(&mut bytes.as_slice(), path.name(), false)?;
            return Ok(());
        }

        Err(StoreError::NotValid(self.location(path).display().to_string()))
    }

    /// Stream `source` into a temp file, hash it, and rename it into place.
    fn commit(
        &self,
        source: &mut dyn Read,
        name: &str,
        repair: bool,
    ) -> Result<StorePath, StoreError> {
        super::validate_name(name)?;

        let tmp_path = self
            .root
            .join(format!(".tmp-{:016x}", rand::random::<u64>()));
        let result = self.write_tmp(source, &tmp_path).and_then(|hash| {
            let path = self.compute_path(name, &hash, IngestionMethod::Flat)?;
            let dest = self.location(&path);

            if dest.is_file() && !repair {
                log::debug!("'{}' already valid, keeping existing object", path);
                fs::remove_file(&tmp_path).map_err(|e| StoreError::io(&tmp_path, e))?;
                return Ok(path);
            }

            fs::rename(&tmp_path, &dest).map_err(|e| StoreError::io(&dest, e))?;
            if repair {
                log::info!("repaired '{}'", dest.display());
            } else {
                log::info!("added '{}'", dest.display());
            }
            Ok(path)
        });

        if result.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        result
    }

    fn write_tmp(&self, source: &mut dyn Read, tmp_path: &Path) -> Result<Hash, StoreError> {
        let io_err = |e| StoreError::io(tmp_path, e);

        let mut file = File::create(tmp_path).map_err(io_err)?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; COPY_BUF_SIZE];

        loop {
            let n = match source.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(io_err(e)),
            };
            hasher.update(&buf[..n]);
            file.write_all(&buf[..n]).map_err(io_err)?;
        }

        file.sync_all().map_err(io_err)?;
        let mut perms = file.metadata().map_err(io_err)?.permissions();
        perms.set_readonly(true);
        fs::set_permissions(tmp_path, perms).map_err(io_err)?;

        Ok(Hash::from_hasher(hasher))
    }
}

impl ContentStore for FsStore {
    fn store_dir(&self) -> &Path {
        &self.root
    }

    fn ensure_present(&self, path: &StorePath) -> Result<(), StoreError> {
        if self.is_valid(path) {
            return Ok(());
        }
        self.substitute(path)
    }

    fn write_from_stream(
        &self,
        source: &mut dyn Read,
        name: &str,
        method: IngestionMethod,
        algorithm: HashAlgorithm,
        repair: bool,
    ) -> Result<StorePath, StoreError> {
        let IngestionMethod::Flat = method;
        if algorithm != HashAlgorithm::Sha256 {
            return Err(StoreError::UnsupportedAlgorithm(algorithm));
        }
        self.commit(source, name, repair)
    }

    fn read_artifact(&self, path: &StorePath) -> Result<Vec<u8>, StoreError> {
        let location = self.location(path);
        fs::read(&location).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StoreError::NotValid(location.display().to_string())
            } else {
                StoreError::io(&location, e)
            }
        })
    }
}
