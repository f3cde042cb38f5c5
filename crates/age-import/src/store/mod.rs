//! Content-addressed storage for decrypted artifacts.
//!
//! The resolver only needs a narrow view of the store: compute where an
//! object with a given name and hash would live, make sure such an object
//! is present (pulling it from a substituter if the store can), and admit a
//! new byte stream. [`ContentStore`] is that view.
//!
//! # Layout
//!
//! ```text
//! <store_dir>/
//! ├── <nix32-digest>-<name>      read-only object file
//! └── .tmp-<random>              in-flight write, renamed into place
//! ```
//!
//! # Modules
//!
//! - [`path`]: deterministic fixed-output path computation.
//! - [`fs`]: filesystem store with local substituter directories.
//! - [`memory`]: in-memory store for tests and embedding.

pub mod fs;
pub mod memory;
pub mod path;

use std::io::Read;
use std::path::{Path, PathBuf};

use crate::hash::{Hash, HashAlgorithm};

pub use fs::FsStore;
pub use memory::MemoryStore;
pub use path::{fixed_output_path, validate_name, IngestionMethod, StorePath};

// ── Errors ────────────────────────────────────────────────────────────────────

/// Failures reported by a store implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("invalid store path name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("malformed store path '{0}'")]
    MalformedPath(String),

    #[error("store objects must be addressed by sha256, not {0}")]
    UnsupportedAlgorithm(HashAlgorithm),

    #[error("path '{0}' is not valid and no substituter provides it")]
    NotValid(String),

    #[error("substituted object '{path}' hashes to {actual}, which does not belong at that path")]
    SubstituteMismatch { path: String, actual: String },

    #[error("store I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

// ── ContentStore ──────────────────────────────────────────────────────────────

/// The storage capability consumed by the resolver.
pub trait ContentStore {
    /// Directory objects are rendered under; part of every path fingerprint.
    fn store_dir(&self) -> &Path;

    /// Where an object with `name` and content `hash` lives.
    fn compute_path(
        &self,
        name: &str,
        hash: &Hash,
        method: IngestionMethod,
    ) -> Result<StorePath, StoreError> {
        fixed_output_path(self.store_dir(), name, hash, method)
    }

    /// Succeeds if `path` is present locally or could be substituted.
    fn ensure_present(&self, path: &StorePath) -> Result<(), StoreError>;

    /// Admit `source` as a new object, hashing it with `algorithm`.
    ///
    /// An existing valid object at the resulting path is kept unless
    /// `repair` is set, in which case it is rewritten.
    fn write_from_stream(
        &self,
        source: &mut dyn Read,
        name: &str,
        method: IngestionMethod,
        algorithm: HashAlgorithm,
        repair: bool,
    ) -> Result<StorePath, StoreError>;

    /// Read a present object back.
    fn read_artifact(&self, path: &StorePath) -> Result<Vec<u8>, StoreError>;

    /// Canonical filesystem location of `path`.
    fn location(&self, path: &StorePath) -> PathBuf {
        self.store_dir().join(path.to_string())
    }
}
