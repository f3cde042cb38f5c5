//! age-import: hash-locked decryption of age files into a content-addressed
//! store.
//!
//! An encrypted reference is resolved at most once per declared hash: if the
//! store already holds (or can substitute) the object for that hash, no
//! identity or decryption is needed, which keeps pure evaluation possible.
//! Otherwise the file is decrypted with `age`, verified against the hash and
//! committed to the store.

pub mod decrypt;
pub mod error;
pub mod hash;
pub mod identity;
pub mod output;
pub mod request;
pub mod resolve;
pub mod store;

// Re-export primary types
pub use decrypt::{AgeCommand, DecryptError, Decryptor};
pub use error::{AgeError, ErrorKind, Result};
pub use hash::{Hash, HashAlgorithm};
pub use identity::{CandidateState, FileProbe, FsProbe, IdentityConfig};
pub use output::{import_age, read_age, DocumentEvaluator, JsonEvaluator};
pub use request::{EncryptedReference, EvaluationMode, Operation, ResolveSettings};
pub use resolve::{Origin, Resolution, ResolvedArtifact, Resolver};
pub use store::{ContentStore, FsStore, IngestionMethod, MemoryStore, StoreError, StorePath};
