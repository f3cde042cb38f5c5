//! Decryption identity discovery.
//!
//! Identities are private key files handed to `age` with `-i`. They are
//! looked up fresh on every resolution and never cached.

pub mod discovery;
pub mod probe;

pub use discovery::{
    discover, IdentityCandidate, IdentityConfig, IdentityDiscovery, DEFAULT_IDENTITY_FILES,
    IDENTITY_FILE_ENV,
};
pub use probe::{CandidateState, FileProbe, FsProbe};
