//! Decryption of encrypted files.
//!
//! The resolver only needs one operation from a decryptor, so it depends on
//! the [`Decryptor`] trait rather than on a process. [`AgeCommand`] is the
//! production implementation.

pub mod age;

use std::path::{Path, PathBuf};

pub use age::{AgeCommand, AGE_PROGRAM_ENV, DEFAULT_AGE_PROGRAM};

/// Failure of a decryption attempt.
#[derive(Debug, thiserror::Error)]
pub enum DecryptError {
    #[error("could not run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("program '{program}' failed with {status}{}", stderr_suffix(.stderr))]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}

/// Turn an encrypted file into plaintext bytes using the given identities.
pub trait Decryptor {
    fn decrypt(&self, identities: &[PathBuf], encrypted: &Path) -> Result<Vec<u8>, DecryptError>;
}
