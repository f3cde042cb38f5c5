//! Error types for age-import.
//!
//! Every variant is terminal for the resolution attempt that produced it.
//! Messages name the offending path and suggest a remedy; plaintext never
//! appears in them.

use std::path::PathBuf;

use crate::decrypt::DecryptError;
use crate::request::Operation;
use crate::store::StoreError;

/// Resolution error types.
#[derive(Debug, thiserror::Error)]
pub enum AgeError {
    #[error("{0}")]
    Configuration(String),

    #[error(
        "{who} requires 'hash' in pure evaluation mode. \
         Run with '--impure' for first-time decryption, \
         then add the printed hash to your expression."
    )]
    Purity { who: Operation },

    #[error(
        "{who}: no usable identity found. {detail}. \
         Set AGE_IDENTITY_FILE or ensure a key exists at a default path.{}",
        .hash_locked.then_some(HASH_LOCKED_HINT).unwrap_or_default()
    )]
    Identity {
        who: Operation,
        detail: String,
        hash_locked: bool,
    },

    #[error(
        "{who}: file '{}' does not exist. \
         If you are using flakes, ensure the file has been added to git.",
        .file.display()
    )]
    Input { who: Operation, file: PathBuf },

    #[error("{who}: age failed to decrypt '{}': {source}", .file.display())]
    Tool {
        who: Operation,
        file: PathBuf,
        #[source]
        source: DecryptError,
    },

    #[error(
        "{who}: hash mismatch for '{}'.\n  specified: {expected}\n  got:       {actual}\n\
         (did you update the encrypted file without updating the hash?)",
        .file.display()
    )]
    Integrity {
        who: Operation,
        file: PathBuf,
        expected: String,
        actual: String,
    },

    #[error(
        "{who}: the decrypted contents of '{}' cannot be represented as a string",
        .file.display()
    )]
    Representation { who: Operation, file: PathBuf },

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("{message}\n… while evaluating the decrypted content from '{who}'")]
    Evaluation { who: Operation, message: String },
}

const HASH_LOCKED_HINT: &str = " The hash-locked store path is not present and no identity was found \
     to decrypt. You may need to run an initial impure evaluation on a machine with the identity, \
     or populate the store path via substitution.";

/// Tag identifying the class of an [`AgeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    Purity,
    Identity,
    Input,
    Tool,
    Integrity,
    Representation,
    Store,
    Evaluation,
}

impl AgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Purity { .. } => ErrorKind::Purity,
            Self::Identity { .. } => ErrorKind::Identity,
            Self::Input { .. } => ErrorKind::Input,
            Self::Tool { .. } => ErrorKind::Tool,
            Self::Integrity { .. } => ErrorKind::Integrity,
            Self::Representation { .. } => ErrorKind::Representation,
            Self::Store(_) => ErrorKind::Store,
            Self::Evaluation { .. } => ErrorKind::Evaluation,
        }
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, AgeError>;
