//! Deterministic store paths for fixed-output, flat-ingested objects.
//!
//! The path of an object is derived from its name, its content hash and the
//! store directory only:
//!
//! ```text
//! inner  = sha256("fixed:out:sha256:<hex(content)>:")
//! outer  = sha256("output:out:sha256:<hex(inner)>:<store_dir>:<name>")
//! path   = <store_dir>/<nix32(fold20(outer))>-<name>
//! ```

use std::path::Path;

use sha2::{Digest, Sha256};

use super::StoreError;
use crate::hash::{nix32, Hash, HashAlgorithm};

/// Longest name accepted for a store object.
pub const MAX_NAME_LEN: usize = 211;

/// Length in bytes of the folded digest embedded in a store path.
const STORE_PATH_DIGEST_BYTES: usize = 20;

/// How a byte stream is admitted into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionMethod {
    /// A single regular file, hashed as a whole.
    Flat,
}

impl IngestionMethod {
    /// Fingerprint prefix for the method; flat ingestion has none.
    fn prefix(self) -> &'static str {
        match self {
            Self::Flat => "",
        }
    }
}

/// A store object reference: digest part plus name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StorePath {
    digest_part: String,
    name: String,
}

impl StorePath {
    /// The 32-character digest prefix.
    pub fn digest_part(&self) -> &str {
        &self.digest_part
    }

    /// The human-readable name suffix.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parse a `<digest>-<name>` base name.
    pub fn from_base_name(base: &str) -> Result<Self, StoreError> {
        let digest_len = nix32::encoded_len(STORE_PATH_DIGEST_BYTES);
        let malformed = || StoreError::MalformedPath(base.to_string());

        if base.len() < digest_len + 2 || base.as_bytes()[digest_len] != b'-' {
            return Err(malformed());
        }
        let (digest_part, rest) = base.split_at(digest_len);
        nix32::decode(digest_part, STORE_PATH_DIGEST_BYTES).ok_or_else(malformed)?;
        let name = &rest[1..];
        validate_name(name)?;

        Ok(Self {
            digest_part: digest_part.to_string(),
            name: name.to_string(),
        })
    }
}

impl std::fmt::Display for StorePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.digest_part, self.name)
    }
}

impl serde::Serialize for StorePath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Check that `name` may be used as a store object name.
pub fn validate_name(name: &str) -> Result<(), StoreError> {
    let invalid = |reason| StoreError::InvalidName {
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("name must not be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(invalid("name is longer than 211 characters"));
    }
    if name.starts_with('.') {
        return Err(invalid("name must not begin with a period"));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || "+-._?=".contains(*c)))
    {
        return Err(StoreError::InvalidName {
            name: name.to_string(),
            reason: if c.is_ascii() {
                "name contains a forbidden character"
            } else {
                "name contains a non-ASCII character"
            },
        });
    }
    Ok(())
}

/// Compute the path a fixed-output object with `hash` and `name` occupies
/// in `store_dir`.
pub fn fixed_output_path(
    store_dir: &Path,
    name: &str,
    hash: &Hash,
    method: IngestionMethod,
) -> Result<StorePath, StoreError> {
    validate_name(name)?;
    if hash.algorithm != HashAlgorithm::Sha256 {
        return Err(StoreError::UnsupportedAlgorithm(hash.algorithm));
    }

    let inner = Sha256::digest(
        format!(
            "fixed:out:{}{}:{}:",
            method.prefix(),
            hash.algorithm,
            hash.to_hex()
        )
        .as_bytes(),
    );

    let outer = Sha256::digest(
        format!(
            "output:out:sha256:{}:{}:{}",
            hex::encode(inner),
            store_dir.display(),
            name
        )
        .as_bytes(),
    );

    let mut folded = [0u8; STORE_PATH_DIGEST_BYTES];
    for (i, byte) in outer.iter().enumerate() {
        folded[i % STORE_PATH_DIGEST_BYTES] ^= byte;
    }

    Ok(StorePath {
        digest_part: nix32::encode(&folded),
        name: name.to_string(),
    })
}
