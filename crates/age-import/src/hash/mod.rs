//! Content hash parsing, formatting and verification.
//!
//! A declared hash arrives as text and may use any of the forms the
//! evaluator accepts:
//!
//! - SRI: `sha256-<base64>`
//! - prefixed: `sha256:<hex | nix32 | base64>`
//! - bare: `<hex | nix32 | base64>`, interpreted as SHA-256
//!
//! Only SHA-256 is accepted for resolution, but the other algorithm names
//! are recognised so that the caller gets a precise error instead of a
//! parse failure.

pub mod nix32;

use base64::Engine as _;
use sha2::{Digest, Sha256};

// ── HashAlgorithm ─────────────────────────────────────────────────────────────

/// Hash algorithms that can appear in a declared hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    /// Canonical lowercase name, as used in SRI prefixes.
    pub fn name(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
            Self::Sha512 => "sha512",
        }
    }

    /// Digest length in bytes.
    pub fn digest_len(self) -> usize {
        match self {
            Self::Md5 => 16,
            Self::Sha1 => 20,
            Self::Sha256 => 32,
            Self::Sha512 => 64,
        }
    }

    /// Look up an algorithm by its canonical name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "md5" => Some(Self::Md5),
            "sha1" => Some(Self::Sha1),
            "sha256" => Some(Self::Sha256),
            "sha512" => Some(Self::Sha512),
            _ => None,
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Failure to interpret a hash string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HashParseError {
    #[error("unknown hash algorithm '{0}'")]
    UnknownAlgorithm(String),

    #[error("hash '{0}' does not include a type, nor is the type otherwise known from context")]
    MissingAlgorithm(String),

    #[error("invalid SRI hash '{0}'")]
    InvalidSri(String),

    #[error("hash '{hash}' has wrong length for hash algorithm '{algorithm}'")]
    WrongLength { hash: String, algorithm: HashAlgorithm },

    #[error("invalid {encoding} encoding in hash '{hash}'")]
    InvalidEncoding {
        hash: String,
        encoding: &'static str,
    },
}

// ── Hash ──────────────────────────────────────────────────────────────────────

/// A digest tagged with the algorithm that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hash {
    /// Algorithm that produced `digest`.
    pub algorithm: HashAlgorithm,
    digest: Vec<u8>,
}

impl Hash {
    /// Wrap raw digest bytes. Returns `None` if the length does not match
    /// the algorithm.
    pub fn from_digest(algorithm: HashAlgorithm, digest: Vec<u8>) -> Option<Self> {
        if digest.len() != algorithm.digest_len() {
            return None;
        }
        Some(Self { algorithm, digest })
    }

    /// SHA-256 of the full byte stream.
    pub fn sha256(data: &[u8]) -> Self {
        Self {
            algorithm: HashAlgorithm::Sha256,
            digest: Sha256::digest(data).to_vec(),
        }
    }

    /// Finish a streaming SHA-256 computation.
    pub fn from_hasher(hasher: Sha256) -> Self {
        Self {
            algorithm: HashAlgorithm::Sha256,
            digest: hasher.finalize().to_vec(),
        }
    }

    /// Raw digest bytes.
    pub fn digest(&self) -> &[u8] {
        &self.digest
    }

    /// `<algo>-<base64>`; the form printed for users to pin.
    pub fn to_sri(&self) -> String {
        format!(
            "{}-{}",
            self.algorithm,
            base64::engine::general_purpose::STANDARD.encode(&self.digest)
        )
    }

    /// Lowercase base-16 digest without algorithm prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.digest)
    }

    /// Nix base-32 digest without algorithm prefix.
    pub fn to_nix32(&self) -> String {
        nix32::encode(&self.digest)
    }

    /// Parse a hash string in SRI, prefixed or bare form.
    ///
    /// `default_algorithm` applies to bare digests only; an explicit prefix
    /// always wins, even when it names an algorithm other than the default.
    pub fn parse(
        s: &str,
        default_algorithm: Option<HashAlgorithm>,
    ) -> Result<Self, HashParseError> {
        if let Some((prefix, rest)) = s.split_once(':') {
            let algorithm = HashAlgorithm::from_name(prefix)
                .ok_or_else(|| HashParseError::UnknownAlgorithm(prefix.to_string()))?;
            return decode_any(s, rest, algorithm);
        }

        if let Some((prefix, rest)) = s.split_once('-') {
            if let Some(algorithm) = HashAlgorithm::from_name(prefix) {
                return decode_sri(s, rest, algorithm);
            }
        }

        let algorithm =
            default_algorithm.ok_or_else(|| HashParseError::MissingAlgorithm(s.to_string()))?;
        decode_any(s, s, algorithm)
    }

    /// Like [`Hash::parse`], but the empty string means "no hash".
    pub fn parse_allow_empty(
        s: &str,
        default_algorithm: Option<HashAlgorithm>,
    ) -> Result<Option<Self>, HashParseError> {
        if s.is_empty() {
            return Ok(None);
        }
        Self::parse(s, default_algorithm).map(Some)
    }
}

impl std::fmt::Display for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_sri())
    }
}

impl std::str::FromStr for Hash {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, Some(HashAlgorithm::Sha256))
    }
}

// Serialized as SRI; any accepted textual form deserializes.
impl serde::Serialize for Hash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_sri())
    }
}

impl<'de> serde::Deserialize<'de> for Hash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

fn decode_sri(whole: &str, rest: &str, algorithm: HashAlgorithm) -> Result<Hash, HashParseError> {
    let digest = base64::engine::general_purpose::STANDARD
        .decode(rest)
        .map_err(|_| HashParseError::InvalidSri(whole.to_string()))?;
    Hash::from_digest(algorithm, digest).ok_or_else(|| HashParseError::WrongLength {
        hash: whole.to_string(),
        algorithm,
    })
}

/// Pick the encoding from the string length, the way prefixed and bare
/// digests are disambiguated.
fn decode_any(whole: &str, rest: &str, algorithm: HashAlgorithm) -> Result<Hash, HashParseError> {
    let size = algorithm.digest_len();
    let invalid = |encoding| HashParseError::InvalidEncoding {
        hash: whole.to_string(),
        encoding,
    };

    let digest = if rest.len() == size * 2 {
        hex::decode(rest).map_err(|_| invalid("base-16"))?
    } else if rest.len() == nix32::encoded_len(size) {
        nix32::decode(rest, size).ok_or_else(|| invalid("base-32"))?
    } else if rest.len() == size.div_ceil(3) * 4 {
        base64::engine::general_purpose::STANDARD
            .decode(rest)
            .map_err(|_| invalid("base-64"))?
    } else {
        return Err(HashParseError::WrongLength {
            hash: whole.to_string(),
            algorithm,
        });
    };

    Hash::from_digest(algorithm, digest).ok_or_else(|| HashParseError::WrongLength {
        hash: whole.to_string(),
        algorithm,
    })
}

// ── Verification ──────────────────────────────────────────────────────────────

/// Outcome of checking plaintext against an optional declared hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// The declared hash matched.
    Matched(Hash),
    /// The declared hash did not match.
    Mismatched { expected: Hash, actual: Hash },
    /// Nothing was declared; `0` is the digest the caller should pin.
    Unpinned(Hash),
}

/// Compute SHA-256 of `plaintext` and compare it with `expected`.
pub fn verify(expected: Option<&Hash>, plaintext: &[u8]) -> Verification {
    let actual = Hash::sha256(plaintext);
    match expected {
        Some(expected) if *expected == actual => Verification::Matched(actual),
        Some(expected) => Verification::Mismatched {
            expected: expected.clone(),
            actual,
        },
        None => Verification::Unpinned(actual),
    }
}
