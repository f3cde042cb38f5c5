//! Resolution requests and the settings they run under.
//!
//! A request arrives from the evaluator as an attribute set:
//!
//! ```json
//! { "file": "./secrets/db.nix.age", "hash": "sha256-..." }
//! ```
//!
//! `file` is required, `hash` is optional (the empty string counts as
//! absent), and any other attribute is rejected.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AgeError, Result};
use crate::hash::{Hash, HashAlgorithm};

// ── Operation ─────────────────────────────────────────────────────────────────

/// The primitive a resolution runs on behalf of; used to label messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Decrypted bytes are returned as a string.
    ReadAge,
    /// Decrypted bytes are evaluated as a document.
    ImportAge,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Self::ReadAge => "builtins.readAge",
            Self::ImportAge => "builtins.importAge",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ── Settings ──────────────────────────────────────────────────────────────────

/// Whether side effects without a declared hash are allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationMode {
    #[default]
    Pure,
    Impure,
}

impl EvaluationMode {
    pub fn is_pure(self) -> bool {
        self == Self::Pure
    }
}

/// Per-run settings consulted by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveSettings {
    pub mode: EvaluationMode,
    /// Rewrite an existing store object instead of trusting it.
    pub repair: bool,
}

impl ResolveSettings {
    pub fn pure() -> Self {
        Self {
            mode: EvaluationMode::Pure,
            repair: false,
        }
    }

    pub fn impure() -> Self {
        Self {
            mode: EvaluationMode::Impure,
            repair: false,
        }
    }

    pub fn with_repair(mut self, repair: bool) -> Self {
        self.repair = repair;
        self
    }
}

// ── EncryptedReference ────────────────────────────────────────────────────────

/// An encrypted file plus the hash its plaintext is expected to have.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedReference {
    pub file: PathBuf,
    pub hash: Option<Hash>,
}

impl EncryptedReference {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            hash: None,
        }
    }

    pub fn with_hash(mut self, hash: Hash) -> Self {
        self.hash = Some(hash);
        self
    }

    /// Parse an attribute set. Relative `file` values are joined onto
    /// `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns `AgeError::Configuration` for unknown attributes, a missing
    /// `file`, values of the wrong type, or an unparseable `hash`.
    pub fn from_attrs(attrs: &Map<String, Value>, base_dir: &Path, who: Operation) -> Result<Self> {
        let mut file = None;
        let mut hash = None;

        for (name, value) in attrs {
            match name.as_str() {
                "file" => {
                    let s = value.as_str().ok_or_else(|| {
                        AgeError::Configuration(format!(
                            "the 'file' attribute passed to '{who}' must be a path, got {}",
                            type_name(value)
                        ))
                    })?;
                    file = Some(base_dir.join(s));
                }
                "hash" => {
                    let s = value.as_str().ok_or_else(|| {
                        AgeError::Configuration(format!(
                            "the 'hash' attribute passed to '{who}' must be a string, got {}",
                            type_name(value)
                        ))
                    })?;
                    hash = Hash::parse_allow_empty(s, Some(HashAlgorithm::Sha256)).map_err(
                        |e| {
                            AgeError::Configuration(format!(
                                "while evaluating the 'hash' attribute passed to '{who}': {e}"
                            ))
                        },
                    )?;
                }
                other => {
                    return Err(AgeError::Configuration(format!(
                        "unsupported attribute '{other}' in '{who}'"
                    )));
                }
            }
        }

        let file = file.ok_or_else(|| {
            AgeError::Configuration(format!("'file' attribute is required in '{who}'"))
        })?;

        Ok(Self { file, hash })
    }

    /// Parse a JSON value that must be an object.
    pub fn from_value(value: &Value, base_dir: &Path, who: Operation) -> Result<Self> {
        let attrs = value.as_object().ok_or_else(|| {
            AgeError::Configuration(format!(
                "the argument passed to '{who}' must be a set, got {}",
                type_name(value)
            ))
        })?;
        Self::from_attrs(attrs, base_dir, who)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a Boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a set",
    }
}
