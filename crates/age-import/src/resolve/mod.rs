//! Resolution of an encrypted reference into a store artifact.
//!
//! One call walks a fixed sequence of steps and stops at the first failure:
//!
//! ```text
//! algorithm check ─▶ purity gate ─▶ name check ─▶ cache check ─┬─ hit ──▶ done
//!   (hash given)     (no hash)                   (hash given) └─ miss
//!   ─▶ identities ─▶ file check ─▶ decrypt ─▶ verify ─▶ store write
//!   ─▶ (pin hint) ─▶ done
//! ```
//!
//! Nothing is retried and nothing persists between calls except the store
//! objects themselves.

pub mod name;

use std::path::PathBuf;

use serde::Serialize;
use zeroize::Zeroizing;

use crate::decrypt::Decryptor;
use crate::error::{AgeError, Result};
use crate::hash::{self, Hash, HashAlgorithm, Verification};
use crate::identity::{self, FileProbe, IdentityConfig};
use crate::request::{EncryptedReference, Operation, ResolveSettings};
use crate::store::{self, ContentStore, IngestionMethod, StorePath};

pub use name::derive_name;

/// A materialized, verified artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedArtifact {
    pub store_path: StorePath,
    /// Canonical filesystem location of `store_path`.
    pub location: PathBuf,
    pub content_hash: Hash,
}

/// How an artifact was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Already in the store, or substituted into it.
    Cached,
    /// Decrypted during this call.
    Decrypted,
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub artifact: ResolvedArtifact,
    pub origin: Origin,
    /// Set when no hash was declared: text the caller can paste to pin it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin_hint: Option<String>,
}

/// Composes the store, decryptor and identity discovery into resolutions.
pub struct Resolver<'a> {
    store: &'a dyn ContentStore,
    decryptor: &'a dyn Decryptor,
    probe: &'a dyn FileProbe,
    identities: IdentityConfig,
    settings: ResolveSettings,
}

impl<'a> Resolver<'a> {
    pub fn new(
        store: &'a dyn ContentStore,
        decryptor: &'a dyn Decryptor,
        probe: &'a dyn FileProbe,
        identities: IdentityConfig,
        settings: ResolveSettings,
    ) -> Self {
        Self {
            store,
            decryptor,
            probe,
            identities,
            settings,
        }
    }

    pub fn settings(&self) -> ResolveSettings {
        self.settings
    }

    pub fn store(&self) -> &'a dyn ContentStore {
        self.store
    }

    /// Resolve `reference` on behalf of `who`.
    ///
    /// # Errors
    ///
    /// - `Configuration` for a non-SHA-256 hash or an unusable object name.
    /// - `Purity` when no hash is declared in pure mode.
    /// - `Identity` when no candidate identity is usable.
    /// - `Input` when the encrypted file does not exist.
    /// - `Tool` when the decryptor fails.
    /// - `Integrity` when the plaintext does not match the declared hash.
    /// - `Store` when the store rejects the write.
    pub fn resolve(&self, who: Operation, reference: &EncryptedReference) -> Result<Resolution> {
        let expected = reference.hash.as_ref();

        if let Some(expected) = expected {
            if expected.algorithm != HashAlgorithm::Sha256 {
                return Err(AgeError::Configuration(format!(
                    "{who} only supports SHA-256 hashes"
                )));
            }
        }

        if expected.is_none() && self.settings.mode.is_pure() {
            return Err(AgeError::Purity { who });
        }

        let name = derive_name(&reference.file);
        store::validate_name(&name).map_err(|e| {
            AgeError::Configuration(format!(
                "{who}: cannot derive a store name from '{}': {e}",
                reference.file.display()
            ))
        })?;

        if let Some(expected) = expected {
            if let Some(hit) = self.cached(&name, expected)? {
                return Ok(hit);
            }
        }

        let discovery = identity::discover(&self.identities, self.probe);
        if !discovery.has_usable() {
            return Err(AgeError::Identity {
                who,
                detail: discovery.describe(),
                hash_locked: expected.is_some(),
            });
        }

        if !self.probe.exists(&reference.file) {
            return Err(AgeError::Input {
                who,
                file: reference.file.clone(),
            });
        }

        let plaintext = Zeroizing::new(
            self.decryptor
                .decrypt(&discovery.usable(), &reference.file)
                .map_err(|source| AgeError::Tool {
                    who,
                    file: reference.file.clone(),
                    source,
                })?,
        );

        let content_hash = match hash::verify(expected, &plaintext) {
            Verification::Mismatched { expected, actual } => {
                return Err(AgeError::Integrity {
                    who,
                    file: reference.file.clone(),
                    expected: expected.to_sri(),
                    actual: actual.to_sri(),
                });
            }
            Verification::Matched(actual) | Verification::Unpinned(actual) => actual,
        };

        let store_path = self.store.write_from_stream(
            &mut plaintext.as_slice(),
            &name,
            IngestionMethod::Flat,
            HashAlgorithm::Sha256,
            self.settings.repair,
        )?;

        let pin_hint = if expected.is_none() {
            let hint = format!(
                "{who}: hash for '{}' is:\n  hash = \"{}\";",
                reference.file.display(),
                content_hash.to_sri()
            );
            log::warn!("{hint}");
            Some(hint)
        } else {
            None
        };

        Ok(Resolution {
            artifact: self.artifact(store_path, content_hash),
            origin: Origin::Decrypted,
            pin_hint,
        })
    }

    /// The cache check: `Some` if the hash-locked object is present.
    fn cached(&self, name: &str, expected: &Hash) -> Result<Option<Resolution>> {
        let path = self
            .store
            .compute_path(name, expected, IngestionMethod::Flat)?;

        match self.store.ensure_present(&path) {
            Ok(()) => {
                log::debug!("'{path}' is present, skipping decryption");
                Ok(Some(Resolution {
                    artifact: self.artifact(path, expected.clone()),
                    origin: Origin::Cached,
                    pin_hint: None,
                }))
            }
            Err(e) => {
                log::debug!("'{path}' not available ({e}), decrypting");
                Ok(None)
            }
        }
    }

    fn artifact(&self, store_path: StorePath, content_hash: Hash) -> ResolvedArtifact {
        ResolvedArtifact {
            location: self.store.location(&store_path),
            store_path,
            content_hash,
        }
    }
}
