//! The two ways decrypted content is handed back to the evaluator.
//!
//! - [`read_age`] returns the plaintext as a string. Strings cannot carry an
//!   embedded NUL, so such content is rejected.
//! - [`import_age`] passes the materialized artifact to a
//!   [`DocumentEvaluator`], which has no such restriction.

use std::path::Path;

use serde_json::Value;

use crate::error::{AgeError, Result};
use crate::request::{EncryptedReference, Operation};
use crate::resolve::{Resolution, Resolver};

/// Evaluates a decrypted artifact as a structured document.
pub trait DocumentEvaluator {
    type Output;

    /// `location` is the artifact's store location, `bytes` its content.
    fn evaluate(&self, location: &Path, bytes: &[u8]) -> std::result::Result<Self::Output, String>;
}

/// Evaluates artifacts as JSON documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEvaluator;

impl DocumentEvaluator for JsonEvaluator {
    type Output = Value;

    fn evaluate(&self, location: &Path, bytes: &[u8]) -> std::result::Result<Value, String> {
        serde_json::from_slice(bytes)
            .map_err(|e| format!("error parsing '{}' as JSON: {e}", location.display()))
    }
}

/// Resolve `reference` and return its plaintext as a string.
///
/// # Errors
///
/// Propagates resolution errors; returns `AgeError::Representation` if the
/// content holds a NUL byte or is not valid UTF-8.
pub fn read_age(resolver: &Resolver<'_>, reference: &EncryptedReference) -> Result<String> {
    read_age_with(resolver, reference).map(|(text, _)| text)
}

/// Like [`read_age`], also returning the resolution details.
pub fn read_age_with(
    resolver: &Resolver<'_>,
    reference: &EncryptedReference,
) -> Result<(String, Resolution)> {
    let who = Operation::ReadAge;
    let resolution = resolver.resolve(who, reference)?;
    let bytes = resolver
        .store()
        .read_artifact(&resolution.artifact.store_path)?;

    let unrepresentable = || AgeError::Representation {
        who,
        file: reference.file.clone(),
    };
    if bytes.contains(&0) {
        return Err(unrepresentable());
    }
    let text = String::from_utf8(bytes).map_err(|_| unrepresentable())?;

    Ok((text, resolution))
}

/// Resolve `reference` and evaluate the artifact with `evaluator`.
///
/// # Errors
///
/// Propagates resolution errors; evaluator failures become
/// `AgeError::Evaluation`.
pub fn import_age<E: DocumentEvaluator + ?Sized>(
    resolver: &Resolver<'_>,
    reference: &EncryptedReference,
    evaluator: &E,
) -> Result<E::Output> {
    import_age_with(resolver, reference, evaluator).map(|(value, _)| value)
}

/// Like [`import_age`], also returning the resolution details.
pub fn import_age_with<E: DocumentEvaluator + ?Sized>(
    resolver: &Resolver<'_>,
    reference: &EncryptedReference,
    evaluator: &E,
) -> Result<(E::Output, Resolution)> {
    let who = Operation::ImportAge;
    let resolution = resolver.resolve(who, reference)?;
    let bytes = zeroize::Zeroizing::new(
        resolver
            .store()
            .read_artifact(&resolution.artifact.store_path)?,
    );

    let value = evaluator
        .evaluate(&resolution.artifact.location, &bytes)
        .map_err(|message| AgeError::Evaluation { who, message })?;

    Ok((value, resolution))
}
