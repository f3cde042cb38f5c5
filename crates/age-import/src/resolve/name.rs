//! Store object names derived from encrypted file names.

use std::path::Path;

/// Suffix stripped from encrypted file names.
pub const ENCRYPTED_SUFFIX: &str = ".age";

/// Name used when the reference has no final path component.
pub const FALLBACK_NAME: &str = "source";

/// `secrets/db.nix.age` → `db.nix`; `/` → `source`.
pub fn derive_name(file: &Path) -> String {
    let base = match file.file_name() {
        Some(base) => base.to_string_lossy(),
        None => return FALLBACK_NAME.to_string(),
    };
    base.strip_suffix(ENCRYPTED_SUFFIX)
        .unwrap_or(&base)
        .to_string()
}
