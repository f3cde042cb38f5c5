//! Candidate identity discovery.
//!
//! If `AGE_IDENTITY_FILE` is set it is the only candidate. Otherwise the
//! default SSH keys under the home directory are tried, ed25519 first.

use std::path::{Path, PathBuf};

use super::probe::{CandidateState, FileProbe};

/// Environment variable naming an explicit identity file.
pub const IDENTITY_FILE_ENV: &str = "AGE_IDENTITY_FILE";

/// Default identity files relative to the home directory, in priority order.
pub const DEFAULT_IDENTITY_FILES: [&str; 2] = [".ssh/id_ed25519", ".ssh/id_rsa"];

/// Where to look for identities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityConfig {
    /// Explicit identity file; disables default discovery when set.
    pub override_file: Option<PathBuf>,
    /// Home directory for default discovery.
    pub home: Option<PathBuf>,
}

impl IdentityConfig {
    /// Read `AGE_IDENTITY_FILE` and `HOME`. Empty values count as unset.
    pub fn from_env() -> Self {
        Self {
            override_file: non_empty_env(IDENTITY_FILE_ENV),
            home: non_empty_env("HOME"),
        }
    }

    /// A config that uses exactly one identity file.
    pub fn with_override(path: impl Into<PathBuf>) -> Self {
        Self {
            override_file: Some(path.into()),
            home: None,
        }
    }

    /// A config that searches the default files under `home`.
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        Self {
            override_file: None,
            home: Some(home.into()),
        }
    }

    /// Candidate paths in priority order, without touching the filesystem.
    pub fn candidate_paths(&self) -> Vec<PathBuf> {
        if let Some(path) = &self.override_file {
            return vec![path.clone()];
        }
        match &self.home {
            Some(home) => DEFAULT_IDENTITY_FILES
                .iter()
                .map(|rel| home.join(rel))
                .collect(),
            None => Vec::new(),
        }
    }
}

fn non_empty_env(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// One probed candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityCandidate {
    pub path: PathBuf,
    pub state: CandidateState,
}

/// Result of probing every candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityDiscovery {
    /// Every candidate, in priority order.
    pub candidates: Vec<IdentityCandidate>,
}

impl IdentityDiscovery {
    /// Paths `age` can use, in priority order.
    pub fn usable(&self) -> Vec<PathBuf> {
        self.candidates
            .iter()
            .filter(|c| c.state.is_usable())
            .map(|c| c.path.clone())
            .collect()
    }

    pub fn has_usable(&self) -> bool {
        self.candidates.iter().any(|c| c.state.is_usable())
    }

    /// Diagnostic text listing every candidate with its state.
    pub fn describe(&self) -> String {
        if self.candidates.is_empty() {
            return "no candidate paths (could not determine home directory)".to_string();
        }
        let checked: Vec<String> = self
            .candidates
            .iter()
            .map(|c| describe_candidate(&c.path, c.state))
            .collect();
        format!("checked: {}", checked.join(", "))
    }
}

fn describe_candidate(path: &Path, state: CandidateState) -> String {
    format!("{} ({})", path.display(), state.label())
}

/// Probe every candidate named by `config`.
pub fn discover(config: &IdentityConfig, probe: &dyn FileProbe) -> IdentityDiscovery {
    let candidates = config
        .candidate_paths()
        .into_iter()
        .map(|path| {
            let state = probe.state(&path);
            log::debug!("identity candidate {} is {}", path.display(), state.label());
            IdentityCandidate { path, state }
        })
        .collect();
    IdentityDiscovery { candidates }
}
