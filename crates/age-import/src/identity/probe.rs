//! Filesystem probing behind a trait, so callers can observe or fake which
//! paths a resolution touches.

use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;

/// Observed state of a candidate identity file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateState {
    /// Exists and can be opened for reading.
    Found,
    /// Does not exist.
    NotFound,
    /// Exists but cannot be opened for reading.
    NotReadable,
    /// Its existence could not be determined.
    Inaccessible,
}

impl CandidateState {
    /// Whether an identity in this state can be passed to `age`.
    pub fn is_usable(self) -> bool {
        self == Self::Found
    }

    /// Label used in diagnostics.
    pub fn label(self) -> &'static str {
        match self {
            Self::Found => "found",
            Self::NotFound => "not found",
            Self::NotReadable => "not readable",
            Self::Inaccessible => "inaccessible",
        }
    }
}

/// Read-only filesystem queries made during a resolution.
pub trait FileProbe {
    /// Classify `path` as an identity candidate.
    fn state(&self, path: &Path) -> CandidateState;

    /// Whether `path` exists at all.
    fn exists(&self, path: &Path) -> bool;
}

/// The real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

impl FileProbe for FsProbe {
    fn state(&self, path: &Path) -> CandidateState {
        match std::fs::metadata(path) {
            Ok(_) => match File::open(path) {
                Ok(_) => CandidateState::Found,
                Err(_) => CandidateState::NotReadable,
            },
            Err(e) if e.kind() == ErrorKind::NotFound => CandidateState::NotFound,
            Err(_) => CandidateState::Inaccessible,
        }
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}
