//! Decryption by running the `age` binary.
//!
//! Invocation: `age --decrypt [-i <identity>]... <file>`. Standard output is
//! taken verbatim as the plaintext; standard error is kept for the failure
//! message. No timeout is imposed here.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use super::{DecryptError, Decryptor};

/// Program run when nothing else is configured.
pub const DEFAULT_AGE_PROGRAM: &str = "age";

/// Environment variable overriding the program path.
pub const AGE_PROGRAM_ENV: &str = "AGE_PROGRAM";

/// Runs an external `age`-compatible program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgeCommand {
    program: PathBuf,
}

impl AgeCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Use `AGE_PROGRAM` if set, otherwise `age` from `PATH`.
    pub fn from_env() -> Self {
        match std::env::var_os(AGE_PROGRAM_ENV).filter(|v| !v.is_empty()) {
            Some(program) => Self::new(program),
            None => Self::default(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments passed to the program, in order.
    pub fn args(identities: &[PathBuf], encrypted: &Path) -> Vec<OsString> {
        let mut args = Vec::with_capacity(identities.len() * 2 + 2);
        args.push(OsString::from("--decrypt"));
        for id in identities {
            args.push(OsString::from("-i"));
            args.push(id.clone().into_os_string());
        }
        args.push(encrypted.as_os_str().to_owned());
        args
    }
}

impl Default for AgeCommand {
    fn default() -> Self {
        Self::new(DEFAULT_AGE_PROGRAM)
    }
}

impl Decryptor for AgeCommand {
    fn decrypt(&self, identities: &[PathBuf], encrypted: &Path) -> Result<Vec<u8>, DecryptError> {
        let program = self.program.display().to_string();
        log::debug!(
            "running {} --decrypt with {} identities on {}",
            program,
            identities.len(),
            encrypted.display()
        );

        let output = Command::new(&self.program)
            .args(Self::args(identities, encrypted))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|source| DecryptError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(DecryptError::Failed {
                program,
                status: describe_status(output.status),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        Ok(output.stdout)
    }
}

fn describe_status(status: ExitStatus) -> String {
    if let Some(code) = status.code() {
        return format!("exit code {code}");
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return format!("signal {signal}");
        }
    }
    status.to_string()
}
