//! Command runner abstraction used to shell out to host utilities.

use std::ffi::OsString;
use std::process::Command;

use thiserror::Error;

/// Result of running an external command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandOutput {
    /// Exit code reported by the process, if available.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns `true` when the exit code equals zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

/// Errors raised while starting an external command.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum CommandError {
    /// Raised when the process cannot be spawned (for example when the
    /// binary is absent).
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Program that could not be started.
        program: String,
        /// Error reported by the operating system.
        message: String,
    },
}

/// Abstraction over command execution to support fakes in tests.
pub trait CommandRunner {
    /// Runs `program` with the given arguments, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Spawn`] if the command cannot be started.
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, CommandError>;
}

/// Real command runner that shells out to the host operating system.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessCommandRunner;

impl CommandRunner for ProcessCommandRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, CommandError> {
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|err| CommandError::Spawn {
                program: program.to_owned(),
                message: err.to_string(),
            })?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_reports_spawn_error() {
        let err = ProcessCommandRunner
            .run("stackvol-definitely-not-installed", &[])
            .expect_err("binary should be absent");
        assert!(matches!(err, CommandError::Spawn { ref program, .. } if program == "stackvol-definitely-not-installed"));
    }

    #[test]
    fn is_success_requires_zero_exit() {
        let output = CommandOutput {
            code: Some(1),
            stdout: String::new(),
            stderr: String::new(),
        };
        assert!(!output.is_success());
        assert!(CommandOutput { code: Some(0), ..output }.is_success());
    }
}
