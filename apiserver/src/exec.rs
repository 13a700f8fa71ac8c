//! Adapter for the routing daemon's control binary.
//!
//! The executor holds a base command (path plus fixed arguments addressing
//! the daemon) and the URI of the rendered configuration file.  Each
//! operation appends its subcommand, runs the composed command with
//! whitespace tokenization, and succeeds only when the process exits zero
//! AND some stdout line contains an expected marker.

use snafu::{ensure, OptionExt, ResultExt, Snafu};
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::Command;

const VALIDATE_MARKERS: &[&str] = &["Configuration OK"];
const LOAD_MARKERS: &[&str] = &["Reconfiguration in progress", "Reconfigured"];

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Executor command is empty"))]
    EmptyCommand,

    #[snafu(display("Failed to spawn '{}': {}", command, source))]
    Spawn { command: String, source: io::Error },

    #[snafu(display("'{}' exited with status {}", command, code))]
    NonZeroExit { command: String, code: i32 },

    #[snafu(display("'{}' printed no expected marker line", command))]
    MarkerNotFound { command: String },
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone)]
pub struct BirdExecutor {
    base_command: String,
    target_uri: String,
}

impl BirdExecutor {
    pub fn new<S1, S2>(base_command: S1, target_uri: S2) -> Result<Self>
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        let base_command = base_command.into();
        ensure!(!base_command.trim().is_empty(), EmptyCommandSnafu);
        Ok(Self {
            base_command,
            target_uri: target_uri.into(),
        })
    }

    /// Asks the daemon to check the target file without applying it.
    pub fn validate(&self) -> Result<()> {
        let command = format!(
            "{} configure check \"{}\"",
            self.base_command, self.target_uri
        );
        trace!("Validation command to execute: '{}'", command);
        self.run_and_match(&command, VALIDATE_MARKERS)
    }

    /// Asks the daemon to apply the target file.
    pub fn load(&self) -> Result<()> {
        let command = format!("{} configure \"{}\"", self.base_command, self.target_uri);
        trace!("Load command to execute: '{}'", command);
        self.run_and_match(&command, LOAD_MARKERS)
    }

    /// Asks the daemon to return to its previous configuration.
    pub fn rollback(&self) -> Result<()> {
        let command = format!("{} configure undo", self.base_command);
        trace!("Rollback command to execute: '{}'", command);
        self.run_and_match(&command, LOAD_MARKERS)
    }

    fn run_and_match(&self, command: &str, markers: &[&str]) -> Result<()> {
        let mut parts = command.split_whitespace();
        let program = parts.next().context(EmptyCommandSnafu)?;

        let output = Command::new(program)
            .args(parts)
            .output()
            .context(SpawnSnafu { command })?;

        // A non-zero exit is a failure no matter what was printed.
        ensure!(
            output.status.success(),
            NonZeroExitSnafu {
                command,
                code: match output.status.code() {
                    Some(code) => code,
                    None => output.status.signal().unwrap_or(1),
                },
            }
        );

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines() {
            trace!("Output line from process: '{}'", line);
            if markers.iter().any(|marker| line.contains(marker)) {
                return Ok(());
            }
        }

        for line in String::from_utf8_lossy(&output.stderr).lines() {
            error!("Output line from process: '{}'", line);
        }
        MarkerNotFoundSnafu { command }.fail()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_base_command_is_rejected() {
        BirdExecutor::new("  ", "/tmp/target.conf").unwrap_err();
    }

    #[test]
    fn validate_matches_marker_line() {
        // `echo` prints the subcommand too; only the marker matters.
        let exec = BirdExecutor::new("echo Configuration OK", "/tmp/target.conf").unwrap();
        exec.validate().unwrap();
    }

    #[test]
    fn load_matches_either_marker() {
        let exec = BirdExecutor::new("echo Reconfigured", "/tmp/target.conf").unwrap();
        exec.load().unwrap();

        let exec = BirdExecutor::new("echo Reconfiguration in progress", "/tmp/t").unwrap();
        exec.load().unwrap();
        exec.rollback().unwrap();
    }

    #[test]
    fn missing_marker_is_a_failure() {
        let exec = BirdExecutor::new("echo nothing of note", "/tmp/target.conf").unwrap();
        assert!(matches!(
            exec.validate().unwrap_err(),
            Error::MarkerNotFound { .. }
        ));
    }

    #[test]
    fn nonzero_exit_is_a_failure_regardless_of_output() {
        // `false` ignores its arguments and exits 1.
        let exec = BirdExecutor::new("false Configuration OK", "/tmp/target.conf").unwrap();
        assert!(matches!(
            exec.validate().unwrap_err(),
            Error::NonZeroExit { .. }
        ));
    }

    #[test]
    fn unspawnable_command_is_a_failure() {
        let exec = BirdExecutor::new("/definitely/not/here", "/tmp/target.conf").unwrap();
        assert!(matches!(exec.validate().unwrap_err(), Error::Spawn { .. }));
    }
}
