//! Runs the user's command after each settled burst.

use std::process::Command;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

/// The command to run and when to stop running it.
#[derive(Debug)]
pub struct CommandRunner {
    program: String,
    args: Vec<String>,
    once: bool,
    halt_on_failure: bool,
    runs: usize,
}

impl CommandRunner {
    /// Create a runner for `command`, whose first element is the program.
    pub fn new(command: Vec<String>, once: bool, halt_on_failure: bool) -> Result<Self> {
        let mut parts = command.into_iter();
        let program = parts.next().context("empty command")?;

        Ok(Self {
            program,
            args: parts.collect(),
            once,
            halt_on_failure,
            runs: 0,
        })
    }

    /// Run the command to completion. Returns `true` when watching should
    /// stop.
    pub fn run(&mut self) -> bool {
        self.runs += 1;
        info!(run = self.runs, command = %self.program, "change detected, running command");

        // Otherwise the command would block the runtime worker thread.
        let status = tokio::task::block_in_place(|| {
            Command::new(&self.program).args(&self.args).status()
        });

        let succeeded = match status {
            Ok(status) if status.success() => {
                info!(%status, "command finished");
                true
            }
            Ok(status) => {
                warn!(%status, "command failed");
                false
            }
            Err(e) => {
                error!("failed to run {}: {e}", self.program);
                false
            }
        };

        self.once || (self.halt_on_failure && !succeeded)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn command(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|p| (*p).to_string()).collect()
    }

    #[test]
    fn test_empty_command_rejected() {
        assert!(CommandRunner::new(Vec::new(), false, false).is_err());
    }

    #[test]
    fn test_keeps_running_on_success() {
        let mut runner = CommandRunner::new(command(&["true"]), false, true).unwrap();
        assert!(!runner.run());
        assert!(!runner.run());
        assert_eq!(runner.runs, 2);
    }

    #[test]
    fn test_once_stops_after_first_run() {
        let mut runner = CommandRunner::new(command(&["true"]), true, false).unwrap();
        assert!(runner.run());
    }

    #[test]
    fn test_failure_policy() {
        let mut tolerant = CommandRunner::new(command(&["sh", "-c", "exit 3"]), false, false).unwrap();
        assert!(!tolerant.run());

        let mut strict = CommandRunner::new(command(&["sh", "-c", "exit 3"]), false, true).unwrap();
        assert!(strict.run());
    }

    #[test]
    fn test_spawn_failure_counts_as_failure() {
        let mut runner =
            CommandRunner::new(command(&["/nonexistent/program/12345"]), false, true).unwrap();
        assert!(runner.run());
    }
}
