use std::process::Command;

use crate::errors::{Result, TestingError};

#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub command: String,
    pub stdout: String,
    pub stderr: String,
}

pub fn render(command: &str, args: &[&str]) -> String {
    if args.is_empty() {
        command.to_string()
    } else {
        format!("{} {}", command, args.join(" "))
    }
}

/// Runs a setup command (`losetup`, `pvcreate`, ...) to completion.
pub fn run(command: &str, args: &[&str]) -> Result<CommandOutcome> {
    let rendered = render(command, args);
    let output = Command::new(command)
        .args(args)
        .env("LC_ALL", "C")
        .output()
        .map_err(|error| TestingError::CommandFailed {
            command: rendered.clone(),
            stderr: error.to_string(),
        })?;

    if !output.status.success() {
        return Err(TestingError::CommandFailed {
            command: rendered,
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    Ok(CommandOutcome {
        command: rendered,
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}
