// SPDX-License-Identifier: GPL-3.0-only

use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::debug;

use super::{CommandRunner, LvmStream, Verbosity};
use crate::config::{LvmConfig, NSENTER_HOST_ARGS};
use crate::context::Context;
use crate::error::{LvmError, Result};

/// Runs the host's `lvm` binary.
#[derive(Debug, Clone)]
pub struct LvmCommand {
    program: PathBuf,
    /// Arguments placed before the subcommand (the nsenter wrapping).
    prefix: Vec<String>,
}

impl LvmCommand {
    pub fn new(config: &LvmConfig) -> Self {
        let lvm_path = config.resolve_lvm_path();
        if config.containerized {
            let mut prefix: Vec<String> = NSENTER_HOST_ARGS
                .iter()
                .map(|arg| arg.to_string())
                .collect();
            prefix.push(lvm_path.to_string_lossy().into_owned());
            Self {
                program: config.nsenter_path.clone(),
                prefix,
            }
        } else {
            Self {
                program: lvm_path,
                prefix: Vec::new(),
            }
        }
    }

    /// Full argv as it is executed, program first.
    pub fn argv(&self, args: &[String]) -> Vec<String> {
        std::iter::once(self.program.to_string_lossy().into_owned())
            .chain(self.prefix.iter().cloned())
            .chain(args.iter().cloned())
            .collect()
    }
}

#[async_trait]
impl CommandRunner for LvmCommand {
    fn spawn(&self, ctx: &Context, verbosity: Verbosity, args: &[String]) -> Result<LvmStream> {
        if ctx.is_cancelled() {
            return Err(LvmError::Cancelled);
        }

        let argv = self.argv(args);
        ctx.in_scope(|| debug!(args = ?argv, "invoking command"));

        let mut child = Command::new(&self.program)
            .args(&self.prefix)
            .args(args)
            .env("LC_ALL", "C")
            .env("LVM_SUPPRESS_FD_WARNINGS", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| LvmError::Io(io::Error::other("stdout was not captured")))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| LvmError::Io(io::Error::other("stderr was not captured")))?;

        // Drained concurrently so a chatty stderr cannot stall the child.
        let stderr = tokio::spawn(async move {
            let mut buf = Vec::new();
            stderr.read_to_end(&mut buf).await.map(|_| buf)
        });

        Ok(LvmStream::from_child(
            ctx,
            verbosity,
            argv.join(" "),
            child,
            stdout,
            stderr,
        ))
    }
}
