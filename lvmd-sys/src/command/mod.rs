// SPDX-License-Identifier: GPL-3.0-only

//! Invocation of the `lvm` tool.
//!
//! [`CommandRunner`] is the capability the volume layer is written against.
//! [`LvmCommand`] runs the real binary; the `fake-runner` feature adds a
//! scripted in-memory implementation.

pub mod classify;
#[cfg(any(test, feature = "fake-runner"))]
pub mod fake;
mod process;
mod stream;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tracing::{debug, trace};

use crate::context::Context;
use crate::error::Result;

pub use classify::{NOT_FOUND_EXIT_CODE, classify};
pub use process::LvmCommand;
pub use stream::LvmStream;

/// Whether a call only reads LVM state or changes it.
///
/// Only decides how loudly raw output is logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    ReadOnly,
    StateUpdate,
}

impl Verbosity {
    fn log_output(self, line: &str) {
        match self {
            Self::ReadOnly => trace!("{line}"),
            Self::StateUpdate => debug!("{line}"),
        }
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Starts `lvm` with `args` and hands back its stdout.
    ///
    /// Returns as soon as the process runs. Its exit status is only known
    /// once the returned stream is closed.
    fn spawn(&self, ctx: &Context, verbosity: Verbosity, args: &[String]) -> Result<LvmStream>;

    /// Runs a state-changing `lvm` command to completion and returns stdout.
    async fn run(&self, ctx: &Context, args: &[String]) -> Result<Vec<u8>> {
        let stream = self.spawn(ctx, Verbosity::StateUpdate, args)?;
        collect(ctx, stream).await
    }
}

/// Drains `stream`, waits for the process and logs the output line by line.
///
/// A failed exit wins over a failed read: it carries the diagnostic text.
pub async fn collect(ctx: &Context, mut stream: LvmStream) -> Result<Vec<u8>> {
    let verbosity = stream.verbosity();
    let mut stdout = Vec::new();
    let read = stream.read_to_end(&mut stdout).await;
    let closed = stream.close().await;

    ctx.in_scope(|| {
        for line in String::from_utf8_lossy(&stdout).lines() {
            verbosity.log_output(line);
        }
    });

    closed?;
    read?;
    Ok(stdout)
}
