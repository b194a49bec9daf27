// SPDX-License-Identifier: GPL-3.0-only

use std::future::Future;
use std::io::{self, Cursor};
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

use tokio::io::{AsyncRead, ReadBuf};
use tokio::process::{Child, ChildStdout};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tracing::instrument::WithSubscriber;
use tracing::{Dispatch, warn};

use super::{Verbosity, classify};
use crate::context::Context;
use crate::error::{LvmError, Result};

/// Stdout of a running `lvm` process.
///
/// Reading only reports pipe errors and cancellation. Whether the command
/// succeeded is decided by [`LvmStream::close`], which waits for the exit
/// status and turns a non-zero exit into a classified
/// [`CommandError`](crate::CommandError). Dropping the stream without
/// closing it kills the process.
pub struct LvmStream {
    source: Source,
    verbosity: Verbosity,
    cancel: CancellationToken,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
    dispatch: Dispatch,
}

enum Source {
    Process(ChildProcess),
    Buffered {
        stdout: Cursor<Vec<u8>>,
        outcome: Option<LvmError>,
    },
}

struct ChildProcess {
    command: String,
    child: Child,
    stdout: ChildStdout,
    stderr: JoinHandle<io::Result<Vec<u8>>>,
}

impl LvmStream {
    pub(crate) fn from_child(
        ctx: &Context,
        verbosity: Verbosity,
        command: String,
        child: Child,
        stdout: ChildStdout,
        stderr: JoinHandle<io::Result<Vec<u8>>>,
    ) -> Self {
        Self::new(
            ctx,
            verbosity,
            Source::Process(ChildProcess {
                command,
                child,
                stdout,
                stderr,
            }),
        )
    }

    /// Stream over output that is already complete. `outcome` is what
    /// [`close`](Self::close) reports.
    pub fn buffered(
        ctx: &Context,
        verbosity: Verbosity,
        stdout: impl Into<Vec<u8>>,
        outcome: Option<LvmError>,
    ) -> Self {
        Self::new(
            ctx,
            verbosity,
            Source::Buffered {
                stdout: Cursor::new(stdout.into()),
                outcome,
            },
        )
    }

    fn new(ctx: &Context, verbosity: Verbosity, source: Source) -> Self {
        let cancel = ctx.cancellation().clone();
        Self {
            source,
            verbosity,
            cancelled: Box::pin(cancel.clone().cancelled_owned()),
            cancel,
            dispatch: ctx.dispatch(),
        }
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// Waits for the process to exit.
    ///
    /// Fails with the classified command error on a non-zero exit even when
    /// every read succeeded, and with [`LvmError::Cancelled`] (after killing
    /// and reaping the child) when the context is cancelled first.
    pub async fn close(self) -> Result<()> {
        let dispatch = self.dispatch.clone();
        self.finish().with_subscriber(dispatch).await
    }

    async fn finish(self) -> Result<()> {
        let Self { source, cancel, .. } = self;
        match source {
            Source::Process(process) => process.wait(&cancel).await,
            Source::Buffered { outcome, .. } => {
                if cancel.is_cancelled() {
                    return Err(LvmError::Cancelled);
                }
                outcome.map_or(Ok(()), Err)
            }
        }
    }
}

impl ChildProcess {
    async fn wait(self, cancel: &CancellationToken) -> Result<()> {
        let Self {
            command,
            mut child,
            stdout,
            mut stderr,
        } = self;
        // A child still writing gets EPIPE instead of blocking on a full pipe.
        drop(stdout);

        // A descendant holding stderr open keeps the drain pending after the
        // child itself exited, so both are raced against cancellation.
        let finished = tokio::select! {
            finished = async { (child.wait().await, (&mut stderr).await) } => Some(finished),
            () = cancel.cancelled() => None,
        };
        let Some((status, stderr)) = finished else {
            if let Err(error) = child.kill().await {
                warn!("failed to kill cancelled command {command}: {error}");
            }
            stderr.abort();
            return Err(LvmError::Cancelled);
        };
        let status = status?;
        let stderr = stderr.map_err(|error| LvmError::Io(io::Error::other(error)))??;
        if status.success() {
            return Ok(());
        }

        let exit_code = status.code().unwrap_or(-1);
        Err(classify(command, exit_code, &String::from_utf8_lossy(&stderr)).into())
    }
}

impl AsyncRead for LvmStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut TaskContext<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        if this.cancel.is_cancelled() || this.cancelled.as_mut().poll(cx).is_ready() {
            return Poll::Ready(Err(LvmError::Cancelled.into_io()));
        }

        match &mut this.source {
            Source::Process(process) => Pin::new(&mut process.stdout).poll_read(cx, buf),
            Source::Buffered { stdout, .. } => Pin::new(stdout).poll_read(cx, buf),
        }
    }
}

impl std::fmt::Debug for LvmStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let command = match &self.source {
            Source::Process(process) => process.command.as_str(),
            Source::Buffered { .. } => "<buffered>",
        };
        f.debug_struct("LvmStream")
            .field("command", &command)
            .field("verbosity", &self.verbosity)
            .finish_non_exhaustive()
    }
}
