// SPDX-License-Identifier: GPL-3.0-only

//! Per-call cancellation and logging sink.

use tokio_util::sync::CancellationToken;
use tracing::Dispatch;

/// Carried into every LVM operation.
///
/// Cancelling the token aborts a pending spawn, wakes blocked stream reads
/// and kills a child that is still running when its stream is closed.
/// Events are emitted into `dispatch` when set, otherwise into the caller's
/// default subscriber, so concurrent callers can log to separate sinks.
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancel: CancellationToken,
    dispatch: Option<Dispatch>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_dispatch(mut self, dispatch: impl Into<Dispatch>) -> Self {
        self.dispatch = Some(dispatch.into());
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Context sharing this logging sink whose token is a child of this one.
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            dispatch: self.dispatch.clone(),
        }
    }

    pub(crate) fn dispatch(&self) -> Dispatch {
        self.dispatch
            .clone()
            .unwrap_or_else(|| tracing::dispatcher::get_default(Dispatch::clone))
    }

    /// Runs `f` with this context's subscriber as the default.
    pub(crate) fn in_scope<T>(&self, f: impl FnOnce() -> T) -> T {
        match &self.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
            None => f(),
        }
    }
}
