// SPDX-License-Identifier: GPL-3.0-only

//! Scripted [`CommandRunner`] for tests.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::{CommandRunner, LvmStream, Verbosity, classify};
use crate::context::Context;
use crate::error::{LvmError, Result};

/// One scripted process outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeResponse {
    stdout: Vec<u8>,
    failure: Option<(i32, String)>,
}

impl FakeResponse {
    pub fn ok(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            stdout: stdout.into(),
            failure: None,
        }
    }

    pub fn fail(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: Vec::new(),
            failure: Some((exit_code, stderr.into())),
        }
    }
}

/// Replays queued responses in order and records every argv it is given.
///
/// An exhausted queue answers like an unknown `lvm` subcommand.
#[derive(Debug, Default)]
pub struct FakeRunner {
    responses: Mutex<VecDeque<FakeResponse>>,
    invocations: Mutex<Vec<Vec<String>>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: FakeResponse) -> &Self {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(response);
        self
    }

    /// Arguments of every spawn so far, oldest first.
    pub fn invocations(&self) -> Vec<Vec<String>> {
        self.invocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn pending(&self) -> usize {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    fn spawn(&self, ctx: &Context, verbosity: Verbosity, args: &[String]) -> Result<LvmStream> {
        if ctx.is_cancelled() {
            return Err(LvmError::Cancelled);
        }
        self.invocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(args.to_vec());

        let response = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| FakeResponse::fail(3, "no scripted response"));

        let outcome = response.failure.map(|(exit_code, stderr)| {
            LvmError::from(classify(format!("lvm {}", args.join(" ")), exit_code, &stderr))
        });
        Ok(LvmStream::buffered(ctx, verbosity, response.stdout, outcome))
    }
}
