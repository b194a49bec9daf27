// SPDX-License-Identifier: GPL-3.0-only

use std::error::Error as StdError;
use std::io;

use lvmd_types::MINIMUM_SECTOR_SIZE;
use thiserror::Error;

use crate::report::ReportError;

/// Classification of a failed `lvm` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandErrorKind {
    /// The volume group or logical volume named in the command does not exist.
    NotFound,
    Generic,
}

/// A non-zero exit of the `lvm` tool.
///
/// Built once by the classifier when the process exits; everything above
/// the invoker passes it along untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{command} failed with exit status {exit_code}: {}", .stderr.trim())]
pub struct CommandError {
    command: String,
    exit_code: i32,
    stderr: String,
    kind: CommandErrorKind,
}

impl CommandError {
    pub(crate) fn new(
        command: impl Into<String>,
        exit_code: i32,
        stderr: impl Into<String>,
        kind: CommandErrorKind,
    ) -> Self {
        Self {
            command: command.into(),
            exit_code,
            stderr: stderr.into(),
            kind,
        }
    }

    /// Rendered argv of the failed invocation.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Process exit code, `-1` when the process was killed by a signal.
    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    /// Diagnostic output exactly as the tool printed it.
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    pub fn kind(&self) -> CommandErrorKind {
        self.kind
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == CommandErrorKind::NotFound
    }
}

/// Error types for LVM operations
#[derive(Debug, Error)]
pub enum LvmError {
    #[error(transparent)]
    Command(#[from] CommandError),

    /// The tool succeeded but reported no matching row.
    #[error("{kind} {name} not found")]
    NotFound { kind: &'static str, name: String },

    #[error(
        "size {size} is not a non-zero multiple of the minimum sector size {}",
        MINIMUM_SECTOR_SIZE
    )]
    NotMultipleOfSectorSize { size: u64 },

    #[error("cannot shrink {name} from {current} to {requested} bytes")]
    ShrinkNotSupported {
        name: String,
        current: u64,
        requested: u64,
    },

    #[error("invalid lvm report: {0}")]
    Report(#[from] ReportError),

    #[error("{name} is not a thin volume")]
    NotThin { name: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(io::Error),
}

impl LvmError {
    pub(crate) fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Command(error) => error.is_not_found(),
            _ => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn as_command_error(&self) -> Option<&CommandError> {
        match self {
            Self::Command(error) => Some(error),
            _ => None,
        }
    }

    /// Wraps this error for transport through `AsyncRead`.
    pub(crate) fn into_io(self) -> io::Error {
        io::Error::other(self)
    }
}

/// Stream reads carry `LvmError`s inside `io::Error`; unwrap them so the
/// original class survives `?`.
impl From<io::Error> for LvmError {
    fn from(error: io::Error) -> Self {
        if !error.get_ref().is_some_and(|inner| inner.is::<LvmError>()) {
            return Self::Io(error);
        }
        match error.into_inner().map(|inner| inner.downcast::<LvmError>()) {
            Some(Ok(inner)) => *inner,
            Some(Err(other)) => Self::Io(io::Error::other(other)),
            None => Self::Io(io::Error::other("stream failed")),
        }
    }
}

/// Result type alias for LVM operations
pub type Result<T> = std::result::Result<T, LvmError>;

fn chain<'a>(
    error: &'a (dyn StdError + 'static),
) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    std::iter::successors(Some(error), |&current| current.source())
}

/// Finds the [`CommandError`] behind `error`, looking through any wrapping
/// layers that expose it as a source.
pub fn as_command_error<'a>(error: &'a (dyn StdError + 'static)) -> Option<&'a CommandError> {
    chain(error).find_map(|current| {
        current.downcast_ref::<CommandError>().or_else(|| {
            current
                .downcast_ref::<LvmError>()
                .and_then(LvmError::as_command_error)
        })
    })
}

/// Whether `error` says the requested volume group or volume does not exist.
pub fn is_not_found(error: &(dyn StdError + 'static)) -> bool {
    chain(error).any(|current| {
        current
            .downcast_ref::<LvmError>()
            .is_some_and(LvmError::is_not_found)
            || current
                .downcast_ref::<CommandError>()
                .is_some_and(CommandError::is_not_found)
    })
}

/// Whether `error` stems from the caller cancelling the operation.
pub fn is_cancelled(error: &(dyn StdError + 'static)) -> bool {
    chain(error).any(|current| {
        current
            .downcast_ref::<LvmError>()
            .is_some_and(LvmError::is_cancelled)
    })
}

#[cfg(test)]
mod tests {
    use anyhow::Context as _;

    use super::*;

    fn vgs_missing() -> LvmError {
        CommandError::new(
            "/sbin/lvm vgs missing",
            5,
            "Volume group \"missing\" not found",
            CommandErrorKind::NotFound,
        )
        .into()
    }

    #[test]
    fn command_error_display_carries_exit_status_and_stderr() {
        let error = vgs_missing();
        let message = error.to_string();
        assert!(message.contains("exit status 5"));
        assert!(message.contains("Volume group \"missing\" not found"));
    }

    #[test]
    fn extracts_command_error_through_anyhow_context() {
        let wrapped = Err::<(), _>(vgs_missing())
            .context("looking up volume group")
            .unwrap_err();
        let error: &(dyn StdError + 'static) = wrapped.as_ref();

        let command = as_command_error(error).expect("command error in chain");
        assert_eq!(command.exit_code(), 5);
        assert!(command.stderr().contains("not found"));
        assert!(is_not_found(error));
        assert!(!is_cancelled(error));
    }

    #[test]
    fn generic_failure_is_not_not_found() {
        let error = LvmError::from(CommandError::new(
            "/sbin/lvm foobar",
            3,
            "No such command 'foobar'.",
            CommandErrorKind::Generic,
        ));
        assert!(!error.is_not_found());
        assert!(!is_not_found(&error));
        assert_eq!(as_command_error(&error).map(CommandError::exit_code), Some(3));
    }

    #[test]
    fn empty_report_not_found_has_no_command_error() {
        let error = LvmError::not_found("volume group", "vg0");
        assert!(is_not_found(&error));
        assert!(as_command_error(&error).is_none());
        assert_eq!(error.to_string(), "volume group vg0 not found");
    }

    #[test]
    fn io_round_trip_preserves_cancellation() {
        let io_error = LvmError::Cancelled.into_io();
        assert!(LvmError::from(io_error).is_cancelled());

        let plain = io::Error::new(io::ErrorKind::BrokenPipe, "pipe");
        assert!(matches!(LvmError::from(plain), LvmError::Io(_)));
    }

    #[test]
    fn io_round_trip_preserves_command_error() {
        let io_error = vgs_missing().into_io();
        let error = LvmError::from(io_error);
        assert!(error.is_not_found());
    }
}
