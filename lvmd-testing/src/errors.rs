use std::path::PathBuf;

use lvmd_sys::LvmError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TestingError {
    #[error("skipped: {reason}")]
    TestSkipped { reason: String },
    #[error("failed: {reason}")]
    TestFailed { reason: String },
    #[error("command failed: {command}; stderr: {stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error("backing file io error for {path:?}: {reason}")]
    BackingFile { path: PathBuf, reason: String },
    #[error(transparent)]
    Lvm(#[from] LvmError),
}

pub type Result<T> = std::result::Result<T, TestingError>;
