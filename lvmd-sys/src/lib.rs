// SPDX-License-Identifier: GPL-3.0-only

//! LVM operations on top of the `lvm` command-line tool
//!
//! This crate drives `lvm` as a child process and interprets its output:
//! - `command` → spawning `lvm`, streamed and buffered, and classifying failures
//! - `report` → parsing `lvm fullreport` JSON into `lvmd-types` records
//! - `lvm` → volume groups, logical volumes and thin pools
//!
//! Every operation takes a [`Context`] carrying cancellation and the logging
//! sink for that call. Commands need root privileges on the host.

pub mod command;
pub mod config;
pub mod context;
pub mod error;
pub mod lvm;
pub mod report;

pub use command::{CommandRunner, LvmCommand, LvmStream, Verbosity, collect};
pub use config::LvmConfig;
pub use context::Context;
pub use error::{
    CommandError, CommandErrorKind, LvmError, Result, as_command_error, is_cancelled, is_not_found,
};
pub use lvm::{Access, CreateOptions, LogicalVolume, Lvm, ThinPool, VolumeGroup};
pub use report::{ReportEntry, ReportError};

pub use lvmd_types::MINIMUM_SECTOR_SIZE;
