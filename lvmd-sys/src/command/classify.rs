// SPDX-License-Identifier: GPL-3.0-only

//! Exit-code and diagnostic based classification of `lvm` failures.
//!
//! The not-found signature is a compatibility contract with the LVM2 release
//! in use. The table test below pins the messages observed from the tool;
//! extend it when upgrading LVM rather than loosening the match.

use crate::error::{CommandError, CommandErrorKind};

/// `ECMD_FAILED`, returned when the named object could not be processed.
pub const NOT_FOUND_EXIT_CODE: i32 = 5;

/// Diagnostic fragments LVM prints for a missing volume group or volume.
const NOT_FOUND_SIGNATURES: &[&str] = &["not found", "Failed to find"];

/// Classifies a non-zero exit of `command`. `stderr` is kept verbatim.
pub fn classify(command: impl Into<String>, exit_code: i32, stderr: &str) -> CommandError {
    let kind = if exit_code == NOT_FOUND_EXIT_CODE
        && NOT_FOUND_SIGNATURES
            .iter()
            .any(|signature| stderr.contains(signature))
    {
        CommandErrorKind::NotFound
    } else {
        CommandErrorKind::Generic
    };

    CommandError::new(command, exit_code, stderr, kind)
}
