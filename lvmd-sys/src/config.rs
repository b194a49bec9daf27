// SPDX-License-Identifier: GPL-3.0-only

//! Configuration of the `lvm` invocation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

const DEFAULT_LVM_PATH: &str = "/sbin/lvm";
const DEFAULT_NSENTER_PATH: &str = "/usr/bin/nsenter";

/// Arguments that make `nsenter` join every namespace of the host's init.
pub(crate) const NSENTER_HOST_ARGS: &[&str] = &["-m", "-u", "-i", "-n", "-p", "-t", "1"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LvmConfig {
    /// The `lvm` binary. Falls back to a `PATH` lookup when missing.
    pub lvm_path: PathBuf,

    /// Run `lvm` in the host namespaces through `nsenter`, for deployments
    /// inside a container.
    pub containerized: bool,

    pub nsenter_path: PathBuf,
}

impl Default for LvmConfig {
    fn default() -> Self {
        Self {
            lvm_path: PathBuf::from(DEFAULT_LVM_PATH),
            containerized: false,
            nsenter_path: PathBuf::from(DEFAULT_NSENTER_PATH),
        }
    }
}

impl LvmConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading lvm configuration from {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// The binary to execute for `lvm`.
    ///
    /// Inside a container the path refers to the host filesystem and is used
    /// verbatim.
    pub fn resolve_lvm_path(&self) -> PathBuf {
        if self.containerized || self.lvm_path.exists() {
            return self.lvm_path.clone();
        }
        match which::which("lvm") {
            Ok(found) => {
                debug!("{:?} missing, using lvm from PATH at {:?}", self.lvm_path, found);
                found
            }
            Err(_) => self.lvm_path.clone(),
        }
    }
}
