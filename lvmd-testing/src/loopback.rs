use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::cmd::run;
use crate::errors::{Result, TestingError};

/// Size of each sparse backing file.
pub const BACKING_FILE_SIZE: u64 = 4 << 30;

/// A sparse file attached to a loop device. Detached and deleted on drop.
#[derive(Debug)]
pub struct LoopbackDevice {
    file: PathBuf,
    device: String,
}

impl LoopbackDevice {
    pub fn new(file: &Path, size: u64) -> Result<Self> {
        let backing_error = |error: std::io::Error| TestingError::BackingFile {
            path: file.to_path_buf(),
            reason: error.to_string(),
        };
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).map_err(backing_error)?;
        }
        File::create(file)
            .and_then(|handle| handle.set_len(size))
            .map_err(backing_error)?;

        let path = file.to_string_lossy();
        let outcome = match run("losetup", &["--find", "--show", path.as_ref()]) {
            Ok(outcome) => outcome,
            Err(error) => {
                if let Err(cleanup) = fs::remove_file(file) {
                    warn!("failed to remove {file:?}: {cleanup}");
                }
                return Err(error);
            }
        };
        Ok(Self {
            file: file.to_path_buf(),
            device: outcome.stdout.trim().to_string(),
        })
    }

    /// `/dev/loopN`
    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn file(&self) -> &Path {
        &self.file
    }
}

impl Drop for LoopbackDevice {
    fn drop(&mut self) {
        if let Err(error) = run("losetup", &["-d", self.device.as_str()]) {
            warn!("failed to detach {}: {error}", self.device);
        }
        if let Err(error) = fs::remove_file(&self.file) {
            warn!("failed to remove {:?}: {error}", self.file);
        }
    }
}

/// A volume group over freshly created loop devices.
///
/// Dropping it removes the group with everything in it, wipes the physical
/// volumes and detaches the devices.
#[derive(Debug)]
pub struct LoopbackVolumeGroup {
    name: String,
    devices: Vec<LoopbackDevice>,
}

impl LoopbackVolumeGroup {
    /// Creates volume group `name` over `pv_count` loop devices.
    pub fn new(name: &str, pv_count: usize) -> Result<Self> {
        let dir = std::env::temp_dir().join("lvmd-testing").join(name);
        let devices = (0..pv_count)
            .map(|index| LoopbackDevice::new(&dir.join(format!("{name}{index}")), BACKING_FILE_SIZE))
            .collect::<Result<Vec<_>>>()?;
        let paths: Vec<&str> = devices.iter().map(LoopbackDevice::device).collect();

        for &path in &paths {
            run("pvcreate", &["-y", path])?;
        }
        let mut args = vec![name];
        args.extend(paths.iter().copied());
        if let Err(error) = run("vgcreate", &args) {
            Self::wipe(&paths);
            return Err(error);
        }

        Ok(Self {
            name: name.to_string(),
            devices,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn devices(&self) -> &[LoopbackDevice] {
        &self.devices
    }

    fn wipe(paths: &[&str]) {
        for &path in paths {
            if let Err(error) = run("pvremove", &["-f", "-y", path]) {
                warn!("failed to wipe {path}: {error}");
            }
        }
    }
}

impl Drop for LoopbackVolumeGroup {
    fn drop(&mut self) {
        // udev may still hold freshly removed volumes open for a moment.
        let started = Instant::now();
        while let Err(error) = run("vgremove", &["-f", "-y", self.name.as_str()]) {
            if started.elapsed() > Duration::from_secs(2) {
                warn!("failed to remove volume group {}: {error}", self.name);
                break;
            }
            sleep(Duration::from_millis(150));
        }
        let paths: Vec<&str> = self.devices.iter().map(LoopbackDevice::device).collect();
        Self::wipe(&paths);
    }
}
