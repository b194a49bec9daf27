// SPDX-License-Identifier: GPL-3.0-only

//! LVM (Logical Volume Manager) types
//!
//! Snapshots of volume group and logical volume metadata as reported by
//! `lvm fullreport`. Values are never cached across calls; each query
//! produces fresh instances.

use serde::{Deserialize, Serialize};

use crate::attr::LvAttr;

/// Every size handed to `lvcreate` or `lvresize` must be a multiple of this
/// many bytes.
pub const MINIMUM_SECTOR_SIZE: u64 = 4096;

/// Whether `size` is a non-zero multiple of [`MINIMUM_SECTOR_SIZE`].
pub fn is_sector_multiple(size: u64) -> bool {
    size != 0 && size % MINIMUM_SECTOR_SIZE == 0
}

/// Volume group information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeGroupInfo {
    /// Volume group name
    pub name: String,

    /// Volume group UUID
    pub uuid: String,

    /// Total size in bytes
    pub size: u64,

    /// Free space in bytes
    pub free: u64,
}

impl VolumeGroupInfo {
    /// Get used space in bytes
    pub fn used(&self) -> u64 {
        self.size.saturating_sub(self.free)
    }

    /// Get usage percentage (0-100)
    pub fn usage_percent(&self) -> u32 {
        if self.size == 0 {
            0
        } else {
            ((self.used() as f64 / self.size as f64) * 100.0) as u32
        }
    }
}

/// Logical volume information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicalVolumeInfo {
    /// Logical volume name
    pub name: String,

    /// `vg/lv`
    pub full_name: String,

    /// Parent volume group name
    pub vg_name: String,

    /// Logical volume UUID
    pub uuid: String,

    /// Size in bytes
    pub size: u64,

    /// Device path (e.g., "/dev/vg0/lv0"); empty for hidden sub-volumes
    pub device_path: String,

    /// Decoded `lv_attr`
    pub attr: LvAttr,

    /// Thin pool, or cache volume for cached volumes
    pub pool: Option<String>,

    /// Origin volume for snapshots
    pub origin: Option<String>,

    pub origin_size: Option<u64>,

    pub tags: Vec<String>,

    /// Kernel device numbers, `None` while inactive
    pub major: Option<u32>,
    pub minor: Option<u32>,

    /// Thin pool data / metadata usage in percent
    pub data_percent: Option<f64>,
    pub metadata_percent: Option<f64>,
}

impl LogicalVolumeInfo {
    /// Get a display name for this logical volume
    pub fn display_name(&self) -> String {
        // Prefer short form: vg/lv
        if !self.vg_name.is_empty() && !self.name.is_empty() {
            format!("{}/{}", self.vg_name, self.name)
        } else if let Some(stripped) = self.device_path.strip_prefix("/dev/") {
            stripped.to_string()
        } else {
            self.device_path.clone()
        }
    }

    pub fn is_thin(&self) -> bool {
        self.attr.is_thin()
    }

    pub fn is_thin_pool(&self) -> bool {
        self.attr.is_thin_pool()
    }

    pub fn is_cached(&self) -> bool {
        self.attr.is_cached()
    }

    /// Thick or thin snapshot of another volume.
    pub fn is_snapshot(&self) -> bool {
        self.origin.is_some()
    }

    /// Hidden sub-volumes (`[lvol0_pmspare]`, `[pool_tdata]`, ...).
    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('[')
    }
}

/// Space accounting of a thin pool.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThinPoolUsage {
    /// Pool size in bytes
    pub size: u64,

    pub data_percent: f64,

    pub metadata_percent: f64,

    /// Sum of the virtual sizes of all thin volumes in the pool
    pub virtual_bytes: u64,
}

impl ThinPoolUsage {
    /// Bytes of the pool's data area currently written.
    pub fn used_bytes(&self) -> u64 {
        ((self.data_percent / 100.0) * self.size as f64) as u64
    }

    /// Virtual over physical size; above 1.0 the pool is over-provisioned.
    pub fn overprovision_ratio(&self) -> f64 {
        if self.size == 0 {
            0.0
        } else {
            self.virtual_bytes as f64 / self.size as f64
        }
    }
}
