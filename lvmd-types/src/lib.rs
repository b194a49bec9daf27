// SPDX-License-Identifier: GPL-3.0-only

//! Canonical LVM domain models for lvmd
//!
//! This crate holds the plain data the volume layer hands to its callers:
//!
//! - `VolumeGroupInfo` / `LogicalVolumeInfo` → one row of an `lvm` report
//! - `LvAttr` → the decoded ten-character `lv_attr` flag string
//! - `MINIMUM_SECTOR_SIZE` → the size multiple every volume request must honor
//!
//! Nothing here spawns processes; `lvmd-sys` produces these values.

pub mod attr;
pub mod lvm;

pub use attr::{
    AllocationPolicy, AttrError, LvAttr, OpenState, Permissions, TargetType, VolumeClass,
    VolumeHealth, VolumeState, VolumeType,
};
pub use lvm::{
    LogicalVolumeInfo, MINIMUM_SECTOR_SIZE, ThinPoolUsage, VolumeGroupInfo, is_sector_multiple,
};
