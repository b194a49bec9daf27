// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use lvmd_types::{LogicalVolumeInfo, VolumeGroupInfo};
use tracing::debug;

use super::{
    CreateOptions, LogicalVolume, ThinPool, byte_size, ensure_sector_multiple, report_group,
    strings, tag_args,
};
use crate::command::CommandRunner;
use crate::context::Context;
use crate::error::{LvmError, Result};

/// A volume group as reported by the last lookup.
#[derive(Clone)]
pub struct VolumeGroup {
    runner: Arc<dyn CommandRunner>,
    info: VolumeGroupInfo,
}

impl VolumeGroup {
    pub(super) fn new(runner: Arc<dyn CommandRunner>, info: VolumeGroupInfo) -> Self {
        Self { runner, info }
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn uuid(&self) -> &str {
        &self.info.uuid
    }

    /// Capacity in bytes.
    pub fn size(&self) -> u64 {
        self.info.size
    }

    /// Unallocated bytes at lookup time.
    pub fn free(&self) -> u64 {
        self.info.free
    }

    pub fn info(&self) -> &VolumeGroupInfo {
        &self.info
    }

    /// Current logical volumes of the group, omitting hidden sub-volumes.
    pub(super) async fn volumes(&self, ctx: &Context) -> Result<Vec<LogicalVolumeInfo>> {
        let entry = report_group(self.runner.as_ref(), ctx, self.name()).await?;
        Ok(entry
            .volumes
            .into_iter()
            .filter(|volume| !volume.is_hidden())
            .collect())
    }

    pub(super) async fn lookup(&self, ctx: &Context, name: &str) -> Result<LogicalVolumeInfo> {
        self.volumes(ctx)
            .await?
            .into_iter()
            .find(|volume| volume.name == name)
            .ok_or_else(|| {
                LvmError::not_found("logical volume", format!("{}/{name}", self.name()))
            })
    }

    pub async fn find_volume(&self, ctx: &Context, name: &str) -> Result<LogicalVolume> {
        let info = self.lookup(ctx, name).await?;
        Ok(LogicalVolume::new(self.runner.clone(), info))
    }

    pub async fn list_volumes(&self, ctx: &Context) -> Result<Vec<LogicalVolume>> {
        Ok(self
            .volumes(ctx)
            .await?
            .into_iter()
            .map(|info| LogicalVolume::new(self.runner.clone(), info))
            .collect())
    }

    /// Creates a fully allocated volume of `size` bytes.
    ///
    /// `size` must be a non-zero multiple of
    /// [`MINIMUM_SECTOR_SIZE`](lvmd_types::MINIMUM_SECTOR_SIZE); otherwise
    /// nothing is executed.
    pub async fn create_volume(
        &self,
        ctx: &Context,
        name: &str,
        size: u64,
        options: &CreateOptions,
    ) -> Result<LogicalVolume> {
        ensure_sector_multiple(size)?;

        let size_arg = byte_size(size);
        let mut args = strings(&["lvcreate", "-n", name, "-L", size_arg.as_str(), "-W", "y", "-y"]);
        args.extend(tag_args(&options.tags));
        args.extend(options.stripe_args());
        args.extend(options.extra_args.iter().cloned());
        args.push(self.name().to_string());

        self.runner.run(ctx, &args).await?;
        ctx.in_scope(|| debug!(vg = self.name(), lv = name, size, "created logical volume"));
        self.find_volume(ctx, name).await
    }

    /// Removes `name` from the group. A volume that is already gone fails
    /// with a not-found error.
    pub async fn remove_volume(&self, ctx: &Context, name: &str) -> Result<()> {
        let target = format!("{}/{name}", self.name());
        self.runner
            .run(ctx, &strings(&["lvremove", "-f", target.as_str()]))
            .await?;
        ctx.in_scope(|| debug!(lv = %target, "removed logical volume"));
        Ok(())
    }

    /// Creates a thin pool of `size` bytes.
    pub async fn create_pool(&self, ctx: &Context, name: &str, size: u64) -> Result<ThinPool> {
        ensure_sector_multiple(size)?;

        let target = format!("{}/{name}", self.name());
        let size_arg = byte_size(size);
        let args = strings(&[
            "lvcreate",
            "-T",
            target.as_str(),
            "-L",
            size_arg.as_str(),
            "-W",
            "y",
            "-y",
        ]);
        self.runner.run(ctx, &args).await?;
        ctx.in_scope(|| debug!(pool = %target, size, "created thin pool"));
        self.find_pool(ctx, name).await
    }

    pub async fn find_pool(&self, ctx: &Context, name: &str) -> Result<ThinPool> {
        let info = self.lookup(ctx, name).await?;
        if !info.is_thin_pool() {
            return Err(LvmError::not_found("thin pool", info.full_name));
        }
        Ok(ThinPool::new(self.clone(), info))
    }

    pub async fn list_pools(&self, ctx: &Context) -> Result<Vec<ThinPool>> {
        Ok(self
            .volumes(ctx)
            .await?
            .into_iter()
            .filter(LogicalVolumeInfo::is_thin_pool)
            .map(|info| ThinPool::new(self.clone(), info))
            .collect())
    }

    pub(super) fn runner(&self) -> &Arc<dyn CommandRunner> {
        &self.runner
    }
}

impl std::fmt::Debug for VolumeGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VolumeGroup")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}
