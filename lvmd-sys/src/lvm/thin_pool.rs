// SPDX-License-Identifier: GPL-3.0-only

use lvmd_types::{LogicalVolumeInfo, ThinPoolUsage};
use tracing::debug;

use super::logical_volume::{requery, resize_volume};
use super::{
    CreateOptions, LogicalVolume, VolumeGroup, byte_size, ensure_sector_multiple, strings,
    tag_args,
};
use crate::context::Context;
use crate::error::{LvmError, Result};

/// A thin pool inside a [`VolumeGroup`].
#[derive(Debug, Clone)]
pub struct ThinPool {
    vg: VolumeGroup,
    info: LogicalVolumeInfo,
}

impl ThinPool {
    pub(super) fn new(vg: VolumeGroup, info: LogicalVolumeInfo) -> Self {
        Self { vg, info }
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Size of the pool's data area in bytes.
    pub fn size(&self) -> u64 {
        self.info.size
    }

    pub fn info(&self) -> &LogicalVolumeInfo {
        &self.info
    }

    pub fn volume_group(&self) -> &VolumeGroup {
        &self.vg
    }

    async fn thin_volumes(&self, ctx: &Context) -> Result<Vec<LogicalVolumeInfo>> {
        Ok(self
            .vg
            .volumes(ctx)
            .await?
            .into_iter()
            .filter(|volume| volume.is_thin() && volume.pool.as_deref() == Some(self.name()))
            .collect())
    }

    /// Current fill levels and the virtual size handed out to thin volumes.
    ///
    /// An inactive pool reports no percentages; they read as zero.
    pub async fn usage(&self, ctx: &Context) -> Result<ThinPoolUsage> {
        let volumes = self.vg.volumes(ctx).await?;
        let pool = volumes
            .iter()
            .find(|volume| volume.name == self.info.name && volume.is_thin_pool())
            .ok_or_else(|| LvmError::not_found("thin pool", self.info.full_name.clone()))?;
        let virtual_bytes = volumes
            .iter()
            .filter(|volume| volume.is_thin() && volume.pool.as_deref() == Some(self.name()))
            .map(|volume| volume.size)
            .sum();

        Ok(ThinPoolUsage {
            size: pool.size,
            data_percent: pool.data_percent.unwrap_or(0.0),
            metadata_percent: pool.metadata_percent.unwrap_or(0.0),
            virtual_bytes,
        })
    }

    /// Creates a thin volume with `virtual_size` bytes of address space.
    ///
    /// Striping options are ignored; a thin volume inherits the pool's
    /// layout.
    pub async fn create_volume(
        &self,
        ctx: &Context,
        name: &str,
        virtual_size: u64,
        options: &CreateOptions,
    ) -> Result<LogicalVolume> {
        ensure_sector_multiple(virtual_size)?;

        let pool = self.info.full_name.as_str();
        let size_arg = byte_size(virtual_size);
        let mut args = strings(&[
            "lvcreate",
            "-T",
            pool,
            "-n",
            name,
            "-V",
            size_arg.as_str(),
            "-W",
            "y",
            "-y",
        ]);
        args.extend(tag_args(&options.tags));
        args.extend(options.extra_args.iter().cloned());

        self.vg.runner().run(ctx, &args).await?;
        ctx.in_scope(|| debug!(pool, lv = name, virtual_size, "created thin volume"));
        self.find_volume(ctx, name).await
    }

    /// Finds the thin volume `name` carved from this pool.
    pub async fn find_volume(&self, ctx: &Context, name: &str) -> Result<LogicalVolume> {
        self.thin_volumes(ctx)
            .await?
            .into_iter()
            .find(|volume| volume.name == name)
            .map(|info| LogicalVolume::new(self.vg.runner().clone(), info))
            .ok_or_else(|| {
                LvmError::not_found(
                    "thin volume",
                    format!("{}/{name} in pool {}", self.vg.name(), self.name()),
                )
            })
    }

    pub async fn list_volumes(&self, ctx: &Context) -> Result<Vec<LogicalVolume>> {
        Ok(self
            .thin_volumes(ctx)
            .await?
            .into_iter()
            .map(|info| LogicalVolume::new(self.vg.runner().clone(), info))
            .collect())
    }

    /// Removes the thin volume `name` of this pool.
    pub async fn remove_volume(&self, ctx: &Context, name: &str) -> Result<()> {
        self.find_volume(ctx, name).await?.remove(ctx).await
    }

    /// Grows the pool's data area to `size` bytes.
    pub async fn resize(&mut self, ctx: &Context, size: u64) -> Result<()> {
        let runner = self.vg.runner().clone();
        if resize_volume(runner.as_ref(), ctx, &self.info, size).await? {
            self.info = requery(runner.as_ref(), ctx, &self.info).await?;
        }
        Ok(())
    }
}
