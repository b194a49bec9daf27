// SPDX-License-Identifier: GPL-3.0-only

use std::sync::Arc;

use lvmd_types::{LogicalVolumeInfo, LvAttr};
use tracing::debug;

use super::{Access, byte_size, ensure_sector_multiple, report_group, strings, tag_args};
use crate::command::CommandRunner;
use crate::context::Context;
use crate::error::{LvmError, Result};

/// A logical volume as reported by the last lookup.
///
/// [`remove`](Self::remove) consumes the handle.
pub struct LogicalVolume {
    runner: Arc<dyn CommandRunner>,
    info: LogicalVolumeInfo,
}

impl LogicalVolume {
    pub(super) fn new(runner: Arc<dyn CommandRunner>, info: LogicalVolumeInfo) -> Self {
        Self { runner, info }
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// `vg/lv`
    pub fn full_name(&self) -> &str {
        &self.info.full_name
    }

    pub fn path(&self) -> &str {
        &self.info.device_path
    }

    pub fn size(&self) -> u64 {
        self.info.size
    }

    pub fn vg_name(&self) -> &str {
        &self.info.vg_name
    }

    pub fn pool(&self) -> Option<&str> {
        self.info.pool.as_deref()
    }

    pub fn origin(&self) -> Option<&str> {
        self.info.origin.as_deref()
    }

    pub fn origin_size(&self) -> Option<u64> {
        self.info.origin_size
    }

    pub fn tags(&self) -> &[String] {
        &self.info.tags
    }

    pub fn attr(&self) -> &LvAttr {
        &self.info.attr
    }

    pub fn major(&self) -> Option<u32> {
        self.info.major
    }

    pub fn minor(&self) -> Option<u32> {
        self.info.minor
    }

    pub fn is_thin(&self) -> bool {
        self.info.is_thin()
    }

    pub fn is_cached(&self) -> bool {
        self.info.is_cached()
    }

    pub fn is_snapshot(&self) -> bool {
        self.info.is_snapshot()
    }

    pub fn info(&self) -> &LogicalVolumeInfo {
        &self.info
    }

    /// Grows the volume to `new_size` bytes. Equal sizes are a no-op.
    pub async fn resize(&mut self, ctx: &Context, new_size: u64) -> Result<()> {
        if resize_volume(self.runner.as_ref(), ctx, &self.info, new_size).await? {
            self.info = requery(self.runner.as_ref(), ctx, &self.info).await?;
        }
        Ok(())
    }

    /// Takes a thin snapshot named `name` in the same volume group.
    ///
    /// Only thin volumes can be snapshotted this way; the snapshot is created
    /// without the activation skip flag.
    pub async fn thin_snapshot(
        &self,
        ctx: &Context,
        name: &str,
        tags: &[String],
    ) -> Result<LogicalVolume> {
        if !self.is_thin() {
            return Err(LvmError::NotThin {
                name: self.info.full_name.clone(),
            });
        }

        let mut args = strings(&["lvcreate", "-s", "-k", "n", "-n", name]);
        args.extend(tag_args(tags));
        args.push(self.info.full_name.clone());
        self.runner.run(ctx, &args).await?;
        ctx.in_scope(|| debug!(origin = self.full_name(), snapshot = name, "created thin snapshot"));

        let entry = report_group(self.runner.as_ref(), ctx, self.vg_name()).await?;
        entry
            .volumes
            .into_iter()
            .find(|volume| volume.name == name)
            .map(|info| LogicalVolume::new(self.runner.clone(), info))
            .ok_or_else(|| {
                LvmError::not_found("logical volume", format!("{}/{name}", self.vg_name()))
            })
    }

    /// Activates the volume, or switches it to read-only.
    pub async fn activate(&mut self, ctx: &Context, access: Access) -> Result<()> {
        let target = self.info.full_name.as_str();
        let args = match access {
            Access::ReadWrite => strings(&["lvchange", "-k", "n", "-a", "y", target]),
            Access::ReadOnly => strings(&["lvchange", "-p", "r", target]),
        };
        self.runner.run(ctx, &args).await?;
        self.info = requery(self.runner.as_ref(), ctx, &self.info).await?;
        Ok(())
    }

    /// Removes the volume. The handle is gone afterwards.
    pub async fn remove(self, ctx: &Context) -> Result<()> {
        self.runner
            .run(ctx, &strings(&["lvremove", "-f", self.full_name()]))
            .await?;
        ctx.in_scope(|| debug!(lv = self.full_name(), "removed logical volume"));
        Ok(())
    }
}

impl std::fmt::Debug for LogicalVolume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogicalVolume")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

/// Runs `lvresize` when `new_size` differs from the current size.
///
/// Returns whether anything was executed.
pub(super) async fn resize_volume(
    runner: &dyn CommandRunner,
    ctx: &Context,
    info: &LogicalVolumeInfo,
    new_size: u64,
) -> Result<bool> {
    ensure_sector_multiple(new_size)?;
    if new_size < info.size {
        return Err(LvmError::ShrinkNotSupported {
            name: info.full_name.clone(),
            current: info.size,
            requested: new_size,
        });
    }
    if new_size == info.size {
        return Ok(false);
    }

    let size_arg = byte_size(new_size);
    runner
        .run(
            ctx,
            &strings(&["lvresize", "-L", size_arg.as_str(), info.full_name.as_str()]),
        )
        .await?;
    ctx.in_scope(|| debug!(lv = %info.full_name, from = info.size, to = new_size, "resized"));
    Ok(true)
}

/// Fresh report row of the volume `info` describes.
pub(super) async fn requery(
    runner: &dyn CommandRunner,
    ctx: &Context,
    info: &LogicalVolumeInfo,
) -> Result<LogicalVolumeInfo> {
    report_group(runner, ctx, &info.vg_name)
        .await?
        .volumes
        .into_iter()
        .find(|volume| volume.name == info.name)
        .ok_or_else(|| LvmError::not_found("logical volume", info.full_name.clone()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lvmd_types::{MINIMUM_SECTOR_SIZE, Permissions};
    use serde_json::json;

    use super::*;
    use crate::command::fake::{FakeResponse, FakeRunner};
    use crate::lvm::tests::{GIB, group_report, linear, vg0};
    use crate::report::tests::lv_row;

    async fn volume(runner: &Arc<FakeRunner>, row: serde_json::Value) -> LogicalVolume {
        let name = row["lv_name"].as_str().unwrap_or_default().to_string();
        let vg = vg0(runner, vec![]).await;
        runner.push(group_report(vec![row]));
        vg.find_volume(&Context::new(), &name).await.unwrap()
    }

    #[tokio::test]
    async fn accessors_reflect_report() {
        let runner = Arc::new(FakeRunner::new());
        let mut row = lv_row("vg0", "snap", GIB, "Vwi---tz-k");
        row["origin"] = json!("thin1");
        row["origin_size"] = json!("1073741824");
        row["pool_lv"] = json!("pool0");
        row["lv_tags"] = json!("a,b");
        row["lv_kernel_major"] = json!("-1");
        let lv = volume(&runner, row).await;

        assert_eq!(lv.full_name(), "vg0/snap");
        assert_eq!(lv.path(), "/dev/vg0/snap");
        assert_eq!(lv.vg_name(), "vg0");
        assert_eq!(lv.origin(), Some("thin1"));
        assert_eq!(lv.origin_size(), Some(GIB));
        assert_eq!(lv.pool(), Some("pool0"));
        assert_eq!(lv.tags(), ["a", "b"]);
        assert_eq!(lv.major(), None);
        assert!(lv.is_thin());
        assert!(lv.is_snapshot());
        assert!(lv.attr().skip_activation);
    }

    #[tokio::test]
    async fn resize_grows_and_requeries() {
        let runner = Arc::new(FakeRunner::new());
        let mut lv = volume(&runner, linear("lv0", GIB)).await;
        runner.push(FakeResponse::ok(Vec::new()));
        runner.push(group_report(vec![linear("lv0", 2 * GIB)]));

        lv.resize(&Context::new(), 2 * GIB).await.unwrap();
        assert_eq!(lv.size(), 2 * GIB);
        assert_eq!(
            runner.invocations()[2],
            ["lvresize", "-L", "2147483648b", "vg0/lv0"]
        );
    }

    #[tokio::test]
    async fn resize_validates_before_running() {
        let runner = Arc::new(FakeRunner::new());
        let mut lv = volume(&runner, linear("lv0", GIB)).await;
        let ctx = Context::new();

        let err = lv.resize(&ctx, GIB + 1).await.unwrap_err();
        assert!(matches!(err, LvmError::NotMultipleOfSectorSize { .. }));

        let err = lv.resize(&ctx, GIB - MINIMUM_SECTOR_SIZE).await.unwrap_err();
        assert!(matches!(
            err,
            LvmError::ShrinkNotSupported { current, .. } if current == GIB
        ));

        lv.resize(&ctx, GIB).await.unwrap();
        assert_eq!(runner.invocations().len(), 2);
    }

    #[tokio::test]
    async fn thin_snapshot_of_thin_volume() {
        let runner = Arc::new(FakeRunner::new());
        let mut thin = lv_row("vg0", "thin1", GIB, "Vwi-a-tz--");
        thin["pool_lv"] = json!("pool0");
        let lv = volume(&runner, thin).await;

        let mut snap = lv_row("vg0", "snap1", GIB, "Vwi---tz--");
        snap["origin"] = json!("thin1");
        runner.push(FakeResponse::ok(Vec::new()));
        runner.push(group_report(vec![snap]));

        let snapshot = lv
            .thin_snapshot(&Context::new(), "snap1", &["backup".to_string()])
            .await
            .unwrap();
        assert_eq!(snapshot.origin(), Some("thin1"));
        assert_eq!(
            runner.invocations()[2],
            ["lvcreate", "-s", "-k", "n", "-n", "snap1", "--addtag", "backup", "vg0/thin1"]
        );
    }

    #[tokio::test]
    async fn thin_snapshot_requires_thin_volume() {
        let runner = Arc::new(FakeRunner::new());
        let lv = volume(&runner, linear("lv0", GIB)).await;
        let err = lv
            .thin_snapshot(&Context::new(), "snap", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, LvmError::NotThin { .. }));
        assert_eq!(runner.invocations().len(), 2);
    }

    #[tokio::test]
    async fn activate_read_only_switches_permission() {
        let runner = Arc::new(FakeRunner::new());
        let mut lv = volume(&runner, linear("lv0", GIB)).await;
        runner.push(FakeResponse::ok(Vec::new()));
        runner.push(group_report(vec![lv_row("vg0", "lv0", GIB, "-ri-a-----")]));

        lv.activate(&Context::new(), Access::ReadOnly).await.unwrap();
        assert_eq!(lv.attr().permissions, Permissions::ReadOnly);
        assert_eq!(runner.invocations()[2], ["lvchange", "-p", "r", "vg0/lv0"]);

        runner.push(FakeResponse::ok(Vec::new()));
        runner.push(group_report(vec![linear("lv0", GIB)]));
        lv.activate(&Context::new(), Access::ReadWrite).await.unwrap();
        assert!(lv.attr().is_active());
        assert_eq!(
            runner.invocations()[4],
            ["lvchange", "-k", "n", "-a", "y", "vg0/lv0"]
        );
    }

    #[tokio::test]
    async fn remove_consumes_handle() {
        let runner = Arc::new(FakeRunner::new());
        let lv = volume(&runner, linear("lv0", GIB)).await;
        runner.push(FakeResponse::ok(Vec::new()));
        lv.remove(&Context::new()).await.unwrap();
        assert_eq!(runner.invocations()[2], ["lvremove", "-f", "vg0/lv0"]);
    }

    #[tokio::test]
    async fn failed_command_keeps_structured_error() {
        let runner = Arc::new(FakeRunner::new());
        let mut lv = volume(&runner, linear("lv0", GIB)).await;
        runner.push(FakeResponse::fail(
            5,
            "  Insufficient free space: 256 extents needed, but only 10 available",
        ));
        let err = lv.resize(&Context::new(), 2 * GIB).await.unwrap_err();
        assert!(!err.is_not_found());
        let command = err.as_command_error().unwrap();
        assert_eq!(command.exit_code(), 5);
        assert!(command.stderr().trim_start().starts_with("Insufficient free space"));
        assert_eq!(lv.size(), GIB);
    }
}
