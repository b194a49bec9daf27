// SPDX-License-Identifier: GPL-3.0-only

//! Volume groups, logical volumes and thin pools.
//!
//! Handles are snapshots: every lookup runs a fresh `fullreport`, and every
//! operation that changes state re-reads what it returns. Nothing is cached
//! or locked here; concurrent mutations are serialized by `lvm` itself.

mod logical_volume;
mod thin_pool;
mod volume_group;

use std::sync::Arc;

use lvmd_types::is_sector_multiple;

use crate::command::{CommandRunner, LvmCommand, Verbosity, collect};
use crate::config::LvmConfig;
use crate::context::Context;
use crate::error::{LvmError, Result};
use crate::report::{self, ReportEntry};

pub use logical_volume::LogicalVolume;
pub use thin_pool::ThinPool;
pub use volume_group::VolumeGroup;

/// Entry point of the volume layer.
#[derive(Clone)]
pub struct Lvm {
    runner: Arc<dyn CommandRunner>,
}

impl Lvm {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Runs the `lvm` binary described by `config`.
    pub fn from_config(config: &LvmConfig) -> Self {
        Self::new(Arc::new(LvmCommand::new(config)))
    }

    pub fn runner(&self) -> &Arc<dyn CommandRunner> {
        &self.runner
    }

    /// Looks up the volume group `name`.
    ///
    /// Fails with a not-found error both when `lvm` reports the group as
    /// missing and when the report comes back without a matching row.
    pub async fn find_volume_group(&self, ctx: &Context, name: &str) -> Result<VolumeGroup> {
        let entry = report_group(self.runner.as_ref(), ctx, name).await?;
        Ok(VolumeGroup::new(self.runner.clone(), entry.volume_group))
    }

    pub async fn list_volume_groups(&self, ctx: &Context) -> Result<Vec<VolumeGroup>> {
        let entries = report_all(self.runner.as_ref(), ctx, None).await?;
        Ok(entries
            .into_iter()
            .map(|entry| VolumeGroup::new(self.runner.clone(), entry.volume_group))
            .collect())
    }
}

impl std::fmt::Debug for Lvm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lvm").finish_non_exhaustive()
    }
}

/// Options of a volume creation beyond name and size.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateOptions {
    /// Applied with one `--addtag` each.
    pub tags: Vec<String>,

    /// Number of stripes; 0 leaves striping to `lvm`'s default.
    pub stripes: u32,

    /// Passed to `-I` verbatim, e.g. `4k` or `4M`. Only used with `stripes`.
    pub stripe_size: Option<String>,

    /// Appended to `lvcreate` as given, for features such as
    /// `--type writecache`.
    pub extra_args: Vec<String>,
}

impl CreateOptions {
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_stripes(mut self, stripes: u32, stripe_size: Option<&str>) -> Self {
        self.stripes = stripes;
        self.stripe_size = stripe_size.map(str::to_string);
        self
    }

    pub fn with_extra_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args = args.into_iter().map(Into::into).collect();
        self
    }

    fn stripe_args(&self) -> Vec<String> {
        if self.stripes == 0 {
            return Vec::new();
        }
        let mut args = vec!["-i".to_string(), self.stripes.to_string()];
        if let Some(size) = self.stripe_size.as_deref().filter(|size| !size.is_empty()) {
            args.extend(["-I".to_string(), size.to_string()]);
        }
        args
    }
}

/// How [`LogicalVolume::activate`] exposes the volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadWrite,
    ReadOnly,
}

pub(crate) fn ensure_sector_multiple(size: u64) -> Result<()> {
    if is_sector_multiple(size) {
        Ok(())
    } else {
        Err(LvmError::NotMultipleOfSectorSize { size })
    }
}

/// Size argument in bytes, as accepted by `-L` and `-V`.
fn byte_size(size: u64) -> String {
    format!("{size}b")
}

fn tag_args(tags: &[String]) -> Vec<String> {
    tags.iter()
        .flat_map(|tag| ["--addtag".to_string(), tag.clone()])
        .collect()
}

async fn report_all(
    runner: &dyn CommandRunner,
    ctx: &Context,
    scope: Option<&str>,
) -> Result<Vec<ReportEntry>> {
    let stream = runner.spawn(ctx, Verbosity::ReadOnly, &report::fullreport_args(scope))?;
    let output = collect(ctx, stream).await?;
    Ok(report::parse(&output)?)
}

async fn report_group(runner: &dyn CommandRunner, ctx: &Context, name: &str) -> Result<ReportEntry> {
    report_all(runner, ctx, Some(name))
        .await?
        .into_iter()
        .find(|entry| entry.volume_group.name == name)
        .ok_or_else(|| LvmError::not_found("volume group", name))
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|arg| arg.to_string()).collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use serde_json::Value;

    use super::*;
    use crate::command::fake::{FakeResponse, FakeRunner};
    use crate::report::tests::{document, lv_row, vg_row};

    pub(crate) const GIB: u64 = 1 << 30;

    pub(crate) fn lvm(runner: &Arc<FakeRunner>) -> Lvm {
        Lvm::new(runner.clone())
    }

    pub(crate) fn group_report(lvs: Vec<Value>) -> FakeResponse {
        FakeResponse::ok(document(vec![(vg_row("vg0", 10 * GIB, 6 * GIB), lvs)]))
    }

    pub(crate) fn linear(name: &str, size: u64) -> Value {
        lv_row("vg0", name, size, "-wi-a-----")
    }

    pub(crate) async fn vg0(runner: &Arc<FakeRunner>, lvs: Vec<Value>) -> VolumeGroup {
        runner.push(group_report(lvs));
        lvm(runner)
            .find_volume_group(&Context::new(), "vg0")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn find_volume_group_queries_scoped_report() {
        let runner = Arc::new(FakeRunner::new());
        let vg = vg0(&runner, vec![]).await;
        assert_eq!(vg.name(), "vg0");
        assert_eq!(vg.size(), 10 * GIB);
        assert_eq!(vg.free(), 6 * GIB);

        let invocations = runner.invocations();
        assert_eq!(invocations.len(), 1);
        assert_eq!(invocations[0][0], "fullreport");
        assert_eq!(invocations[0].last().map(String::as_str), Some("vg0"));
    }

    #[tokio::test]
    async fn missing_group_is_not_found() {
        let runner = Arc::new(FakeRunner::new());
        runner.push(FakeResponse::fail(5, "  Volume group \"nope\" not found\n"));
        let err = lvm(&runner)
            .find_volume_group(&Context::new(), "nope")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.as_command_error().map(|e| e.exit_code()), Some(5));
    }

    #[tokio::test]
    async fn empty_report_is_not_found() {
        let runner = Arc::new(FakeRunner::new());
        runner.push(FakeResponse::ok(br#"{"report": []}"#.to_vec()));
        let err = lvm(&runner)
            .find_volume_group(&Context::new(), "vg0")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(err.as_command_error().is_none());
    }

    #[tokio::test]
    async fn unknown_subcommand_style_failure_is_not_not_found() {
        let runner = Arc::new(FakeRunner::new());
        runner.push(FakeResponse::fail(3, "No such command 'fullreport'.  Try 'help'."));
        let err = lvm(&runner)
            .find_volume_group(&Context::new(), "vg0")
            .await
            .unwrap_err();
        assert!(!err.is_not_found());
    }

    #[tokio::test]
    async fn malformed_report_is_a_parse_error() {
        let runner = Arc::new(FakeRunner::new());
        runner.push(FakeResponse::ok(b"  vg0  1 0 wz--n- 10g 6g\n".to_vec()));
        let err = lvm(&runner)
            .find_volume_group(&Context::new(), "vg0")
            .await
            .unwrap_err();
        assert!(matches!(err, LvmError::Report(_)));
    }

    #[tokio::test]
    async fn lists_every_group() {
        let runner = Arc::new(FakeRunner::new());
        runner.push(FakeResponse::ok(document(vec![
            (vg_row("vg0", GIB, GIB), vec![]),
            (vg_row("vg1", 2 * GIB, GIB), vec![]),
        ])));
        let groups = lvm(&runner)
            .list_volume_groups(&Context::new())
            .await
            .unwrap();
        let names: Vec<_> = groups.iter().map(VolumeGroup::name).collect();
        assert_eq!(names, ["vg0", "vg1"]);
        assert_ne!(runner.invocations()[0].last().map(String::as_str), Some("vg0"));
    }

    #[tokio::test]
    async fn cancelled_context_runs_nothing() {
        let runner = Arc::new(FakeRunner::new());
        let ctx = Context::new();
        ctx.cancellation().cancel();
        let err = lvm(&runner).find_volume_group(&ctx, "vg0").await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(runner.invocations().is_empty());
    }

    #[test]
    fn stripe_args_need_a_stripe_count() {
        let options = CreateOptions::default().with_stripes(0, Some("4k"));
        assert!(options.stripe_args().is_empty());

        let options = CreateOptions::default().with_stripes(2, Some(""));
        assert_eq!(options.stripe_args(), ["-i", "2"]);

        let options = CreateOptions::default().with_stripes(2, Some("4M"));
        assert_eq!(options.stripe_args(), ["-i", "2", "-I", "4M"]);
    }

    #[test]
    fn sector_multiples() {
        assert!(ensure_sector_multiple(4096).is_ok());
        assert!(ensure_sector_multiple(GIB).is_ok());
        for size in [0, 1, 4095, 4097, 4096 + 512] {
            assert!(matches!(
                ensure_sector_multiple(size),
                Err(LvmError::NotMultipleOfSectorSize { size: s }) if s == size
            ));
        }
    }
}
