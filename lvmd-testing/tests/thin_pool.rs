//! Thin provisioning on a loopback-backed volume group.
//!
//! Needs root and `LVMD_TESTING_ENABLE_DESTRUCTIVE=1`.

use lvmd_sys::{Access, Context, CreateOptions, Lvm, LvmConfig, LvmError};
use lvmd_testing::loopback::LoopbackVolumeGroup;
use lvmd_testing::support::{ensure, failure, require_destructive, run_test};

const GIB: u64 = 1 << 30;

#[tokio::test]
async fn pool_volume_snapshot_roundtrip() {
    run_test("thin_pool.pool_volume_snapshot_roundtrip", async {
        require_destructive("thin_pool.pool_volume_snapshot_roundtrip")?;
        let fixture = LoopbackVolumeGroup::new("lvmd_testing_thin", 1)?;
        let ctx = Context::new();
        let vg = Lvm::from_config(&LvmConfig::default())
            .find_volume_group(&ctx, fixture.name())
            .await?;

        let mut pool = vg.create_pool(&ctx, "pool0", GIB).await?;
        ensure(pool.size() == GIB, format!("pool size {}", pool.size()))?;

        let options = CreateOptions::default().with_tags(["thin"]);
        let thin = pool.create_volume(&ctx, "thin1", 2 * GIB, &options).await?;
        ensure(thin.is_thin(), "thin volume not classified as thin")?;
        ensure(thin.pool() == Some("pool0"), format!("pool {:?}", thin.pool()))?;

        let usage = pool.usage(&ctx).await?;
        ensure(
            usage.virtual_bytes == 2 * GIB,
            format!("virtual bytes {}", usage.virtual_bytes),
        )?;
        ensure(usage.overprovision_ratio() > 1.0, "pool should be overprovisioned")?;

        let mut snapshot = thin.thin_snapshot(&ctx, "snap1", &[]).await?;
        ensure(snapshot.origin() == Some("thin1"), format!("origin {:?}", snapshot.origin()))?;
        snapshot.activate(&ctx, Access::ReadWrite).await?;
        ensure(snapshot.attr().is_active(), "snapshot should be active")?;

        let names: Vec<String> = pool
            .list_volumes(&ctx)
            .await?
            .iter()
            .map(|lv| lv.name().to_string())
            .collect();
        ensure(names.len() == 2, format!("thin volumes {names:?}"))?;

        pool.resize(&ctx, 2 * GIB).await?;
        ensure(pool.size() == 2 * GIB, format!("pool size {}", pool.size()))?;

        snapshot.remove(&ctx).await?;
        pool.remove_volume(&ctx, "thin1").await?;
        match pool.remove_volume(&ctx, "thin1").await {
            Err(err) if err.is_not_found() => {}
            other => return failure(format!("expected not found, got {other:?}")),
        }

        let linear = vg
            .create_volume(&ctx, "plain", GIB / 4, &CreateOptions::default())
            .await?;
        match linear.thin_snapshot(&ctx, "snap2", &[]).await {
            Err(LvmError::NotThin { .. }) => Ok(()),
            other => failure(format!("snapshot of a linear volume, got {other:?}")),
        }
    })
    .await;
}
