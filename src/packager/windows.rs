//! Windows packaging strategy: rename to `<displayName>.exe` plus the
//! version marker. No signing step.

use crate::error::Result;
use crate::external::CompileSpec;

use super::{
    Artifact, ArtifactRole, BuildTarget, PackageContext, build_err, fs, write_version_marker,
};

pub(super) async fn package(
    ctx: &PackageContext<'_>,
    artifacts: &mut Vec<Artifact>,
) -> Result<()> {
    let target = BuildTarget::Windows;
    let lane_dir = ctx.lane_dir(target).await?;

    let spec = CompileSpec {
        target,
        arch: None,
        bundled: false,
        deployment_target: None,
    };
    let compiled = ctx
        .toolchain
        .compile(&spec, ctx.config)
        .await
        .map_err(|e| build_err(target, e))?;

    let exe = lane_dir.join(format!("{}.exe", ctx.config.display_name));
    fs::copy_file(&compiled, &exe).await?;
    log::info!("packaged {}", exe.display());
    artifacts.push(Artifact::new(target, exe, ArtifactRole::Binary));

    artifacts.push(write_version_marker(target, &lane_dir, ctx.config).await?);
    Ok(())
}
