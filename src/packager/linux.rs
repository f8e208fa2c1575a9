//! Linux packaging strategy: rename to `<dataName>` plus the version
//! marker. No signing step.

use crate::error::Result;
use crate::external::CompileSpec;

use super::{
    Artifact, ArtifactRole, BuildTarget, PackageContext, build_err, fs, write_version_marker,
};

pub(super) async fn package(
    ctx: &PackageContext<'_>,
    artifacts: &mut Vec<Artifact>,
) -> Result<()> {
    let target = BuildTarget::Linux;
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

    let binary = lane_dir.join(&ctx.config.data_name);
    fs::copy_file(&compiled, &binary).await?;

    // The copy does not carry the execute bit on all filesystems.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = tokio::fs::metadata(&binary).await?.permissions();
        perms.set_mode(0o755);
        tokio::fs::set_permissions(&binary, perms).await?;
    }

    log::info!("packaged {}", binary.display());
    artifacts.push(Artifact::new(target, binary, ArtifactRole::Binary));

    artifacts.push(write_version_marker(target, &lane_dir, ctx.config).await?);
    Ok(())
}
