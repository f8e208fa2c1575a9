//! macOS packaging strategy.
//!
//! The longest lane: icon generation, dual-architecture build, Info.plist
//! patching, universal-binary merge, ad-hoc signing, DMG creation (the
//! one retried step), and the fixed-name update archive.

use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result, ToolError};
use crate::external::{CompileSpec, ToolInvocation, ToolRunner};
use crate::pipeline::retry;

use super::{
    Artifact, ArtifactRole, BuildTarget, MacArch, PackageContext, build_err, fs, icon, universal,
    write_version_marker,
};

/// Host tools this strategy shells out to.
const HOST_TOOLS: [&str; 5] = ["sips", "iconutil", "lipo", "codesign", "hdiutil"];

/// Names the host tools that are not on PATH. Used for an early warning;
/// the strategy itself surfaces the concrete failure when a tool runs.
pub fn missing_host_tools() -> Vec<&'static str> {
    HOST_TOOLS
        .iter()
        .copied()
        .filter(|tool| which::which(tool).is_err())
        .collect()
}

pub(super) async fn package(
    ctx: &PackageContext<'_>,
    artifacts: &mut Vec<Artifact>,
) -> Result<()> {
    let target = BuildTarget::MacOs;
    let lane_dir = ctx.lane_dir(target).await?;

    // Icon first, so the bundling tool finds the .icns next to the master.
    if let Some(master) = &ctx.config.icon_master {
        let icns = master.with_extension("icns");
        icon::generate_icns(ctx.runner, master, &icns)
            .await
            .map_err(|e| build_err(target, e))?;
    }

    // ARM64 as an .app bundle, x86_64 as a bare binary. The deployment
    // targets differ on purpose; see MacArch::deployment_target.
    let mut compiled = Vec::with_capacity(2);
    for arch in MacArch::BOTH {
        let spec = CompileSpec {
            target,
            arch: Some(arch),
            bundled: arch.bundled(),
            deployment_target: Some(arch.deployment_target()),
        };
        let path = ctx
            .toolchain
            .compile(&spec, ctx.config)
            .await
            .map_err(|e| build_err(target, e))?;
        compiled.push(path);
    }
    let (app_src, x86_binary) = (&compiled[0], &compiled[1]);

    // Work on a copy of the bundle under the lane directory.
    let app = lane_dir.join(format!("{}.app", ctx.config.display_name));
    match tokio::fs::remove_dir_all(&app).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    fs::copy_dir(app_src, &app).await?;

    patch_info_plist(&app)?;

    // Merge output overwrites the ARM bundle's binary path, so the bundle
    // ends up universal in place.
    let bundle_binary = app.join("Contents/MacOS").join(&ctx.config.data_name);
    universal::merge(ctx.runner, &bundle_binary, x86_binary)
        .await
        .map_err(|e| build_err(target, e))?;
    universal::verify(&bundle_binary).await?;

    sign_adhoc(ctx.runner, &app)
        .await
        .map_err(|e| build_err(target, e))?;

    let dmg = create_dmg(ctx, &app, &lane_dir).await?;
    artifacts.push(Artifact::new(target, dmg, ArtifactRole::DiskImage));

    let archive = create_update_archive(&app, &lane_dir, &ctx.config.data_name).await?;
    artifacts.push(Artifact::new(target, archive, ArtifactRole::UpdateArchive));

    artifacts.push(write_version_marker(target, &lane_dir, ctx.config).await?);
    Ok(())
}

/// Patches the bundle manifest with the fixed key set: camera and
/// microphone usage descriptions, window tabbing off, automatic
/// termination off. Nothing else is touched.
fn patch_info_plist(app: &Path) -> Result<()> {
    let path = app.join("Contents/Info.plist");
    let mut value = plist::Value::from_file(&path)?;
    let dict = value.as_dictionary_mut().ok_or_else(|| {
        PipelineError::Generic(format!("{}: root is not a dictionary", path.display()))
    })?;

    dict.insert(
        "NSCameraUsageDescription".to_string(),
        plist::Value::String("Camera access may be requested by in-game voice features.".into()),
    );
    dict.insert(
        "NSMicrophoneUsageDescription".to_string(),
        plist::Value::String("Microphone access may be requested by in-game voice chat.".into()),
    );
    dict.insert(
        "NSWindowAllowsAutomaticWindowTabbing".to_string(),
        plist::Value::Boolean(false),
    );
    dict.insert(
        "NSSupportsAutomaticTermination".to_string(),
        plist::Value::Boolean(false),
    );

    value.to_file_xml(&path)?;
    Ok(())
}

/// Ad-hoc signature: self-signed, enough for local trust, not a
/// distribution identity.
async fn sign_adhoc(runner: &dyn ToolRunner, app: &Path) -> std::result::Result<(), ToolError> {
    let invocation = ToolInvocation::new(
        "codesign",
        [
            "--force".to_string(),
            "--deep".to_string(),
            "--sign".to_string(),
            "-".to_string(),
            app.display().to_string(),
        ],
    );
    runner.run(&invocation).await
}

/// Creates `<displayName>.dmg` from a staging directory holding the
/// bundle and an Applications symlink for drag-to-install layout.
///
/// hdiutil is the one tool wrapped in the retry executor: it fails
/// nondeterministically with "resource busy" under OS-level contention.
async fn create_dmg(
    ctx: &PackageContext<'_>,
    app: &Path,
    lane_dir: &Path,
) -> Result<PathBuf> {
    let dmg = lane_dir.join(format!("{}.dmg", ctx.config.display_name));
    match tokio::fs::remove_file(&dmg).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    let staging = tempfile::tempdir()?;
    let app_name = app
        .file_name()
        .ok_or_else(|| PipelineError::Generic(format!("invalid bundle path {}", app.display())))?;
    fs::copy_dir(app, &staging.path().join(app_name)).await?;

    #[cfg(unix)]
    std::os::unix::fs::symlink("/Applications", staging.path().join("Applications"))?;

    let invocation = ToolInvocation::new(
        "hdiutil",
        [
            "create".to_string(),
            "-volname".to_string(),
            ctx.config.display_name.clone(),
            "-srcfolder".to_string(),
            staging.path().display().to_string(),
            "-ov".to_string(),
            "-format".to_string(),
            "UDZO".to_string(),
            dmg.display().to_string(),
        ],
    );
    retry::run_with_retry(ctx.runner, &invocation, ctx.retry).await?;

    log::info!("created disk image {}", dmg.display());
    Ok(dmg)
}

/// Stages the bundle under the fixed name `update.app` and compresses it
/// to `<dataName>_macos.tar.gz`. The inner name never varies with the
/// product name; the launcher's self-update looks for exactly this entry.
async fn create_update_archive(
    app: &Path,
    lane_dir: &Path,
    data_name: &str,
) -> Result<PathBuf> {
    let archive_path = lane_dir.join(format!("{data_name}_macos.tar.gz"));

    let staging = tempfile::tempdir()?;
    let update_app = staging.path().join("update.app");
    fs::copy_dir(app, &update_app).await?;

    let archive = archive_path.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let file = std::fs::File::create(&archive)?;
        let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        builder.follow_symlinks(false);
        builder.append_dir_all("update.app", &update_app)?;
        builder.into_inner()?.finish()?;
        Ok(())
    })
    .await
    .map_err(|e| PipelineError::Generic(format!("archive task panicked: {e}")))??;

    log::info!("created update archive {}", archive_path.display());
    Ok(archive_path)
}
