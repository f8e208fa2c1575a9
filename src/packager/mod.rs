//! Per-OS packaging strategies.
//!
//! Each [`BuildTarget`] owns one strategy that turns a compiled binary
//! into the OS-native distributable set. Windows and Linux are a rename
//! plus a version marker; macOS carries the bulk of the work (icon,
//! bundle, plist, universal merge, signing, disk image, update archive).

pub(crate) mod fs;
mod icon;
mod linux;
mod macos;
pub mod universal;
mod windows;

pub use icon::ICON_SIZES;
pub use macos::missing_host_tools;

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{PipelineError, Result};
use crate::external::{ToolRunner, Toolchain};
use crate::pipeline::{ReleaseConfig, RetryPolicy};

/// Target operating system. Fixed enumeration; each variant owns exactly
/// one lane of the pipeline.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BuildTarget {
    Windows,
    Linux,
    #[value(name = "macos")]
    MacOs,
}

impl BuildTarget {
    /// All targets, in lane order.
    pub const ALL: [BuildTarget; 3] = [BuildTarget::Windows, BuildTarget::Linux, BuildTarget::MacOs];

    /// Lowercase OS tag used in artifact and marker names.
    pub fn os_tag(self) -> &'static str {
        match self {
            BuildTarget::Windows => "windows",
            BuildTarget::Linux => "linux",
            BuildTarget::MacOs => "macos",
        }
    }

    /// Version-marker filename for this target.
    pub fn version_marker_name(self) -> String {
        format!("version_{}.txt", self.os_tag())
    }
}

impl std::fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.os_tag())
    }
}

/// The two macOS architectures a release always carries.
///
/// The deployment targets intentionally differ: the bundling tool and the
/// plain compiler have different minimum-OS defaults, and the x86_64
/// slice keeps the older floor for backward compatibility. Do not unify
/// them without revisiting that requirement.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MacArch {
    Aarch64,
    X86_64,
}

impl MacArch {
    /// Both architectures, merge-input order (ARM first).
    pub const BOTH: [MacArch; 2] = [MacArch::Aarch64, MacArch::X86_64];

    /// Rust target triple for this architecture.
    pub fn rust_triple(self) -> &'static str {
        match self {
            MacArch::Aarch64 => "aarch64-apple-darwin",
            MacArch::X86_64 => "x86_64-apple-darwin",
        }
    }

    /// Minimum macOS version this slice is built against.
    pub fn deployment_target(self) -> &'static str {
        match self {
            MacArch::Aarch64 => "11.0",
            MacArch::X86_64 => "10.12",
        }
    }

    /// Whether this architecture is produced as an `.app` bundle.
    pub fn bundled(self) -> bool {
        matches!(self, MacArch::Aarch64)
    }
}

/// Logical role of a produced artifact.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactRole {
    /// Primary executable or its package
    Binary,
    /// Small file naming the commit this build came from
    VersionMarker,
    /// User-facing drag-to-install disk image
    DiskImage,
    /// Auto-update payload, fixed-name inner entry
    UpdateArchive,
}

/// One file produced by a packager, consumed by the publisher and the
/// run reporter.
#[derive(Clone, Debug)]
pub struct Artifact {
    pub target: BuildTarget,
    pub path: PathBuf,
    pub role: ArtifactRole,
}

impl Artifact {
    pub fn new(target: BuildTarget, path: PathBuf, role: ArtifactRole) -> Self {
        Self { target, path, role }
    }
}

/// Collaborators and per-run parameters a packaging strategy needs.
pub struct PackageContext<'a> {
    pub toolchain: &'a dyn Toolchain,
    pub runner: &'a dyn ToolRunner,
    pub config: &'a ReleaseConfig,
    /// Root output directory; strategies write under `<root>/<os_tag>`.
    pub out_dir: &'a Path,
    /// Retry bound for the disk-image tool (macOS only).
    pub retry: &'a RetryPolicy,
}

impl PackageContext<'_> {
    /// Per-lane output directory, created on demand.
    pub(crate) async fn lane_dir(&self, target: BuildTarget) -> Result<PathBuf> {
        let dir = self.out_dir.join(target.os_tag());
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }
}

/// Runs the packaging strategy for `target`, appending produced artifacts
/// to `artifacts` as they materialize so that anything finished before a
/// failure remains available to the run reporter.
pub async fn package(
    target: BuildTarget,
    ctx: &PackageContext<'_>,
    artifacts: &mut Vec<Artifact>,
) -> Result<()> {
    match target {
        BuildTarget::Windows => windows::package(ctx, artifacts).await,
        BuildTarget::Linux => linux::package(ctx, artifacts).await,
        BuildTarget::MacOs => macos::package(ctx, artifacts).await,
    }
}

/// Writes the `version_<os>.txt` marker containing the commit id.
pub(crate) async fn write_version_marker(
    target: BuildTarget,
    lane_dir: &Path,
    config: &ReleaseConfig,
) -> Result<Artifact> {
    let path = lane_dir.join(target.version_marker_name());
    tokio::fs::write(&path, &config.version).await?;
    log::debug!("wrote version marker {}", path.display());
    Ok(Artifact::new(target, path, ArtifactRole::VersionMarker))
}

/// Maps an external-tool failure to the lane-fatal build error.
pub(crate) fn build_err(target: BuildTarget, error: impl std::fmt::Display) -> PipelineError {
    PipelineError::Build {
        target: target.os_tag(),
        reason: error.to_string(),
    }
}
