//! Run reporter: unconditional artifact preservation.
//!
//! Every artifact a lane produced is copied under the report directory
//! and described in a per-lane JSON manifest, whether or not deployment
//! ran. The reporter logs its own problems instead of failing the lane.

use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use crate::error::Result;
use crate::packager::{Artifact, ArtifactRole, BuildTarget};

/// One manifest row.
#[derive(Debug, Serialize)]
pub struct ReportEntry {
    pub file: String,
    pub role: ArtifactRole,
    pub bytes: u64,
    pub sha256: String,
}

/// Copies artifacts to `<root>/<os>/` and writes `report_<os>.json`.
pub struct RunReporter {
    root: PathBuf,
}

impl RunReporter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Report root; packagers write their lane output beneath it.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Per-lane report directory.
    pub fn lane_dir(&self, target: BuildTarget) -> PathBuf {
        self.root.join(target.os_tag())
    }

    /// Preserves the lane's artifacts. Never fails the lane: every error
    /// is logged and swallowed.
    pub async fn preserve(&self, target: BuildTarget, artifacts: &[Artifact]) {
        if let Err(e) = self.try_preserve(target, artifacts).await {
            log::warn!("run report for {target} incomplete: {e}");
        }
    }

    async fn try_preserve(&self, target: BuildTarget, artifacts: &[Artifact]) -> Result<()> {
        let dir = self.lane_dir(target);
        tokio::fs::create_dir_all(&dir).await?;

        let mut entries = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            let Some(name) = artifact.path.file_name() else {
                log::warn!("artifact without a file name: {}", artifact.path.display());
                continue;
            };
            let dest = dir.join(name);
            // Artifacts may already live in the report directory; only
            // copy the ones produced elsewhere.
            if dest != artifact.path {
                tokio::fs::copy(&artifact.path, &dest).await?;
            }

            let metadata = tokio::fs::metadata(&dest).await?;
            entries.push(ReportEntry {
                file: name.to_string_lossy().into_owned(),
                role: artifact.role,
                bytes: metadata.len(),
                sha256: sha256_file(&dest).await?,
            });
        }

        let manifest = dir.join(format!("report_{}.json", target.os_tag()));
        tokio::fs::write(&manifest, serde_json::to_vec_pretty(&entries)?).await?;
        log::info!(
            "preserved {} artifact(s) for {target} in {}",
            entries.len(),
            dir.display()
        );
        Ok(())
    }
}

/// SHA-256 of a file, hex-encoded, read in 8 KiB chunks.
pub async fn sha256_file(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];

    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}
