//! Command line argument parsing.
//!
//! Every trigger input can arrive as a flag or as the CI environment
//! variable the workflow exports; clap's `env` support covers both.

use clap::Parser;
use std::path::PathBuf;

use crate::packager::BuildTarget;
use crate::pipeline::TriggerInputs;

/// Multi-target release pipeline for the launcher
#[derive(Parser, Debug)]
#[command(
    name = "launcher-release",
    version,
    about = "Compiles, packages, and optionally deploys the launcher for each target OS",
    long_about = "Runs one independent lane per target OS: compile, package into the \
native distributable, and - on the release branch with deploy credentials \
present - publish the artifacts and fire the post-deploy action.

Missing credentials or a non-release branch skip deployment; they never fail \
the run. Artifacts are always preserved under the output directory.

Exit code 0 = every selected lane succeeded (skipped deploys included)."
)]
pub struct Args {
    /// Product name
    #[arg(long, env = "LAUNCHER_NAME")]
    pub product_name: String,

    /// Display-name override; defaults to the product name
    #[arg(long, env = "LAUNCHER_DISPLAY_NAME")]
    pub display_name: Option<String>,

    /// Trigger branch
    #[arg(long, env = "GITHUB_REF_NAME")]
    pub branch: String,

    /// Trigger commit id, used verbatim as the release version
    #[arg(long, env = "GITHUB_SHA")]
    pub commit: String,

    /// Outcome of the upstream CI stage
    #[arg(long, env = "UPSTREAM_RESULT", default_value = "success")]
    pub upstream_result: String,

    /// Branch deploys are allowed from
    #[arg(long, default_value = "master")]
    pub release_branch: String,

    /// Update-manifest base URL baked into the build
    #[arg(long, env = "VERSION_MANIFEST_URL")]
    pub manifest_url: Option<String>,

    /// Alternate auto-update base URL baked into the build
    #[arg(long, env = "AUTO_UPDATE_BASE")]
    pub update_base: Option<String>,

    /// Master icon PNG for macOS icon generation
    #[arg(long)]
    pub icon: Option<PathBuf>,

    /// Source checkout to build
    #[arg(long, default_value = ".")]
    pub project_dir: PathBuf,

    /// Output directory for artifacts and lane reports
    #[arg(long, short = 'o', default_value = "dist")]
    pub output: PathBuf,

    /// Target lane(s) to run; repeat for several, default all
    #[arg(long = "target", value_enum)]
    pub targets: Vec<BuildTarget>,
}

impl Args {
    /// Selected targets, defaulting to all three lanes.
    ///
    /// Each target runs at most one lane; repeated flags collapse to the
    /// first occurrence so lanes never share an output directory.
    pub fn selected_targets(&self) -> Vec<BuildTarget> {
        if self.targets.is_empty() {
            return BuildTarget::ALL.to_vec();
        }
        let mut seen = std::collections::HashSet::new();
        let mut targets = self.targets.clone();
        targets.retain(|t| seen.insert(*t));
        targets
    }

    /// Trigger inputs for the environment resolver.
    pub fn trigger_inputs(&self) -> TriggerInputs {
        TriggerInputs {
            product_name: self.product_name.clone(),
            display_name: self.display_name.clone(),
            commit: self.commit.clone(),
            release_branch: self.release_branch.clone(),
            manifest_url: self.manifest_url.clone(),
            update_base: self.update_base.clone(),
            icon_master: self.icon.clone(),
            project_dir: self.project_dir.clone(),
        }
    }

    /// Upstream outcome as a flag.
    pub fn upstream_success(&self) -> bool {
        self.upstream_result == "success"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec![
            "launcher-release",
            "--product-name",
            "Potato Launcher",
            "--branch",
            "master",
            "--commit",
            "abc123",
        ];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn defaults_to_all_targets() {
        let args = parse(&[]);
        assert_eq!(args.selected_targets(), BuildTarget::ALL.to_vec());
        assert!(args.upstream_success());
        assert_eq!(args.release_branch, "master");
    }

    #[test]
    fn explicit_targets_are_respected() {
        let args = parse(&["--target", "macos", "--target", "linux"]);
        assert_eq!(
            args.selected_targets(),
            vec![BuildTarget::MacOs, BuildTarget::Linux]
        );
    }

    #[test]
    fn repeated_targets_collapse_to_one_lane_each() {
        let args = parse(&[
            "--target", "macos", "--target", "linux", "--target", "macos",
        ]);
        assert_eq!(
            args.selected_targets(),
            vec![BuildTarget::MacOs, BuildTarget::Linux]
        );
    }

    #[test]
    fn non_success_upstream_is_not_success() {
        let args = parse(&["--upstream-result", "failure"]);
        assert!(!args.upstream_success());
    }
}
