//! Command line interface: argument parsing, lane fan-out, exit codes.

mod args;

pub use args::Args;

use std::sync::Arc;

use clap::Parser;
use tokio::task::JoinSet;

use crate::external::{CargoToolchain, ProcessRunner, ToolRunner, Toolchain};
use crate::packager::{self, BuildTarget};
use crate::pipeline::{
    LaneContext, LaneOutcome, PipelineRun, ReleaseConfig, RetryPolicy, RunReporter,
    SecretAvailability, run_lane,
};
use crate::publish::{DeployCredentials, ScpTransfer, Transfer};

/// Main CLI entry point. Returns the process exit code.
pub async fn run() -> anyhow::Result<i32> {
    let args = Args::parse();

    let run = Arc::new(PipelineRun {
        branch: args.branch.clone(),
        commit: args.commit.clone(),
        upstream_success: args.upstream_success(),
    });
    let config = Arc::new(ReleaseConfig::resolve(args.trigger_inputs()));
    let secrets = SecretAvailability::from_env();

    log::info!(
        "release {} of {} from branch {} (deployable: {})",
        config.version,
        config.display_name,
        run.branch,
        run.deployable(&config.release_branch)
    );

    // Credential values are read once, only to construct the transfer
    // backend; gating decisions use presence flags alone.
    let transfer: Option<Arc<dyn Transfer>> = match DeployCredentials::from_env() {
        Some(credentials) => Some(Arc::new(ScpTransfer::new(credentials)?)),
        None => None,
    };

    let toolchain: Arc<dyn Toolchain> = Arc::new(CargoToolchain::new(config.project_dir.clone()));
    let runner: Arc<dyn ToolRunner> = Arc::new(ProcessRunner);
    let reporter = Arc::new(RunReporter::new(args.output.clone()));

    let targets = args.selected_targets();
    if targets.contains(&BuildTarget::MacOs) {
        let missing = packager::missing_host_tools();
        if !missing.is_empty() {
            log::warn!("macos host tools not on PATH: {}", missing.join(", "));
        }
    }

    // One independent task per lane; a lane's failure is collected, never
    // propagated to its siblings.
    let mut lanes = JoinSet::new();
    for target in targets {
        let ctx = LaneContext {
            target,
            run: Arc::clone(&run),
            config: Arc::clone(&config),
            secrets,
            toolchain: Arc::clone(&toolchain),
            runner: Arc::clone(&runner),
            transfer: transfer.clone(),
            reporter: Arc::clone(&reporter),
            retry: RetryPolicy::default(),
        };
        lanes.spawn(run_lane(ctx));
    }

    let (outcomes, panicked) = drain_lanes(lanes).await;

    let mut exit_code = if panicked { 1 } else { 0 };
    for outcome in &outcomes {
        if outcome.succeeded() {
            log::info!(
                "{} lane ok ({} artifact(s))",
                outcome.target,
                outcome.artifacts.len()
            );
        } else {
            let detail = outcome
                .build_error
                .clone()
                .unwrap_or_else(|| format!("publish {}, notify {}", outcome.publish, outcome.notify));
            log::error!("{} lane failed: {detail}", outcome.target);
            exit_code = 1;
        }
    }
    Ok(exit_code)
}

/// Collects every lane outcome, draining past panicked tasks so sibling
/// lanes run to completion instead of being aborted with a dropped set.
async fn drain_lanes(mut lanes: JoinSet<LaneOutcome>) -> (Vec<LaneOutcome>, bool) {
    let mut outcomes = Vec::new();
    let mut panicked = false;
    while let Some(joined) = lanes.join_next().await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                log::error!("lane task panicked: {e}");
                panicked = true;
            }
        }
    }
    (outcomes, panicked)
}
