//! Per-target lane: the sequential state machine
//! Resolve → Package → Gate → Publish → Notify → Report.
//!
//! Each gate precondition is a pure predicate so the whole flow can be
//! unit-tested with injected collaborators and no real external tools.

use std::sync::Arc;

use crate::external::{ToolRunner, Toolchain};
use crate::packager::{self, Artifact, BuildTarget, PackageContext};
use crate::publish::{self, NOTIFY_CREDENTIALS, PUBLISH_CREDENTIALS, Transfer};

use super::report::RunReporter;
use super::retry::RetryPolicy;
use super::run::PipelineRun;
use super::secrets::SecretAvailability;
use super::{ReleaseConfig, config};

/// Why a gated step did not run. Skips are reported distinctly from
/// failures so "nothing to deploy here" never reads as "deployment broke".
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SkipReason {
    /// Trigger branch is not the release branch
    NotReleaseBranch,
    /// Upstream CI stage did not succeed
    UpstreamFailed,
    /// A required credential is absent
    MissingCredential,
    /// Notifier only: publish was skipped or failed
    PublishDidNotRun,
    /// Packaging failed; deploy steps never started
    LaneAborted,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            SkipReason::NotReleaseBranch => "not the release branch",
            SkipReason::UpstreamFailed => "upstream outcome was not success",
            SkipReason::MissingCredential => "required credential absent",
            SkipReason::PublishDidNotRun => "publish did not run",
            SkipReason::LaneAborted => "lane aborted before this step",
        };
        f.write_str(text)
    }
}

/// Outcome of one gated step.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StepStatus {
    Success,
    Skipped(SkipReason),
    Failed(String),
}

impl StepStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, StepStatus::Failed(_))
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Success => f.write_str("success"),
            StepStatus::Skipped(reason) => write!(f, "skipped ({reason})"),
            StepStatus::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Publisher precondition. None means the publisher may run.
pub fn publish_gate(
    run: &PipelineRun,
    config: &ReleaseConfig,
    secrets: &SecretAvailability,
) -> Option<SkipReason> {
    if run.branch != config.release_branch {
        Some(SkipReason::NotReleaseBranch)
    } else if !run.upstream_success {
        Some(SkipReason::UpstreamFailed)
    } else if !secrets.permits(&PUBLISH_CREDENTIALS) {
        Some(SkipReason::MissingCredential)
    } else {
        None
    }
}

/// Notifier precondition: a successful publish plus the extended
/// credential set.
pub fn notify_gate(publish: &StepStatus, secrets: &SecretAvailability) -> Option<SkipReason> {
    match publish {
        StepStatus::Success => {
            if secrets.permits(&NOTIFY_CREDENTIALS) {
                None
            } else {
                Some(SkipReason::MissingCredential)
            }
        }
        _ => Some(SkipReason::PublishDidNotRun),
    }
}

/// Everything one lane needs. Shared pieces are `Arc`s of read-only
/// state; lanes never share anything mutable.
pub struct LaneContext {
    pub target: BuildTarget,
    pub run: Arc<PipelineRun>,
    pub config: Arc<ReleaseConfig>,
    pub secrets: SecretAvailability,
    pub toolchain: Arc<dyn Toolchain>,
    pub runner: Arc<dyn ToolRunner>,
    /// Present only when transfer credentials exist (or a fake is injected).
    pub transfer: Option<Arc<dyn Transfer>>,
    pub reporter: Arc<RunReporter>,
    pub retry: RetryPolicy,
}

/// Result of one lane. A failed lane is surfaced here; it never affects
/// sibling lanes.
#[derive(Clone, Debug)]
pub struct LaneOutcome {
    pub target: BuildTarget,
    pub artifacts: Vec<Artifact>,
    pub publish: StepStatus,
    pub notify: StepStatus,
    /// Fatal packaging error, if the lane aborted
    pub build_error: Option<String>,
}

impl LaneOutcome {
    /// Lane success: no fatal build error and no deploy failure. Skipped
    /// deploy steps count as success.
    pub fn succeeded(&self) -> bool {
        self.build_error.is_none() && !self.publish.is_failure() && !self.notify.is_failure()
    }
}

/// Runs one lane to completion. The reporter always executes, whatever
/// happened before it.
pub async fn run_lane(ctx: LaneContext) -> LaneOutcome {
    debug_assert_eq!(ctx.config.data_name, config::data_name(&ctx.config.display_name));

    let mut artifacts: Vec<Artifact> = Vec::new();
    let package_ctx = PackageContext {
        toolchain: ctx.toolchain.as_ref(),
        runner: ctx.runner.as_ref(),
        config: &ctx.config,
        out_dir: ctx.reporter.root(),
        retry: &ctx.retry,
    };

    let build_error = match packager::package(ctx.target, &package_ctx, &mut artifacts).await {
        Ok(()) => None,
        Err(e) => {
            log::error!("{} lane: packaging failed: {e}", ctx.target);
            Some(e.to_string())
        }
    };

    let (publish, notify) = if build_error.is_some() {
        (
            StepStatus::Skipped(SkipReason::LaneAborted),
            StepStatus::Skipped(SkipReason::LaneAborted),
        )
    } else {
        let publish = run_publish(&ctx, &artifacts).await;
        let notify = run_notify(&ctx, &publish).await;
        (publish, notify)
    };

    ctx.reporter.preserve(ctx.target, &artifacts).await;

    let outcome = LaneOutcome {
        target: ctx.target,
        artifacts,
        publish,
        notify,
        build_error,
    };
    log::info!(
        "{} lane: publish {}, notify {}",
        outcome.target,
        outcome.publish,
        outcome.notify
    );
    outcome
}

async fn run_publish(ctx: &LaneContext, artifacts: &[Artifact]) -> StepStatus {
    if let Some(reason) = publish_gate(&ctx.run, &ctx.config, &ctx.secrets) {
        log::info!("{} lane: publish skipped: {reason}", ctx.target);
        return StepStatus::Skipped(reason);
    }
    let Some(transfer) = &ctx.transfer else {
        // Gate passed but no backend was constructed; treat as absent
        // credentials rather than a failure.
        return StepStatus::Skipped(SkipReason::MissingCredential);
    };
    match publish::publish_artifacts(transfer.as_ref(), artifacts).await {
        Ok(()) => StepStatus::Success,
        Err(e) => StepStatus::Failed(e.to_string()),
    }
}

async fn run_notify(ctx: &LaneContext, publish: &StepStatus) -> StepStatus {
    if let Some(reason) = notify_gate(publish, &ctx.secrets) {
        log::info!("{} lane: notify skipped: {reason}", ctx.target);
        return StepStatus::Skipped(reason);
    }
    let Some(transfer) = &ctx.transfer else {
        return StepStatus::Skipped(SkipReason::MissingCredential);
    };
    match publish::notify(transfer.as_ref()).await {
        Ok(()) => StepStatus::Success,
        Err(e) => StepStatus::Failed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(branch: &str, upstream: bool) -> PipelineRun {
        PipelineRun {
            branch: branch.to_string(),
            commit: "abc".to_string(),
            upstream_success: upstream,
        }
    }

    fn config() -> ReleaseConfig {
        ReleaseConfig::resolve(super::super::TriggerInputs {
            product_name: "Potato Launcher".to_string(),
            commit: "abc".to_string(),
            release_branch: "master".to_string(),
            ..Default::default()
        })
    }

    fn secrets(identity: bool, destination: bool, action: bool) -> SecretAvailability {
        SecretAvailability {
            transfer_identity: identity,
            transfer_destination: destination,
            remote_action: action,
        }
    }

    #[test]
    fn publish_gate_truth_table() {
        let config = config();
        let all = secrets(true, true, true);

        assert_eq!(publish_gate(&run("master", true), &config, &all), None);
        assert_eq!(
            publish_gate(&run("feature/x", true), &config, &all),
            Some(SkipReason::NotReleaseBranch)
        );
        assert_eq!(
            publish_gate(&run("master", false), &config, &all),
            Some(SkipReason::UpstreamFailed)
        );
        assert_eq!(
            publish_gate(&run("master", true), &config, &secrets(false, true, true)),
            Some(SkipReason::MissingCredential)
        );
        assert_eq!(
            publish_gate(&run("master", true), &config, &secrets(true, false, true)),
            Some(SkipReason::MissingCredential)
        );
        // The remote action credential is not required for publishing.
        assert_eq!(
            publish_gate(&run("master", true), &config, &secrets(true, true, false)),
            None
        );
    }

    #[test]
    fn notify_gate_requires_successful_publish() {
        let all = secrets(true, true, true);
        assert_eq!(notify_gate(&StepStatus::Success, &all), None);
        assert_eq!(
            notify_gate(&StepStatus::Skipped(SkipReason::NotReleaseBranch), &all),
            Some(SkipReason::PublishDidNotRun)
        );
        assert_eq!(
            notify_gate(&StepStatus::Failed("boom".to_string()), &all),
            Some(SkipReason::PublishDidNotRun)
        );
        assert_eq!(
            notify_gate(&StepStatus::Success, &secrets(true, true, false)),
            Some(SkipReason::MissingCredential)
        );
    }

    #[test]
    fn skipped_deploy_is_still_lane_success() {
        let outcome = LaneOutcome {
            target: BuildTarget::Linux,
            artifacts: Vec::new(),
            publish: StepStatus::Skipped(SkipReason::NotReleaseBranch),
            notify: StepStatus::Skipped(SkipReason::PublishDidNotRun),
            build_error: None,
        };
        assert!(outcome.succeeded());

        let failed = LaneOutcome {
            publish: StepStatus::Failed("io".to_string()),
            ..outcome
        };
        assert!(!failed.succeeded());
    }
}
