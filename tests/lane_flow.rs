//! End-to-end lane flows with injected collaborators.
//!
//! No real compiler or packaging tool runs here: the toolchain fake
//! fabricates compiler outputs on disk and the runner fake mimics the
//! observable effects of sips, iconutil, lipo, codesign, and hdiutil.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use launcher_release::error::ToolError;
use launcher_release::external::{CompileSpec, ToolInvocation, ToolRunner, Toolchain};
use launcher_release::packager::{ArtifactRole, BuildTarget};
use launcher_release::pipeline::{
    LaneContext, LaneOutcome, PipelineRun, ReleaseConfig, RetryPolicy, RunReporter,
    SecretAvailability, SkipReason, StepStatus, TriggerInputs, run_lane,
};
use launcher_release::publish::Transfer;

const CPU_TYPE_ARM64: u32 = 0x0100_000c;
const CPU_TYPE_X86_64: u32 = 0x0100_0007;

/// Minimal fat image carrying both required architecture slices.
fn fat_image() -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&0xcafe_babe_u32.to_be_bytes());
    bytes.extend_from_slice(&2u32.to_be_bytes());
    for (i, cputype) in [CPU_TYPE_ARM64, CPU_TYPE_X86_64].iter().enumerate() {
        bytes.extend_from_slice(&cputype.to_be_bytes());
        bytes.extend_from_slice(&0u32.to_be_bytes());
        bytes.extend_from_slice(&(4096 * (i as u32 + 1)).to_be_bytes());
        bytes.extend_from_slice(&16u32.to_be_bytes());
        bytes.extend_from_slice(&12u32.to_be_bytes());
    }
    bytes.resize(4096 * 3, 0);
    bytes
}

const INFO_PLIST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>CFBundleName</key>
    <string>Potato Launcher</string>
</dict>
</plist>
"#;

/// Fabricates compiler outputs under its work directory.
struct FakeToolchain {
    work_dir: PathBuf,
    /// Targets whose compile step should fail
    fail_targets: Vec<BuildTarget>,
}

impl FakeToolchain {
    fn new(work_dir: &Path) -> Self {
        Self {
            work_dir: work_dir.to_path_buf(),
            fail_targets: Vec::new(),
        }
    }

    fn failing_for(work_dir: &Path, targets: &[BuildTarget]) -> Self {
        Self {
            work_dir: work_dir.to_path_buf(),
            fail_targets: targets.to_vec(),
        }
    }
}

#[async_trait]
impl Toolchain for FakeToolchain {
    async fn compile(
        &self,
        spec: &CompileSpec,
        config: &ReleaseConfig,
    ) -> Result<PathBuf, ToolError> {
        if self.fail_targets.contains(&spec.target) {
            return Err(ToolError::new("cargo", "compilation failed"));
        }
        if spec.bundled {
            let app = self
                .work_dir
                .join(format!("{}-arm.app", config.data_name));
            let macos_dir = app.join("Contents/MacOS");
            std::fs::create_dir_all(&macos_dir).unwrap();
            std::fs::write(macos_dir.join(&config.data_name), b"arm64 slice").unwrap();
            std::fs::write(app.join("Contents/Info.plist"), INFO_PLIST).unwrap();
            Ok(app)
        } else {
            let name = match (spec.target, &spec.arch) {
                (BuildTarget::MacOs, _) => format!("{}-x86", config.data_name),
                _ => format!("{}-{}", config.data_name, spec.target),
            };
            let binary = self.work_dir.join(name);
            std::fs::write(&binary, b"compiled binary").unwrap();
            Ok(binary)
        }
    }
}

/// Mimics the packaging tools' observable effects on the filesystem.
#[derive(Default)]
struct FakeRunner {
    /// hdiutil failures to inject before letting it succeed
    hdiutil_failures: AtomicU32,
    hdiutil_attempts: AtomicU32,
    calls: Mutex<Vec<String>>,
}

impl FakeRunner {
    fn with_hdiutil_failures(failures: u32) -> Self {
        Self {
            hdiutil_failures: AtomicU32::new(failures),
            ..Default::default()
        }
    }

    fn arg_after(invocation: &ToolInvocation, flag: &str) -> Option<PathBuf> {
        let index = invocation.args.iter().position(|a| a == flag)?;
        invocation.args.get(index + 1).map(PathBuf::from)
    }
}

#[async_trait]
impl ToolRunner for FakeRunner {
    async fn run(&self, invocation: &ToolInvocation) -> Result<(), ToolError> {
        self.calls.lock().unwrap().push(invocation.program.clone());
        match invocation.program.as_str() {
            "sips" => {
                let out = Self::arg_after(invocation, "--out").unwrap();
                std::fs::write(out, b"png").unwrap();
                Ok(())
            }
            "iconutil" => {
                let out = Self::arg_after(invocation, "-o").unwrap();
                std::fs::write(out, b"icns").unwrap();
                Ok(())
            }
            "lipo" => {
                let output = Self::arg_after(invocation, "-output").unwrap();
                let arm = PathBuf::from(&invocation.args[1]);
                let x86 = PathBuf::from(&invocation.args[2]);
                assert!(arm.is_file(), "lipo arm input missing: {}", arm.display());
                assert!(x86.is_file(), "lipo x86 input missing: {}", x86.display());
                assert_eq!(arm, output, "merge output must overwrite the ARM input");
                std::fs::write(output, fat_image()).unwrap();
                Ok(())
            }
            "codesign" => Ok(()),
            "hdiutil" => {
                let attempt = self.hdiutil_attempts.fetch_add(1, Ordering::SeqCst) + 1;
                if attempt <= self.hdiutil_failures.load(Ordering::SeqCst) {
                    return Err(ToolError::new("hdiutil", "Resource busy"));
                }
                let dmg = PathBuf::from(invocation.args.last().unwrap());
                std::fs::write(dmg, b"dmg image").unwrap();
                Ok(())
            }
            other => Err(ToolError::new(other, "unexpected tool")),
        }
    }
}

#[derive(Default)]
struct FakeTransfer {
    uploads: Mutex<Vec<String>>,
    remote_invocations: AtomicU32,
}

#[async_trait]
impl Transfer for FakeTransfer {
    async fn upload(&self, local: &Path, remote_name: &str) -> Result<(), ToolError> {
        assert!(local.is_file(), "upload of missing file {}", local.display());
        self.uploads.lock().unwrap().push(remote_name.to_string());
        Ok(())
    }

    async fn invoke_remote(&self) -> Result<(), ToolError> {
        self.remote_invocations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Harness {
    work: tempfile::TempDir,
    out: tempfile::TempDir,
    transfer: Arc<FakeTransfer>,
    runner: Arc<FakeRunner>,
}

impl Harness {
    fn new(runner: FakeRunner) -> Self {
        Self {
            work: tempfile::tempdir().unwrap(),
            out: tempfile::tempdir().unwrap(),
            transfer: Arc::new(FakeTransfer::default()),
            runner: Arc::new(runner),
        }
    }

    fn config(&self) -> ReleaseConfig {
        ReleaseConfig::resolve(TriggerInputs {
            product_name: "Potato Launcher".to_string(),
            commit: "abc123".to_string(),
            release_branch: "master".to_string(),
            icon_master: Some(self.work.path().join("master.png")),
            project_dir: self.work.path().to_path_buf(),
            ..Default::default()
        })
    }

    fn context(
        &self,
        target: BuildTarget,
        branch: &str,
        secrets: SecretAvailability,
        toolchain: Arc<dyn Toolchain>,
    ) -> LaneContext {
        LaneContext {
            target,
            run: Arc::new(PipelineRun {
                branch: branch.to_string(),
                commit: "abc123".to_string(),
                upstream_success: true,
            }),
            config: Arc::new(self.config()),
            secrets,
            toolchain,
            runner: Arc::clone(&self.runner) as Arc<dyn ToolRunner>,
            transfer: Some(Arc::clone(&self.transfer) as Arc<dyn Transfer>),
            reporter: Arc::new(RunReporter::new(self.out.path())),
            retry: RetryPolicy::default(),
        }
    }
}

fn all_secrets() -> SecretAvailability {
    SecretAvailability {
        transfer_identity: true,
        transfer_destination: true,
        remote_action: true,
    }
}

fn artifact_names(outcome: &LaneOutcome) -> Vec<String> {
    outcome
        .artifacts
        .iter()
        .map(|a| a.path.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

/// Scenario A: release branch, all credentials, upstream success. Every
/// lane packages, publishes, and notifies.
#[tokio::test(start_paused = true)]
async fn release_branch_with_credentials_deploys_all_lanes() {
    let harness = Harness::new(FakeRunner::default());
    let toolchain: Arc<dyn Toolchain> = Arc::new(FakeToolchain::new(harness.work.path()));

    let mut outcomes = Vec::new();
    for target in BuildTarget::ALL {
        let ctx = harness.context(target, "master", all_secrets(), Arc::clone(&toolchain));
        outcomes.push(run_lane(ctx).await);
    }

    for outcome in &outcomes {
        assert!(outcome.succeeded(), "{}: {outcome:?}", outcome.target);
        assert_eq!(outcome.publish, StepStatus::Success);
        assert_eq!(outcome.notify, StepStatus::Success);
    }

    assert_eq!(
        artifact_names(&outcomes[0]),
        vec!["Potato Launcher.exe", "version_windows.txt"]
    );
    assert_eq!(
        artifact_names(&outcomes[1]),
        vec!["potato_launcher", "version_linux.txt"]
    );
    assert_eq!(
        artifact_names(&outcomes[2]),
        vec![
            "Potato Launcher.dmg",
            "potato_launcher_macos.tar.gz",
            "version_macos.txt"
        ]
    );

    // Every artifact of every lane went out, and the post-deploy action
    // fired once per lane.
    assert_eq!(harness.transfer.uploads.lock().unwrap().len(), 7);
    assert_eq!(harness.transfer.remote_invocations.load(Ordering::SeqCst), 3);

    // Version markers name the commit.
    let marker = harness.out.path().join("linux/version_linux.txt");
    assert_eq!(std::fs::read_to_string(marker).unwrap(), "abc123");

    // The bundle manifest carries the fixed patch set.
    let plist = std::fs::read_to_string(
        harness
            .out
            .path()
            .join("macos/Potato Launcher.app/Contents/Info.plist"),
    )
    .unwrap();
    for key in [
        "NSCameraUsageDescription",
        "NSMicrophoneUsageDescription",
        "NSWindowAllowsAutomaticWindowTabbing",
        "NSSupportsAutomaticTermination",
    ] {
        assert!(plist.contains(key), "missing {key}");
    }
}

/// Scenario B: non-release branch. Artifacts are produced and preserved,
/// deployment never runs.
#[tokio::test(start_paused = true)]
async fn non_release_branch_packages_but_never_deploys() {
    let harness = Harness::new(FakeRunner::default());
    let toolchain: Arc<dyn Toolchain> = Arc::new(FakeToolchain::new(harness.work.path()));

    for target in BuildTarget::ALL {
        let ctx = harness.context(target, "feature/shiny", all_secrets(), Arc::clone(&toolchain));
        let outcome = run_lane(ctx).await;

        assert!(outcome.succeeded());
        assert_eq!(
            outcome.publish,
            StepStatus::Skipped(SkipReason::NotReleaseBranch)
        );
        assert_eq!(
            outcome.notify,
            StepStatus::Skipped(SkipReason::PublishDidNotRun)
        );
        assert!(!outcome.artifacts.is_empty());
    }

    assert!(harness.transfer.uploads.lock().unwrap().is_empty());
    assert_eq!(harness.transfer.remote_invocations.load(Ordering::SeqCst), 0);

    // The reporter preserved everything regardless.
    for (lane, file) in [
        ("windows", "version_windows.txt"),
        ("linux", "version_linux.txt"),
        ("macos", "Potato Launcher.dmg"),
    ] {
        assert!(harness.out.path().join(lane).join(file).is_file());
    }
    assert!(
        harness
            .out
            .path()
            .join("macos/report_macos.json")
            .is_file()
    );
}

/// Scenario C: hdiutil fails four times, succeeds on the fifth attempt.
/// The macOS lane still succeeds with exactly one disk image.
#[tokio::test(start_paused = true)]
async fn flaky_disk_image_tool_is_retried_to_success() {
    let harness = Harness::new(FakeRunner::with_hdiutil_failures(4));
    let toolchain: Arc<dyn Toolchain> = Arc::new(FakeToolchain::new(harness.work.path()));

    let ctx = harness.context(BuildTarget::MacOs, "master", all_secrets(), toolchain);
    let outcome = run_lane(ctx).await;

    assert!(outcome.succeeded(), "{outcome:?}");
    assert_eq!(harness.runner.hdiutil_attempts.load(Ordering::SeqCst), 5);
    let disk_images: Vec<_> = outcome
        .artifacts
        .iter()
        .filter(|a| a.role == ArtifactRole::DiskImage)
        .collect();
    assert_eq!(disk_images.len(), 1);
}

/// Retry exhaustion aborts the lane; deploy steps never start.
#[tokio::test(start_paused = true)]
async fn disk_image_retry_exhaustion_is_fatal() {
    let harness = Harness::new(FakeRunner::with_hdiutil_failures(5));
    let toolchain: Arc<dyn Toolchain> = Arc::new(FakeToolchain::new(harness.work.path()));

    let ctx = harness.context(BuildTarget::MacOs, "master", all_secrets(), toolchain);
    let outcome = run_lane(ctx).await;

    assert!(!outcome.succeeded());
    assert_eq!(harness.runner.hdiutil_attempts.load(Ordering::SeqCst), 5);
    assert!(outcome.build_error.as_deref().unwrap().contains("5 attempts"));
    assert_eq!(outcome.publish, StepStatus::Skipped(SkipReason::LaneAborted));
    assert_eq!(outcome.notify, StepStatus::Skipped(SkipReason::LaneAborted));
    assert!(harness.transfer.uploads.lock().unwrap().is_empty());
}

/// One lane's build failure leaves sibling lanes untouched.
#[tokio::test(start_paused = true)]
async fn lane_failure_is_isolated_from_siblings() {
    let harness = Harness::new(FakeRunner::default());
    let toolchain: Arc<dyn Toolchain> = Arc::new(FakeToolchain::failing_for(
        harness.work.path(),
        &[BuildTarget::Windows],
    ));

    let mut join_set = tokio::task::JoinSet::new();
    for target in BuildTarget::ALL {
        join_set.spawn(run_lane(harness.context(
            target,
            "master",
            all_secrets(),
            Arc::clone(&toolchain),
        )));
    }

    let mut outcomes = Vec::new();
    while let Some(outcome) = join_set.join_next().await {
        outcomes.push(outcome.unwrap());
    }

    let failed: Vec<_> = outcomes.iter().filter(|o| !o.succeeded()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].target, BuildTarget::Windows);
    for outcome in outcomes.iter().filter(|o| o.succeeded()) {
        assert_eq!(outcome.publish, StepStatus::Success);
    }
}

/// Missing credentials on the release branch skip deployment without
/// failing anything.
#[tokio::test(start_paused = true)]
async fn missing_credentials_skip_deploy_steps() {
    let harness = Harness::new(FakeRunner::default());
    let toolchain: Arc<dyn Toolchain> = Arc::new(FakeToolchain::new(harness.work.path()));

    let secrets = SecretAvailability {
        transfer_identity: true,
        transfer_destination: false,
        remote_action: true,
    };
    let ctx = harness.context(BuildTarget::Linux, "master", secrets, toolchain);
    let outcome = run_lane(ctx).await;

    assert!(outcome.succeeded());
    assert_eq!(
        outcome.publish,
        StepStatus::Skipped(SkipReason::MissingCredential)
    );
    assert!(harness.transfer.uploads.lock().unwrap().is_empty());
}

/// The update archive carries the fixed inner name whatever the product
/// is called.
#[tokio::test(start_paused = true)]
async fn update_archive_uses_fixed_inner_name() {
    let harness = Harness::new(FakeRunner::default());
    let toolchain: Arc<dyn Toolchain> = Arc::new(FakeToolchain::new(harness.work.path()));

    let ctx = harness.context(BuildTarget::MacOs, "master", all_secrets(), toolchain);
    let outcome = run_lane(ctx).await;
    assert!(outcome.succeeded());

    let archive = harness
        .out
        .path()
        .join("macos/potato_launcher_macos.tar.gz");
    let file = std::fs::File::open(archive).unwrap();
    let mut entries_seen = 0usize;
    let mut tar = tar::Archive::new(flate2::read::GzDecoder::new(file));
    for entry in tar.entries().unwrap() {
        let entry = entry.unwrap();
        let path = entry.path().unwrap().into_owned();
        assert!(
            path.starts_with("update.app"),
            "unexpected entry {}",
            path.display()
        );
        entries_seen += 1;
    }
    assert!(entries_seen > 0);
}
