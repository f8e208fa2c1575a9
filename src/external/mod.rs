//! Seams to the external toolchains the pipeline drives.
//!
//! The pipeline's own content is decision logic; compilers, bundlers, and
//! packaging tools are collaborators behind the [`Toolchain`] and
//! [`ToolRunner`] traits so the whole flow can be exercised with fakes.
//! The process-backed implementations live here as well.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::ToolError;
use crate::packager::{BuildTarget, MacArch};
use crate::pipeline::ReleaseConfig;

/// One external command, fully described.
///
/// Built by the call site, executed by a [`ToolRunner`]. Keeping the
/// invocation as data lets the retry executor re-run it verbatim and lets
/// test fakes match on the program name.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    /// Program name or path
    pub program: String,
    /// Arguments in order
    pub args: Vec<String>,
    /// Extra environment variables for the child process
    pub envs: Vec<(String, String)>,
}

impl ToolInvocation {
    /// Creates an invocation of `program` with the given arguments.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            envs: Vec::new(),
        }
    }

    /// Adds an environment variable for the child process.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }
}

/// Executes external commands to completion.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Runs the command, blocking until it exits.
    ///
    /// Ok on a zero exit status; Err carries the captured stderr (or the
    /// launch failure) otherwise.
    async fn run(&self, invocation: &ToolInvocation) -> Result<(), ToolError>;
}

/// Compiler/bundler black box: `compile(target) -> binary path`.
///
/// The pipeline never inspects how a binary is produced; it only needs
/// the path of the output and whether the invocation succeeded.
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Compiles one architecture of one target, returning the path of the
    /// produced binary (or `.app` bundle when `spec.bundled`).
    async fn compile(
        &self,
        spec: &CompileSpec,
        config: &ReleaseConfig,
    ) -> Result<PathBuf, ToolError>;
}

/// One compile request for a single target architecture.
#[derive(Debug, Clone)]
pub struct CompileSpec {
    /// Target OS
    pub target: BuildTarget,
    /// macOS architecture; None for single-arch targets
    pub arch: Option<MacArch>,
    /// Produce an `.app` bundle instead of a bare binary
    pub bundled: bool,
    /// `MACOSX_DEPLOYMENT_TARGET` value, when the target needs one
    pub deployment_target: Option<&'static str>,
}

/// [`ToolRunner`] backed by `tokio::process`.
pub struct ProcessRunner;

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, invocation: &ToolInvocation) -> Result<(), ToolError> {
        log::debug!(
            "running {} {}",
            invocation.program,
            invocation.args.join(" ")
        );

        let output = tokio::process::Command::new(&invocation.program)
            .args(&invocation.args)
            .envs(invocation.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .output()
            .await
            .map_err(|e| ToolError::new(&invocation.program, e.to_string()))?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(ToolError::new(
                &invocation.program,
                format!("exit {:?}: {}", output.status.code(), stderr.trim()),
            ))
        }
    }
}

/// [`Toolchain`] backed by cargo, matching how the launcher itself is
/// built: `cargo bundle` for `.app` bundles, plain `cargo build`
/// otherwise. Build-time configuration (launcher name, manifest URL,
/// update base, version) is passed through the environment, where the
/// launcher's build script picks it up.
pub struct CargoToolchain {
    project_dir: PathBuf,
}

impl CargoToolchain {
    pub fn new(project_dir: PathBuf) -> Self {
        Self { project_dir }
    }

    fn build_envs(config: &ReleaseConfig) -> Vec<(String, String)> {
        let mut envs = vec![
            ("LAUNCHER_NAME".to_string(), config.display_name.clone()),
            ("VERSION".to_string(), config.version.clone()),
        ];
        if let Some(url) = &config.manifest_url {
            envs.push(("VERSION_MANIFEST_URL".to_string(), url.clone()));
        }
        if let Some(base) = &config.update_base {
            envs.push(("AUTO_UPDATE_BASE".to_string(), base.clone()));
        }
        envs
    }
}

#[async_trait]
impl Toolchain for CargoToolchain {
    async fn compile(
        &self,
        spec: &CompileSpec,
        config: &ReleaseConfig,
    ) -> Result<PathBuf, ToolError> {
        let subcommand = if spec.bundled { "bundle" } else { "build" };
        let mut command = tokio::process::Command::new("cargo");
        command
            .current_dir(&self.project_dir)
            .arg(subcommand)
            .arg("--release");

        let triple = spec.arch.map(MacArch::rust_triple);
        if let Some(triple) = triple {
            command.args(["--target", triple]);
        }
        if let Some(deployment_target) = spec.deployment_target {
            command.env("MACOSX_DEPLOYMENT_TARGET", deployment_target);
        }
        for (key, value) in Self::build_envs(config) {
            command.env(key, value);
        }

        log::info!(
            "compiling {} ({})",
            spec.target.os_tag(),
            triple.unwrap_or("host")
        );

        let output = command
            .output()
            .await
            .map_err(|e| ToolError::new("cargo", e.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ToolError::new(
                "cargo",
                format!("{subcommand} failed: {}", stderr.trim()),
            ));
        }

        let release_dir = match triple {
            Some(triple) => self.project_dir.join("target").join(triple).join("release"),
            None => self.project_dir.join("target/release"),
        };
        let path = if spec.bundled {
            release_dir
                .join("bundle/osx")
                .join(format!("{}.app", config.display_name))
        } else if spec.target == BuildTarget::Windows {
            release_dir.join(format!("{}.exe", config.data_name))
        } else {
            release_dir.join(&config.data_name)
        };

        if !path.exists() {
            return Err(ToolError::new(
                "cargo",
                format!("expected output missing: {}", path.display()),
            ));
        }
        Ok(path)
    }
}
