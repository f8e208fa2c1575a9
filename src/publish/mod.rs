//! Artifact publisher and post-deploy notifier.
//!
//! Both are deploy-gated: they run only on the release branch with a
//! green upstream and with their full credential set present. The
//! transport itself sits behind the [`Transfer`] trait; the production
//! backend shells out to scp/ssh. Transfer failures are fatal for the
//! lane and are never retried.

use std::io::Write;
use std::path::Path;

use async_trait::async_trait;

use crate::error::{PipelineError, Result, ToolError};
use crate::packager::Artifact;
use crate::pipeline::CredentialKind;
use crate::pipeline::secrets::{
    ENV_DEPLOY_HOST, ENV_DEPLOY_KEY, ENV_DEPLOY_PATH, ENV_DEPLOY_PURGE_HOOK, ENV_DEPLOY_USER,
};

/// Credentials the publisher requires.
pub const PUBLISH_CREDENTIALS: [CredentialKind; 2] = [
    CredentialKind::TransferIdentity,
    CredentialKind::TransferDestination,
];

/// Credentials the notifier requires.
pub const NOTIFY_CREDENTIALS: [CredentialKind; 3] = [
    CredentialKind::TransferIdentity,
    CredentialKind::TransferDestination,
    CredentialKind::RemoteAction,
];

/// Remote file transfer and remote invocation, as the pipeline consumes
/// them: success or failure, nothing more.
#[async_trait]
pub trait Transfer: Send + Sync {
    /// Uploads one local file to the remote destination under `remote_name`.
    async fn upload(&self, local: &Path, remote_name: &str) -> std::result::Result<(), ToolError>;

    /// Invokes the configured post-deploy remote action.
    async fn invoke_remote(&self) -> std::result::Result<(), ToolError>;
}

/// Uploads every artifact of a lane. Any failure aborts immediately;
/// partial uploads are a deploy failure, not a retry case.
pub async fn publish_artifacts(transfer: &dyn Transfer, artifacts: &[Artifact]) -> Result<()> {
    for artifact in artifacts {
        let name = artifact
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                PipelineError::Transfer(format!(
                    "artifact without a file name: {}",
                    artifact.path.display()
                ))
            })?;
        transfer
            .upload(&artifact.path, &name)
            .await
            .map_err(|e| PipelineError::Transfer(format!("uploading {name}: {e}")))?;
        log::info!("published {name}");
    }
    Ok(())
}

/// Fires the post-deploy action.
pub async fn notify(transfer: &dyn Transfer) -> Result<()> {
    transfer
        .invoke_remote()
        .await
        .map_err(|e| PipelineError::Transfer(format!("post-deploy action: {e}")))
}

/// Destination for artifact uploads.
#[derive(Clone, Debug)]
pub struct DeployEndpoint {
    pub user: String,
    pub host: String,
    pub remote_path: String,
}

/// Credential values, read from the environment only when the transfer
/// backend is actually constructed. Not part of any gating decision and
/// never logged.
pub struct DeployCredentials {
    pub key_material: String,
    pub endpoint: DeployEndpoint,
    pub purge_hook: Option<String>,
}

impl DeployCredentials {
    /// Reads the full credential set; None when anything required for
    /// transfers is absent.
    pub fn from_env() -> Option<Self> {
        let non_empty = |var: &str| std::env::var(var).ok().filter(|v| !v.is_empty());
        Some(Self {
            key_material: non_empty(ENV_DEPLOY_KEY)?,
            endpoint: DeployEndpoint {
                user: non_empty(ENV_DEPLOY_USER)?,
                host: non_empty(ENV_DEPLOY_HOST)?,
                remote_path: non_empty(ENV_DEPLOY_PATH)?,
            },
            purge_hook: non_empty(ENV_DEPLOY_PURGE_HOOK),
        })
    }
}

/// Production [`Transfer`]: scp for uploads, ssh for the remote action.
/// The key material is written to a private temp file that lives as long
/// as the transfer does.
pub struct ScpTransfer {
    key_file: tempfile::NamedTempFile,
    endpoint: DeployEndpoint,
    purge_hook: Option<String>,
}

impl ScpTransfer {
    pub fn new(credentials: DeployCredentials) -> Result<Self> {
        let mut key_file = tempfile::NamedTempFile::new()?;
        key_file.write_all(credentials.key_material.as_bytes())?;
        key_file.flush()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(key_file.path(), std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(Self {
            key_file,
            endpoint: credentials.endpoint,
            purge_hook: credentials.purge_hook,
        })
    }

    fn common_args(&self) -> Vec<String> {
        vec![
            "-i".to_string(),
            self.key_file.path().display().to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
        ]
    }

    async fn run_tool(program: &str, args: Vec<String>) -> std::result::Result<(), ToolError> {
        let output = tokio::process::Command::new(program)
            .args(&args)
            .output()
            .await
            .map_err(|e| ToolError::new(program, e.to_string()))?;
        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(ToolError::new(
                program,
                format!("exit {:?}: {}", output.status.code(), stderr.trim()),
            ))
        }
    }
}

#[async_trait]
impl Transfer for ScpTransfer {
    async fn upload(&self, local: &Path, remote_name: &str) -> std::result::Result<(), ToolError> {
        let mut args = self.common_args();
        args.push(local.display().to_string());
        args.push(format!(
            "{}@{}:{}/{}",
            self.endpoint.user, self.endpoint.host, self.endpoint.remote_path, remote_name
        ));
        Self::run_tool("scp", args).await
    }

    async fn invoke_remote(&self) -> std::result::Result<(), ToolError> {
        let Some(action) = &self.purge_hook else {
            return Err(ToolError::new("ssh", "no remote action configured"));
        };
        let mut args = self.common_args();
        args.push(format!("{}@{}", self.endpoint.user, self.endpoint.host));
        args.push(action.clone());
        Self::run_tool("ssh", args).await
    }
}
