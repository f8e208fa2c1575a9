//! Secret gate: credential presence, never credential values.
//!
//! A missing credential is a defined skip, not an error. The gate is a
//! pure conjunction over presence flags and performs no I/O of its own;
//! the flags are snapshotted from the ambient store once per lane.

/// Environment variables the deploy steps read.
pub const ENV_DEPLOY_KEY: &str = "DEPLOY_KEY";
pub const ENV_DEPLOY_USER: &str = "DEPLOY_USER";
pub const ENV_DEPLOY_HOST: &str = "DEPLOY_HOST";
pub const ENV_DEPLOY_PATH: &str = "DEPLOY_PATH";
pub const ENV_DEPLOY_PURGE_HOOK: &str = "DEPLOY_PURGE_HOOK";

/// Credential classes the gate can require.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CredentialKind {
    /// Transfer key material
    TransferIdentity,
    /// Remote user, address, and path, all three
    TransferDestination,
    /// Post-deploy remote action reference
    RemoteAction,
}

/// Presence flags for the deploy credentials. Holds no values.
#[derive(Clone, Copy, Debug, Default)]
pub struct SecretAvailability {
    pub transfer_identity: bool,
    pub transfer_destination: bool,
    pub remote_action: bool,
}

fn present(var: &str) -> bool {
    std::env::var(var).map(|v| !v.is_empty()).unwrap_or(false)
}

impl SecretAvailability {
    /// Snapshots presence from the ambient environment. Values are not
    /// read into this struct and are never logged.
    pub fn from_env() -> Self {
        Self {
            transfer_identity: present(ENV_DEPLOY_KEY),
            transfer_destination: present(ENV_DEPLOY_USER)
                && present(ENV_DEPLOY_HOST)
                && present(ENV_DEPLOY_PATH),
            remote_action: present(ENV_DEPLOY_PURGE_HOOK),
        }
    }

    fn flag(&self, kind: CredentialKind) -> bool {
        match kind {
            CredentialKind::TransferIdentity => self.transfer_identity,
            CredentialKind::TransferDestination => self.transfer_destination,
            CredentialKind::RemoteAction => self.remote_action,
        }
    }

    /// True only if every required credential is present. Checks the full
    /// set rather than short-circuiting; the result is a pure AND.
    pub fn permits(&self, required: &[CredentialKind]) -> bool {
        required.iter().fold(true, |acc, kind| acc & self.flag(*kind))
    }
}
