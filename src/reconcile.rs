// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Remote repository reconciliation.
//!
//! Before anything gets copied, the remote repository is driven into a known
//! fresh state: if it exists it is deleted, and then it is created again as
//! an empty private repository. Old remote content is discarded on every
//! run. That is the whole point, because the staging tree is the only
//! source of truth for what the backup should contain.
//!
//! Every failure in here is fatal for the run. Copying into a repository
//! whose state we could not establish risks a partial overwrite, so no retry
//! or partial reconciliation is attempted.

use crate::{
    config::RemoteSettings,
    hosting::{HostingApi, Identity, RemoteEndpoint, RepoStatus, Visibility},
};

use tracing::{info, instrument, warn};

/// Drive a remote repository to a freshly created state.
#[derive(Debug)]
pub struct Reconciler<'a, H>
where
    H: HostingApi,
{
    host: &'a H,
    settings: &'a RemoteSettings,
}

impl<'a, H> Reconciler<'a, H>
where
    H: HostingApi,
{
    /// Construct new reconciler.
    pub fn new(host: &'a H, settings: &'a RemoteSettings) -> Self {
        Self { host, settings }
    }

    /// Delete then recreate target repository, and return its clone URL.
    ///
    /// An indeterminate existence check is treated as absence. Creation is
    /// still attempted, and will fail loudly if the repository turns out to
    /// exist after all.
    ///
    /// # Errors
    ///
    /// - Return [`ReconcileError::Unauthenticated`] if the session is not
    ///   authenticated.
    /// - Return [`ReconcileError::Delete`] if existing repository cannot be
    ///   deleted.
    /// - Return [`ReconcileError::Create`] if repository cannot be created.
    #[instrument(skip(self), level = "debug")]
    pub fn reconcile(&self, identity: &Identity, repo_name: &str) -> Result<RemoteEndpoint> {
        info!("checking GitHub repository status");
        self.host
            .auth_status()
            .map_err(ReconcileError::Unauthenticated)?;

        let owner = identity.as_str();
        match self.host.get_repo(owner, repo_name) {
            RepoStatus::Exists => {
                info!("deleting existing repository: {owner}/{repo_name}");
                self.host
                    .delete_repo(owner, repo_name)
                    .map_err(|source| ReconcileError::Delete {
                        source,
                        repository: format!("{owner}/{repo_name}"),
                    })?;
            }
            RepoStatus::NotFound => info!("repository {owner}/{repo_name} does not exist yet"),
            RepoStatus::Unknown(reason) => {
                warn!("cannot determine whether {owner}/{repo_name} exists: {reason}");
            }
        }

        self.host
            .create_repo(repo_name, Visibility::Private, &self.settings.description)
            .map_err(|source| ReconcileError::Create {
                source,
                repository: format!("{owner}/{repo_name}"),
            })?;
        info!("successfully created repository: {repo_name}");

        Ok(self.host.endpoint(owner, repo_name))
    }
}

/// Reconciliation error types.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// Session is not authenticated with hosting service.
    #[error("not authenticated with GitHub, please run 'gh auth login' first")]
    Unauthenticated(#[source] crate::hosting::HostingError),

    /// Existing repository cannot be deleted.
    #[error("failed to delete existing repository {repository}")]
    Delete {
        #[source]
        source: crate::hosting::HostingError,
        repository: String,
    },

    /// Repository cannot be created.
    #[error("failed to create repository {repository}")]
    Create {
        #[source]
        source: crate::hosting::HostingError,
        repository: String,
    },
}

/// Friendly result alias :3
type Result<T, E = ReconcileError> = std::result::Result<T, E>;
