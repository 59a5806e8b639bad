// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Code hosting service access.
//!
//! Dotback publishes the staging tree to a repository on a code hosting
//! service. Everything it needs from that service sits behind the
//! [`HostingApi`] trait, so the reconciliation logic never has to know how
//! requests actually get made. The stock implementation, [`GhCli`], drives
//! the GitHub CLI, which keeps authentication entirely in the hands of
//! `gh auth login`.

use crate::syscall::syscall_non_interactive;

use std::fmt::{Display, Formatter, Result as FmtResult};
use tracing::{debug, info, instrument, warn};

/// Account name on the hosting service.
///
/// Resolved once per run, and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    /// Construct new identity.
    pub fn new(login: impl Into<String>) -> Self {
        Self(login.into())
    }

    /// Treat identity as string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for Identity {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.as_str())
    }
}

/// Clone URL of a remote repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteEndpoint(String);

impl RemoteEndpoint {
    /// Construct new endpoint from raw URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// Derive HTTPS clone URL of form `https://<host>/<owner>/<name>.git`.
    pub fn https(host: &str, owner: &str, name: &str) -> Self {
        Self(format!("https://{host}/{owner}/{name}.git"))
    }

    /// Treat endpoint as string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for RemoteEndpoint {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.as_str())
    }
}

/// Existence of a remote repository.
///
/// A lookup can fail for reasons that have nothing to do with the
/// repository, e.g., rate limiting or a flaky network. Those failures are
/// kept apart from a definite "not found" answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoStatus {
    /// Repository exists.
    Exists,

    /// Hosting service definitely reported that repository does not exist.
    NotFound,

    /// Lookup failed in some other way.
    Unknown(String),
}

/// Visibility of created repository.
///
/// Backups carry personal configuration, so repositories are always
/// created private.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    #[default]
    Private,
}

impl Visibility {
    /// Repository is hidden from anyone but its owner.
    pub fn is_private(&self) -> bool {
        matches!(self, Self::Private)
    }
}

/// Layer of indirection for hosting service access.
#[cfg_attr(test, mockall::automock)]
pub trait HostingApi {
    /// Check that the current session is authenticated.
    fn auth_status(&self) -> Result<()>;

    /// Login name of authenticated user, if the service can tell us.
    fn current_login(&self) -> Result<Option<String>>;

    /// Look up existence of repository with one request.
    fn get_repo(&self, owner: &str, name: &str) -> RepoStatus;

    /// Delete repository.
    fn delete_repo(&self, owner: &str, name: &str) -> Result<()>;

    /// Create repository owned by authenticated user.
    fn create_repo(&self, name: &str, visibility: Visibility, description: &str) -> Result<()>;

    /// Clone URL of repository. Must be deterministic.
    fn endpoint(&self, owner: &str, name: &str) -> RemoteEndpoint;
}

/// Hosting service access through the GitHub CLI.
#[derive(Debug, Clone)]
pub struct GhCli {
    host: String,
}

impl GhCli {
    /// Construct new GitHub CLI client for target host, e.g., "github.com".
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    fn gh(&self, args: &[&str]) -> Result<crate::syscall::Output> {
        syscall_non_interactive("gh", args).map_err(HostingError::Spawn)
    }
}

impl Default for GhCli {
    fn default() -> Self {
        Self::new("github.com")
    }
}

impl HostingApi for GhCli {
    #[instrument(skip(self), level = "debug")]
    fn auth_status(&self) -> Result<()> {
        let output = self.gh(&["auth", "status", "--hostname", self.host.as_str()])?;
        if !output.success {
            return Err(HostingError::Unauthenticated(output.message()));
        }

        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn current_login(&self) -> Result<Option<String>> {
        let output = self.gh(&["api", "user", "--jq", ".login"])?;
        if !output.success {
            warn!("cannot get login through gh: {}", output.message());
            return Ok(None);
        }

        let login = output.stdout.trim();
        Ok((!login.is_empty()).then(|| login.to_string()))
    }

    #[instrument(skip(self), level = "debug")]
    fn get_repo(&self, owner: &str, name: &str) -> RepoStatus {
        let route = format!("/repos/{owner}/{name}");
        match self.gh(&["api", route.as_str(), "--silent"]) {
            Ok(output) => classify_repo_lookup(output.success, &output.stderr),
            Err(error) => RepoStatus::Unknown(error.to_string()),
        }
    }

    #[instrument(skip(self), level = "debug")]
    fn delete_repo(&self, owner: &str, name: &str) -> Result<()> {
        let route = format!("/repos/{owner}/{name}");
        let output = self.gh(&["api", route.as_str(), "--method", "DELETE"])?;
        if !output.success {
            return Err(HostingError::Request(output.message()));
        }

        Ok(())
    }

    #[instrument(skip(self, description), level = "debug")]
    fn create_repo(&self, name: &str, visibility: Visibility, description: &str) -> Result<()> {
        let name = format!("name={name}");
        let private = format!("private={}", visibility.is_private());
        let description = format!("description={description}");
        let output = self.gh(&[
            "api",
            "/user/repos",
            "--method",
            "POST",
            "-f",
            name.as_str(),
            "-F",
            private.as_str(),
            "-f",
            description.as_str(),
        ])?;
        if !output.success {
            return Err(HostingError::Request(output.message()));
        }

        Ok(())
    }

    fn endpoint(&self, owner: &str, name: &str) -> RemoteEndpoint {
        RemoteEndpoint::https(self.host.as_str(), owner, name)
    }
}

/// Classify outcome of repository lookup.
///
/// Only an explicit "Not Found" answer from the API counts as absence.
pub fn classify_repo_lookup(success: bool, stderr: &str) -> RepoStatus {
    if success {
        return RepoStatus::Exists;
    }

    if stderr.contains("Not Found") || stderr.contains("HTTP 404") {
        return RepoStatus::NotFound;
    }

    RepoStatus::Unknown(stderr.trim().to_string())
}

/// Resolve identity of operator.
///
/// Asks the hosting service first, then falls back to the given lookup,
/// which is normally [`git_config_user`].
///
/// # Errors
///
/// - Return [`IdentityError::Unresolved`] if neither source yields a
///   non-empty login name.
#[instrument(skip(host, fallback), level = "debug")]
pub fn resolve_identity(
    host: &impl HostingApi,
    fallback: impl FnOnce() -> Option<String>,
) -> Result<Identity, IdentityError> {
    match host.current_login() {
        Ok(Some(login)) => {
            info!("using GitHub username: {login}");
            return Ok(Identity::new(login));
        }
        Ok(None) => debug!("hosting service did not report a login"),
        Err(error) => warn!("cannot get login from hosting service: {error}"),
    }

    match fallback().map(|login| login.trim().to_string()) {
        Some(login) if !login.is_empty() => {
            info!("using GitHub username from git config: {login}");
            Ok(Identity::new(login))
        }
        _ => Err(IdentityError::Unresolved),
    }
}

/// Read `github.user` from the user's git configuration.
pub fn git_config_user() -> Option<String> {
    git2::Config::open_default()
        .and_then(|config| config.get_string("github.user"))
        .ok()
}

/// Hosting service error types.
#[derive(Debug, thiserror::Error)]
pub enum HostingError {
    /// Hosting client binary cannot be spawned.
    #[error("failed to run hosting client")]
    Spawn(#[source] std::io::Error),

    /// Session is not authenticated.
    #[error("not authenticated with hosting service: {0}")]
    Unauthenticated(String),

    /// Request was rejected or failed.
    #[error("hosting request failed: {0}")]
    Request(String),
}

/// Identity resolution error types.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// No source could tell us who the operator is.
    #[error(
        "could not determine GitHub username, please run: \
         git config --global github.user YOUR_GITHUB_USERNAME"
    )]
    Unresolved,
}

/// Friendly result alias :3
type Result<T, E = HostingError> = std::result::Result<T, E>;
