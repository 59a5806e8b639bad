// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Local repository synchronization.
//!
//! Turn the staging tree into a commit, and push it to the reconciled
//! remote. The synchronizer is the only part of dotback that creates
//! commits or pushes.
//!
//! # Repository Metadata Lifecycle
//!
//! 1. __Uninitialized → initialized__: only when repository metadata is
//!    missing. The repository is created with the configured default branch,
//!    and the gitignore rules are written. The gitignore file is never
//!    touched again afterwards, since the operator may have customized it.
//! 2. __Remote binding refresh__: on every run the remote binding is removed
//!    and added again, because reconciliation may have produced a brand new
//!    repository under the same name. The binding is read back, and a
//!    mismatch aborts the run.
//! 3. __Commit__: everything gets staged and committed. Nothing to commit is
//!    an expected outcome. Any other commit failure is reported, but is not
//!    fatal.
//! 4. __Push__: failure is reported along with the exact command to retry
//!    by hand. By this point the expensive work is already durable locally,
//!    so the run still succeeds.

use crate::{
    config::RemoteSettings,
    hosting::RemoteEndpoint,
    staging::StagingTree,
    vcs::{CommitOutcome, VersionControl},
};

use std::{fs::OpenOptions, io::Write, path::PathBuf};
use tracing::{info, instrument, warn};

/// Outcome of synchronizing staging tree with remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Repository metadata was created during this run.
    pub initialized: bool,

    pub commit: CommitStatus,

    pub push: PushStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitStatus {
    Committed(String),
    NothingToCommit,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushStatus {
    Pushed,
    Failed { reason: String, recovery: String },
}

/// Publish staging tree to remote repository.
#[derive(Debug)]
pub struct Synchronizer<'a, V>
where
    V: VersionControl,
{
    vcs: &'a V,
    settings: &'a RemoteSettings,
    ignore: &'a [String],
}

impl<'a, V> Synchronizer<'a, V>
where
    V: VersionControl,
{
    /// Construct new synchronizer.
    ///
    /// The ignore rules are only ever written into a staging tree whose
    /// repository metadata does not exist yet.
    pub fn new(vcs: &'a V, settings: &'a RemoteSettings, ignore: &'a [String]) -> Self {
        Self {
            vcs,
            settings,
            ignore,
        }
    }

    /// Commit staging tree, and push it to target endpoint.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::Vcs`] if repository cannot be initialized,
    ///   remote binding cannot be set, or changes cannot be staged.
    /// - Return [`SyncError::WriteIgnore`] if gitignore rules cannot be
    ///   written on first run.
    /// - Return [`SyncError::RemoteMismatch`] if remote binding does not
    ///   point at target endpoint after being set.
    #[instrument(skip(self, staging), level = "debug")]
    pub fn sync_to_remote(
        &self,
        staging: &StagingTree,
        endpoint: &RemoteEndpoint,
    ) -> Result<SyncReport> {
        let remote = self.settings.remote_name.as_str();
        let branch = self.settings.branch.as_str();

        let initialized = !self.vcs.is_initialized();
        if initialized {
            self.vcs.init(branch)?;
            self.write_ignore_rules(staging)?;
        }

        self.vcs.remote_remove(remote)?;
        self.vcs.remote_add(remote, endpoint.as_str())?;
        let listing = self.vcs.remote_list()?;
        if !binding_matches(&listing, remote, endpoint.as_str()) {
            return Err(SyncError::RemoteMismatch {
                expected: endpoint.to_string(),
                found: listing,
            });
        }

        self.vcs.add_all()?;
        let message = format!("Backup update {}", chrono::Local::now().to_rfc3339());
        let commit = match self.vcs.commit(&message) {
            Ok(CommitOutcome::Committed(id)) => {
                info!("committed changes as {id}");
                CommitStatus::Committed(id)
            }
            Ok(CommitOutcome::NothingToCommit) => {
                info!("no changes to commit");
                CommitStatus::NothingToCommit
            }
            Err(error) => {
                warn!("failed to commit changes: {error}");
                CommitStatus::Failed(error.to_string())
            }
        };

        let push = match self.vcs.push(remote, branch, true) {
            Ok(()) => {
                info!("pushed to remote");
                PushStatus::Pushed
            }
            Err(error) => {
                let recovery = format!(
                    "cd {} && git push -u {remote} {branch}",
                    staging.root().display()
                );
                warn!("error pushing to remote: {error}");
                warn!("manual push may be needed: {recovery}");
                PushStatus::Failed {
                    reason: error.to_string(),
                    recovery,
                }
            }
        };

        Ok(SyncReport {
            initialized,
            commit,
            push,
        })
    }

    fn write_ignore_rules(&self, staging: &StagingTree) -> Result<()> {
        let path = staging.gitignore_path();

        // INVARIANT: First write wins, never replace an existing file.
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                info!("keeping existing {:?}", path.display());
                return Ok(());
            }
            Err(err) => return Err(SyncError::WriteIgnore { source: err, path }),
        };

        let mut rules = self.ignore.join("\n");
        rules.push('\n');
        file.write_all(rules.as_bytes())
            .map_err(|err| SyncError::WriteIgnore { source: err, path })?;

        Ok(())
    }
}

/// Check `git remote -v` shaped listing for binding of remote to URL.
fn binding_matches(listing: &str, remote: &str, url: &str) -> bool {
    listing.lines().any(|line| {
        let mut fields = line.split_whitespace();
        fields.next() == Some(remote) && fields.next() == Some(url)
    })
}

/// Synchronization error types.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Version control operation failed.
    #[error(transparent)]
    Vcs(#[from] crate::vcs::VcsError),

    /// Gitignore rules cannot be written.
    #[error("failed to write gitignore rules at {:?}", path.display())]
    WriteIgnore {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Remote binding does not point at expected endpoint.
    #[error("remote URL verification failed, expected {expected}, current remotes:\n{found}")]
    RemoteMismatch { expected: String, found: String },
}

/// Friendly result alias :3
type Result<T, E = SyncError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcs::VcsError;
    use pretty_assertions::assert_eq;
    use std::cell::{Cell, RefCell};

    /// In-memory version control that remembers what was asked of it.
    #[derive(Debug, Default)]
    struct FakeVcs {
        initialized: Cell<bool>,
        remotes: RefCell<Vec<(String, String)>>,
        tampered_url: Option<String>,
        commits: RefCell<Vec<String>>,
        dirty: Cell<bool>,
        fail_commit: bool,
        fail_push: bool,
        calls: RefCell<Vec<String>>,
    }

    impl FakeVcs {
        fn log(&self, call: impl Into<String>) {
            self.calls.borrow_mut().push(call.into());
        }
    }

    impl VersionControl for FakeVcs {
        fn is_initialized(&self) -> bool {
            self.initialized.get()
        }

        fn init(&self, default_branch: &str) -> crate::vcs::Result<()> {
            self.log(format!("init {default_branch}"));
            self.initialized.set(true);
            self.dirty.set(true);
            Ok(())
        }

        fn remote_remove(&self, name: &str) -> crate::vcs::Result<()> {
            self.log(format!("remote remove {name}"));
            self.remotes.borrow_mut().retain(|(remote, _)| remote != name);
            Ok(())
        }

        fn remote_add(&self, name: &str, url: &str) -> crate::vcs::Result<()> {
            self.log(format!("remote add {name}"));
            let url = self.tampered_url.clone().unwrap_or_else(|| url.to_string());
            self.remotes.borrow_mut().push((name.to_string(), url));
            Ok(())
        }

        fn remote_list(&self) -> crate::vcs::Result<String> {
            Ok(self
                .remotes
                .borrow()
                .iter()
                .map(|(name, url)| format!("{name}\t{url} (fetch)\n{name}\t{url} (push)\n"))
                .collect())
        }

        fn add_all(&self) -> crate::vcs::Result<()> {
            self.log("add");
            Ok(())
        }

        fn commit(&self, message: &str) -> crate::vcs::Result<CommitOutcome> {
            self.log("commit");
            if self.fail_commit {
                return Err(VcsError::Git2(git2::Error::from_str("index is locked")));
            }
            if !self.dirty.replace(false) {
                return Ok(CommitOutcome::NothingToCommit);
            }
            self.commits.borrow_mut().push(message.to_string());
            Ok(CommitOutcome::Committed(format!("{:040}", self.commits.borrow().len())))
        }

        fn push(&self, remote: &str, branch: &str, set_upstream: bool) -> crate::vcs::Result<()> {
            self.log(format!("push {remote} {branch} {set_upstream}"));
            if self.fail_push {
                return Err(VcsError::Git2(git2::Error::from_str("could not resolve host")));
            }
            Ok(())
        }
    }

    fn endpoint() -> RemoteEndpoint {
        RemoteEndpoint::https("github.com", "alice", "home_backup")
    }

    #[test]
    fn first_run_initializes_commits_and_pushes() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let staging = StagingTree::open(dir.path())?;
        let vcs = FakeVcs::default();
        let settings = RemoteSettings::default();
        let ignore = vec!["*.pyc".to_string(), "__pycache__/".to_string()];

        let report =
            Synchronizer::new(&vcs, &settings, &ignore).sync_to_remote(&staging, &endpoint())?;

        assert!(report.initialized);
        assert!(matches!(report.commit, CommitStatus::Committed(_)));
        assert_eq!(report.push, PushStatus::Pushed);
        assert_eq!(
            *vcs.calls.borrow(),
            vec![
                "init main",
                "remote remove origin",
                "remote add origin",
                "add",
                "commit",
                "push origin main true",
            ]
        );
        assert!(vcs.commits.borrow()[0].starts_with("Backup update "));
        assert_eq!(
            std::fs::read_to_string(staging.gitignore_path())?,
            "*.pyc\n__pycache__/\n"
        );

        Ok(())
    }

    #[test]
    fn unchanged_tree_is_nothing_to_commit() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let staging = StagingTree::open(dir.path())?;
        let vcs = FakeVcs::default();
        let settings = RemoteSettings::default();
        let sync = Synchronizer::new(&vcs, &settings, &[]);

        sync.sync_to_remote(&staging, &endpoint())?;
        let report = sync.sync_to_remote(&staging, &endpoint())?;

        assert!(!report.initialized);
        assert_eq!(report.commit, CommitStatus::NothingToCommit);
        assert_eq!(vcs.remotes.borrow().len(), 1);

        Ok(())
    }

    #[test]
    fn existing_gitignore_survives_initialization() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let staging = StagingTree::open(dir.path())?;
        std::fs::write(staging.gitignore_path(), "secrets/\n")?;
        let vcs = FakeVcs::default();
        let settings = RemoteSettings::default();
        let ignore = vec!["*.pyc".to_string()];

        Synchronizer::new(&vcs, &settings, &ignore).sync_to_remote(&staging, &endpoint())?;

        assert_eq!(std::fs::read_to_string(staging.gitignore_path())?, "secrets/\n");
        Ok(())
    }

    #[test]
    fn binding_mismatch_is_fatal() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let staging = StagingTree::open(dir.path())?;
        let vcs = FakeVcs {
            tampered_url: Some("https://example.com/mallory/home_backup.git".into()),
            ..FakeVcs::default()
        };
        let settings = RemoteSettings::default();

        let result =
            Synchronizer::new(&vcs, &settings, &[]).sync_to_remote(&staging, &endpoint());

        assert!(matches!(result, Err(SyncError::RemoteMismatch { .. })));
        assert!(!vcs.calls.borrow().iter().any(|call| call == "commit"));
        Ok(())
    }

    #[test]
    fn push_failure_is_reported_with_recovery_command() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let staging = StagingTree::open(dir.path())?;
        let vcs = FakeVcs {
            fail_push: true,
            ..FakeVcs::default()
        };
        let settings = RemoteSettings::default();

        let report =
            Synchronizer::new(&vcs, &settings, &[]).sync_to_remote(&staging, &endpoint())?;

        match report.push {
            PushStatus::Failed { reason, recovery } => {
                assert!(reason.contains("could not resolve host"));
                assert_eq!(
                    recovery,
                    format!("cd {} && git push -u origin main", dir.path().display())
                );
            }
            PushStatus::Pushed => panic!("push should have failed"),
        }
        assert!(matches!(report.commit, CommitStatus::Committed(_)));
        Ok(())
    }

    #[test]
    fn commit_failure_still_pushes() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let staging = StagingTree::open(dir.path())?;
        let vcs = FakeVcs {
            fail_commit: true,
            ..FakeVcs::default()
        };
        let settings = RemoteSettings::default();

        let report =
            Synchronizer::new(&vcs, &settings, &[]).sync_to_remote(&staging, &endpoint())?;

        match &report.commit {
            CommitStatus::Failed(reason) => assert!(reason.contains("index is locked")),
            other => panic!("commit should have failed, got {other:?}"),
        }
        assert_eq!(report.push, PushStatus::Pushed);
        assert_eq!(vcs.calls.borrow().last().map(String::as_str), Some("push origin main true"));
        assert!(vcs.commits.borrow().is_empty());

        Ok(())
    }

    #[test]
    fn binding_lookup_requires_exact_remote_and_url() {
        let listing = "origin\thttps://github.com/alice/home_backup.git (fetch)\n";
        assert!(binding_matches(listing, "origin", "https://github.com/alice/home_backup.git"));
        assert!(!binding_matches(listing, "upstream", "https://github.com/alice/home_backup.git"));
        assert!(!binding_matches(listing, "origin", "https://github.com/alice/home_backup"));
    }
}
