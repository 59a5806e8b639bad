// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Version control of the staging tree.
//!
//! The synchronizer only needs a handful of operations from version
//! control. They are modeled through the [`VersionControl`] trait so the
//! synchronization logic can be exercised without touching a real
//! repository. The stock implementation, [`Git2Vcs`], does everything in
//! process through libgit2.

use auth_git2::GitAuthenticator;
use git2::{
    Commit, ErrorCode, IndexAddOption, IndexMatchedPath, PushOptions, RemoteCallbacks,
    Repository, RepositoryInitOptions,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Outcome of a commit attempt that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// New commit with given object id.
    Committed(String),

    /// Staged tree is identical to the tree of `HEAD`.
    NothingToCommit,
}

/// Version control operations needed to publish the staging tree.
pub trait VersionControl {
    /// Repository metadata exists.
    fn is_initialized(&self) -> bool;

    /// Create repository metadata with target default branch.
    fn init(&self, default_branch: &str) -> Result<()>;

    /// Remove remote binding. Removing a missing binding is not an error.
    fn remote_remove(&self, name: &str) -> Result<()>;

    /// Add remote binding.
    fn remote_add(&self, name: &str, url: &str) -> Result<()>;

    /// List remote bindings like `git remote -v` does.
    fn remote_list(&self) -> Result<String>;

    /// Stage every change in the work tree, honoring gitignore rules.
    ///
    /// Nested repositories are left out with a warning.
    fn add_all(&self) -> Result<()>;

    /// Commit staged changes.
    fn commit(&self, message: &str) -> Result<CommitOutcome>;

    /// Push branch to remote, optionally recording it as upstream.
    fn push(&self, remote: &str, branch: &str, set_upstream: bool) -> Result<()>;
}

/// Version control through libgit2.
#[derive(Debug, Clone)]
pub struct Git2Vcs {
    work_tree: PathBuf,
}

impl Git2Vcs {
    /// Construct new libgit2 version control over target work tree.
    pub fn new(work_tree: impl Into<PathBuf>) -> Self {
        Self {
            work_tree: work_tree.into(),
        }
    }

    pub fn work_tree(&self) -> &Path {
        self.work_tree.as_path()
    }

    fn repo(&self) -> Result<Repository> {
        Ok(Repository::open(&self.work_tree)?)
    }
}

impl VersionControl for Git2Vcs {
    fn is_initialized(&self) -> bool {
        self.work_tree.join(".git").exists()
    }

    #[instrument(skip(self), level = "debug")]
    fn init(&self, default_branch: &str) -> Result<()> {
        info!("initialize repository at {:?}", self.work_tree.display());
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head(default_branch);
        Repository::init_opts(&self.work_tree, &opts)?;

        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn remote_remove(&self, name: &str) -> Result<()> {
        match self.repo()?.remote_delete(name) {
            Err(err) if err.code() == ErrorCode::NotFound => {
                debug!("no remote named {name} to remove");
                Ok(())
            }
            result => Ok(result?),
        }
    }

    #[instrument(skip(self), level = "debug")]
    fn remote_add(&self, name: &str, url: &str) -> Result<()> {
        self.repo()?.remote(name, url)?;
        Ok(())
    }

    fn remote_list(&self) -> Result<String> {
        let repo = self.repo()?;
        let mut listing = String::new();
        for name in repo.remotes()?.iter().flatten() {
            let remote = repo.find_remote(name)?;
            let fetch = remote.url().unwrap_or_default();
            let push = remote.pushurl().unwrap_or(fetch);
            listing.push_str(format!("{name}\t{fetch} (fetch)\n").as_str());
            listing.push_str(format!("{name}\t{push} (push)\n").as_str());
        }

        Ok(listing)
    }

    #[instrument(skip(self), level = "debug")]
    fn add_all(&self) -> Result<()> {
        let repo = self.repo()?;
        let mut index = repo.index()?;

        // INVARIANT: Nested repositories cannot be staged as plain content,
        //   so leave them out instead of failing the whole commit.
        let mut skip_nested = |path: &Path, _: &[u8]| -> i32 {
            if is_nested_repo(&self.work_tree, path) {
                warn!("skip nested repository {:?}", path.display());
                1
            } else {
                0
            }
        };
        index.add_all(
            ["*"],
            IndexAddOption::DEFAULT,
            Some(&mut skip_nested as &mut IndexMatchedPath),
        )?;

        // INVARIANT: Stage deletions too.
        index.update_all(["*"], None)?;
        index.write()?;

        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    fn commit(&self, message: &str) -> Result<CommitOutcome> {
        let repo = self.repo()?;
        let mut index = repo.index()?;
        let tree_oid = index.write_tree()?;

        // INVARIANT: Unborn branch has no parent.
        let parent = repo.head().ok().and_then(|head| head.peel_to_commit().ok());
        let unchanged = match &parent {
            Some(parent) => parent.tree_id() == tree_oid,
            None => index.is_empty(),
        };
        if unchanged {
            return Ok(CommitOutcome::NothingToCommit);
        }

        let tree = repo.find_tree(tree_oid)?;
        let signature = repo.signature()?;
        let parents = parent.iter().collect::<Vec<&Commit>>();
        let oid = repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &parents,
        )?;

        Ok(CommitOutcome::Committed(oid.to_string()))
    }

    #[instrument(skip(self), level = "debug")]
    fn push(&self, remote: &str, branch: &str, set_upstream: bool) -> Result<()> {
        let repo = self.repo()?;
        let mut handle = repo.find_remote(remote)?;
        let config = repo.config()?;
        let authenticator = GitAuthenticator::default();

        let mut rc = RemoteCallbacks::new();
        rc.credentials(authenticator.credentials(&config));
        rc.push_update_reference(|refname, status| match status {
            Some(message) => Err(git2::Error::from_str(
                format!("remote rejected {refname}: {message}").as_str(),
            )),
            None => Ok(()),
        });

        let mut opts = PushOptions::new();
        opts.remote_callbacks(rc);
        let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
        handle.push(&[refspec.as_str()], Some(&mut opts))?;

        if set_upstream {
            let mut config = repo.config()?;
            config.set_str(format!("branch.{branch}.remote").as_str(), remote)?;
            config.set_str(
                format!("branch.{branch}.merge").as_str(),
                format!("refs/heads/{branch}").as_str(),
            )?;
        }

        Ok(())
    }
}

/// Path relative to work tree is a directory holding its own repository.
fn is_nested_repo(work_tree: &Path, path: &Path) -> bool {
    let path = work_tree.join(path);
    path != work_tree && path.is_dir() && path.join(".git").exists()
}

/// Version control error types.
#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),
}

/// Friendly result alias :3
pub type Result<T, E = VcsError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn fixture() -> anyhow::Result<(tempfile::TempDir, Git2Vcs)> {
        let dir = tempfile::tempdir()?;
        let vcs = Git2Vcs::new(dir.path());
        vcs.init("main")?;

        // INVARIANT: Always provide valid name and email.
        let mut config = vcs.repo()?.config()?;
        config.set_str("user.name", "John Doe")?;
        config.set_str("user.email", "john@doe.com")?;

        Ok((dir, vcs))
    }

    #[test]
    fn init_uses_default_branch() -> anyhow::Result<()> {
        let (_dir, vcs) = fixture()?;
        assert!(vcs.is_initialized());
        let repo = vcs.repo()?;
        assert_eq!(repo.find_reference("HEAD")?.symbolic_target(), Some("refs/heads/main"));
        Ok(())
    }

    #[test]
    fn remote_binding_is_replaced() -> anyhow::Result<()> {
        let (_dir, vcs) = fixture()?;

        vcs.remote_remove("origin")?;
        vcs.remote_add("origin", "https://github.com/alice/old.git")?;
        vcs.remote_remove("origin")?;
        vcs.remote_add("origin", "https://github.com/alice/home_backup.git")?;

        assert_eq!(
            vcs.remote_list()?,
            "origin\thttps://github.com/alice/home_backup.git (fetch)\n\
             origin\thttps://github.com/alice/home_backup.git (push)\n"
        );
        Ok(())
    }

    #[test]
    fn second_commit_of_same_tree_is_nothing_to_commit() -> anyhow::Result<()> {
        let (dir, vcs) = fixture()?;
        assert_eq!(vcs.commit("empty")?, CommitOutcome::NothingToCommit);

        fs::write(dir.path().join("README.md"), "# Backup\n")?;
        vcs.add_all()?;
        assert!(matches!(vcs.commit("first")?, CommitOutcome::Committed(_)));

        vcs.add_all()?;
        assert_eq!(vcs.commit("second")?, CommitOutcome::NothingToCommit);

        fs::remove_file(dir.path().join("README.md"))?;
        fs::write(dir.path().join("other.txt"), "x")?;
        vcs.add_all()?;
        assert!(matches!(vcs.commit("third")?, CommitOutcome::Committed(_)));
        let repo = vcs.repo()?;
        let tree = repo.head()?.peel_to_tree()?;
        assert!(tree.get_name("README.md").is_none());

        Ok(())
    }

    #[test]
    fn add_all_skips_nested_repository() -> anyhow::Result<()> {
        let (dir, vcs) = fixture()?;
        let plugin = dir.path().join("configs/.oh-my-zsh/custom/plugins/zsh-autosuggestions");
        fs::create_dir_all(&plugin)?;
        fs::write(plugin.join("zsh-autosuggestions.zsh"), "# plugin\n")?;
        let nested = Repository::init(&plugin)?;
        let mut index = nested.index()?;
        index.add_path(Path::new("zsh-autosuggestions.zsh"))?;
        index.write()?;
        let tree = nested.find_tree(index.write_tree()?)?;
        let signature = git2::Signature::now("John Doe", "john@doe.com")?;
        nested.commit(Some("HEAD"), &signature, &signature, "init", &tree, &[])?;
        fs::write(dir.path().join("configs/.bashrc"), "set -o vi\n")?;

        vcs.add_all()?;
        assert!(matches!(vcs.commit("first")?, CommitOutcome::Committed(_)));

        let repo = vcs.repo()?;
        let tree = repo.head()?.peel_to_tree()?;
        assert!(tree.get_path(Path::new("configs/.bashrc")).is_ok());
        assert!(tree.get_path(Path::new("configs/.oh-my-zsh")).is_err());

        Ok(())
    }

    #[test]
    fn push_to_local_bare_remote_sets_upstream() -> anyhow::Result<()> {
        let (dir, vcs) = fixture()?;
        let remote_dir = tempfile::tempdir()?;
        Repository::init_bare(remote_dir.path())?;

        fs::write(dir.path().join("README.md"), "# Backup\n")?;
        vcs.add_all()?;
        let CommitOutcome::Committed(id) = vcs.commit("first")? else {
            panic!("expected commit");
        };
        vcs.remote_add("origin", remote_dir.path().to_string_lossy().as_ref())?;
        vcs.push("origin", "main", true)?;

        let remote = Repository::open_bare(remote_dir.path())?;
        let pushed = remote.find_reference("refs/heads/main")?.peel_to_commit()?;
        assert_eq!(pushed.id().to_string(), id);

        let config = vcs.repo()?.config()?;
        assert_eq!(config.get_string("branch.main.remote")?, "origin");
        assert_eq!(config.get_string("branch.main.merge")?, "refs/heads/main");

        Ok(())
    }
}
