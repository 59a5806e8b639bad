// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Staging tree layout.
//!
//! The __staging tree__ is the local directory that accumulates everything
//! a backup contains, and is the unit that gets committed to version
//! control. It is created once, and reused on every run after that:
//!
//! ```text
//! <staging>/
//! ├── .gitignore        written on first run only
//! ├── README.md         regenerated every run
//! ├── configs/          mirrored dotfiles
//! └── package_lists/    *.txt package manifests
//! ```

use std::{
    fs::create_dir_all,
    path::{Path, PathBuf},
};

/// Local staging tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingTree {
    root: PathBuf,
}

impl StagingTree {
    /// Open staging tree at target path, creating it along with its
    /// sub-directories if needed.
    ///
    /// # Errors
    ///
    /// - Return [`StagingError::CreateDir`] if any directory cannot be
    ///   created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let tree = Self { root: root.into() };
        for dir in [tree.root.clone(), tree.configs_dir(), tree.package_lists_dir()] {
            create_dir_all(&dir).map_err(|err| StagingError::CreateDir {
                source: err,
                path: dir.clone(),
            })?;
        }

        Ok(tree)
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    pub fn configs_dir(&self) -> PathBuf {
        self.root.join("configs")
    }

    pub fn package_lists_dir(&self) -> PathBuf {
        self.root.join("package_lists")
    }

    pub fn readme_path(&self) -> PathBuf {
        self.root.join("README.md")
    }

    pub fn gitignore_path(&self) -> PathBuf {
        self.root.join(".gitignore")
    }
}

/// Staging tree error types.
#[derive(Debug, thiserror::Error)]
pub enum StagingError {
    /// Directory of staging tree cannot be created.
    #[error("failed to create staging directory at {:?}", path.display())]
    CreateDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
type Result<T, E = StagingError> = std::result::Result<T, E>;
