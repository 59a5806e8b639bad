// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the optional settings file that dotback reads at
//! startup. Every field has a default, so an empty or missing settings file
//! yields the stock backup layout: a private `home_backup` repository on
//! GitHub, staged at `~/home_backup`, covering the usual shell, editor, and
//! language tooling dotfiles.
//!
//! # General Layout
//!
//! ```toml
//! staging_dir = "~/home_backup"
//! entries = [".bashrc", ".ssh/config"]
//! ignore = ["*.pyc"]
//!
//! [remote]
//! repository = "home_backup"
//! description = "Automated backup of home directory configurations"
//! host = "github.com"
//! remote_name = "origin"
//! branch = "main"
//! ```

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, info};

/// Default listing of paths to mirror, relative to the home directory.
pub const DEFAULT_ENTRIES: &[&str] = &[
    ".bashrc",
    ".profile",
    ".gitconfig",
    ".ssh/config",
    ".config/r",
    ".julia/config",
    ".config/pip",
    ".local/share/jupyter/kernels",
    ".Rprofile",
    ".Renviron",
    ".config/Code/User/settings.json",
    ".config/Code/User/keybindings.json",
    ".config/Code/User/snippets",
    ".jupyter/jupyter_notebook_config.py",
    ".config/matplotlib/matplotlibrc",
    ".zshrc",
    ".zprofile",
    ".oh-my-zsh/custom",
    ".oh-my-zsh/custom/themes",
    ".oh-my-zsh/custom/plugins",
    ".oh-my-zsh/custom/aliases.zsh",
    ".oh-my-zsh/custom/functions.zsh",
];

/// Default gitignore rules written into a freshly initialized staging tree.
pub const DEFAULT_IGNORE: &[&str] = &[
    "__pycache__/",
    "*.pyc",
    "node_modules/",
    ".ipynb_checkpoints/",
    ".Trash/",
    "Cache/",
    ".cache/",
];

/// Backup settings layout.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackupSettings {
    /// Location of the staging tree. Subject to shell expansion.
    pub staging_dir: String,

    /// Ordered listing of paths to mirror, relative to the home directory.
    pub entries: Vec<String>,

    /// Gitignore rules for the staging tree. Only written on first run.
    pub ignore: Vec<String>,

    /// Remote repository settings.
    pub remote: RemoteSettings,
}

impl BackupSettings {
    /// Load settings from target path, or use defaults if it does not exist.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if settings file exists but cannot be
    ///   read.
    /// - Return [`ConfigError::Deserialize`] if settings file is malformed.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("no settings file at {:?}, using defaults", path.display());
            return Ok(Self::default());
        }

        info!("load settings from {:?}", path.display());
        read_to_string(path)
            .map_err(|err| ConfigError::Read {
                source: err,
                path: path.to_path_buf(),
            })?
            .parse()
    }

    /// Absolute path to staging tree after shell expansion.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::ShellExpansion`] if expansion fails.
    pub fn staging_path(&self) -> Result<PathBuf> {
        Ok(PathBuf::from(
            shellexpand::full(self.staging_dir.as_str())?.into_owned(),
        ))
    }
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            staging_dir: "~/home_backup".into(),
            entries: DEFAULT_ENTRIES.iter().map(ToString::to_string).collect(),
            ignore: DEFAULT_IGNORE.iter().map(ToString::to_string).collect(),
            remote: RemoteSettings::default(),
        }
    }
}

impl FromStr for BackupSettings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let settings: BackupSettings = toml::de::from_str(data)?;

        // INVARIANT: Entries must stay relative to the home directory.
        if let Some(entry) = settings
            .entries
            .iter()
            .find(|entry| Path::new(entry).is_absolute() || entry.split('/').any(|c| c == ".."))
        {
            return Err(ConfigError::EntryEscapesHome(entry.clone()));
        }

        Ok(settings)
    }
}

impl Display for BackupSettings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Remote repository settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RemoteSettings {
    /// Name of repository to recreate on every run.
    pub repository: String,

    /// Human readable description attached to created repository.
    pub description: String,

    /// Hosting service to build clone URLs for.
    pub host: String,

    /// Name of remote binding in the staging tree.
    pub remote_name: String,

    /// Default branch of the staging tree.
    pub branch: String,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            repository: "home_backup".into(),
            description: "Automated backup of home directory configurations".into(),
            host: "github.com".into(),
            remote_name: "origin".into(),
            branch: "main".into(),
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Settings file cannot be read.
    #[error("failed to read settings file at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// Entry is absolute or climbs out of the home directory.
    #[error("entry {0:?} must be relative to the home directory")]
    EntryEscapesHome(String),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
