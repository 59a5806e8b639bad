// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Per-run context.
//!
//! Everything that is resolved once at startup, i.e., who the operator is,
//! where their home directory is, where the staging tree lives, and what
//! the settings say. Built once and then handed to every step by reference.

use crate::{
    config::BackupSettings,
    hosting::{resolve_identity, HostingApi, Identity},
};

use std::path::{Path, PathBuf};

/// Read-only context of a single backup run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    identity: Identity,
    home: PathBuf,
    staging_root: PathBuf,
    settings: BackupSettings,
}

impl RunContext {
    /// Construct new run context from already resolved parts.
    pub fn new(
        identity: Identity,
        home: impl Into<PathBuf>,
        staging_root: impl Into<PathBuf>,
        settings: BackupSettings,
    ) -> Self {
        Self {
            identity,
            home: home.into(),
            staging_root: staging_root.into(),
            settings,
        }
    }

    /// Resolve identity and staging location, and build run context.
    ///
    /// # Errors
    ///
    /// - Return [`ContextError::Identity`] if identity cannot be resolved.
    /// - Return [`ContextError::Config`] if staging path cannot be expanded.
    pub fn resolve(
        settings: BackupSettings,
        home: impl Into<PathBuf>,
        host: &impl HostingApi,
        fallback: impl FnOnce() -> Option<String>,
    ) -> Result<Self, ContextError> {
        let identity = resolve_identity(host, fallback)?;
        let staging_root = settings.staging_path()?;

        Ok(Self::new(identity, home, staging_root, settings))
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn home(&self) -> &Path {
        self.home.as_path()
    }

    pub fn staging_root(&self) -> &Path {
        self.staging_root.as_path()
    }

    pub fn settings(&self) -> &BackupSettings {
        &self.settings
    }
}

/// Run context error types.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error(transparent)]
    Identity(#[from] crate::hosting::IdentityError),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}
