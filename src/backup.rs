// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Backup run orchestration.
//!
//! One run is a strictly sequential pipeline:
//!
//! 1. Reconcile remote repository (fatal on failure).
//! 2. Save package lists (warnings only).
//! 3. Save Oh My Zsh lists (warnings only).
//! 4. Mirror configuration entries (warnings only).
//! 5. Regenerate README (warning only).
//! 6. Commit and push staging tree (fatal only for repository setup).

use crate::{
    context::RunContext,
    hosting::{HostingApi, RemoteEndpoint},
    mirror::{mirror_with_progress, MirrorReport},
    packages::{save_package_lists, ManifestCommand, ManifestOutcome},
    readme::write_readme,
    reconcile::Reconciler,
    staging::StagingTree,
    sync::{SyncReport, Synchronizer},
    vcs::VersionControl,
    zsh::save_omz_lists,
};

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Everything a finished run has to say for itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupSummary {
    pub endpoint: RemoteEndpoint,
    pub manifests: Vec<ManifestOutcome>,
    pub mirror: MirrorReport,
    pub sync: SyncReport,
}

/// Run a complete backup.
///
/// # Errors
///
/// - Return [`BackupError`] for any condition that must abort the run.
#[instrument(skip_all, level = "debug")]
pub fn run_backup<H, V>(
    ctx: &RunContext,
    host: &H,
    vcs: &V,
    manifests: impl IntoIterator<Item = ManifestCommand>,
) -> Result<BackupSummary>
where
    H: HostingApi,
    V: VersionControl,
{
    let settings = ctx.settings();
    info!("starting backup process");

    let endpoint = Reconciler::new(host, &settings.remote)
        .reconcile(ctx.identity(), &settings.remote.repository)?;
    let staging = StagingTree::open(ctx.staging_root())?;

    info!("backing up package lists");
    let mut outcomes = save_package_lists(staging.package_lists_dir(), manifests);
    info!("saving Oh My Zsh lists");
    outcomes.extend(save_omz_lists(ctx.home(), staging.package_lists_dir()));

    info!("backing up config files");
    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template("{spinner:.green} {elapsed_precise}  {msg}")?);
    bar.enable_steady_tick(Duration::from_millis(100));
    let mirror = mirror_with_progress(
        ctx.home(),
        &settings.entries,
        staging.configs_dir(),
        &bar,
    );
    bar.finish_and_clear();
    info!("copied {} file(s)", mirror.files_copied());

    info!("creating documentation");
    let saved = outcomes
        .iter()
        .filter_map(|outcome| match outcome {
            ManifestOutcome::Saved { file_name, .. } => Some(file_name.clone()),
            ManifestOutcome::Failed { .. } => None,
        })
        .collect::<Vec<_>>();
    if let Err(error) = write_readme(&staging, ctx, &endpoint, &saved) {
        warn!("couldn't create README.md: {error}");
    }

    info!("setting up git repository");
    let sync = Synchronizer::new(vcs, &settings.remote, &settings.ignore)
        .sync_to_remote(&staging, &endpoint)?;

    info!("backup completed");
    info!("repository location: {endpoint}");
    info!("local backup path: {}", staging.root().display());

    Ok(BackupSummary {
        endpoint,
        manifests: outcomes,
        mirror,
        sync,
    })
}

/// Fatal backup error types.
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error(transparent)]
    Reconcile(#[from] crate::reconcile::ReconcileError),

    #[error(transparent)]
    Staging(#[from] crate::staging::StagingError),

    #[error(transparent)]
    Sync(#[from] crate::sync::SyncError),

    /// Style template cannot be set for progress bars.
    #[error(transparent)]
    IndicatifStyleTemplate(#[from] indicatif::style::TemplateError),
}

/// Friendly result alias :3
type Result<T, E = BackupError> = std::result::Result<T, E>;
