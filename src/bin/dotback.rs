// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use dotback::{
    backup::run_backup,
    config::BackupSettings,
    context::RunContext,
    hosting::{git_config_user, GhCli},
    packages::default_manifests,
    path::{default_settings_path, home_dir},
    sync::{CommitStatus, PushStatus},
    vcs::Git2Vcs,
};

use anyhow::Result;
use clap::Parser;
use std::process::exit;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Back up home directory configurations to a private GitHub repository.
///
/// Deletes and recreates the remote repository on every run, so the remote
/// always mirrors the latest backup only.
#[derive(Debug, Clone, Parser)]
#[command(about, long_about, version)]
struct Cli {}

impl Cli {
    fn run(self) -> Result<()> {
        let settings = BackupSettings::load_or_default(default_settings_path()?)?;
        let host = GhCli::new(settings.remote.host.clone());
        let ctx = RunContext::resolve(settings, home_dir()?, &host, git_config_user)?;
        let vcs = Git2Vcs::new(ctx.staging_root());

        let summary = run_backup(&ctx, &host, &vcs, default_manifests())?;

        let failures = summary.mirror.failures().count();
        if failures > 0 {
            warn!("{failures} file(s) could not be copied");
        }

        match &summary.sync.commit {
            CommitStatus::Committed(id) => info!("created commit {id}"),
            CommitStatus::NothingToCommit => info!("nothing changed since last backup"),
            CommitStatus::Failed(reason) => warn!("commit failed: {reason}"),
        }

        if let PushStatus::Failed { recovery, .. } = &summary.sync.push {
            warn!("backup is committed locally but not pushed, run: {recovery}");
        }

        Ok(())
    }
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    Cli::parse().run()
}
