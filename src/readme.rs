// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! README generation for the staging tree.
//!
//! The README is fully regenerated on every run from a template baked into
//! the binary. It carries no timestamp, so an unchanged backup renders an
//! unchanged README, and leaves nothing to commit.

use crate::{context::RunContext, hosting::RemoteEndpoint, staging::StagingTree};

use std::{fs::write, path::PathBuf};
use tracing::{info, instrument};

const TEMPLATE: &str = include_str!("readme.md");

/// Render README for target run.
pub fn render_readme(
    ctx: &RunContext,
    endpoint: &RemoteEndpoint,
    package_lists: &[String],
) -> String {
    let entries = ctx
        .settings()
        .entries
        .iter()
        .map(|entry| format!("- `~/{entry}`"))
        .collect::<Vec<_>>()
        .join("\n");

    let package_lists = if package_lists.is_empty() {
        "No package lists were saved on the last run.".to_string()
    } else {
        package_lists
            .iter()
            .map(|name| format!("- `package_lists/{name}`"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    TEMPLATE
        .replace("{{identity}}", ctx.identity().as_str())
        .replace("{{endpoint}}", endpoint.as_str())
        .replace("{{staging}}", &ctx.staging_root().display().to_string())
        .replace("{{entries}}", &entries)
        .replace("{{package_lists}}", &package_lists)
}

/// Write README into staging tree, replacing any previous one.
///
/// # Errors
///
/// - Return [`ReadmeError`] if README cannot be written.
#[instrument(skip_all, level = "debug")]
pub fn write_readme(
    staging: &StagingTree,
    ctx: &RunContext,
    endpoint: &RemoteEndpoint,
    package_lists: &[String],
) -> Result<(), ReadmeError> {
    let path = staging.readme_path();
    write(&path, render_readme(ctx, endpoint, package_lists))
        .map_err(|err| ReadmeError { source: err, path })?;
    info!("created README.md");

    Ok(())
}

/// README cannot be written.
#[derive(Debug, thiserror::Error)]
#[error("failed to write README at {:?}", path.display())]
pub struct ReadmeError {
    #[source]
    source: std::io::Error,
    path: PathBuf,
}
