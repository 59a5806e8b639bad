// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Installed package manifests.
//!
//! Record what each language ecosystem currently has installed, so the
//! environment can be rebuilt later. Every manifest is produced by running
//! a command, and writing whatever it prints to stdout into its own file
//! under `package_lists/`.
//!
//! Not every machine has every toolchain installed. Failing to collect one
//! manifest is reported as a warning, and never stops the others.

use crate::syscall::syscall_non_interactive;

use std::{fs::write, path::Path};
use tracing::{info, instrument, warn};

/// Command that prints a package manifest to stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestCommand {
    /// Human readable ecosystem name.
    pub label: String,

    /// Name of file to write manifest into.
    pub file_name: String,

    /// Binary to run.
    pub program: String,

    /// Arguments to binary.
    pub args: Vec<String>,
}

impl ManifestCommand {
    /// Construct new manifest command.
    pub fn new(
        label: impl Into<String>,
        file_name: impl Into<String>,
        program: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            label: label.into(),
            file_name: file_name.into(),
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

/// Stock manifest commands for Python, R, and Julia.
pub fn default_manifests() -> Vec<ManifestCommand> {
    vec![
        ManifestCommand::new("Python", "python_packages.txt", "pip", ["freeze"]),
        ManifestCommand::new(
            "R",
            "r_packages.txt",
            "Rscript",
            ["--vanilla", "-e", "writeLines(rownames(installed.packages()))"],
        ),
        ManifestCommand::new(
            "Julia",
            "julia_packages.txt",
            "julia",
            [
                "-e",
                "using Pkg; foreach(println, sort([dep.name for dep in values(Pkg.dependencies())]))",
            ],
        ),
    ]
}

/// Outcome of saving one list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestOutcome {
    /// List was written to file of given name.
    Saved { label: String, file_name: String },

    /// List could not be produced or written.
    Failed { label: String, reason: String },
}

impl ManifestOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved { .. })
    }
}

/// Run each manifest command, and save its output into target directory.
#[instrument(skip_all, level = "debug")]
pub fn save_package_lists(
    dir: impl AsRef<Path>,
    manifests: impl IntoIterator<Item = ManifestCommand>,
) -> Vec<ManifestOutcome> {
    manifests
        .into_iter()
        .map(|manifest| match save_manifest(dir.as_ref(), &manifest) {
            Ok(()) => {
                info!("saved {} packages", manifest.label);
                ManifestOutcome::Saved {
                    label: manifest.label,
                    file_name: manifest.file_name,
                }
            }
            Err(reason) => {
                warn!("couldn't save {} packages: {reason}", manifest.label);
                ManifestOutcome::Failed {
                    label: manifest.label,
                    reason,
                }
            }
        })
        .collect()
}

fn save_manifest(dir: &Path, manifest: &ManifestCommand) -> Result<(), String> {
    let output = syscall_non_interactive(&manifest.program, &manifest.args)
        .map_err(|err| format!("cannot run {}: {err}", manifest.program))?;
    if !output.success {
        return Err(format!("{} failed: {}", manifest.program, output.message()));
    }

    write(dir.join(&manifest.file_name), output.stdout.as_bytes())
        .map_err(|err| format!("cannot write {}: {err}", manifest.file_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn failed_manifest_does_not_stop_others() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let manifests = vec![
            ManifestCommand::new(
                "Missing",
                "missing.txt",
                "dotback-no-such-binary",
                ["freeze"],
            ),
            ManifestCommand::new("Broken", "broken.txt", "sh", ["-c", "exit 1"]),
            ManifestCommand::new(
                "Shell",
                "shell_packages.txt",
                "sh",
                ["-c", "echo bat; echo ripgrep"],
            ),
        ];

        let outcomes = save_package_lists(dir.path(), manifests);
        assert!(!outcomes[0].is_saved());
        assert!(!outcomes[1].is_saved());
        assert_eq!(
            outcomes[2],
            ManifestOutcome::Saved {
                label: "Shell".into(),
                file_name: "shell_packages.txt".into(),
            }
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("shell_packages.txt"))?,
            "bat\nripgrep\n"
        );
        assert!(!dir.path().join("missing.txt").exists());
        assert!(!dir.path().join("broken.txt").exists());

        Ok(())
    }

    #[test]
    fn default_manifests_cover_python_r_and_julia() {
        let files = default_manifests()
            .into_iter()
            .map(|manifest| manifest.file_name)
            .collect::<Vec<_>>();
        assert_eq!(
            files,
            vec!["python_packages.txt", "r_packages.txt", "julia_packages.txt"]
        );
    }
}
