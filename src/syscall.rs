// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External process plumbing.
//!
//! Dotback leans on a couple of external binaries, e.g., the GitHub CLI and
//! language package managers. This module provides the one way we spawn
//! them: block until the process exits, and capture everything it says.

use std::{ffi::OsStr, process::Command};
use tracing::{debug, instrument};

/// Captured result of an external process.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Output {
    /// Process exited with a zero status.
    pub success: bool,

    /// Everything written to stdout.
    pub stdout: String,

    /// Everything written to stderr.
    pub stderr: String,
}

impl Output {
    /// Combined stdout and stderr with trailing newline chomped.
    pub fn message(&self) -> String {
        let mut message = String::new();

        if !self.stdout.is_empty() {
            message.push_str(format!("stdout: {}", self.stdout).as_str());
        }

        if !self.stderr.is_empty() {
            message.push_str(format!("stderr: {}", self.stderr).as_str());
        }

        // INVARIANT: Chomp trailing newlines.
        message
            .strip_suffix("\r\n")
            .or(message.strip_suffix('\n'))
            .map(ToString::to_string)
            .unwrap_or(message)
    }
}

/// Run external process to completion without user interaction.
///
/// A non-zero exit status is _not_ an error here, because callers need to
/// classify failures by their output. Only failure to spawn is an error.
///
/// # Errors
///
/// - Return [`std::io::Error`] if the process cannot be spawned, e.g., the
///   binary is not installed.
#[instrument(skip(cmd, args), level = "debug")]
pub fn syscall_non_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> std::io::Result<Output> {
    let mut command = Command::new(cmd.as_ref());
    command.args(args);
    debug!("run {command:?}");

    let output = command.output()?;
    Ok(Output {
        success: output.status.success(),
        stdout: String::from_utf8_lossy(output.stdout.as_slice()).into_owned(),
        stderr: String::from_utf8_lossy(output.stderr.as_slice()).into_owned(),
    })
}
