// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Personal configuration backups published to GitHub.
//!
//! Dotback copies a fixed set of dotfiles from the home directory into a
//! local __staging tree__, records installed package lists, and publishes
//! the result to a private repository that is recreated from scratch on
//! every run.
//!
//! # Run Pipeline
//!
//! 1. [`reconcile`]: delete then recreate the remote repository.
//! 2. [`packages`] and [`zsh`]: record package and plugin lists.
//! 3. [`mirror`]: copy configuration entries, tolerating per-file failures.
//! 4. [`readme`]: regenerate documentation.
//! 5. [`sync`]: commit the staging tree, and push it.
//!
//! The whole pipeline lives in [`backup::run_backup`].

pub mod backup;
pub mod config;
pub mod context;
pub mod hosting;
pub mod mirror;
pub mod packages;
pub mod path;
pub mod readme;
pub mod reconcile;
pub mod staging;
pub mod sync;
pub mod syscall;
pub mod vcs;
pub mod zsh;
