// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Failure tolerant tree mirroring.
//!
//! Copies a fixed listing of paths, relative to some source root, into the
//! same relative locations under a destination root. Each entry may be a
//! plain file or a whole directory.
//!
//! # Partial Failure
//!
//! Home directories routinely contain files that cannot be copied by their
//! own owner: lockfiles, sockets, named pipes, dangling symlinks, permission
//! restricted caches, etc. A single one of those must never abort an entire
//! backup. Only regular files are copied. So
//! every file is copied on its own, failures are recorded in the
//! [`MirrorReport`], and the walk keeps going.
//!
//! # Exclusion
//!
//! Nothing is excluded while mirroring. Every file in an entry is copied.
//! What ends up tracked in history is decided later through gitignore rules
//! on the staging tree.

use ignore::WalkBuilder;
use indicatif::ProgressBar;
use std::{
    fs::{copy, create_dir_all, remove_file, symlink_metadata, File},
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument, warn};

/// Outcome of mirroring a listing of entries.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MirrorReport {
    pub entries: Vec<EntryReport>,
}

impl MirrorReport {
    /// Total number of files copied.
    pub fn files_copied(&self) -> usize {
        self.entries.iter().map(|entry| entry.outcome.files()).sum()
    }

    /// All recorded per-file failures.
    pub fn failures(&self) -> impl Iterator<Item = &MirrorFailure> {
        self.entries
            .iter()
            .flat_map(|entry| match &entry.outcome {
                EntryOutcome::Partial { failures, .. } => failures.as_slice(),
                _ => &[],
            })
    }

    /// Look up report of target entry.
    pub fn entry(&self, entry: impl AsRef<str>) -> Option<&EntryOutcome> {
        self.entries
            .iter()
            .find(|report| report.entry == entry.as_ref())
            .map(|report| &report.outcome)
    }
}

/// Outcome of mirroring one top-level entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryReport {
    pub entry: String,
    pub outcome: EntryOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    /// Every file was copied.
    Copied { files: usize },

    /// Entry does not exist under the source root.
    SkippedAbsent,

    /// Some files were copied, others failed.
    Partial {
        files: usize,
        failures: Vec<MirrorFailure>,
    },
}

impl EntryOutcome {
    pub fn files(&self) -> usize {
        match self {
            Self::Copied { files } | Self::Partial { files, .. } => *files,
            Self::SkippedAbsent => 0,
        }
    }
}

/// A single file that could not be mirrored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Mirror entries from source root into destination root.
///
/// See [`mirror_with_progress`].
pub fn mirror(
    source_root: impl AsRef<Path>,
    entries: impl IntoIterator<Item = impl AsRef<str>>,
    dest_root: impl AsRef<Path>,
) -> MirrorReport {
    mirror_with_progress(source_root, entries, dest_root, &ProgressBar::hidden())
}

/// Mirror entries from source root into destination root, narrating on a
/// progress bar.
///
/// Entries that do not exist are skipped silently. Files keep their
/// permission bits and modification time. This never fails as a whole, all
/// per-file failures end up in the returned report.
#[instrument(skip_all, level = "debug")]
pub fn mirror_with_progress(
    source_root: impl AsRef<Path>,
    entries: impl IntoIterator<Item = impl AsRef<str>>,
    dest_root: impl AsRef<Path>,
    bar: &ProgressBar,
) -> MirrorReport {
    let mut report = MirrorReport::default();

    for entry in entries {
        let entry = entry.as_ref();
        bar.set_message(entry.to_string());
        let src = source_root.as_ref().join(entry);
        let dst = dest_root.as_ref().join(entry);
        let outcome = mirror_entry(&src, &dst, bar);

        match &outcome {
            EntryOutcome::Copied { .. } => info!("backed up {entry}"),
            EntryOutcome::SkippedAbsent => debug!("skip {entry}, it does not exist"),
            EntryOutcome::Partial { failures, .. } => {
                warn!("backed up {entry} with {} failure(s)", failures.len())
            }
        }

        report.entries.push(EntryReport {
            entry: entry.to_string(),
            outcome,
        });
    }

    report
}

fn mirror_entry(src: &Path, dst: &Path, bar: &ProgressBar) -> EntryOutcome {
    // INVARIANT: Dangling symlinks still count as present, so they get
    //   reported as failures instead of silently vanishing.
    if symlink_metadata(src).is_err() {
        return EntryOutcome::SkippedAbsent;
    }

    let mut files = 0;
    let mut failures = Vec::new();

    if !src.is_dir() {
        match copy_file(src, dst) {
            Ok(()) => files += 1,
            Err(failure) => failures.push(failure),
        }
    } else {
        let walker = WalkBuilder::new(src)
            .standard_filters(false)
            .hidden(false)
            .follow_links(false)
            .build();

        for result in walker {
            let dir_entry = match result {
                Ok(dir_entry) => dir_entry,
                Err(err) => {
                    warn!("cannot walk {:?}: {err}", src.display());
                    failures.push(MirrorFailure {
                        path: src.to_path_buf(),
                        reason: err.to_string(),
                    });
                    continue;
                }
            };

            let path = dir_entry.path();
            let Ok(relative) = path.strip_prefix(src) else {
                continue;
            };
            let target = dst.join(relative);

            // INVARIANT: Symlinks are not descended, but symlinks to files are
            //   copied by content.
            if dir_entry.file_type().is_some_and(|kind| kind.is_dir()) {
                if let Err(err) = create_dir_all(&target) {
                    warn!("cannot create {:?}: {err}", target.display());
                    failures.push(MirrorFailure {
                        path: target,
                        reason: err.to_string(),
                    });
                }
                continue;
            }

            if path.is_dir() {
                debug!("skip symlinked directory {:?}", path.display());
                continue;
            }

            bar.tick();
            match copy_file(path, &target) {
                Ok(()) => files += 1,
                Err(failure) => failures.push(failure),
            }
        }
    }

    if failures.is_empty() {
        EntryOutcome::Copied { files }
    } else {
        EntryOutcome::Partial { files, failures }
    }
}

fn copy_file(src: &Path, dst: &Path) -> Result<(), MirrorFailure> {
    let failure = |err: std::io::Error| {
        warn!("couldn't copy {:?}: {err}", src.display());
        MirrorFailure {
            path: src.to_path_buf(),
            reason: err.to_string(),
        }
    };

    // INVARIANT: Only regular files get copied, opening a FIFO blocks until
    //   some writer shows up.
    let meta = src.metadata().map_err(failure)?;
    if !meta.is_file() {
        warn!("couldn't copy {:?}: not a regular file", src.display());
        return Err(MirrorFailure {
            path: src.to_path_buf(),
            reason: "not a regular file".into(),
        });
    }

    if let Some(parent) = dst.parent() {
        create_dir_all(parent).map_err(failure)?;
    }

    // INVARIANT: A read-only copy from a previous run cannot be truncated, so
    //   replace it outright.
    if symlink_metadata(dst).is_ok() {
        remove_file(dst).map_err(failure)?;
    }

    // INVARIANT: Permission bits come along with the copy, modification time
    //   has to be carried over by hand.
    copy(src, dst).map_err(failure)?;
    let modified = meta.modified().map_err(failure)?;
    File::open(dst)
        .and_then(|file| file.set_modified(modified))
        .map_err(failure)?;

    Ok(())
}
