// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Oh My Zsh plugin and theme lists.
//!
//! Scrape `~/.zshrc` for the enabled plugins and theme, and list whatever
//! lives in the custom Oh My Zsh directory. Each list lands in its own file
//! under `package_lists/`, next to the language package manifests.

use crate::packages::ManifestOutcome;

use regex::Regex;
use std::{
    fs::{read_to_string, write},
    path::Path,
    sync::LazyLock,
};
use tracing::{debug, info, instrument, warn};

// INVARIANT: Skip commented out plugin lines.
static PLUGINS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?ms)^[ \t]*plugins=\((.*?)\)").expect("plugins pattern is valid")
});

static THEME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^[ \t]*ZSH_THEME="(.*?)""#).expect("theme pattern is valid")
});

/// Enabled plugins, i.e., contents of `plugins=(...)`. May span many lines.
pub fn parse_plugins(zshrc: &str) -> Option<Vec<String>> {
    PLUGINS.captures(zshrc).map(|caps| {
        caps[1]
            .split_whitespace()
            .map(ToString::to_string)
            .collect()
    })
}

/// Selected theme, i.e., value of `ZSH_THEME="..."`.
pub fn parse_theme(zshrc: &str) -> Option<String> {
    THEME.captures(zshrc).map(|caps| caps[1].to_string())
}

/// Save Oh My Zsh lists from home directory into target directory.
///
/// Missing sources are skipped without a trace in the returned outcomes.
#[instrument(skip_all, level = "debug")]
pub fn save_omz_lists(home: impl AsRef<Path>, dir: impl AsRef<Path>) -> Vec<ManifestOutcome> {
    let home = home.as_ref();
    let dir = dir.as_ref();
    let mut outcomes = Vec::new();

    let zshrc = home.join(".zshrc");
    if zshrc.exists() {
        match read_to_string(&zshrc) {
            Ok(content) => {
                if let Some(plugins) = parse_plugins(&content) {
                    outcomes.push(save_list(dir, "Oh My Zsh plugins", "omz_plugins.txt", &plugins));
                }
                if let Some(theme) = parse_theme(&content) {
                    outcomes.push(save_list(dir, "Oh My Zsh theme", "omz_themes.txt", &[theme]));
                }
            }
            Err(err) => {
                warn!("couldn't read {:?}: {err}", zshrc.display());
                outcomes.push(ManifestOutcome::Failed {
                    label: "Oh My Zsh configuration".into(),
                    reason: err.to_string(),
                });
            }
        }
    } else {
        debug!("no .zshrc to scrape");
    }

    let custom = home.join(".oh-my-zsh").join("custom");
    if custom.exists() {
        outcomes.push(
            list_children(&custom.join("plugins"), true)
                .map(|plugins| {
                    save_list(dir, "Oh My Zsh custom plugins", "omz_custom_plugins.txt", &plugins)
                })
                .unwrap_or_else(|reason| ManifestOutcome::Failed {
                    label: "Oh My Zsh custom plugins".into(),
                    reason,
                }),
        );
        outcomes.push(
            list_children(&custom.join("themes"), false)
                .map(|themes| {
                    save_list(dir, "Oh My Zsh custom themes", "omz_custom_themes.txt", &themes)
                })
                .unwrap_or_else(|reason| ManifestOutcome::Failed {
                    label: "Oh My Zsh custom themes".into(),
                    reason,
                }),
        );
    }

    outcomes
}

/// Sorted names of directories (or files) directly inside target path.
///
/// A missing directory is an empty listing.
fn list_children(path: &Path, dirs: bool) -> Result<Vec<String>, String> {
    let pattern = glob::Pattern::escape(&path.to_string_lossy());
    let mut names = glob::glob(&format!("{pattern}/*"))
        .map_err(|err| err.to_string())?
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("cannot read {:?}: {err}", err.path().display());
                None
            }
        })
        .filter(|entry| if dirs { entry.is_dir() } else { entry.is_file() })
        .filter_map(|entry| entry.file_name().map(|name| name.to_string_lossy().into_owned()))
        .collect::<Vec<_>>();
    names.sort();

    Ok(names)
}

fn save_list(dir: &Path, label: &str, file_name: &str, items: &[String]) -> ManifestOutcome {
    match write(dir.join(file_name), items.join("\n")) {
        Ok(()) => {
            info!("saved {label} list");
            ManifestOutcome::Saved {
                label: label.into(),
                file_name: file_name.into(),
            }
        }
        Err(err) => {
            warn!("couldn't save {label} list: {err}");
            ManifestOutcome::Failed {
                label: label.into(),
                reason: err.to_string(),
            }
        }
    }
}
