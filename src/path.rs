// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine relevent path information for external files that need to be
//! interacted with, or managed in some way.

use std::path::PathBuf;

/// Determine absolute path to user's home directory.
///
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(NoWayHome)
}

/// Determine default absolute path to the staging tree.
///
/// Uses `$HOME/home_backup` as the default location for the staging tree.
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_staging_dir() -> Result<PathBuf> {
    home_dir().map(|path| path.join("home_backup"))
}

/// Determine default absolute path to the settings file.
///
/// Uses XDG Base Directory path `$XDG_CONFIG_HOME/dotback/config.toml`. The
/// settings file is optional, so callers are expected to fall back to
/// default settings when it is missing.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_settings_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("dotback").join("config.toml"))
        .ok_or(NoWayHome)
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("HOME", "/home/blah")])]
    fn staging_dir_lives_under_home() -> anyhow::Result<()> {
        assert_eq!(default_staging_dir()?, PathBuf::from("/home/blah/home_backup"));
        Ok(())
    }

    #[sealed_test(env = [("HOME", "/home/blah"), ("XDG_CONFIG_HOME", "/home/blah/.config")])]
    fn settings_path_uses_xdg_config_home() -> anyhow::Result<()> {
        assert_eq!(
            default_settings_path()?,
            PathBuf::from("/home/blah/.config/dotback/config.toml")
        );
        Ok(())
    }
}
