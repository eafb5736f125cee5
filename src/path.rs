// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine default locations of the per-user files that archupd reads and
//! writes between runs.

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

/// Determine default absolute path to the news poll state file.
///
/// Uses XDG Base Directory path `$XDG_STATE_HOME/archupd.json`. Falls back to
/// `~/.local/state/archupd.json` on platforms without a state directory.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_state_file() -> Result<PathBuf> {
    let state_dir = match dirs::state_dir() {
        Some(path) => path,
        None => home_dir()?.join(".local").join("state"),
    };

    Ok(state_dir.join("archupd.json"))
}

/// Determine default absolute path to the configuration file.
///
/// Uses `$XDG_CONFIG_HOME/archupd/config.toml`. Does not check if the path
/// returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn default_config_file() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|path| path.join("archupd").join("config.toml"))
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

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("XDG_STATE_HOME", "/tmp/blah/state")])]
    fn state_file_follows_xdg_state_home() -> anyhow::Result<()> {
        assert_eq!(
            default_state_file()?,
            PathBuf::from("/tmp/blah/state/archupd.json")
        );

        Ok(())
    }

    #[sealed_test(env = [("XDG_CONFIG_HOME", "/tmp/blah/config")])]
    fn config_file_follows_xdg_config_home() -> anyhow::Result<()> {
        assert_eq!(
            default_config_file()?,
            PathBuf::from("/tmp/blah/config/archupd/config.toml")
        );

        Ok(())
    }
}
