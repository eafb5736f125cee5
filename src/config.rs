// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the optional settings file that archupd reads at
//! startup. Every field has a sensible default, so an absent file simply
//! means "use the stock Arch Linux setup".
//!
//! # General Layout
//!
//! ```toml
//! [pacman]
//! escalation = ["sudo"]
//! command = ["pacman"]
//! log_file = "/var/log/pacman.log"
//! log_marker = " [ALPM] "
//!
//! [news]
//! enabled = true
//! url = "https://archlinux.org/feeds/news/"
//! state_file = "$XDG_STATE_HOME/archupd.json"
//! ```

use serde::Deserialize;
use std::{
    fs::read_to_string,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

/// Default location of pacman's log file.
pub const DEFAULT_LOG_FILE: &str = "/var/log/pacman.log";

/// Substring that marks log lines written by ALPM itself.
pub const DEFAULT_LOG_MARKER: &str = " [ALPM] ";

/// Official Arch Linux news feed.
pub const DEFAULT_NEWS_URL: &str = "https://archlinux.org/feeds/news/";

/// Complete settings layout.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// How to invoke pacman and where to find its log.
    pub pacman: PacmanSettings,

    /// Where to poll news from, and where to remember what was seen.
    pub news: NewsSettings,
}

impl Settings {
    /// Load settings from target file.
    ///
    /// A missing file at the default location is not an error, archupd just
    /// falls back to its defaults. A missing file that the user explicitly
    /// asked for is an error though.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if the file exists but cannot be read,
    ///   or if `required` is set and the file does not exist.
    /// - Return [`ConfigError::Deserialize`] if the file is not valid TOML.
    /// - Return [`ConfigError::ShellExpansion`] if path expansion fails.
    pub fn load(path: impl AsRef<Path>, required: bool) -> Result<Self> {
        let path = path.as_ref();
        match read_to_string(path) {
            Ok(data) => {
                debug!("load settings from {:?}", path.display());
                data.parse()
            }
            Err(err) if err.kind() == ErrorKind::NotFound && !required => {
                debug!("no settings at {:?}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(err) => Err(ConfigError::Read {
                source: err,
                path: path.into(),
            }),
        }
    }
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: Settings = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every path field.
        settings.pacman.log_file = expand_path(&settings.pacman.log_file)?;
        if let Some(state_file) = settings.news.state_file.take() {
            settings.news.state_file = Some(expand_path(&state_file)?);
        }

        Ok(settings)
    }
}

/// Pacman invocation settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize)]
#[serde(default)]
pub struct PacmanSettings {
    /// Privilege escalation wrapper placed in front of mutating commands.
    pub escalation: Vec<String>,

    /// Program (plus any leading arguments) that acts as pacman.
    pub command: Vec<String>,

    /// Log file that pacman appends its transaction records to.
    pub log_file: PathBuf,

    /// Substring identifying ALPM-authored log lines.
    pub log_marker: String,
}

impl Default for PacmanSettings {
    fn default() -> Self {
        Self {
            escalation: vec!["sudo".into()],
            command: vec!["pacman".into()],
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            log_marker: DEFAULT_LOG_MARKER.into(),
        }
    }
}

/// News feed settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize)]
#[serde(default)]
pub struct NewsSettings {
    /// Poll the news feed at all.
    pub enabled: bool,

    /// URL of the RSS feed.
    pub url: String,

    /// Override for the poll state file location.
    pub state_file: Option<PathBuf>,
}

impl Default for NewsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            url: DEFAULT_NEWS_URL.into(),
            state_file: None,
        }
    }
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let expanded = shellexpand::full(path.to_string_lossy().as_ref())
        .map_err(ConfigError::ShellExpansion)?
        .into_owned();

    Ok(PathBuf::from(expanded))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read settings file.
    #[error("failed to read settings at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("BLAH", "/home/blah")])]
    fn deserialize_settings() -> anyhow::Result<()> {
        let result: Settings = r#"
            [pacman]
            escalation = ["doas"]
            log_file = "$BLAH/pacman.log"

            [news]
            url = "https://blah.org/feed/"
            state_file = "$BLAH/.local/state/archupd.json"
        "#
        .parse()?;

        let expect = Settings {
            pacman: PacmanSettings {
                escalation: vec!["doas".into()],
                command: vec!["pacman".into()],
                log_file: PathBuf::from("/home/blah/pacman.log"),
                log_marker: DEFAULT_LOG_MARKER.into(),
            },
            news: NewsSettings {
                enabled: true,
                url: "https://blah.org/feed/".into(),
                state_file: Some(PathBuf::from("/home/blah/.local/state/archupd.json")),
            },
        };

        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn empty_settings_use_defaults() -> anyhow::Result<()> {
        let result: Settings = "".parse()?;
        assert_eq!(result, Settings::default());
        assert_eq!(result.pacman.log_file, PathBuf::from(DEFAULT_LOG_FILE));
        assert!(result.news.enabled);

        Ok(())
    }

    #[test]
    fn missing_optional_settings_file_uses_defaults() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let result = Settings::load(dir.path().join("config.toml"), false)?;
        assert_eq!(result, Settings::default());

        Ok(())
    }

    #[test]
    fn missing_required_settings_file_fails() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let result = Settings::load(dir.path().join("config.toml"), true);
        assert!(matches!(result, Err(ConfigError::Read { .. })));

        Ok(())
    }

    #[test]
    fn malformed_settings_fail() {
        let result = "[pacman]\nescalation = 42\n".parse::<Settings>();
        assert!(matches!(result, Err(ConfigError::Deserialize(_))));
    }
}
