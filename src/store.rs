// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! News poll state persistence.
//!
//! Archupd remembers two things between runs: the `Last-Modified` value the
//! news feed handed out last time, and the publication time of the newest
//! news item that was already shown. Both live in a small JSON file.
//!
//! The state store never fails its caller. Losing the state only means that
//! some old news items are announced again on the next run, so every problem
//! is reported as a warning and the run carries on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fs::{read_to_string, rename, write},
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

/// Persisted news poll state.
///
/// # Invariant
///
/// - `latest_seen` never moves backwards across successful polls.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct PollState {
    /// Cache validator from the last successful fetch. Empty means never
    /// fetched.
    #[serde(default)]
    pub last_modified: String,

    /// Publication time of the newest item already announced.
    #[serde(default, rename = "latest_seen")]
    pub latest_seen: Option<DateTime<Utc>>,
}

/// Poll state file at a fixed location.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Construct new state store backed by target file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of backing state file.
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Load poll state.
    ///
    /// Returns the empty state if the file is missing, unreadable, or
    /// malformed. Anything other than a missing file is logged as a warning.
    pub fn load(&self) -> PollState {
        let data = match read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no poll state at {:?}", self.path.display());
                return PollState::default();
            }
            Err(err) => {
                warn!("cannot read poll state {:?}: {err}", self.path.display());
                return PollState::default();
            }
        };

        match serde_json::from_str(&data) {
            Ok(state) => state,
            Err(err) => {
                warn!("malformed poll state {:?}: {err}", self.path.display());
                PollState::default()
            }
        }
    }

    /// Save poll state.
    ///
    /// Creates missing parent directories. The file is replaced atomically so
    /// that an interrupted write never leaves a truncated state behind.
    /// Failure is logged as a warning.
    pub fn save(&self, state: &PollState) {
        if let Err(err) = self.try_save(state) {
            warn!("cannot save poll state {:?}: {err}", self.path.display());
        }
    }

    fn try_save(&self, state: &PollState) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            mkdirp::mkdirp(parent)?;
        }

        let data = serde_json::to_string(state).map_err(std::io::Error::other)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        write(&tmp, data.as_bytes())?;
        rename(&tmp, &self.path)?;
        debug!("saved poll state to {:?}", self.path.display());

        Ok(())
    }
}
