// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! System update orchestration.
//!
//! One update run walks through a fixed sequence of stages:
//!
//! 1. Clean the package cache.
//! 2. Snapshot package changelogs.
//! 3. Start monitoring pacman's log file.
//! 4. Upgrade the system.
//! 5. Report what ALPM logged during the upgrade.
//! 6. If ALPM logged anything: snapshot changelogs again, show what changed,
//!    and offer to remove orphaned packages.
//!
//! Any failure in these stages ends the run. News polling happens outside
//! of this sequence, see [`drain_news`] for how its results are shown.

use crate::{
    changelog::ChangelogDiff,
    logmon::LogMonitor,
    pacman::{Orphans, PackageManager},
};

use std::{
    io::Write,
    path::{Path, PathBuf},
};
use tokio::sync::mpsc;
use tracing::{info, instrument};

/// Summary of a finished update run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UpdateSummary {
    /// ALPM log lines written during the upgrade.
    pub alpm_entries: Vec<String>,

    /// Packages whose changelog changed.
    pub changed_changelogs: Vec<String>,

    /// Orphans found after the upgrade.
    pub orphans: Orphans,
}

/// Update run over some package manager, reporting to some output.
#[derive(Debug)]
pub struct Update<P, W>
where
    P: PackageManager,
    W: Write,
{
    pacman: P,
    log_file: PathBuf,
    log_marker: String,
    out: W,
}

impl<P, W> Update<P, W>
where
    P: PackageManager,
    W: Write,
{
    /// Construct new update run.
    pub fn new(
        pacman: P,
        log_file: impl Into<PathBuf>,
        log_marker: impl Into<String>,
        out: W,
    ) -> Self {
        Self {
            pacman,
            log_file: log_file.into(),
            log_marker: log_marker.into(),
            out,
        }
    }

    /// Path of monitored log file.
    pub fn log_file(&self) -> &Path {
        self.log_file.as_path()
    }

    /// Consume update run, handing back its output sink.
    pub fn into_output(self) -> W {
        self.out
    }

    /// Perform update run.
    ///
    /// # Errors
    ///
    /// - Return [`UpdateError::Pacman`] if any pacman invocation fails.
    /// - Return [`UpdateError::LogMonitor`] if the log cannot be monitored.
    /// - Return [`UpdateError::Output`] if the report cannot be written.
    #[instrument(skip(self), fields(log_file = %self.log_file.display()), level = "debug")]
    pub fn run(&mut self) -> Result<UpdateSummary> {
        let mut summary = UpdateSummary::default();

        info!("clean package cache");
        self.pacman.clean_cache()?;

        info!("snapshot changelogs");
        let changelogs_pre = self.pacman.changelogs()?;

        let mut monitor = LogMonitor::open(&self.log_file)?;

        info!("upgrade system");
        self.pacman.upgrade()?;

        summary.alpm_entries = monitor.marked_lines(&self.log_marker)?;
        drop(monitor);

        if summary.alpm_entries.is_empty() {
            info!("upgrade changed nothing");
            return Ok(summary);
        }

        writeln!(self.out, "\nALPM logs:")?;
        for line in &summary.alpm_entries {
            writeln!(self.out, "{line}")?;
        }

        let changelogs_post = self.pacman.changelogs()?;
        let diffs = changelogs_pre.diff(&changelogs_post);
        self.show_changelog_diffs(&diffs)?;
        summary.changed_changelogs = diffs.into_iter().map(|diff| diff.package).collect();

        summary.orphans = self.remove_orphans()?;

        Ok(summary)
    }

    fn show_changelog_diffs(&mut self, diffs: &[ChangelogDiff]) -> Result<()> {
        if diffs.is_empty() {
            writeln!(self.out, "\nNo updated changelogs.")?;
            return Ok(());
        }

        writeln!(self.out, "\nChangelog diffs:\n")?;
        for diff in diffs {
            write!(self.out, "{diff}")?;
        }

        Ok(())
    }

    fn remove_orphans(&mut self) -> Result<Orphans> {
        let orphans = self.pacman.orphans()?;
        match &orphans {
            Orphans::Empty => writeln!(self.out, "\nNo superfluous packages.")?,
            Orphans::Found(packages) => {
                writeln!(self.out, "\nSuperfluous packages can be removed:")?;
                // INVARIANT: Pacman prompts on our terminal, so flush first.
                self.out.flush()?;
                self.pacman.remove(packages)?;
            }
        }

        Ok(orphans)
    }
}

/// Print every news line in arrival order until the poller is done.
///
/// # Errors
///
/// - Return [`std::io::Error`] if output cannot be written.
pub async fn drain_news(
    mut news: mpsc::Receiver<String>,
    out: &mut impl Write,
) -> std::io::Result<()> {
    writeln!(out, "\nArch Linux news:")?;
    while let Some(line) = news.recv().await {
        writeln!(out, "  - {line}")?;
    }

    Ok(())
}

/// Update orchestration error types.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    /// Pacman invocation fails.
    #[error(transparent)]
    Pacman(#[from] crate::pacman::PacmanError),

    /// Pacman log cannot be monitored.
    #[error(transparent)]
    LogMonitor(#[from] crate::logmon::LogMonitorError),

    /// Report cannot be written.
    #[error("failed to write update report")]
    Output(#[from] std::io::Error),
}

/// Friendly result alias :3
pub type Result<T, E = UpdateError> = std::result::Result<T, E>;
