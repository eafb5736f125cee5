// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT


use archupd::{
    changelog::ChangelogMap,
    pacman::{Orphans, PackageManager, PacmanError, Result as PacmanResult},
};

use anyhow::Result;
use std::{
    cell::RefCell,
    collections::VecDeque,
    fs::{write, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    rc::Rc,
};

/// Package manager double that records every call it receives.
pub(crate) struct FakePacman {
    calls: Rc<RefCell<Vec<String>>>,
    log_file: PathBuf,
    upgrade_log: String,
    snapshots: RefCell<VecDeque<ChangelogMap>>,
    orphans: Orphans,
    fail_on: Option<&'static str>,
}

impl FakePacman {
    pub(crate) fn new(log_file: impl Into<PathBuf>) -> Self {
        Self {
            calls: Rc::new(RefCell::new(Vec::new())),
            log_file: log_file.into(),
            upgrade_log: String::new(),
            snapshots: RefCell::new(VecDeque::new()),
            orphans: Orphans::Empty,
            fail_on: None,
        }
    }

    /// Text that the upgrade appends to the log file.
    pub(crate) fn with_upgrade_log(mut self, data: impl Into<String>) -> Self {
        self.upgrade_log = data.into();
        self
    }

    /// Changelog snapshots handed out in order, one per call.
    pub(crate) fn with_snapshots(mut self, snapshots: impl IntoIterator<Item = ChangelogMap>) -> Self {
        self.snapshots = RefCell::new(snapshots.into_iter().collect());
        self
    }

    pub(crate) fn with_orphans(mut self, orphans: Orphans) -> Self {
        self.orphans = orphans;
        self
    }

    /// Make the named operation fail with exit code 1.
    pub(crate) fn failing_on(mut self, call: &'static str) -> Self {
        self.fail_on = Some(call);
        self
    }

    pub(crate) fn calls(&self) -> Rc<RefCell<Vec<String>>> {
        Rc::clone(&self.calls)
    }

    fn record(&self, call: impl Into<String>) -> PacmanResult<()> {
        let call = call.into();
        let failed = self.fail_on.is_some_and(|name| call.starts_with(name));
        self.calls.borrow_mut().push(call);
        if failed {
            return Err(PacmanError::Status {
                program: "pacman".into(),
                args: vec![],
                code: Some(1),
            });
        }

        Ok(())
    }
}

impl PackageManager for FakePacman {
    fn clean_cache(&self) -> PacmanResult<()> {
        self.record("clean_cache")
    }

    fn upgrade(&self) -> PacmanResult<()> {
        self.record("upgrade")?;
        append(&self.log_file, &self.upgrade_log).map_err(|err| PacmanError::Spawn {
            source: err,
            program: "pacman".into(),
        })
    }

    fn changelogs(&self) -> PacmanResult<ChangelogMap> {
        self.record("changelogs")?;
        Ok(self.snapshots.borrow_mut().pop_front().unwrap_or_default())
    }

    fn orphans(&self) -> PacmanResult<Orphans> {
        self.record("orphans")?;
        Ok(self.orphans.clone())
    }

    fn remove(&self, packages: &[String]) -> PacmanResult<()> {
        self.record(format!("remove {}", packages.join(" ")))
    }
}

pub(crate) fn append(path: impl AsRef<Path>, data: impl AsRef<str>) -> std::io::Result<()> {
    let mut file = OpenOptions::new().append(true).open(path.as_ref())?;
    file.write_all(data.as_ref().as_bytes())
}

/// Write a shell script that stands in for the pacman binary.
///
/// The script is run through `sh`, so it never needs to be executable.
pub(crate) fn fake_pacman_script(dir: impl AsRef<Path>, body: impl AsRef<str>) -> Result<PathBuf> {
    let path = dir.as_ref().join("fake-pacman.sh");
    write(&path, format!("#!/bin/sh\n{}\n", body.as_ref()))?;
    Ok(path)
}
