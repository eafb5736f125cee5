// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Pacman invocation.
//!
//! Archupd never touches the package database itself. Everything goes
//! through the pacman binary, usually behind `sudo`. Mutating commands run
//! __interactively__, i.e., pacman inherits the terminal and may prompt the
//! user. Queries run with their standard output captured.
//!
//! # Exit Codes As Answers
//!
//! `pacman -Qqtd` lists orphaned packages, but when there are none it exits
//! with status 1 instead of printing nothing. That one status is an answer,
//! not a failure, so [`Orphans`] models it explicitly.

use crate::changelog::ChangelogMap;

use std::{
    ffi::{OsStr, OsString},
    io::BufReader,
    process::{Command, ExitStatus, Stdio},
};
use tracing::{debug, instrument};

/// Exit status of `pacman -Qqtd` when no package is orphaned.
pub const NO_ORPHANS_EXIT_CODE: i32 = 1;

/// Package manager operations that archupd needs.
pub trait PackageManager {
    /// Remove stale packages from the package cache.
    fn clean_cache(&self) -> Result<()>;

    /// Synchronize package databases and upgrade the system.
    fn upgrade(&self) -> Result<()>;

    /// Snapshot changelogs of all installed packages.
    fn changelogs(&self) -> Result<ChangelogMap>;

    /// List packages that nothing requires anymore.
    fn orphans(&self) -> Result<Orphans>;

    /// Remove target packages along with their unneeded dependencies.
    fn remove(&self, packages: &[String]) -> Result<()>;
}

/// Result of the orphan query.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum Orphans {
    /// No package is orphaned.
    #[default]
    Empty,

    /// Orphaned packages by name.
    Found(Vec<String>),
}

impl Orphans {
    /// Classify raw outcome of `pacman -Qqtd`.
    ///
    /// # Errors
    ///
    /// - Return [`PacmanError::Status`] for any failing exit status other
    ///   than [`NO_ORPHANS_EXIT_CODE`].
    pub fn from_query(
        program: impl Into<OsString>,
        args: Vec<OsString>,
        code: Option<i32>,
        stdout: &str,
    ) -> Result<Self> {
        match code {
            Some(0) => {
                let packages = stdout
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_owned)
                    .collect::<Vec<_>>();
                if packages.is_empty() {
                    Ok(Self::Empty)
                } else {
                    Ok(Self::Found(packages))
                }
            }
            Some(NO_ORPHANS_EXIT_CODE) => Ok(Self::Empty),
            code => Err(PacmanError::Status {
                program: program.into(),
                args,
                code,
            }),
        }
    }
}

/// Pacman invoked through an external process.
#[derive(Debug, Clone)]
pub struct Pacman {
    escalation: Vec<OsString>,
    command: Vec<OsString>,
}

impl Pacman {
    /// Construct new pacman runner.
    ///
    /// The `escalation` prefix is placed in front of every mutating command.
    /// The `command` is the program that acts as pacman, plus any leading
    /// arguments it needs.
    ///
    /// # Errors
    ///
    /// - Return [`PacmanError::EmptyCommand`] if `command` is empty.
    pub fn new(
        escalation: impl IntoIterator<Item = impl Into<OsString>>,
        command: impl IntoIterator<Item = impl Into<OsString>>,
    ) -> Result<Self> {
        let command = command.into_iter().map(Into::into).collect::<Vec<_>>();
        if command.is_empty() {
            return Err(PacmanError::EmptyCommand);
        }

        Ok(Self {
            escalation: escalation.into_iter().map(Into::into).collect(),
            command,
        })
    }

    /// Run pacman interactively with escalated privileges.
    ///
    /// Pacman inherits stdin, stdout, and stderr, so it can prompt the user.
    /// Blocks until pacman exits.
    ///
    /// # Errors
    ///
    /// - Return [`PacmanError::Spawn`] if pacman cannot be started.
    /// - Return [`PacmanError::Status`] if pacman exits unsuccessfully.
    #[instrument(skip(self, args), level = "debug")]
    pub fn run(&self, args: impl IntoIterator<Item = impl Into<OsString>>) -> Result<()> {
        let (program, args) = self.expand_bin_args(true, args);
        syscall_interactive(program, args)
    }

    fn expand_bin_args(
        &self,
        escalate: bool,
        args: impl IntoIterator<Item = impl Into<OsString>>,
    ) -> (OsString, Vec<OsString>) {
        let mut bin_args: Vec<OsString> = Vec::new();
        if escalate {
            bin_args.extend(self.escalation.iter().cloned());
        }
        bin_args.extend(self.command.iter().cloned());
        bin_args.extend(args.into_iter().map(Into::into));

        // INVARIANT: Command is never empty, see Pacman::new.
        let program = bin_args.remove(0);
        (program, bin_args)
    }
}

impl PackageManager for Pacman {
    fn clean_cache(&self) -> Result<()> {
        self.run(["-Sc", "--noconfirm"])
    }

    fn upgrade(&self) -> Result<()> {
        self.run(["-Syu", "--noconfirm"])
    }

    #[instrument(skip(self), level = "debug")]
    fn changelogs(&self) -> Result<ChangelogMap> {
        let (program, args) = self.expand_bin_args(false, ["-Qc"]);
        debug!("capture changelogs: {program:?} {args:?}");
        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|err| PacmanError::Spawn {
                source: err,
                program: program.clone(),
            })?;

        // INVARIANT: Stdout was requested as piped above.
        let parsed = match child.stdout.take() {
            Some(stdout) => ChangelogMap::parse(BufReader::new(stdout)),
            None => Ok(ChangelogMap::new()),
        };
        let status = child.wait().map_err(|err| PacmanError::Spawn {
            source: err,
            program: program.clone(),
        })?;
        check_status(&program, &args, status)?;

        parsed.map_err(|err| PacmanError::Output { source: err, program })
    }

    #[instrument(skip(self), level = "debug")]
    fn orphans(&self) -> Result<Orphans> {
        let (program, args) = self.expand_bin_args(true, ["-Qqtd"]);
        debug!("query orphans: {program:?} {args:?}");
        let output = Command::new(&program)
            .args(&args)
            .stdin(Stdio::inherit())
            .stderr(Stdio::inherit())
            .output()
            .map_err(|err| PacmanError::Spawn {
                source: err,
                program: program.clone(),
            })?;
        let stdout = String::from_utf8_lossy(output.stdout.as_slice());

        Orphans::from_query(program, args, output.status.code(), &stdout)
    }

    fn remove(&self, packages: &[String]) -> Result<()> {
        let mut args = vec![OsString::from("-Rs")];
        args.extend(packages.iter().map(OsString::from));
        self.run(args)
    }
}

fn syscall_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Result<()> {
    let args = args
        .into_iter()
        .map(|arg| arg.as_ref().to_os_string())
        .collect::<Vec<_>>();
    debug!("run interactive: {:?} {args:?}", cmd.as_ref());
    let status = Command::new(cmd.as_ref())
        .args(&args)
        .spawn()
        .map_err(|err| PacmanError::Spawn {
            source: err,
            program: cmd.as_ref().to_os_string(),
        })?
        .wait()
        .map_err(|err| PacmanError::Spawn {
            source: err,
            program: cmd.as_ref().to_os_string(),
        })?;

    check_status(cmd.as_ref(), &args, status)
}

fn check_status(program: &OsStr, args: &[OsString], status: ExitStatus) -> Result<()> {
    if !status.success() {
        return Err(PacmanError::Status {
            program: program.to_os_string(),
            args: args.to_vec(),
            code: status.code(),
        });
    }

    Ok(())
}

/// Pacman invocation error types.
#[derive(Debug, thiserror::Error)]
pub enum PacmanError {
    /// No program given to act as pacman.
    #[error("pacman command line is empty")]
    EmptyCommand,

    /// Process cannot be started or waited on.
    #[error("failed to run {program:?}")]
    Spawn {
        #[source]
        source: std::io::Error,
        program: OsString,
    },

    /// Process exited unsuccessfully.
    #[error("command {program:?} {args:?} failed with {}", display_code(.code))]
    Status {
        program: OsString,
        args: Vec<OsString>,
        code: Option<i32>,
    },

    /// Process output cannot be read.
    #[error("failed to read output of {program:?}")]
    Output {
        #[source]
        source: std::io::Error,
        program: OsString,
    },
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "termination by signal".into(),
    }
}

/// Friendly result alias :3
pub type Result<T, E = PacmanError> = std::result::Result<T, E>;
