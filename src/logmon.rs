// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Pacman log file monitoring.
//!
//! Pacman appends a record of every transaction to its log file. To show the
//! user what an upgrade actually did, archupd opens the log right before the
//! upgrade, remembers where the file ended, and afterwards reads back only
//! what was appended in between.
//!
//! This is not `tail -f`. Reads stop at whatever the file holds at the time
//! of the read, and never wait for more data.

use std::{
    fs::File,
    io::{BufRead, BufReader, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};
use tracing::debug;

/// Open log file positioned at its end as of construction.
///
/// # Invariant
///
/// - Every read returns only bytes written at or after construction.
#[derive(Debug)]
pub struct LogMonitor {
    file: File,
    path: PathBuf,
}

impl LogMonitor {
    /// Open target log file and seek to its current end.
    ///
    /// # Errors
    ///
    /// - Return [`LogMonitorError::Open`] if the log cannot be opened.
    /// - Return [`LogMonitorError::Seek`] if the log cannot be seeked.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path).map_err(|err| LogMonitorError::Open {
            source: err,
            path: path.clone(),
        })?;
        let offset = file
            .seek(SeekFrom::End(0))
            .map_err(|err| LogMonitorError::Seek {
                source: err,
                path: path.clone(),
            })?;
        debug!("monitor {:?} from offset {offset}", path.display());

        Ok(Self { file, path })
    }

    /// Read everything appended since the last read, or since construction.
    ///
    /// # Errors
    ///
    /// - Return [`LogMonitorError::Read`] if the log cannot be read.
    pub fn read_appended(&mut self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.file
            .read_to_end(&mut buffer)
            .map_err(|err| LogMonitorError::Read {
                source: err,
                path: self.path.clone(),
            })?;

        Ok(buffer)
    }

    /// Lazily iterate over appended lines, without their line terminator.
    pub fn lines(&mut self) -> impl Iterator<Item = Result<Vec<u8>>> + '_ {
        let path = self.path.clone();
        BufReader::new(&mut self.file).split(b'\n').map(move |line| {
            line.map_err(|err| LogMonitorError::Read {
                source: err,
                path: path.clone(),
            })
        })
    }

    /// Collect appended lines that contain target marker.
    ///
    /// # Errors
    ///
    /// - Return [`LogMonitorError::Read`] if the log cannot be read.
    pub fn marked_lines(&mut self, marker: impl AsRef<[u8]>) -> Result<Vec<String>> {
        let marker = marker.as_ref();
        let mut found = Vec::new();
        for line in self.lines() {
            let line = line?;
            if contains(&line, marker) {
                found.push(String::from_utf8_lossy(&line).into_owned());
            }
        }

        Ok(found)
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|window| window == needle)
}

/// Log monitoring error types.
#[derive(Debug, thiserror::Error)]
pub enum LogMonitorError {
    /// Log file cannot be opened.
    #[error("failed to open log file {:?}", path.display())]
    Open {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Log file cannot be positioned at its end.
    #[error("failed to seek to end of log file {:?}", path.display())]
    Seek {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Log file cannot be read.
    #[error("failed to read log file {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = LogMonitorError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use std::{fs::OpenOptions, io::Write};

    fn append(path: &Path, data: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().append(true).open(path)?;
        file.write_all(data.as_bytes())
    }

    #[test]
    fn read_appended_skips_existing_content() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("pacman.log");
        std::fs::write(&path, "old line 1\nold line 2\n".repeat(1000))?;

        let mut monitor = LogMonitor::open(&path)?;
        append(&path, "new line 1\n")?;
        append(&path, "new line 2\n")?;

        assert_eq!(monitor.read_appended()?, b"new line 1\nnew line 2\n".to_vec());
        assert_eq!(monitor.read_appended()?, Vec::<u8>::new());

        Ok(())
    }

    #[test]
    fn read_appended_without_writes_is_empty() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("pacman.log");
        std::fs::write(&path, "old\n")?;

        let mut monitor = LogMonitor::open(&path)?;
        assert!(monitor.read_appended()?.is_empty());

        Ok(())
    }

    #[test]
    fn marked_lines_filters_on_marker() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("pacman.log");
        std::fs::write(&path, "[2024-01-01T00:00:00+0000] [ALPM] upgraded old (1 -> 2)\n")?;

        let mut monitor = LogMonitor::open(&path)?;
        append(
            &path,
            indoc! {"
                [2024-10-01T10:00:00+0200] [PACMAN] Running 'pacman -Syu --noconfirm'
                [2024-10-01T10:00:05+0200] [ALPM] transaction started
                [2024-10-01T10:00:06+0200] [ALPM] upgraded linux (6.10.1 -> 6.11.2)
                [2024-10-01T10:00:07+0200] [ALPM-SCRIPTLET] ==> Building image
            "},
        )?;

        let expect = vec![
            "[2024-10-01T10:00:05+0200] [ALPM] transaction started".to_string(),
            "[2024-10-01T10:00:06+0200] [ALPM] upgraded linux (6.10.1 -> 6.11.2)".to_string(),
        ];
        assert_eq!(monitor.marked_lines(" [ALPM] ")?, expect);

        Ok(())
    }

    #[test]
    fn open_missing_log_fails() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let result = LogMonitor::open(dir.path().join("missing.log"));
        assert!(matches!(result, Err(LogMonitorError::Open { .. })));

        Ok(())
    }
}
