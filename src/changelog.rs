// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Package changelog snapshots.
//!
//! `pacman -Qc` prints the changelog of every installed package that ships
//! one. Output for each package starts with a header line of the form
//! `Changelog for <name>:`, followed by the changelog body itself.
//!
//! Archupd snapshots all changelogs before an upgrade, and again after, so
//! that it can show the user exactly which entries are new.

use regex::Regex;
use similar::TextDiff;
use std::{
    collections::{btree_map, BTreeMap},
    fmt::{Display, Formatter, Result as FmtResult},
    io::BufRead,
    sync::LazyLock,
};

static CHANGELOG_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Changelog for (.+):$").unwrap());

/// Changelog text of each package, keyed by package name.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct ChangelogMap(BTreeMap<String, String>);

impl ChangelogMap {
    /// Construct new empty changelog map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse changelog listing from a line-oriented reader.
    ///
    /// Lines before the first header belong to no package and are dropped.
    /// Body lines are kept verbatim, each terminated by a newline. Bytes that
    /// are not valid UTF-8 are replaced rather than rejected.
    ///
    /// # Errors
    ///
    /// - Return [`std::io::Error`] if reading fails.
    pub fn parse(reader: impl BufRead) -> std::io::Result<Self> {
        let mut result = BTreeMap::new();
        let mut current: Option<(String, String)> = None;

        for bytes in reader.split(b'\n') {
            let bytes = bytes?;
            let line = String::from_utf8_lossy(bytes.strip_suffix(b"\r").unwrap_or(&bytes[..]));
            if let Some(captures) = CHANGELOG_HEADER.captures(&line) {
                if let Some((package, log)) = current.take() {
                    result.insert(package, log);
                }
                current = Some((captures[1].to_string(), String::new()));
            } else if let Some((_, log)) = current.as_mut() {
                log.push_str(&line);
                log.push('\n');
            }
        }

        if let Some((package, log)) = current {
            result.insert(package, log);
        }

        Ok(Self(result))
    }

    /// Insert changelog for target package.
    pub fn insert(&mut self, package: impl Into<String>, log: impl Into<String>) {
        self.0.insert(package.into(), log.into());
    }

    /// Get changelog of target package.
    pub fn get(&self, package: &str) -> Option<&str> {
        self.0.get(package).map(String::as_str)
    }

    /// Number of packages with a changelog.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if no package has a changelog.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over packages and their changelogs in package order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }

    /// Diff this snapshot, taken before an upgrade, against `post`.
    ///
    /// Only packages present in both snapshots with differing text yield a
    /// diff. Packages that appeared or vanished during the upgrade are
    /// skipped.
    pub fn diff(&self, post: &ChangelogMap) -> Vec<ChangelogDiff> {
        post.iter()
            .filter_map(|(package, after)| {
                let before = self.get(package)?;
                (before != after.as_str()).then(|| ChangelogDiff::new(package, before, after))
            })
            .collect()
    }
}

impl FromIterator<(String, String)> for ChangelogMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Rendered unified diff of one package's changelog.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ChangelogDiff {
    pub package: String,
    pub rendered: String,
}

impl ChangelogDiff {
    fn new(package: &str, before: &str, after: &str) -> Self {
        let rendered = TextDiff::from_lines(before, after)
            .unified_diff()
            .header(
                &format!("{package} (before)"),
                &format!("{package} (after)"),
            )
            .to_string();

        Self {
            package: package.into(),
            rendered,
        }
    }
}

impl Display for ChangelogDiff {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(&self.rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_changelog_listing() -> anyhow::Result<()> {
        let input = "Changelog for foo:\nline1\nChangelog for bar:\nline2\nline3\n";
        let result = ChangelogMap::parse(input.as_bytes())?;

        let mut expect = ChangelogMap::new();
        expect.insert("foo", "line1\n");
        expect.insert("bar", "line2\nline3\n");
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn parse_keeps_empty_changelogs_and_blank_lines() -> anyhow::Result<()> {
        let input = indoc! {"
            stray line before any header
            Changelog for empty:
            Changelog for spaced:
            2024-10-01 packager

            \t* bump to 1.2
        "};
        let result = ChangelogMap::parse(input.as_bytes())?;

        assert_eq!(result.len(), 2);
        assert_eq!(result.get("empty"), Some(""));
        assert_eq!(
            result.get("spaced"),
            Some("2024-10-01 packager\n\n\t* bump to 1.2\n")
        );

        Ok(())
    }

    #[test]
    fn header_must_match_whole_line() -> anyhow::Result<()> {
        let input = "Changelog for foo:\n  Changelog for bar: inline mention\n";
        let result = ChangelogMap::parse(input.as_bytes())?;

        assert_eq!(result.len(), 1);
        assert_eq!(
            result.get("foo"),
            Some("  Changelog for bar: inline mention\n")
        );

        Ok(())
    }

    #[test]
    fn diff_only_reports_changed_packages() {
        let pre: ChangelogMap = [
            ("same".to_string(), "a\n".to_string()),
            ("changed".to_string(), "old entry\n".to_string()),
            ("removed".to_string(), "gone\n".to_string()),
        ]
        .into_iter()
        .collect();
        let post: ChangelogMap = [
            ("same".to_string(), "a\n".to_string()),
            ("changed".to_string(), "new entry\nold entry\n".to_string()),
            ("added".to_string(), "fresh\n".to_string()),
        ]
        .into_iter()
        .collect();

        let result = pre.diff(&post);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].package, "changed");

        let expect = indoc! {"
            --- changed (before)
            +++ changed (after)
            @@ -1 +1,2 @@
            +new entry
             old entry
        "};
        assert_eq!(result[0].to_string(), expect);
    }

    #[test]
    fn diff_of_identical_snapshots_is_empty() {
        let pre: ChangelogMap = [("foo".to_string(), "x\n".to_string())]
            .into_iter()
            .collect();
        assert!(pre.diff(&pre.clone()).is_empty());
    }
}
