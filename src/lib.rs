// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Arch Linux update assistant.
//!
//! Archupd wraps a routine `pacman -Syu` with the chores that usually
//! surround it: cleaning the package cache, showing what ALPM logged during
//! the upgrade, diffing package changelogs, offering to remove orphaned
//! packages, and checking the Arch Linux news feed for announcements. The
//! news feed is polled in the background so that it never holds up pacman.

pub mod changelog;
pub mod config;
pub mod logmon;
pub mod news;
pub mod pacman;
pub mod path;
pub mod store;
pub mod update;

pub use changelog::{ChangelogDiff, ChangelogMap};
pub use config::Settings;
pub use logmon::LogMonitor;
pub use news::{Feed, FeedItem, NewsPoller};
pub use pacman::{Orphans, PackageManager, Pacman};
pub use store::{PollState, StateStore};
pub use update::{drain_news, Update, UpdateSummary};
