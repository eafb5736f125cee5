// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Arch Linux news polling.
//!
//! Some upgrades need manual intervention, and the Arch Linux developers
//! announce those through the news feed. Archupd fetches the feed in the
//! background while pacman does its thing, and reports any item that has not
//! been shown on an earlier run.
//!
//! # Conditional Fetch
//!
//! The feed rarely changes, so the `Last-Modified` header of the last
//! successful response is echoed back as `If-Modified-Since`. Most runs thus
//! end with a cheap `304 Not Modified`.
//!
//! # Watermark
//!
//! The publication time of the newest item seen so far is remembered as a
//! watermark. Only items published strictly after it are announced. The
//! watermark only ever moves forward.
//!
//! # Known Quirk
//!
//! The new cache validator is captured before the feed body is parsed, and
//! the state is saved even when parsing fails. A malformed response that the
//! server keeps serving as unmodified is therefore never retried.

use crate::store::{PollState, StateStore};

use chrono::{DateTime, Local, Utc};
use reqwest::{
    header::{IF_MODIFIED_SINCE, LAST_MODIFIED},
    Client, StatusCode,
};
use serde::Deserialize;
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};
use tokio::sync::mpsc;
use tracing::{debug, instrument};

/// Capacity of news result channel.
pub const NEWS_CHANNEL_CAPACITY: usize = 10;

/// One news announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub published_at: DateTime<Utc>,
    pub guid: String,
}

impl Display for FeedItem {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(
            fmt,
            "{}: {} ({})",
            self.published_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
            self.title,
            self.link
        )
    }
}

/// Parsed RSS news feed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Feed {
    pub items: Vec<FeedItem>,
}

impl FromStr for Feed {
    type Err = NewsError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let document: RssDocument = quick_xml::de::from_str(data)?;
        let items = document
            .channel
            .items
            .into_iter()
            .map(FeedItem::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { items })
    }
}

#[derive(Debug, Deserialize)]
struct RssDocument {
    channel: RssChannel,
}

#[derive(Debug, Deserialize)]
struct RssChannel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    #[serde(default)]
    title: String,

    #[serde(default)]
    link: String,

    #[serde(rename = "pubDate", default)]
    pub_date: String,

    #[serde(default)]
    guid: RssGuid,
}

#[derive(Debug, Default, Deserialize)]
struct RssGuid {
    #[serde(rename = "$text", default)]
    value: String,
}

impl TryFrom<RssItem> for FeedItem {
    type Error = NewsError;

    fn try_from(item: RssItem) -> Result<Self, Self::Error> {
        // Undated items sort last and are never newer than any watermark.
        let pub_date = item.pub_date.trim();
        let published_at = if pub_date.is_empty() {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::parse_from_rfc2822(pub_date)
                .map_err(|err| NewsError::Timestamp {
                    source: err,
                    value: item.pub_date.clone(),
                })?
                .with_timezone(&Utc)
        };

        Ok(Self {
            title: item.title,
            link: item.link,
            published_at,
            guid: item.guid.value,
        })
    }
}

/// Select items to announce and advance the watermark.
///
/// Items are reported newest first. The watermark moves to the newest item in
/// the feed even when nothing was announced, but never moves backwards.
pub fn announce(mut items: Vec<FeedItem>, state: &mut PollState) -> Vec<String> {
    items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    let Some(newest) = items.first().map(|item| item.published_at) else {
        return vec!["No news (empty feed).".into()];
    };

    let seen = state.latest_seen.unwrap_or(DateTime::<Utc>::MIN_UTC);
    let mut lines = items
        .iter()
        .filter(|item| item.published_at > seen)
        .map(ToString::to_string)
        .collect::<Vec<_>>();

    state.latest_seen = Some(state.latest_seen.map_or(newest, |seen| seen.max(newest)));

    if lines.is_empty() {
        lines.push("No new news.".into());
    }

    lines
}

/// Background news feed poller.
#[derive(Debug, Clone)]
pub struct NewsPoller {
    client: Client,
    url: String,
    store: StateStore,
}

impl NewsPoller {
    /// Construct new news poller.
    ///
    /// # Errors
    ///
    /// - Return [`NewsError::Request`] if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, store: StateStore) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
            store,
        })
    }

    /// Spawn poll onto the current runtime.
    ///
    /// The returned receiver yields report lines in order, and closes once
    /// the poll is done.
    pub fn spawn(self) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(NEWS_CHANNEL_CAPACITY);
        tokio::spawn(async move { self.poll(tx).await });
        rx
    }

    /// Poll the news feed once, sending report lines through `tx`.
    ///
    /// Never fails. Every problem becomes a report line. Dropping `tx` at the
    /// end closes the channel.
    #[instrument(skip(self, tx), fields(url = %self.url), level = "debug")]
    pub async fn poll(&self, tx: mpsc::Sender<String>) {
        for line in self.report().await {
            if tx.send(line).await.is_err() {
                debug!("news receiver dropped");
                break;
            }
        }
    }

    async fn report(&self) -> Vec<String> {
        let mut state = self.store.load();

        let mut request = self.client.get(&self.url);
        if !state.last_modified.is_empty() {
            debug!("fetch news if modified since {}", state.last_modified);
            request = request.header(IF_MODIFIED_SINCE, state.last_modified.as_str());
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => return vec![format!("Failed to fetch news: {err}")],
        };

        match response.status() {
            StatusCode::NOT_MODIFIED => return vec!["No news (not modified).".into()],
            StatusCode::OK => {}
            status => return vec![format!("Unexpected HTTP status: {status}")],
        }

        if let Some(value) = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|value| value.to_str().ok())
        {
            state.last_modified = value.to_owned();
        }

        let feed = match response.text().await {
            Ok(body) => body.parse::<Feed>(),
            Err(err) => Err(NewsError::from(err)),
        };
        let lines = match feed {
            Ok(feed) => announce(feed.items, &mut state),
            Err(err) => vec![format!("Failed to decode news feed: {err}")],
        };

        self.store.save(&state);
        lines
    }
}

/// News polling error types.
#[derive(Debug, thiserror::Error)]
pub enum NewsError {
    /// HTTP request fails.
    #[error(transparent)]
    Request(#[from] reqwest::Error),

    /// Feed document is malformed.
    #[error(transparent)]
    Decode(#[from] quick_xml::de::DeError),

    /// Publication timestamp is malformed.
    #[error("invalid publication date {value:?}")]
    Timestamp {
        #[source]
        source: chrono::ParseError,
        value: String,
    },
}

/// Friendly result alias :3
pub type Result<T, E = NewsError> = std::result::Result<T, E>;
