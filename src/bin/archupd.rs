// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use archupd::{
    config::Settings,
    news::NewsPoller,
    pacman::Pacman,
    path::{default_config_file, default_state_file},
    store::StateStore,
    update::{drain_news, Update},
};

use anyhow::Result;
use clap::Parser;
use std::{io::stdout, path::PathBuf, process::exit};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Arch Linux updater.
///
/// Runs without arguments and will:
///
///   - Run "sudo pacman -Sc" to clean up old packages.
///   - Run "sudo pacman -Syu" to update outdated packages.
///   - Show relevant pacman logfile contents, which includes the old and new
///     version of each package.
///   - Show any new package changelog entries.
///   - Offer to remove packages that have become unrequired.
///   - Display any new official Arch Linux news from RSS feed.
#[derive(Debug, Clone, Parser)]
#[command(about, long_about, version)]
struct Cli {
    /// Path to settings file.
    #[arg(short, long, value_name = "path")]
    pub config: Option<PathBuf>,

    /// Skip polling the Arch Linux news feed.
    #[arg(long)]
    pub no_news: bool,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let settings = match &self.config {
            Some(path) => Settings::load(path, true)?,
            None => Settings::load(default_config_file()?, false)?,
        };

        let news = if settings.news.enabled && !self.no_news {
            Some(spawn_news(&settings)?)
        } else {
            info!("news polling disabled");
            None
        };

        let pacman = Pacman::new(&settings.pacman.escalation, &settings.pacman.command)?;
        let mut update = Update::new(
            pacman,
            settings.pacman.log_file,
            settings.pacman.log_marker,
            stdout(),
        );
        tokio::task::spawn_blocking(move || update.run()).await??;

        if let Some(news) = news {
            drain_news(news, &mut stdout()).await?;
        }

        Ok(())
    }
}

fn spawn_news(settings: &Settings) -> Result<mpsc::Receiver<String>> {
    let state_file = match &settings.news.state_file {
        Some(path) => path.clone(),
        None => default_state_file()?,
    };
    let poller = NewsPoller::new(&settings.news.url, StateStore::new(state_file))?;

    Ok(poller.spawn())
}

#[tokio::main]
async fn main() {
    let layer = fmt::layer()
        .compact()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn run() -> Result<()> {
    Cli::parse().run().await
}
