mod chat;
mod cli;
mod config;
mod download;
mod error;
mod fetch_tg;
mod models;
mod prompt;
mod telegram;
mod tg_session;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::chat::Selection;
use crate::cli::Cli;
use crate::config::{Config, default_config_path, load_config, resolve_download_dir};
use crate::download::{DownloadOptions, Downloader};
use crate::error::{Abort, DirectoryError};
use crate::prompt::InquirePrompter;
use crate::telegram::{TgConnection, TgTransfer};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let default_level = if cli.debug { "telegrab=debug,warn" } else { "telegrab=info,warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => match e.downcast_ref::<Abort>() {
            Some(Abort::Interrupted { removed }) => {
                match removed {
                    Some(path) => warn!(path = %path.display(), "interrupted, removed partial download"),
                    None => warn!("interrupted"),
                }
                ExitCode::from(130)
            }
            Some(Abort::Cancelled) => {
                info!("prompt cancelled, bailing out");
                ExitCode::FAILURE
            }
            _ => {
                error!(error = format!("{e:#}"), "telegrab failed");
                ExitCode::FAILURE
            }
        },
    }
}

/// Ok(false) is a clean, already-logged failure.
async fn run(cli: Cli) -> Result<bool> {
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };
    let config = match load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!(path = %config_path.display(), error = %e, "unable to load config");
            return Ok(false);
        }
    };
    info!(config_path = %config_path.display(), "config loaded");

    // Listing chats never writes files, so it doesn't need a download dir.
    let download_dir = if cli.list_chats {
        None
    } else {
        match resolve_download_dir(&config, cli.download_dir.as_deref()) {
            Ok(dir) => Some(dir),
            Err(e) => {
                error!(error = %e, "invalid download directory");
                return Ok(false);
            }
        }
    };

    let Some(config_dir) = dirs::config_dir() else {
        error!(error = %DirectoryError::NoConfigDir, "cannot store session");
        return Ok(false);
    };
    if let Err(e) = tg_session::prepare_session_dir(&config_dir) {
        error!(error = %e, "cannot store session");
        return Ok(false);
    }

    let conn = telegram::connect(&config, &config_dir)
        .await
        .context("connecting to Telegram")?;

    let result = grab(&cli, &config, &conn, download_dir).await;

    // Disconnect cleanly
    conn.disconnect();
    result
}

async fn grab(cli: &Cli, config: &Config, conn: &TgConnection, download_dir: Option<PathBuf>) -> Result<bool> {
    let mut prompter = InquirePrompter;
    telegram::authenticate(&conn.client, config, &mut prompter)
        .await
        .context("Telegram login")?;

    let cancel = CancellationToken::new();
    watch_interrupt(cancel.clone());

    if cli.list_chats {
        for conversation in telegram::list_conversations(conn, &cancel).await? {
            println!("{}", conversation.display_name());
        }
        return Ok(true);
    }
    let Some(download_dir) = download_dir else {
        return Ok(false);
    };

    let chat = match telegram::select_conversation(conn, cli.channel.as_deref(), &mut prompter, &cancel).await? {
        Selection::Chosen(chat) => chat,
        Selection::NotFound => {
            error!("no chats found on this account");
            return Ok(false);
        }
        Selection::BailOut => {
            error!("couldn't select a chat, bailing");
            return Ok(false);
        }
    };
    info!(chat = %chat.display_name(), id = chat.id, dir = %download_dir.display(), "grabbing files");

    let transfer = TgTransfer::new(&conn.client);
    let options = DownloadOptions {
        download_dir,
        interactive: cli.debug,
        assume_yes: cli.yes,
        search: cli.search.clone(),
    };
    let mut downloader = Downloader::new(&transfer, &mut prompter, options, cancel.clone());
    let summary = telegram::grab_history(&conn.client, &chat, &mut downloader, &cancel).await?;

    info!(
        downloaded = summary.downloaded,
        skipped = summary.skipped,
        "finished"
    );
    Ok(true)
}

/// Ctrl-C cancels the token; everything after login stops on it.
fn watch_interrupt(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received");
            cancel.cancel();
        }
    });
}
