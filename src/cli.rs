use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "telegrab", version, about = "Download file attachments from Telegram chats")]
pub struct Cli {
    /// Path to configuration file [default: <config dir>/telegrab.json]
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Verbose logging; also asks before renaming files that already exist
    #[arg(long, short)]
    pub debug: bool,

    /// Print every chat name and exit
    #[arg(long, short)]
    pub list_chats: bool,

    /// Which chat to pull from (exact title, or "First Last" for people)
    #[arg(long)]
    pub channel: Option<String>,

    /// Where to save files (overrides download_dir in config)
    #[arg(long, short = 'o')]
    pub download_dir: Option<PathBuf>,

    /// Only consider messages containing this text (case-insensitive)
    #[arg(long, short)]
    pub search: Option<String>,

    /// Download without asking for confirmation per file
    #[arg(long, short)]
    pub yes: bool,
}
