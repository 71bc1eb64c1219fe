use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read config file: {0}")]
    ReadFile(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("missing required config field(s): {}", .0.join(", "))]
    MissingField(Vec<&'static str>),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("no download directory given, set download_dir in config or pass --download-dir")]
    NotSpecified,
    #[error("directory {} does not exist, please create it", .0.display())]
    Missing(PathBuf),
    #[error("path {} is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("directory {} is not writable", .0.display())]
    ReadOnly(PathBuf),
    #[error("could not determine the user config directory")]
    NoConfigDir,
    #[error("failed to create directory {}: {source}", path.display())]
    Create { path: PathBuf, source: std::io::Error },
}

/// Media payload that does not have the document/attributes shape we need.
#[derive(Debug, Error)]
pub enum StructuralMediaError {
    #[error("media has no document")]
    MissingDocument,
    #[error("document has no attributes")]
    MissingAttributes,
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("transfer truncated: received {received} of {total} bytes")]
    Truncated { received: u64, total: u64 },
    #[error("download request failed: {0}")]
    Request(String),
    #[error("failed writing download: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a single message produced no download. Never fatal to the run.
#[derive(Debug, Error)]
pub enum Skip {
    #[error("message does not match the search filter")]
    FilteredOut,
    #[error("message has no media")]
    TextOnly,
    #[error(transparent)]
    Structural(#[from] StructuralMediaError),
    #[error("attachment has no filename")]
    NoFilename,
    #[error("already downloaded: {}", .0.display())]
    AlreadyDownloaded(PathBuf),
    #[error("collision not resolved for {}", .0.display())]
    CollisionUnresolved(PathBuf),
    #[error("download declined")]
    Declined,
    #[error(transparent)]
    Transfer(#[from] TransferError),
}

/// Ends the whole run.
#[derive(Debug, Error)]
pub enum Abort {
    #[error("prompt cancelled, bailing out")]
    Cancelled,
    #[error("interrupted by user")]
    Interrupted { removed: Option<PathBuf> },
    #[error("prompt failed: {0}")]
    Prompt(String),
}
