//! Session storage location for the grammers client.
//!
//! Each `session_id` gets its own SQLite session file under
//! `<config_dir>/telegrab/`. Keeping the id stable across runs means the
//! account stays logged in.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use grammers_session::storages::SqliteSession;
use tracing::{debug, info};

use crate::error::DirectoryError;

const SESSION_DIR: &str = "telegrab";

/// `<config_dir>/telegrab/<session_id>`
pub fn session_path(config_dir: &Path, session_id: &str) -> PathBuf {
    config_dir.join(SESSION_DIR).join(session_id)
}

/// Create `<config_dir>/telegrab` if absent. Not recursive: a missing
/// `config_dir` is an error rather than something we paper over.
pub fn prepare_session_dir(config_dir: &Path) -> Result<PathBuf, DirectoryError> {
    let dir = config_dir.join(SESSION_DIR);
    if dir.is_dir() {
        return Ok(dir);
    }
    std::fs::create_dir(&dir).map_err(|source| DirectoryError::Create {
        path: dir.clone(),
        source,
    })?;
    info!(path = %dir.display(), "created session directory");
    Ok(dir)
}

/// Open (or create on first use) the session database for `session_id`.
pub async fn open_session(config_dir: &Path, session_id: &str) -> Result<Arc<SqliteSession>> {
    prepare_session_dir(config_dir)?;
    let path = session_path(config_dir, session_id);
    debug!(path = %path.display(), "opening Telegram session");
    let session = SqliteSession::open(&path)
        .await
        .with_context(|| format!("opening session file {}", path.display()))?;
    Ok(Arc::new(session))
}
