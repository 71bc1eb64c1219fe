use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::error::{ConfigError, DirectoryError};

/// Validated configuration. Built once at startup and passed by reference.
#[derive(Debug, Clone)]
pub struct Config {
    pub session_id: String,
    pub api_id: i32,
    pub api_hash: String,
    pub download_dir: Option<PathBuf>,
}

/// On-disk shape. Every field optional so validation can report all gaps at once.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    api_id: Option<Value>,
    #[serde(default)]
    api_hash: Option<String>,
    #[serde(default)]
    download_dir: Option<String>,
}

/// `<config_dir>/telegrab.json`
pub fn default_config_path() -> Result<PathBuf, DirectoryError> {
    dirs::config_dir()
        .map(|dir| dir.join("telegrab.json"))
        .ok_or(DirectoryError::NoConfigDir)
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let raw: RawConfig = serde_json::from_str(content)?;

    let session_id = non_empty(raw.session_id);
    let api_id = raw.api_id.and_then(|v| match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });
    let api_hash = non_empty(raw.api_hash);

    let mut missing = Vec::new();
    if session_id.is_none() {
        missing.push("session_id");
    }
    if api_id.is_none() {
        missing.push("api_id");
    }
    if api_hash.is_none() {
        missing.push("api_hash");
    }

    let (Some(session_id), Some(api_id), Some(api_hash)) = (session_id, api_id, api_hash) else {
        return Err(ConfigError::MissingField(missing));
    };

    let api_id = api_id
        .parse::<i32>()
        .map_err(|_| ConfigError::Invalid(format!("api_id '{api_id}' is not a number")))?;

    Ok(Config {
        session_id,
        api_id,
        api_hash,
        download_dir: non_empty(raw.download_dir).map(PathBuf::from),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Pick the download directory: the command-line override wins over config.
pub fn resolve_download_dir(config: &Config, override_dir: Option<&Path>) -> Result<PathBuf, DirectoryError> {
    let chosen = override_dir
        .or(config.download_dir.as_deref())
        .ok_or(DirectoryError::NotSpecified)?;
    let path = expand_home(chosen);

    if !path.exists() {
        return Err(DirectoryError::Missing(path));
    }
    if !path.is_dir() {
        return Err(DirectoryError::NotADirectory(path));
    }
    // Mode bits ignore ownership, so try a real write.
    if tempfile::tempfile_in(&path).is_err() {
        return Err(DirectoryError::ReadOnly(path));
    }

    Ok(path.canonicalize().unwrap_or(path))
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}
