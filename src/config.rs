// Layered configuration: defaults, TOML file, .env, then environment
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};
use url::Url;

use crate::error::ConfigError;

pub const PLAYLIST_NAME: &str = "Spotted on Spotify";

const TEMP_AUDIO_NAME: &str = "spotted-on-spotify.mp3";
const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8888/callback";
const DEFAULT_FPCALC: &str = "fpcalc";
const DEFAULT_YTDLP: &str = "yt-dlp";
const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 180;

const KEYS: &[&str] = &[
    "SPOTIFY_CLIENT_ID",
    "SPOTIFY_CLIENT_SECRET",
    "SPOTIFY_REDIRECT_URI",
    "ACOUSTID_API_KEY",
    "FPCALC",
    "YTDLP",
    "SPOTTED_DOWNLOAD_DIR",
    "SPOTTED_AUTH_TIMEOUT_SECS",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub spotify_client_id: String,
    pub spotify_client_secret: String,
    pub spotify_redirect_uri: Url,
    pub acoustid_api_key: String,
    pub fpcalc: PathBuf,
    pub ytdlp: String,
    pub download_dir: PathBuf,
    pub auth_timeout: Duration,
}

impl Config {
    /// Load and validate configuration. `fpcalc` must resolve to an
    /// executable here rather than at fingerprinting time.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let mut values = match config_file {
            Some(path) => read_config_file(path)?,
            None => match default_config_file() {
                Some(path) if path.is_file() => read_config_file(&path)?,
                _ => HashMap::new(),
            },
        };
        for key in KEYS {
            if let Ok(value) = env::var(key) {
                if !value.trim().is_empty() {
                    values.insert(key.to_string(), value);
                }
            }
        }

        // Log which keys are configured (NOT their values!)
        let configured: Vec<&str> = KEYS
            .iter()
            .copied()
            .filter(|key| lookup(&values, key).is_some())
            .collect();
        info!("Configuration keys set: {:?}", configured);

        let mut config = Self::from_values(&values)?;
        config.fpcalc = resolve_tool(&config.fpcalc)?;
        debug!("fpcalc resolved to {}", config.fpcalc.display());
        Ok(config)
    }

    fn from_values(values: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let spotify_client_id = require(values, "SPOTIFY_CLIENT_ID")?;
        let spotify_client_secret = require(values, "SPOTIFY_CLIENT_SECRET")?;
        let acoustid_api_key = require(values, "ACOUSTID_API_KEY")?;

        let redirect = lookup(values, "SPOTIFY_REDIRECT_URI").unwrap_or(DEFAULT_REDIRECT_URI);
        let spotify_redirect_uri = Url::parse(redirect).map_err(|_| ConfigError::Invalid {
            key: "SPOTIFY_REDIRECT_URI",
            value: redirect.to_string(),
        })?;

        let download_dir = match lookup(values, "SPOTTED_DOWNLOAD_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => default_download_dir().ok_or(ConfigError::Missing("SPOTTED_DOWNLOAD_DIR"))?,
        };

        let auth_timeout = match lookup(values, "SPOTTED_AUTH_TIMEOUT_SECS") {
            Some(raw) => raw.parse::<u64>().map_err(|_| ConfigError::Invalid {
                key: "SPOTTED_AUTH_TIMEOUT_SECS",
                value: raw.to_string(),
            })?,
            None => DEFAULT_AUTH_TIMEOUT_SECS,
        };

        Ok(Self {
            spotify_client_id,
            spotify_client_secret,
            spotify_redirect_uri,
            acoustid_api_key,
            fpcalc: PathBuf::from(lookup(values, "FPCALC").unwrap_or(DEFAULT_FPCALC)),
            ytdlp: lookup(values, "YTDLP").unwrap_or(DEFAULT_YTDLP).to_string(),
            download_dir,
            auth_timeout: Duration::from_secs(auth_timeout),
        })
    }

    /// Fixed per-run download location, overwritten by every run.
    pub fn temp_audio_path(&self) -> PathBuf {
        self.download_dir.join(TEMP_AUDIO_NAME)
    }
}

fn lookup<'a>(values: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    values
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn require(values: &HashMap<String, String>, key: &'static str) -> Result<String, ConfigError> {
    lookup(values, key)
        .map(str::to_string)
        .ok_or(ConfigError::Missing(key))
}

/// Flat TOML table; keys are the environment variable names in any case.
fn read_config_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let table: toml::Table = raw.parse().map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(table
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                toml::Value::String(s) => s,
                other => other.to_string(),
            };
            (key.to_uppercase(), value)
        })
        .collect())
}

fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("spotted-on-spotify").join("config.toml"))
}

fn default_download_dir() -> Option<PathBuf> {
    dirs::download_dir().or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
}

fn resolve_tool(tool: &Path) -> Result<PathBuf, ConfigError> {
    which::which(tool).map_err(|_| ConfigError::FpcalcNotFound(tool.display().to_string()))
}
