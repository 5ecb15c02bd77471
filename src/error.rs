// Error types; no-match conditions are kept apart from failures
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Startup configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("Chromaprint tool {0:?} not found; set FPCALC to the fpcalc binary")]
    FpcalcNotFound(String),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },

    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Audio download errors
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to download file from {url}: {reason}")]
    Failed { url: String, reason: String },

    #[error("Download finished but {} is missing", .0.display())]
    MissingOutput(PathBuf),
}

/// Fingerprint lookup errors
#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("Chromaprint library/tool not found: {0}")]
    ToolNotFound(#[source] io::Error),

    #[error("Audio fingerprint could not be calculated: {0}")]
    Generation(String),

    #[error("Web service request failed: {0}")]
    WebService(String),
}

/// Spotify errors
#[derive(Debug, Error)]
pub enum SpotifyError {
    #[error("Cannot get token: {0}")]
    Auth(String),

    #[error("Spotify service request failed: {0}")]
    Service(String),

    #[error("Created playlist is named {actual:?} instead of {expected:?}")]
    PlaylistMismatch { expected: String, actual: String },
}

/// Lookups that completed but found nothing usable
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NoMatch {
    #[error("Failed to find a match for your track in the MusicBrainz database.")]
    NotInDatabase,

    #[error(
        "There were no matches for your track with valid ASCII encodings. \
         Could not search for your track on Spotify."
    )]
    NoValidEncoding,

    #[error("Failed to find a match for {title} by {artist} on Spotify.")]
    NotInCatalog { title: String, artist: String },
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),

    #[error(transparent)]
    Spotify(#[from] SpotifyError),

    #[error(transparent)]
    NoMatch(#[from] NoMatch),

    #[error("Failed to read from the terminal: {0}")]
    Terminal(#[from] io::Error),

    #[error("Exiting Spotted on Spotify...")]
    Interrupted,
}

impl AppError {
    pub fn is_no_match(&self) -> bool {
        matches!(self, AppError::NoMatch(_))
    }
}
