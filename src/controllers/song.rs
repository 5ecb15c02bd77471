use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

use crate::{config::Config, error::DownloadError, models::song::SearchQuery};

/// Fetches the audio track of a video into a local file.
#[allow(async_fn_in_trait)]
pub trait AudioAcquirer {
    /// Download `url` as mp3 to `destination`, returning the video metadata.
    async fn acquire(&self, url: &str, destination: &Path) -> Result<SearchQuery, DownloadError>;
}

/// `yt-dlp` backed downloader
pub struct SongController {
    program: String,
}

impl SongController {
    pub fn new(config: &Config) -> Self {
        SongController {
            program: config.ytdlp.clone(),
        }
    }

    fn download_args(url: &str, destination: &Path) -> Vec<OsString> {
        // yt-dlp picks the extension itself; the template pins the stem.
        let template: PathBuf = destination.with_extension("%(ext)s");
        let mut args: Vec<OsString> = [
            "-f",
            "bestaudio",
            "-x",
            "--audio-format",
            "mp3",
            "--audio-quality",
            "256K",
            "--no-playlist",
            "--force-overwrites",
            "--quiet",
            "--no-warnings",
            "--no-progress",
            "--dump-single-json",
            "--no-simulate",
            "-o",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        args.push(template.into_os_string());
        args.push(OsString::from(url));
        args
    }
}

impl AudioAcquirer for SongController {
    async fn acquire(&self, url: &str, destination: &Path) -> Result<SearchQuery, DownloadError> {
        info!("Downloading audio from {}", url);
        let output = Command::new(&self.program)
            .args(Self::download_args(url, destination))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| DownloadError::Spawn {
                tool: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DownloadError::Failed {
                url: url.to_string(),
                reason: stderr.trim().to_string(),
            });
        }

        if !destination.is_file() {
            return Err(DownloadError::MissingOutput(destination.to_path_buf()));
        }

        let query = parse_video_info(&output.stdout).map_err(|e| DownloadError::Failed {
            url: url.to_string(),
            reason: format!("unreadable video info: {}", e),
        })?;
        debug!("video_title={:?} uploader={:?}", query.raw_video_title, query.uploader_name);
        Ok(query)
    }
}

#[derive(Debug, Deserialize)]
struct VideoInfo {
    title: String,
    uploader: Option<String>,
}

/// The info JSON is the last non-empty line on stdout.
fn parse_video_info(stdout: &[u8]) -> Result<SearchQuery, serde_json::Error> {
    let text = String::from_utf8_lossy(stdout);
    let line = text
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or_default();
    let info: VideoInfo = serde_json::from_str(line)?;
    Ok(SearchQuery {
        raw_video_title: info.title,
        uploader_name: info.uploader.unwrap_or_default(),
    })
}
