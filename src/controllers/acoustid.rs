// Chromaprint fingerprint via fpcalc, recording lookup via AcoustID
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

use crate::{config::Config, error::FingerprintError, models::song::Candidate};

const ACOUSTID_LOOKUP_URL: &str = "https://api.acoustid.org/v2/lookup";
const USER_AGENT: &str = concat!("spotted-on-spotify/", env!("CARGO_PKG_VERSION"));

/// Identifies the recording in a local audio file.
#[allow(async_fn_in_trait)]
pub trait FingerprintMatcher {
    /// Candidates ranked by confidence, highest first.
    async fn identify(&self, audio_path: &Path) -> Result<Vec<Candidate>, FingerprintError>;
}

#[derive(Debug, Deserialize)]
struct FpcalcOutput {
    duration: f64,
    fingerprint: String,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    status: String,
    #[serde(default)]
    results: Vec<LookupResult>,
    error: Option<LookupError>,
}

#[derive(Debug, Deserialize)]
struct LookupError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct LookupResult {
    score: f64, // 0.0 to 1.0
    #[serde(default)]
    recordings: Vec<Recording>,
}

#[derive(Debug, Deserialize)]
struct Recording {
    id: String, // MusicBrainz recording MBID
    title: Option<String>,
    artists: Option<Vec<RecordingArtist>>,
}

#[derive(Debug, Deserialize)]
struct RecordingArtist {
    name: String,
    joinphrase: Option<String>,
}

pub struct AcoustIdController {
    client: Client,
    api_key: String,
    fpcalc: PathBuf,
}

impl AcoustIdController {
    pub fn new(config: &Config) -> Result<Self, FingerprintError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| FingerprintError::WebService(e.to_string()))?;

        Ok(Self {
            client,
            api_key: config.acoustid_api_key.clone(),
            fpcalc: config.fpcalc.clone(),
        })
    }

    async fn fingerprint(&self, audio_path: &Path) -> Result<FpcalcOutput, FingerprintError> {
        let output = Command::new(&self.fpcalc)
            .arg("-json")
            .arg(audio_path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                    FingerprintError::ToolNotFound(e)
                }
                _ => FingerprintError::Generation(e.to_string()),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FingerprintError::Generation(stderr.trim().to_string()));
        }

        parse_fpcalc(&output.stdout)
    }

    async fn lookup(&self, fingerprint: &FpcalcOutput) -> Result<String, FingerprintError> {
        let duration = fingerprint.duration.round().to_string();
        let params = [
            ("client", self.api_key.as_str()),
            ("meta", "recordings"),
            ("duration", duration.as_str()),
            ("fingerprint", fingerprint.fingerprint.as_str()),
        ];

        debug!(duration = %duration, "Querying AcoustID");

        // AcoustID reports API errors as JSON with a non-200 status, so the
        // body is read either way and interpreted by `parse_lookup`.
        let response = self
            .client
            .post(ACOUSTID_LOOKUP_URL)
            .form(&params)
            .send()
            .await
            .map_err(|e| FingerprintError::WebService(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FingerprintError::WebService(e.to_string()))?;

        if !status.is_success() && serde_json::from_str::<LookupResponse>(&body).is_err() {
            return Err(FingerprintError::WebService(format!("HTTP {}", status)));
        }
        Ok(body)
    }
}

impl FingerprintMatcher for AcoustIdController {
    async fn identify(&self, audio_path: &Path) -> Result<Vec<Candidate>, FingerprintError> {
        let fingerprint = self.fingerprint(audio_path).await?;
        let body = self.lookup(&fingerprint).await?;
        let candidates = parse_lookup(&body)?;
        info!("AcoustID returned {} candidates", candidates.len());
        Ok(candidates)
    }
}

fn parse_fpcalc(stdout: &[u8]) -> Result<FpcalcOutput, FingerprintError> {
    let parsed: FpcalcOutput = serde_json::from_slice(stdout)
        .map_err(|e| FingerprintError::Generation(format!("unreadable fpcalc output: {}", e)))?;
    if parsed.fingerprint.is_empty() {
        return Err(FingerprintError::Generation("empty fingerprint".to_string()));
    }
    Ok(parsed)
}

/// One candidate per recording of every result, ranked by score.
fn parse_lookup(body: &str) -> Result<Vec<Candidate>, FingerprintError> {
    let response: LookupResponse = serde_json::from_str(body)
        .map_err(|e| FingerprintError::WebService(format!("unreadable response: {}", e)))?;

    if response.status != "ok" {
        let message = response
            .error
            .map(|e| e.message)
            .unwrap_or_else(|| format!("status {}", response.status));
        return Err(FingerprintError::WebService(message));
    }

    let mut candidates: Vec<Candidate> = response
        .results
        .into_iter()
        .flat_map(|result| {
            let score = result.score * 100.0;
            result.recordings.into_iter().map(move |recording| Candidate {
                confidence_score: score,
                recording_id: recording.id,
                title: recording.title,
                artist: recording.artists.as_deref().and_then(join_artists),
            })
        })
        .collect();

    rank_candidates(&mut candidates);
    Ok(candidates)
}

fn join_artists(artists: &[RecordingArtist]) -> Option<String> {
    if artists.is_empty() {
        return None;
    }
    let mut joined = String::new();
    for (i, artist) in artists.iter().enumerate() {
        joined.push_str(&artist.name);
        if i + 1 < artists.len() {
            joined.push_str(artist.joinphrase.as_deref().unwrap_or("; "));
        }
    }
    Some(joined)
}

/// Highest confidence first. The sort is stable, so equal scores keep the
/// service's order.
pub fn rank_candidates(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| b.confidence_score.total_cmp(&a.confidence_score));
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOOKUP_BODY: &str = r#"{
        "status": "ok",
        "results": [
            {
                "id": "a1",
                "score": 0.52,
                "recordings": [
                    {"id": "rec-low", "title": "Other Song", "artists": [{"id": "x", "name": "Other"}]}
                ]
            },
            {"id": "a2", "score": 0.9},
            {
                "id": "a3",
                "score": 0.97,
                "recordings": [
                    {
                        "id": "rec-first",
                        "title": "Under Pressure",
                        "artists": [
                            {"id": "q", "name": "Queen", "joinphrase": " & "},
                            {"id": "b", "name": "David Bowie"}
                        ]
                    },
                    {"id": "rec-second"}
                ]
            }
        ]
    }"#;

    #[test]
    fn test_parse_lookup_ranks_by_score() {
        let candidates = parse_lookup(LOOKUP_BODY).unwrap();

        let ids: Vec<&str> = candidates.iter().map(|c| c.recording_id.as_str()).collect();
        assert_eq!(ids, vec!["rec-first", "rec-second", "rec-low"]);
        assert!((candidates[0].confidence_score - 97.0).abs() < 1e-9);
        assert_eq!(candidates[0].artist.as_deref(), Some("Queen & David Bowie"));
        assert_eq!(candidates[1].title, None);
        assert_eq!(candidates[1].artist, None);
    }

    #[test]
    fn test_parse_lookup_without_results() {
        let candidates = parse_lookup(r#"{"status": "ok", "results": []}"#).unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_parse_lookup_service_error() {
        let body = r#"{"status": "error", "error": {"code": 4, "message": "invalid API key"}}"#;
        let err = parse_lookup(body).unwrap_err();
        match err {
            FingerprintError::WebService(message) => assert_eq!(message, "invalid API key"),
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(matches!(
            parse_lookup("<html>").unwrap_err(),
            FingerprintError::WebService(_)
        ));
    }

    #[test]
    fn test_join_artists_defaults_separator() {
        let artists = vec![
            RecordingArtist {
                name: "A".to_string(),
                joinphrase: None,
            },
            RecordingArtist {
                name: "B".to_string(),
                joinphrase: Some(" feat. ".to_string()),
            },
            RecordingArtist {
                name: "C".to_string(),
                joinphrase: None,
            },
        ];
        assert_eq!(join_artists(&artists).as_deref(), Some("A; B feat. C"));
        assert_eq!(join_artists(&[]), None);
    }

    #[test]
    fn test_rank_candidates_is_stable() {
        let mut candidates: Vec<Candidate> = [("first", 80.0), ("top", 95.0), ("second", 80.0)]
            .into_iter()
            .map(|(id, score)| Candidate {
                confidence_score: score,
                recording_id: id.to_string(),
                title: None,
                artist: None,
            })
            .collect();

        rank_candidates(&mut candidates);
        let ids: Vec<&str> = candidates.iter().map(|c| c.recording_id.as_str()).collect();
        assert_eq!(ids, vec!["top", "first", "second"]);
    }

    #[test]
    fn test_parse_fpcalc() {
        let parsed = parse_fpcalc(br#"{"duration": 215.34, "fingerprint": "AQADtE"}"#).unwrap();
        assert_eq!(parsed.fingerprint, "AQADtE");
        assert!((parsed.duration - 215.34).abs() < 1e-9);

        assert!(matches!(
            parse_fpcalc(b"ERROR: unable to open file").unwrap_err(),
            FingerprintError::Generation(_)
        ));
    }

    #[tokio::test]
    async fn test_missing_fpcalc_is_tool_not_found() {
        let controller = AcoustIdController {
            client: Client::new(),
            api_key: "key".to_string(),
            fpcalc: PathBuf::from("/nonexistent/bin/fpcalc"),
        };
        let err = controller
            .identify(Path::new("/tmp/missing.mp3"))
            .await
            .unwrap_err();
        assert!(matches!(err, FingerprintError::ToolNotFound(_)));
    }
}
