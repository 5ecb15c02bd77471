// In-memory stand-ins for the external services
use std::collections::VecDeque;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::{
    controllers::{acoustid::FingerprintMatcher, song::AudioAcquirer, spotify::MusicCatalog},
    error::{DownloadError, FingerprintError, SpotifyError},
    models::{
        song::{Candidate, SearchQuery},
        spotify::{Playlist, PlaylistTrack, Session},
    },
    terminal::{Prompter, Tone},
};

/// Shared record of the calls made against the fakes
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn record(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.split(':').next() == Some(name))
            .count()
    }
}

pub fn track(id: &str, name: &str, artist: &str, popularity: u32) -> PlaylistTrack {
    PlaylistTrack {
        track_id: id.to_string(),
        uri: format!("spotify:track:{}", id),
        display_name: name.to_string(),
        artist_name: artist.to_string(),
        popularity,
    }
}

pub fn candidate(score: f64, title: &str, artist: &str) -> Candidate {
    Candidate {
        confidence_score: score,
        recording_id: format!("rec-{}", title.len()),
        title: Some(title.to_string()),
        artist: Some(artist.to_string()),
    }
}

pub struct FakeCatalog {
    pub log: CallLog,
    pub username: String,
    pub playlists: Vec<Playlist>,
    /// Name the backend reports for a created playlist, if not the requested one
    pub created_name: Option<String>,
    pub search_results: Vec<PlaylistTrack>,
    pub fail_auth: bool,
    /// Authentication never completes, like an unanswered consent page
    pub hang_auth: bool,
}

impl FakeCatalog {
    pub fn new(log: CallLog) -> Self {
        FakeCatalog {
            log,
            username: "alice".to_string(),
            playlists: Vec::new(),
            created_name: None,
            search_results: Vec::new(),
            fail_auth: false,
            hang_auth: false,
        }
    }
}

impl MusicCatalog for FakeCatalog {
    async fn authenticate(&self, username: &str) -> Result<Session, SpotifyError> {
        self.log.record(format!("authenticate:{}", username));
        if self.hang_auth {
            std::future::pending::<()>().await;
        }
        if self.fail_auth {
            return Err(SpotifyError::Auth(format!("denied for {}", username)));
        }
        Ok(Session {
            username: self.username.clone(),
            access_token: "token".to_string(),
            target_playlist_id: None,
        })
    }

    async fn user_playlists(&self, _session: &Session) -> Result<Vec<Playlist>, SpotifyError> {
        self.log.record("user_playlists");
        Ok(self.playlists.clone())
    }

    async fn create_playlist(
        &self,
        session: &Session,
        name: &str,
    ) -> Result<Playlist, SpotifyError> {
        self.log.record(format!("create_playlist:{}", name));
        Ok(Playlist {
            id: "created".to_string(),
            name: self.created_name.clone().unwrap_or_else(|| name.to_string()),
            owner_id: session.username.clone(),
        })
    }

    async fn search_tracks(
        &self,
        _session: &Session,
        query: &str,
    ) -> Result<Vec<PlaylistTrack>, SpotifyError> {
        self.log.record(format!("search_tracks:{}", query));
        Ok(self.search_results.clone())
    }

    async fn add_tracks(
        &self,
        _session: &Session,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), SpotifyError> {
        self.log.record(format!("add_tracks:{}:{}", playlist_id, uris.join(",")));
        Ok(())
    }
}

pub struct FakeAcquirer {
    pub log: CallLog,
    pub query: SearchQuery,
    /// Raised while the download is running
    pub interrupt: Option<watch::Sender<bool>>,
    pub fail: bool,
}

impl FakeAcquirer {
    pub fn new(log: CallLog, title: &str, uploader: &str) -> Self {
        FakeAcquirer {
            log,
            query: SearchQuery {
                raw_video_title: title.to_string(),
                uploader_name: uploader.to_string(),
            },
            interrupt: None,
            fail: false,
        }
    }
}

impl AudioAcquirer for FakeAcquirer {
    async fn acquire(&self, url: &str, destination: &Path) -> Result<SearchQuery, DownloadError> {
        self.log.record(format!("acquire:{}", url));
        std::fs::write(destination, b"ID3 fake audio").unwrap();
        if let Some(interrupt) = &self.interrupt {
            interrupt.send(true).unwrap();
        }
        if self.fail {
            return Err(DownloadError::Failed {
                url: url.to_string(),
                reason: "HTTP Error 403".to_string(),
            });
        }
        Ok(self.query.clone())
    }
}

pub struct FakeMatcher {
    pub log: CallLog,
    pub candidates: Vec<Candidate>,
}

impl FingerprintMatcher for FakeMatcher {
    async fn identify(&self, audio_path: &Path) -> Result<Vec<Candidate>, FingerprintError> {
        self.log.record("identify");
        assert!(audio_path.is_file(), "audio must exist while fingerprinting");
        Ok(self.candidates.clone())
    }
}

/// Answers prompts from a script and records everything said
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    pub said: Arc<Mutex<Vec<(Tone, String)>>>,
    /// Once the script runs out, wait forever instead of reporting EOF
    pub hang_when_done: bool,
}

impl ScriptedPrompter {
    pub fn new(answers: &[&str]) -> Self {
        ScriptedPrompter {
            answers: answers.iter().map(|a| a.to_string()).collect(),
            said: Arc::default(),
            hang_when_done: false,
        }
    }
}

impl Prompter for ScriptedPrompter {
    async fn ask(&mut self, prompt: &str) -> io::Result<String> {
        self.said
            .lock()
            .unwrap()
            .push((Tone::Progress, prompt.to_string()));
        match self.answers.pop_front() {
            Some(answer) => Ok(answer),
            None if self.hang_when_done => std::future::pending().await,
            None => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "script exhausted")),
        }
    }

    fn say(&mut self, tone: Tone, message: &str) {
        self.said.lock().unwrap().push((tone, message.to_string()));
    }
}
