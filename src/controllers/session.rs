// Interactive run: consent, login, playlist, download, identify, confirm, append
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{
    config::PLAYLIST_NAME,
    controllers::{
        acoustid::FingerprintMatcher,
        parser::{normalize_query, select_candidate},
        playlist::PlaylistManager,
        song::AudioAcquirer,
        spotify::MusicCatalog,
    },
    error::{AppError, NoMatch},
    models::{
        song::{SearchKey, SearchQuery},
        spotify::PlaylistTrack,
    },
    signal::Interrupt,
    terminal::{Prompter, Tone},
};

const CONSENT_NOTICE: &str = "ALERT: Continuing allows this program to access your public\n       playlists and create/modify a new playlist.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Authenticating,
    PlaylistReady,
    Downloading,
    Fingerprinting,
    AwaitingConfirmation,
    Appending,
    Done,
    Failed,
}

#[derive(Debug)]
pub enum Outcome {
    Added(PlaylistTrack),
    Declined,
}

/// What is already known before the run starts. Missing values are prompted.
#[derive(Debug, Default)]
pub struct Request {
    pub url: Option<String>,
    pub username: Option<String>,
    pub use_title: bool,
}

/// Process exit status for a finished run.
pub fn exit_code(result: &Result<Outcome, AppError>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(_) => 1,
    }
}

/// Removes the downloaded audio, plus any partial download sharing its stem,
/// when dropped.
struct TempAudio {
    path: PathBuf,
}

impl TempAudio {
    fn new(path: PathBuf) -> Self {
        TempAudio { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempAudio {
    fn drop(&mut self) {
        remove_file(&self.path);

        let (Some(dir), Some(stem)) = (self.path.parent(), self.path.file_stem()) else {
            return;
        };
        let prefix = format!("{}.", stem.to_string_lossy());
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            if entry.file_name().to_string_lossy().starts_with(&prefix) {
                remove_file(&entry.path());
            }
        }
    }
}

fn remove_file(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove {}: {}", path.display(), e),
    }
}

pub struct SessionController<A, F, C, P> {
    acquirer: A,
    matcher: F,
    playlists: PlaylistManager<C>,
    prompter: P,
    interrupt: Interrupt,
    temp_audio: PathBuf,
    state: State,
}

impl<A, F, C, P> SessionController<A, F, C, P>
where
    A: AudioAcquirer,
    F: FingerprintMatcher,
    C: MusicCatalog,
    P: Prompter,
{
    pub fn new(
        acquirer: A,
        matcher: F,
        playlists: PlaylistManager<C>,
        prompter: P,
        interrupt: Interrupt,
        temp_audio: PathBuf,
    ) -> Self {
        SessionController {
            acquirer,
            matcher,
            playlists,
            prompter,
            interrupt,
            temp_audio,
            state: State::Idle,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Drive one run to completion and report its result on the terminal.
    pub async fn run(&mut self, request: Request) -> Result<Outcome, AppError> {
        let result = self.drive(request).await;
        match &result {
            Ok(Outcome::Added(_)) => {}
            Ok(Outcome::Declined) => {
                self.prompter.say(Tone::Info, "Thanks for stopping by!");
            }
            Err(e) => {
                self.state = State::Failed;
                self.report(e);
            }
        }
        result
    }

    async fn drive(&mut self, request: Request) -> Result<Outcome, AppError> {
        self.prompter.say(Tone::Warning, CONSENT_NOTICE);
        if !self.confirm("Would you like to continue? (y/n): ").await? {
            return Ok(Outcome::Declined);
        }

        self.enter(State::Authenticating)?;
        let username = match request.username {
            Some(username) => username,
            None => self.ask("Enter your Spotify username: ").await?,
        };
        let mut session =
            interruptible(&self.interrupt, self.playlists.authenticate(&username)).await?;

        self.enter(State::PlaylistReady)?;
        let ensured = self.playlists.ensure_playlist(&mut session, PLAYLIST_NAME);
        let playlist_id = interruptible(&self.interrupt, ensured).await?;

        let url = match request.url {
            Some(url) => url,
            None => {
                self.ask("Please enter a valid YouTube/SoundCloud URL: ")
                    .await?
            }
        };

        self.enter(State::Downloading)?;
        let audio = TempAudio::new(self.temp_audio.clone());
        self.prompter.say(Tone::Progress, "Downloading mp3 from URL...");
        let acquired = self.acquirer.acquire(&url, audio.path());
        let query = interruptible(&self.interrupt, acquired).await?;

        self.enter(State::Fingerprinting)?;
        let key = if request.use_title {
            let key = normalize_query(&query);
            self.prompter
                .say(Tone::Match, &format!("Video title suggests: {}", key));
            key
        } else {
            self.identify(audio.path(), &query).await?
        };

        self.prompter.say(Tone::Progress, "Searching Spotify...");
        let found = self.playlists.find_best_track(&session, &key);
        let track = interruptible(&self.interrupt, found)
            .await?
            .ok_or_else(|| NoMatch::NotInCatalog {
                title: key.title.clone(),
                artist: key.artist.clone(),
            })?;

        self.enter(State::AwaitingConfirmation)?;
        let prompt = format!(
            "Would you like to add {} to {}? (y/n): ",
            track.full_title(),
            PLAYLIST_NAME
        );
        if !self.confirm(&prompt).await? {
            return Ok(Outcome::Declined);
        }

        self.enter(State::Appending)?;
        let appended = self.playlists.append_track(&session, &playlist_id, &track);
        interruptible(&self.interrupt, appended).await?;

        self.state = State::Done;
        self.prompter.say(Tone::Success, "Success!");
        Ok(Outcome::Added(track))
    }

    async fn identify(&mut self, audio: &Path, query: &SearchQuery) -> Result<SearchKey, AppError> {
        debug!("Video title suggests {}", normalize_query(query));
        self.prompter
            .say(Tone::Progress, "Analyzing audio fingerprint...");

        let candidates = interruptible(&self.interrupt, self.matcher.identify(audio)).await?;
        if candidates.is_empty() {
            return Err(NoMatch::NotInDatabase.into());
        }
        let cleaned = select_candidate(&candidates).ok_or(NoMatch::NoValidEncoding)?;
        let key = SearchKey::from(&cleaned);
        self.prompter.say(
            Tone::Match,
            &format!("{:.2}% MATCH: {}", cleaned.confidence_score, key),
        );
        Ok(key)
    }

    fn enter(&mut self, next: State) -> Result<(), AppError> {
        if self.interrupt.is_raised() {
            return Err(AppError::Interrupted);
        }
        debug!("{:?} -> {:?}", self.state, next);
        self.state = next;
        Ok(())
    }

    async fn ask(&mut self, prompt: &str) -> Result<String, AppError> {
        interruptible(&self.interrupt, self.prompter.ask(prompt)).await
    }

    async fn confirm(&mut self, prompt: &str) -> Result<bool, AppError> {
        loop {
            let answer = self.ask(prompt).await?;
            match parse_answer(&answer) {
                Some(yes) => return Ok(yes),
                None => self.prompter.say(Tone::Error, "Select from either Y or N"),
            }
        }
    }

    fn report(&mut self, error: &AppError) {
        match error {
            AppError::Interrupted => self.prompter.say(Tone::Info, &format!("\n{}", error)),
            e if e.is_no_match() => self.prompter.say(Tone::Warning, &e.to_string()),
            e => self.prompter.say(Tone::Error, &format!("ERROR: {}", e)),
        }
    }
}

/// Await `step` unless the interrupt is raised first; the step is dropped
/// mid-flight. An interrupt raised while the step was finishing still wins.
async fn interruptible<T, E>(
    interrupt: &Interrupt,
    step: impl Future<Output = Result<T, E>>,
) -> Result<T, AppError>
where
    E: Into<AppError>,
{
    tokio::select! {
        biased;
        _ = interrupt.wait() => Err(AppError::Interrupted),
        result = step => {
            if interrupt.is_raised() {
                Err(AppError::Interrupted)
            } else {
                result.map_err(Into::into)
            }
        }
    }
}

/// First letter decides, case-insensitively.
fn parse_answer(answer: &str) -> Option<bool> {
    match answer.trim().chars().next().map(|c| c.to_ascii_lowercase()) {
        Some('y') => Some(true),
        Some('n') => Some(false),
        _ => None,
    }
}
