// Spotify OAuth and Web API client
use std::time::Duration;

use reqwest::{Client, Response};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;
use tracing::{debug, error, info, warn};
use url::{Host, Url};

use crate::{
    config::Config,
    error::SpotifyError,
    models::spotify::{Playlist, PlaylistTrack, Session},
    routers::spotify::CallbackListener,
    terminal::{self, Tone},
};

/// Spotify API endpoints
const SPOTIFY_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
const SPOTIFY_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const SPOTIFY_API_URL: &str = "https://api.spotify.com/v1";

/// Only public playlists are created and modified
const SPOTIFY_SCOPES: &str = "playlist-modify-public";

const SEARCH_LIMIT: u32 = 20;
const PLAYLIST_PAGE_LIMIT: u32 = 50;

/// The streaming-service operations the playlist flow needs.
#[allow(async_fn_in_trait)]
pub trait MusicCatalog {
    async fn authenticate(&self, username: &str) -> Result<Session, SpotifyError>;

    /// Every playlist of the current user, across all pages.
    async fn user_playlists(&self, session: &Session) -> Result<Vec<Playlist>, SpotifyError>;

    async fn create_playlist(&self, session: &Session, name: &str)
    -> Result<Playlist, SpotifyError>;

    /// Track search, in the service's ranking order.
    async fn search_tracks(
        &self,
        session: &Session,
        query: &str,
    ) -> Result<Vec<PlaylistTrack>, SpotifyError>;

    async fn add_tracks(
        &self,
        session: &Session,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), SpotifyError>;
}

/// Token endpoint response; only the access token is used for a single run.
#[derive(Debug, Deserialize)]
pub struct SpotifyTokens {
    pub access_token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuthCallbackQuery {
    pub code: Option<String>,
    pub error: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SpotifyUser {
    pub id: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Paging<T> {
    items: Vec<T>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiPlaylist {
    id: String,
    name: String,
    owner: ApiOwner,
}

#[derive(Debug, Deserialize)]
struct ApiOwner {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: Paging<Option<ApiTrack>>,
}

#[derive(Debug, Deserialize)]
struct ApiTrack {
    id: Option<String>, // null for local files
    uri: String,
    name: String,
    #[serde(default)]
    popularity: u32,
    #[serde(default)]
    artists: Vec<ApiArtist>,
}

#[derive(Debug, Deserialize)]
struct ApiArtist {
    name: String,
}

impl From<ApiPlaylist> for Playlist {
    fn from(playlist: ApiPlaylist) -> Self {
        Playlist {
            id: playlist.id,
            name: playlist.name,
            owner_id: playlist.owner.id,
        }
    }
}

impl ApiTrack {
    fn into_track(self) -> Option<PlaylistTrack> {
        Some(PlaylistTrack {
            track_id: self.id?,
            uri: self.uri,
            display_name: self.name,
            artist_name: self
                .artists
                .into_iter()
                .next()
                .map(|a| a.name)
                .unwrap_or_default(),
            popularity: self.popularity,
        })
    }
}

pub struct SpotifyController {
    client: Client,
    client_id: String,
    client_secret: String,
    redirect_uri: Url,
    auth_timeout: Duration,
}

impl SpotifyController {
    pub fn new(config: &Config) -> Result<Self, SpotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SpotifyError::Service(e.to_string()))?;

        Ok(Self {
            client,
            client_id: config.spotify_client_id.clone(),
            client_secret: config.spotify_client_secret.clone(),
            redirect_uri: config.spotify_redirect_uri.clone(),
            auth_timeout: config.auth_timeout,
        })
    }

    /// Generate OAuth authorization URL
    pub fn get_auth_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&response_type=code&redirect_uri={}&scope={}&state={}",
            SPOTIFY_AUTH_URL,
            self.client_id,
            urlencoding::encode(self.redirect_uri.as_str()),
            urlencoding::encode(SPOTIFY_SCOPES),
            state
        )
    }

    /// Exchange authorization code for tokens
    pub async fn exchange_code(&self, code: &str) -> Result<SpotifyTokens, SpotifyError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];

        let response = self
            .client
            .post(SPOTIFY_TOKEN_URL)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&params)
            .send()
            .await
            .map_err(|e| SpotifyError::Auth(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await.unwrap_or_default();
            error!("Spotify token exchange failed: {}", error_text);
            return Err(SpotifyError::Auth(error_message(status, &error_text)));
        }

        response
            .json()
            .await
            .map_err(|e| SpotifyError::Auth(format!("Failed to parse tokens: {}", e)))
    }

    /// Get current user's profile
    pub async fn get_current_user(&self, access_token: &str) -> Result<SpotifyUser, SpotifyError> {
        let response = self
            .client
            .get(format!("{}/me", SPOTIFY_API_URL))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(request_failed)?;

        parse_json(check(response).await?).await
    }

    /// Walk the user through the consent page and return the authorization code.
    async fn receive_code(&self, state: &str) -> Result<String, SpotifyError> {
        let auth_url = self.get_auth_url(state);
        terminal::print(
            Tone::Progress,
            &format!("Authorize access in your browser. If it does not open, visit:\n  {}", auth_url),
        );

        // Bind before the browser opens; an already-granted consent redirects at once.
        let listener = if is_loopback(&self.redirect_uri) {
            Some(CallbackListener::bind(&self.redirect_uri).await?)
        } else {
            None
        };
        if let Err(e) = open::that(&auth_url) {
            warn!("Failed to open browser: {}", e);
        }

        let params = if let Some(listener) = listener {
            debug!("Callback listener bound to {}", listener.local_addr());
            listener.wait(self.auth_timeout).await?
        } else {
            let pasted = terminal::read_line("Enter the URL you were redirected to: ")
                .await
                .map_err(|e| SpotifyError::Auth(e.to_string()))?;
            parse_callback_url(&pasted)?
        };

        // CSRF check first
        if params.state.as_deref() != Some(state) {
            return Err(SpotifyError::Auth("invalid or expired OAuth state".to_string()));
        }
        if let Some(error) = params.error {
            return Err(SpotifyError::Auth(error));
        }
        params
            .code
            .ok_or_else(|| SpotifyError::Auth("no authorization code in callback".to_string()))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        session: &Session,
        url: &str,
    ) -> Result<T, SpotifyError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(request_failed)?;

        parse_json(check(response).await?).await
    }
}

impl MusicCatalog for SpotifyController {
    async fn authenticate(&self, username: &str) -> Result<Session, SpotifyError> {
        let state = generate_state();
        let code = self.receive_code(&state).await.map_err(|e| match e {
            SpotifyError::Auth(reason) => SpotifyError::Auth(format!("{} for {}", reason, username)),
            other => other,
        })?;
        let tokens = self.exchange_code(&code).await?;
        let user = self.get_current_user(&tokens.access_token).await?;

        if !user.id.eq_ignore_ascii_case(username) {
            warn!(
                "Token belongs to {} rather than {}; using {}",
                user.id, username, user.id
            );
        }
        info!(
            "Spotify auth successful for {}",
            user.display_name.as_deref().unwrap_or(&user.id)
        );

        Ok(Session {
            username: user.id,
            access_token: tokens.access_token,
            target_playlist_id: None,
        })
    }

    async fn user_playlists(&self, session: &Session) -> Result<Vec<Playlist>, SpotifyError> {
        let mut playlists = Vec::new();
        let mut next = Some(format!(
            "{}/me/playlists?limit={}",
            SPOTIFY_API_URL, PLAYLIST_PAGE_LIMIT
        ));

        while let Some(url) = next {
            let page: Paging<ApiPlaylist> = self.get_json(session, &url).await?;
            playlists.extend(page.items.into_iter().map(Playlist::from));
            next = page.next;
        }

        debug!("user_playlists={}", playlists.len());
        Ok(playlists)
    }

    async fn create_playlist(
        &self,
        session: &Session,
        name: &str,
    ) -> Result<Playlist, SpotifyError> {
        let response = self
            .client
            .post(format!(
                "{}/users/{}/playlists",
                SPOTIFY_API_URL,
                urlencoding::encode(&session.username)
            ))
            .bearer_auth(&session.access_token)
            .json(&json!({
                "name": name,
                "public": true,
                "description": "Songs spotted in videos",
            }))
            .send()
            .await
            .map_err(request_failed)?;

        let created: ApiPlaylist = parse_json(check(response).await?).await?;
        Ok(created.into())
    }

    async fn search_tracks(
        &self,
        session: &Session,
        query: &str,
    ) -> Result<Vec<PlaylistTrack>, SpotifyError> {
        let limit = SEARCH_LIMIT.to_string();
        let response = self
            .client
            .get(format!("{}/search", SPOTIFY_API_URL))
            .bearer_auth(&session.access_token)
            .query(&[("q", query), ("type", "track"), ("limit", limit.as_str())])
            .send()
            .await
            .map_err(request_failed)?;

        let results: SearchResponse = parse_json(check(response).await?).await?;
        Ok(tracks_from_search(results))
    }

    async fn add_tracks(
        &self,
        session: &Session,
        playlist_id: &str,
        uris: &[String],
    ) -> Result<(), SpotifyError> {
        let response = self
            .client
            .post(format!(
                "{}/playlists/{}/tracks",
                SPOTIFY_API_URL,
                urlencoding::encode(playlist_id)
            ))
            .bearer_auth(&session.access_token)
            .json(&json!({ "uris": uris }))
            .send()
            .await
            .map_err(request_failed)?;

        check(response).await?;
        Ok(())
    }
}

fn tracks_from_search(results: SearchResponse) -> Vec<PlaylistTrack> {
    results
        .tracks
        .items
        .into_iter()
        .flatten()
        .filter_map(ApiTrack::into_track)
        .collect()
}

fn request_failed(e: reqwest::Error) -> SpotifyError {
    SpotifyError::Service(format!("Request failed: {}", e))
}

async fn check(response: Response) -> Result<Response, SpotifyError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    error!("Spotify request failed with {}: {}", status, body);
    Err(SpotifyError::Service(error_message(status.as_u16(), &body)))
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, SpotifyError> {
    response
        .json()
        .await
        .map_err(|e| SpotifyError::Service(format!("Failed to parse response: {}", e)))
}

/// Web API errors are `{"error": {"message"}}`, token errors are
/// `{"error", "error_description"}`.
fn error_message(status: u16, body: &str) -> String {
    let parsed: serde_json::Value = serde_json::from_str(body).unwrap_or_default();
    let error = &parsed["error"];

    error["message"]
        .as_str()
        .or_else(|| parsed["error_description"].as_str())
        .or_else(|| error.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status))
}

// Random state string for CSRF protection
fn generate_state() -> String {
    let random_bytes: [u8; 16] = rand::random();
    format!("{:032x}", u128::from_be_bytes(random_bytes))
}

/// Redirects to this machine can be received by the local callback listener.
fn is_loopback(redirect_uri: &Url) -> bool {
    if redirect_uri.scheme() != "http" {
        return false;
    }
    match redirect_uri.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

fn parse_callback_url(pasted: &str) -> Result<AuthCallbackQuery, SpotifyError> {
    let url = Url::parse(pasted.trim())
        .map_err(|e| SpotifyError::Auth(format!("invalid redirect URL: {}", e)))?;

    let mut params = AuthCallbackQuery::default();
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => params.code = Some(value.into_owned()),
            "error" => params.error = Some(value.into_owned()),
            "state" => params.state = Some(value.into_owned()),
            _ => {}
        }
    }
    Ok(params)
}
