// Playlist flow on top of a music catalog
use tracing::{debug, info};

use crate::{
    controllers::{parser::to_ascii, spotify::MusicCatalog},
    error::SpotifyError,
    models::{
        song::SearchKey,
        spotify::{PlaylistTrack, Session},
    },
};

pub struct PlaylistManager<C> {
    catalog: C,
}

impl<C: MusicCatalog> PlaylistManager<C> {
    pub fn new(catalog: C) -> Self {
        PlaylistManager { catalog }
    }

    pub async fn authenticate(&self, username: &str) -> Result<Session, SpotifyError> {
        self.catalog.authenticate(username).await
    }

    /// Reuse the user's own playlist called `name`, or create it. Records the
    /// id on the session.
    pub async fn ensure_playlist(
        &self,
        session: &mut Session,
        name: &str,
    ) -> Result<String, SpotifyError> {
        let playlists = self.catalog.user_playlists(session).await?;
        let existing = playlists
            .into_iter()
            .find(|playlist| playlist.owner_id == session.username && playlist.name == name);

        let playlist_id = match existing {
            Some(playlist) => {
                debug!("Found playlist {} ({})", playlist.name, playlist.id);
                playlist.id
            }
            None => {
                info!("Creating '{}' playlist", name);
                let created = self.catalog.create_playlist(session, name).await?;
                if created.name != name {
                    return Err(SpotifyError::PlaylistMismatch {
                        expected: name.to_string(),
                        actual: created.name,
                    });
                }
                created.id
            }
        };

        session.target_playlist_id = Some(playlist_id.clone());
        Ok(playlist_id)
    }

    pub async fn find_best_track(
        &self,
        session: &Session,
        key: &SearchKey,
    ) -> Result<Option<PlaylistTrack>, SpotifyError> {
        // An empty title would match every item
        if key.title.trim().is_empty() {
            debug!("Empty title, skipping search");
            return Ok(None);
        }
        let query = search_query(&key.title);
        let items = self.catalog.search_tracks(session, &query).await?;
        debug!("query={:?} results={}", query, items.len());
        Ok(best_match(items, key))
    }

    pub async fn append_track(
        &self,
        session: &Session,
        playlist_id: &str,
        track: &PlaylistTrack,
    ) -> Result<(), SpotifyError> {
        self.catalog
            .add_tracks(session, playlist_id, std::slice::from_ref(&track.uri))
            .await
    }
}

/// Exact-title field query
pub fn search_query(title: &str) -> String {
    format!("track:\"{}\"", title)
}

/// Most popular item whose title and lead artist contain the key,
/// case-insensitively. Equal popularity keeps the earlier item; items that
/// are not ASCII after quote normalization are skipped.
pub fn best_match(items: Vec<PlaylistTrack>, key: &SearchKey) -> Option<PlaylistTrack> {
    let title = key.title.to_lowercase();
    let artist = key.artist.to_lowercase();

    let mut best: Option<PlaylistTrack> = None;
    for item in items {
        let (Some(item_title), Some(item_artist)) =
            (to_ascii(&item.display_name), to_ascii(&item.artist_name))
        else {
            continue;
        };
        if !item_title.to_lowercase().contains(&title)
            || !item_artist.to_lowercase().contains(&artist)
        {
            continue;
        }
        match &best {
            Some(current) if current.popularity >= item.popularity => {}
            _ => best = Some(item),
        }
    }
    best
}
