/// Authenticated account for the lifetime of the process. Never persisted.
#[derive(Clone, Debug)]
pub struct Session {
    pub username: String,
    pub access_token: String,
    pub target_playlist_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub owner_id: String,
}

/// Catalog search result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaylistTrack {
    pub track_id: String,
    pub uri: String,
    pub display_name: String,
    pub artist_name: String,
    pub popularity: u32,
}

impl PlaylistTrack {
    pub fn full_title(&self) -> String {
        format!("{} by {}", self.display_name, self.artist_name)
    }
}
