use std::fmt;

/// Video metadata reported by the downloader.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchQuery {
    pub raw_video_title: String,
    pub uploader_name: String,
}

/// One fingerprint lookup result. Title and artist are not always known to
/// the metadata service.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub confidence_score: f64, // 0 to 100
    pub recording_id: String,
    pub title: Option<String>,
    pub artist: Option<String>,
}

/// First usable candidate, with ASCII-only title and artist.
#[derive(Clone, Debug, PartialEq)]
pub struct CleanedMatch {
    pub title: String,
    pub artist: String,
    pub confidence_score: f64,
}

/// Catalog search key. An empty artist matches any artist.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct SearchKey {
    pub artist: String,
    pub title: String,
}

impl fmt::Display for SearchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.artist.is_empty() {
            write!(f, "{}", self.title)
        } else {
            write!(f, "{} by {}", self.title, self.artist)
        }
    }
}
