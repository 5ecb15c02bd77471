// Title and artist heuristics
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::song::{Candidate, CleanedMatch, SearchKey, SearchQuery};

/// Uploader prefix used by official artist channels
const ARTIST_CHANNEL_MARKER: char = '#';

/// Noise commonly found in video titles
const NOISE_WORDS: &[&str] = &[
    "lyrics",
    "hd",
    "hq",
    "320kbps",
    "free download",
    "download",
    "1080p",
    "720p",
];

/// Feature credits, cut from titles
const FEATURE_MARKERS: &[&str] = &[" ft.", " feat.", " featuring", " ft", " feat"];

const ARTIST_CONJUNCTION: &str = " & ";

static PARENTHESIZED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\([^)]*\)").expect("valid parentheses pattern"));
static BRACKETED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*\[[^\]]*\]").expect("valid brackets pattern"));
static STRAY_BRACKETS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[()\[\]]").expect("valid stray bracket pattern"));
static DELIMITERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r" - | : |- |: ").expect("valid delimiter pattern"));
static NOISE: Lazy<Regex> = Lazy::new(|| {
    let alternatives: Vec<String> = NOISE_WORDS.iter().map(|w| regex::escape(w)).collect();
    Regex::new(&format!("(?i){}", alternatives.join("|"))).expect("valid noise pattern")
});

/// Derive a catalog search key from a video title and its uploader.
///
/// Official artist channels (`#ArtistName`) carry the artist in the uploader
/// name, so the title is used as-is. Everything else is assumed to follow
/// the `ARTIST - TITLE` convention after the noise is stripped.
pub fn normalize(raw_title: &str, uploader_name: &str) -> SearchKey {
    if let Some(channel) = uploader_name.strip_prefix(ARTIST_CHANNEL_MARKER) {
        return SearchKey {
            artist: split_camel_case(channel),
            title: raw_title.to_string(),
        };
    }

    let stripped = remove_noise_words(&strip_enclosed(raw_title));
    let mut segments = DELIMITERS.split(&stripped).take(2).map(tidy);
    let first = segments.next().unwrap_or_default();

    match segments.next() {
        Some(title) => SearchKey {
            artist: truncate_at(&first, &[ARTIST_CONJUNCTION]),
            title: truncate_at(&title, FEATURE_MARKERS),
        },
        None => SearchKey {
            artist: String::new(),
            title: first,
        },
    }
}

pub fn normalize_query(query: &SearchQuery) -> SearchKey {
    normalize(&query.raw_video_title, &query.uploader_name)
}

/// Title cleanup applied to fingerprint matches: drops `(...)` and `[...]`.
pub fn clean_title(title: &str) -> String {
    tidy(&strip_enclosed(title))
}

/// Artist cleanup applied to fingerprint matches: keeps the lead artist.
pub fn clean_artist(artist: &str) -> String {
    let lead = DELIMITERS.split(artist).next().unwrap_or_default();
    truncate_at(&tidy(lead), &[ARTIST_CONJUNCTION])
}

impl From<&CleanedMatch> for SearchKey {
    fn from(cleaned: &CleanedMatch) -> Self {
        SearchKey {
            artist: clean_artist(&cleaned.artist),
            title: clean_title(&cleaned.title),
        }
    }
}

/// Replace typographic quotes with their ASCII forms and reject anything
/// still outside ASCII.
pub fn to_ascii(value: &str) -> Option<String> {
    let normalized: String = value
        .chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            other => other,
        })
        .collect();
    normalized.is_ascii().then_some(normalized)
}

/// First candidate with every field present and ASCII-representable.
/// Expects candidates already ranked by confidence.
pub fn select_candidate(candidates: &[Candidate]) -> Option<CleanedMatch> {
    candidates.iter().find_map(|candidate| {
        let title = to_ascii(candidate.title.as_deref()?)?;
        let artist = to_ascii(candidate.artist.as_deref()?)?;
        if candidate.recording_id.is_empty() {
            return None;
        }
        Some(CleanedMatch {
            title,
            artist,
            confidence_score: candidate.confidence_score,
        })
    })
}

fn split_camel_case(name: &str) -> String {
    let mut artist = String::with_capacity(name.len() + 4);
    for (i, letter) in name.chars().enumerate() {
        let after_space = artist.ends_with(char::is_whitespace);
        if i > 0 && letter.is_uppercase() && !after_space {
            artist.push(' ');
        }
        artist.push(letter);
    }
    artist
}

fn strip_enclosed(value: &str) -> String {
    let without_parens = PARENTHESIZED.replace_all(value, "");
    let without_brackets = BRACKETED.replace_all(&without_parens, "");
    STRAY_BRACKETS.replace_all(&without_brackets, "").into_owned()
}

/// Removal repeats until nothing matches, since deleting one word can join
/// the halves of another.
fn remove_noise_words(value: &str) -> String {
    let mut cleaned = value.to_string();
    while NOISE.is_match(&cleaned) {
        cleaned = NOISE.replace_all(&cleaned, "").into_owned();
    }
    cleaned
}

fn truncate_at(value: &str, markers: &[&str]) -> String {
    let cut = markers
        .iter()
        .filter_map(|marker| value.find(marker))
        .min()
        .unwrap_or(value.len());
    value[..cut].trim_end().to_string()
}

fn tidy(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
