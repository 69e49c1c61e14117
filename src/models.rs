/// Core data types shared by the providers, session handlers and UI
use serde::{Deserialize, Serialize};
use std::fmt;

/// A selectable catalog item: what the user sees and what gets sent back to play it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Display name ("Title - Artist" for tracks, the playlist name for playlists)
    pub name: String,
    /// Opaque vendor URI, passed back verbatim to request playback
    pub uri: String,
}

impl CatalogEntry {
    pub fn new(name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uri: uri.into(),
        }
    }

    /// Build an entry only if both the name and the URI are non-empty
    pub fn non_empty(name: impl Into<String>, uri: impl Into<String>) -> Option<Self> {
        let entry = Self::new(name, uri);
        (!entry.name.trim().is_empty() && !entry.uri.trim().is_empty()).then_some(entry)
    }
}

impl fmt::Display for CatalogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A browse category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
}

/// Locally tracked playback flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    Playing,
    #[default]
    Paused,
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackStatus::Playing => write!(f, "playing"),
            PlaybackStatus::Paused => write!(f, "paused"),
        }
    }
}

/// What the vendor reports is currently playing
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NowPlaying {
    pub is_playing: bool,
    pub track: Option<CatalogEntry>,
    pub device_name: Option<String>,
    pub progress_ms: Option<u64>,
}

impl NowPlaying {
    pub fn status(&self) -> PlaybackStatus {
        if self.is_playing {
            PlaybackStatus::Playing
        } else {
            PlaybackStatus::Paused
        }
    }
}

/// A Spotify Connect device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: Option<String>,
    pub name: String,
    pub is_active: bool,
}

/// Result of a catalog query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing<T> {
    Results(Vec<T>),
    Empty,
}

impl<T> Listing<T> {
    pub fn from_vec(items: Vec<T>) -> Self {
        if items.is_empty() {
            Listing::Empty
        } else {
            Listing::Results(items)
        }
    }

    pub fn items(&self) -> &[T] {
        match self {
            Listing::Results(items) => items,
            Listing::Empty => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Listing::Empty)
    }
}

/// Format a millisecond offset as m:ss
pub fn format_progress(ms: u64) -> String {
    let total_secs = ms / 1000;
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty_entry_rejects_blank_fields() {
        assert!(CatalogEntry::non_empty("", "spotify:track:1").is_none());
        assert!(CatalogEntry::non_empty("Song", "  ").is_none());
        assert_eq!(
            CatalogEntry::non_empty("Song", "spotify:track:1"),
            Some(CatalogEntry::new("Song", "spotify:track:1"))
        );
    }

    #[test]
    fn test_listing_from_empty_vec() {
        let listing: Listing<CatalogEntry> = Listing::from_vec(Vec::new());
        assert!(listing.is_empty());
        assert!(listing.items().is_empty());
    }

    #[test]
    fn test_playback_status_display_and_default() {
        assert_eq!(PlaybackStatus::default(), PlaybackStatus::Paused);
        assert_eq!(PlaybackStatus::Playing.to_string(), "playing");
        assert_eq!(
            serde_json::to_string(&PlaybackStatus::Paused).unwrap(),
            "\"paused\""
        );
    }

    #[test]
    fn test_format_progress() {
        assert_eq!(format_progress(0), "0:00");
        assert_eq!(format_progress(61_500), "1:01");
    }
}
