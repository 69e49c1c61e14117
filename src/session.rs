//! Per-session state and the handlers that act on it.
//!
//! Every handler takes the session explicitly and performs at most one
//! provider call. Nothing here is shared between sessions: two sessions
//! holding the same room label never observe each other.

use crate::config::{CatalogConfig, MAX_LIMIT};
use crate::models::{CatalogEntry, Category, Device, Listing, NowPlaying, PlaybackStatus};
use crate::providers::spotify::split_uri;
use crate::providers::{MusicProvider, ProviderError};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("enter something to search for")]
    EmptyQuery,
    #[error("result limit must be between 1 and 50, got {0}")]
    InvalidLimit(u32),
    #[error("room label cannot be empty")]
    EmptyRoomLabel,
    #[error("no track selected")]
    NoTrackSelected,
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// State carried by one user session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub room_id: Option<String>,
    pub selected_track: Option<CatalogEntry>,
    pub playback_status: PlaybackStatus,
}

/// Outcome of a playback command.
///
/// The status flag is updated optimistically before the vendor answers, so
/// `status` may disagree with `result` until the next `refresh_status`.
#[derive(Debug)]
pub struct CommandReport {
    pub status: PlaybackStatus,
    pub result: Result<(), ProviderError>,
}

impl CommandReport {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }

    /// One-line message for the user
    pub fn message(&self, action: &str) -> String {
        match &self.result {
            Ok(()) => format!("{} sent", action),
            Err(e) => format!("{} failed: {}", action, e),
        }
    }
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Room label from a `?room_id=` style link, if one was given
    pub fn from_room(room_id: Option<String>) -> Self {
        Self {
            room_id: room_id.filter(|r| !r.is_empty()),
            ..Self::default()
        }
    }

    /// Create a fresh room and make it the active one
    pub fn create_room(&mut self) -> String {
        let room_id = generate_room_id();
        self.enter_room(room_id.clone());
        tracing::info!("Created room {}", room_id);
        room_id
    }

    /// Join a room by label, stored exactly as given
    pub fn join_room(&mut self, label: &str) -> Result<(), SessionError> {
        if label.is_empty() {
            return Err(SessionError::EmptyRoomLabel);
        }
        self.enter_room(label.to_string());
        tracing::info!("Joined room {}", label);
        Ok(())
    }

    fn enter_room(&mut self, room_id: String) {
        if self.room_id.as_deref() != Some(room_id.as_str()) {
            self.selected_track = None;
        }
        self.room_id = Some(room_id);
    }

    /// Remember a track picked from a result list, replacing any earlier pick
    pub fn select_track(&mut self, entry: CatalogEntry) {
        tracing::debug!("Selected {} ({})", entry.name, entry.uri);
        self.selected_track = Some(entry);
    }

    /// Start the selected track.
    ///
    /// Without a selection nothing is sent and the status is left alone.
    /// With one, the status becomes `Playing` whatever the vendor answers.
    pub async fn play(
        &mut self,
        provider: &dyn MusicProvider,
    ) -> Result<CommandReport, SessionError> {
        let uri = self
            .selected_track
            .as_ref()
            .map(|t| t.uri.clone())
            .ok_or(SessionError::NoTrackSelected)?;

        let result = provider.start_track(&uri).await;
        log_outcome("play", &result);
        self.playback_status = PlaybackStatus::Playing;
        Ok(CommandReport {
            status: self.playback_status,
            result,
        })
    }

    /// Pause the active device; the status becomes `Paused` whatever the vendor answers
    pub async fn pause(&mut self, provider: &dyn MusicProvider) -> CommandReport {
        let result = provider.pause().await;
        log_outcome("pause", &result);
        self.playback_status = PlaybackStatus::Paused;
        CommandReport {
            status: self.playback_status,
            result,
        }
    }

    /// Resume the active device; the status becomes `Playing` whatever the vendor answers
    pub async fn resume(&mut self, provider: &dyn MusicProvider) -> CommandReport {
        let result = provider.resume().await;
        log_outcome("resume", &result);
        self.playback_status = PlaybackStatus::Playing;
        CommandReport {
            status: self.playback_status,
            result,
        }
    }

    /// Skip to the next track; the status flag is untouched
    pub async fn next(&mut self, provider: &dyn MusicProvider) -> CommandReport {
        let result = provider.next().await;
        log_outcome("next", &result);
        CommandReport {
            status: self.playback_status,
            result,
        }
    }

    /// Ask the vendor what is playing and overwrite the local flag with the answer
    pub async fn refresh_status(
        &mut self,
        provider: &dyn MusicProvider,
    ) -> Result<Option<NowPlaying>, SessionError> {
        let now_playing = provider.current_playback().await?;
        self.playback_status = now_playing
            .as_ref()
            .map(NowPlaying::status)
            .unwrap_or(PlaybackStatus::Paused);
        Ok(now_playing)
    }
}

fn log_outcome(action: &str, result: &Result<(), ProviderError>) {
    match result {
        Ok(()) => tracing::info!("{} command sent", action),
        Err(e) => tracing::warn!("{} command failed: {}", action, e),
    }
}

/// Short random room label: the first 8 hex digits of a v4 UUID
pub fn generate_room_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Reflect the room label into a link's `room_id` query parameter
pub fn share_link(base_url: &str, room_id: &str) -> Result<String, url::ParseError> {
    let mut url = url::Url::parse(base_url)?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "room_id")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("room_id", room_id);
    Ok(url.to_string())
}

fn check_limit(limit: u32) -> Result<u32, SessionError> {
    if limit == 0 || limit > MAX_LIMIT {
        Err(SessionError::InvalidLimit(limit))
    } else {
        Ok(limit)
    }
}

fn cap<T>(mut items: Vec<T>, limit: u32) -> Listing<T> {
    items.truncate(limit as usize);
    Listing::from_vec(items)
}

/// Free-text track search
pub async fn search_tracks(
    provider: &dyn MusicProvider,
    query: &str,
    limit: u32,
) -> Result<Listing<CatalogEntry>, SessionError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(SessionError::EmptyQuery);
    }
    let limit = check_limit(limit)?;
    let results = provider.search_tracks(query, limit).await?;
    Ok(cap(results, limit))
}

/// Playlists filed under a category
pub async fn category_playlists(
    provider: &dyn MusicProvider,
    category_id: &str,
    limit: u32,
) -> Result<Listing<CatalogEntry>, SessionError> {
    if category_id.trim().is_empty() {
        return Err(SessionError::EmptyQuery);
    }
    let limit = check_limit(limit)?;
    let results = provider.category_playlists(category_id.trim(), limit).await?;
    Ok(cap(results, limit))
}

/// Tracks of one playlist
pub async fn playlist_tracks(
    provider: &dyn MusicProvider,
    playlist: &str,
    limit: u32,
) -> Result<Listing<CatalogEntry>, SessionError> {
    if playlist.trim().is_empty() {
        return Err(SessionError::EmptyQuery);
    }
    let limit = check_limit(limit)?;
    let results = provider.playlist_tracks(playlist.trim(), limit).await?;
    Ok(cap(results, limit))
}

/// Browse categories offered by the vendor
pub async fn list_categories(
    provider: &dyn MusicProvider,
    limit: u32,
) -> Result<Listing<Category>, SessionError> {
    let limit = check_limit(limit)?;
    let results = provider.categories(limit).await?;
    Ok(cap(results, limit))
}

pub async fn list_devices(provider: &dyn MusicProvider) -> Result<Vec<Device>, SessionError> {
    Ok(provider.devices().await?)
}

/// Play any URI directly: tracks as tracks, everything else as a context
pub async fn play_uri(provider: &dyn MusicProvider, uri: &str) -> Result<(), SessionError> {
    match split_uri(uri) {
        Some((kind, id)) if kind == "track" => {
            provider.start_track(&format!("spotify:track:{}", id)).await?
        }
        Some(_) => provider.start_context(uri).await?,
        // Bare ids are taken to be tracks
        None => provider.start_track(uri).await?,
    }
    Ok(())
}

/// Limits for each kind of listing, taken from the catalog config
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub search: u32,
    pub playlists: u32,
    pub tracks: u32,
    pub categories: u32,
}

impl From<&CatalogConfig> for Limits {
    fn from(catalog: &CatalogConfig) -> Self {
        Self {
            search: catalog.search_limit,
            playlists: catalog.playlist_limit,
            tracks: catalog.track_limit,
            categories: catalog.category_limit,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// In-memory provider that records the calls it receives
    #[derive(Default)]
    pub(crate) struct FakeProvider {
        pub tracks: Vec<CatalogEntry>,
        pub playlists: Vec<CatalogEntry>,
        pub categories: Vec<Category>,
        pub now_playing: Option<NowPlaying>,
        pub fail_playback: bool,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeProvider {
        pub fn with_tracks(n: usize) -> Self {
            Self {
                tracks: (0..n)
                    .map(|i| CatalogEntry::new(format!("Song {} - Artist", i), format!("spotify:track:{}", i)))
                    .collect(),
                ..Default::default()
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn playback_result(&self) -> Result<(), ProviderError> {
            if self.fail_playback {
                Err(ProviderError::Api("no active device".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl MusicProvider for FakeProvider {
        async fn search_tracks(
            &self,
            query: &str,
            limit: u32,
        ) -> Result<Vec<CatalogEntry>, ProviderError> {
            self.record(format!("search:{}:{}", query, limit));
            // Ignores the limit so callers' capping is exercised
            Ok(self.tracks.clone())
        }

        async fn categories(&self, _limit: u32) -> Result<Vec<Category>, ProviderError> {
            self.record("categories".to_string());
            Ok(self.categories.clone())
        }

        async fn category_playlists(
            &self,
            category_id: &str,
            _limit: u32,
        ) -> Result<Vec<CatalogEntry>, ProviderError> {
            self.record(format!("category:{}", category_id));
            Ok(self.playlists.clone())
        }

        async fn playlist_tracks(
            &self,
            playlist: &str,
            _limit: u32,
        ) -> Result<Vec<CatalogEntry>, ProviderError> {
            self.record(format!("playlist:{}", playlist));
            Ok(self.tracks.clone())
        }

        async fn start_track(&self, uri: &str) -> Result<(), ProviderError> {
            self.record(format!("start_track:{}", uri));
            self.playback_result()
        }

        async fn start_context(&self, uri: &str) -> Result<(), ProviderError> {
            self.record(format!("start_context:{}", uri));
            self.playback_result()
        }

        async fn pause(&self) -> Result<(), ProviderError> {
            self.record("pause".to_string());
            self.playback_result()
        }

        async fn resume(&self) -> Result<(), ProviderError> {
            self.record("resume".to_string());
            self.playback_result()
        }

        async fn next(&self) -> Result<(), ProviderError> {
            self.record("next".to_string());
            self.playback_result()
        }

        async fn current_playback(&self) -> Result<Option<NowPlaying>, ProviderError> {
            self.record("current_playback".to_string());
            Ok(self.now_playing.clone())
        }

        async fn devices(&self) -> Result<Vec<Device>, ProviderError> {
            Ok(vec![Device {
                id: Some("dev-1".to_string()),
                name: "Kitchen".to_string(),
                is_active: true,
            }])
        }
    }

    #[tokio::test]
    async fn test_search_caps_results_at_limit() {
        let provider = FakeProvider::with_tracks(12);
        let listing = search_tracks(&provider, "lofi", 5).await.unwrap();

        assert_eq!(listing.items().len(), 5);
        for entry in listing.items() {
            assert!(!entry.name.is_empty());
            assert!(!entry.uri.is_empty());
        }
        assert_eq!(provider.calls(), vec!["search:lofi:5"]);
    }

    #[tokio::test]
    async fn test_search_with_no_matches_is_empty_listing() {
        let provider = FakeProvider::default();
        let listing = search_tracks(&provider, "zzzz", 5).await.unwrap();
        assert!(listing.is_empty());
    }

    #[tokio::test]
    async fn test_blank_query_never_reaches_provider() {
        let provider = FakeProvider::with_tracks(3);
        assert!(matches!(
            search_tracks(&provider, "   ", 5).await,
            Err(SessionError::EmptyQuery)
        ));
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_limit_out_of_range_rejected() {
        let provider = FakeProvider::with_tracks(3);
        assert!(matches!(
            search_tracks(&provider, "x", 0).await,
            Err(SessionError::InvalidLimit(0))
        ));
        assert!(matches!(
            playlist_tracks(&provider, "pl", 51).await,
            Err(SessionError::InvalidLimit(51))
        ));
    }

    #[tokio::test]
    async fn test_category_playlists_then_tracks() {
        let provider = FakeProvider {
            playlists: vec![CatalogEntry::new("Hot Hits", "spotify:playlist:abc")],
            ..FakeProvider::with_tracks(25)
        };

        let playlists = category_playlists(&provider, "0JQ5DAqbMKFEC4WFtoNRpw", 5)
            .await
            .unwrap();
        assert_eq!(playlists.items().len(), 1);

        let tracks = playlist_tracks(&provider, &playlists.items()[0].uri, 20)
            .await
            .unwrap();
        assert_eq!(tracks.items().len(), 20);
        assert_eq!(
            provider.calls(),
            vec![
                "category:0JQ5DAqbMKFEC4WFtoNRpw",
                "playlist:spotify:playlist:abc"
            ]
        );
    }

    #[test]
    fn test_generated_room_ids_are_short_and_distinct() {
        let ids: HashSet<String> = (0..200).map(|_| generate_room_id()).collect();
        assert_eq!(ids.len(), 200);
        for id in &ids {
            assert_eq!(id.len(), 8);
            assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn test_join_stores_label_verbatim() {
        let mut session = Session::new();
        session.join_room("  Party Room #1 ").unwrap();
        assert_eq!(session.room_id.as_deref(), Some("  Party Room #1 "));
        assert!(matches!(
            session.join_room(""),
            Err(SessionError::EmptyRoomLabel)
        ));
    }

    #[test]
    fn test_changing_room_clears_selection() {
        let mut session = Session::new();
        session.join_room("a").unwrap();
        session.select_track(CatalogEntry::new("Song", "spotify:track:1"));

        session.join_room("a").unwrap();
        assert!(session.selected_track.is_some());

        let created = session.create_room();
        assert_eq!(session.room_id.as_deref(), Some(created.as_str()));
        assert!(session.selected_track.is_none());
    }

    #[test]
    fn test_session_from_room_link() {
        assert_eq!(Session::from_room(Some(String::new())).room_id, None);
        assert_eq!(
            Session::from_room(Some("abcd1234".to_string())).room_id.as_deref(),
            Some("abcd1234")
        );
    }

    #[test]
    fn test_share_link_replaces_room_param() {
        let link = share_link("http://localhost:8501/?room_id=old&theme=dark", "new1").unwrap();
        assert_eq!(link, "http://localhost:8501/?theme=dark&room_id=new1");
        assert!(share_link("not a url", "x").is_err());
    }

    #[tokio::test]
    async fn test_play_then_pause_updates_status() {
        let provider = FakeProvider::default();
        let mut session = Session::new();
        session.select_track(CatalogEntry::new("Song", "spotify:track:1"));

        let report = session.play(&provider).await.unwrap();
        assert!(report.succeeded());
        assert_eq!(session.playback_status, PlaybackStatus::Playing);

        let report = session.pause(&provider).await;
        assert_eq!(report.status, PlaybackStatus::Paused);
        assert_eq!(session.playback_status, PlaybackStatus::Paused);
        assert_eq!(provider.calls(), vec!["start_track:spotify:track:1", "pause"]);
    }

    #[tokio::test]
    async fn test_status_is_optimistic_when_vendor_fails() {
        let provider = FakeProvider {
            fail_playback: true,
            ..Default::default()
        };
        let mut session = Session::new();
        session.select_track(CatalogEntry::new("Song", "spotify:track:1"));

        let report = session.play(&provider).await.unwrap();
        assert!(!report.succeeded());
        assert_eq!(report.status, PlaybackStatus::Playing);
        assert!(report.message("Play").contains("no active device"));
    }

    #[tokio::test]
    async fn test_play_without_selection_sends_nothing() {
        let provider = FakeProvider::default();
        let mut session = Session::new();
        assert!(matches!(
            session.play(&provider).await,
            Err(SessionError::NoTrackSelected)
        ));
        assert_eq!(session.playback_status, PlaybackStatus::Paused);
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_status_reconciles_flag() {
        let provider = FakeProvider {
            now_playing: Some(NowPlaying {
                is_playing: false,
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut session = Session::new();
        session.playback_status = PlaybackStatus::Playing;

        let now = session.refresh_status(&provider).await.unwrap();
        assert!(now.is_some());
        assert_eq!(session.playback_status, PlaybackStatus::Paused);

        let idle = FakeProvider::default();
        session.playback_status = PlaybackStatus::Playing;
        assert!(session.refresh_status(&idle).await.unwrap().is_none());
        assert_eq!(session.playback_status, PlaybackStatus::Paused);
    }

    #[tokio::test]
    async fn test_next_leaves_flag_and_resume_sets_playing() {
        let provider = FakeProvider::default();
        let mut session = Session::new();
        session.next(&provider).await;
        assert_eq!(session.playback_status, PlaybackStatus::Paused);
        session.resume(&provider).await;
        assert_eq!(session.playback_status, PlaybackStatus::Playing);
    }

    #[tokio::test]
    async fn test_play_uri_dispatches_on_kind() {
        let provider = FakeProvider::default();
        play_uri(&provider, "spotify:track:1").await.unwrap();
        play_uri(&provider, "spotify:playlist:2").await.unwrap();
        play_uri(&provider, "3").await.unwrap();
        play_uri(&provider, "https://open.spotify.com/track/4?si=x")
            .await
            .unwrap();
        assert_eq!(
            provider.calls(),
            vec![
                "start_track:spotify:track:1",
                "start_context:spotify:playlist:2",
                "start_track:3",
                "start_track:spotify:track:4"
            ]
        );
    }

    #[tokio::test]
    async fn test_list_devices() {
        let devices = list_devices(&FakeProvider::default()).await.unwrap();
        assert_eq!(devices.len(), 1);
        assert!(devices[0].is_active);
    }

    #[test]
    fn test_limits_from_config() {
        let limits = Limits::from(&CatalogConfig::default());
        assert_eq!(limits.search, 5);
        assert_eq!(limits.playlists, 5);
        assert_eq!(limits.tracks, 20);
    }
}
