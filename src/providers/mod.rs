/// Provider trait and implementations
pub mod oauth;
pub mod spotify;

use crate::models::{CatalogEntry, Category, Device, NowPlaying};
use async_trait::async_trait;

/// Error type for provider operations
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("not authenticated; run `music-room auth` and try again")]
    NotAuthenticated,
    #[error("invalid id: {0}")]
    InvalidId(String),
    #[error("Spotify API error: {0}")]
    Api(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<crate::config::ConfigError> for ProviderError {
    fn from(err: crate::config::ConfigError) -> Self {
        ProviderError::Config(err.to_string())
    }
}

/// The vendor calls the session handlers need.
///
/// Every method maps onto exactly one Web API request. Limits are passed
/// through unchanged; callers validate them.
#[async_trait]
pub trait MusicProvider: Send + Sync {
    /// Search tracks by free text
    async fn search_tracks(&self, query: &str, limit: u32)
        -> Result<Vec<CatalogEntry>, ProviderError>;

    /// List browse categories
    async fn categories(&self, limit: u32) -> Result<Vec<Category>, ProviderError>;

    /// Playlists filed under a browse category
    async fn category_playlists(
        &self,
        category_id: &str,
        limit: u32,
    ) -> Result<Vec<CatalogEntry>, ProviderError>;

    /// Tracks of a playlist, given its id or URI
    async fn playlist_tracks(
        &self,
        playlist: &str,
        limit: u32,
    ) -> Result<Vec<CatalogEntry>, ProviderError>;

    /// Start playback of a single track URI
    async fn start_track(&self, uri: &str) -> Result<(), ProviderError>;

    /// Start playback of a playlist, album or artist URI
    async fn start_context(&self, uri: &str) -> Result<(), ProviderError>;

    async fn pause(&self) -> Result<(), ProviderError>;

    async fn resume(&self) -> Result<(), ProviderError>;

    async fn next(&self) -> Result<(), ProviderError>;

    /// Query what the vendor reports as playing; `None` when nothing is active
    async fn current_playback(&self) -> Result<Option<NowPlaying>, ProviderError>;

    async fn devices(&self) -> Result<Vec<Device>, ProviderError>;
}
