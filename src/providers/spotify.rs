use super::{MusicProvider, ProviderError};
/// Spotify provider implementation
use crate::config::Config;
use crate::models::{CatalogEntry, Category, Device, NowPlaying};
use async_trait::async_trait;
use rspotify::model::{
    AdditionalType, AlbumId, ArtistId, Country, FullTrack, Market, PlayContextId, PlayableId,
    PlayableItem, PlaylistId, SearchResult, SearchType, TrackId,
};
use rspotify::{prelude::*, AuthCodeSpotify, Credentials, OAuth, Token};
use std::path::{Path, PathBuf};

/// Spotify provider state
pub struct SpotifyProvider {
    client: AuthCodeSpotify,
    market: Option<Market>,
    device_id: Option<String>,
}

impl SpotifyProvider {
    /// Build a provider from the loaded configuration with the token cache in the config dir
    pub fn from_config(config: &Config) -> Result<Self, ProviderError> {
        let cache_path = Config::token_cache_path()?;
        Self::with_cache(config, cache_path)
    }

    /// Build a provider with an explicit token cache location
    pub fn with_cache(config: &Config, cache_path: PathBuf) -> Result<Self, ProviderError> {
        let (client_id, client_secret) = config.spotify.credentials()?;
        let credentials = Credentials::new(client_id, client_secret);
        let oauth = OAuth {
            redirect_uri: config.spotify.redirect_uri.clone(),
            scopes: config
                .spotify
                .scopes
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            ..Default::default()
        };

        let mut client_config = rspotify::Config {
            token_cached: true,
            token_refreshing: true,
            cache_path,
            ..Default::default()
        };
        if let Some(base) = &config.spotify.api_base_url {
            client_config.api_base_url = base.clone();
        }

        let market = parse_country(&config.catalog.country).map(Market::Country);
        if market.is_none() {
            tracing::warn!(
                "Unknown market country '{}', browse calls will not pass one",
                config.catalog.country
            );
        }

        Ok(Self {
            client: AuthCodeSpotify::with_config(credentials, oauth, client_config),
            market,
            device_id: config.spotify.device_id.clone(),
        })
    }

    /// Get the authorization URL for OAuth flow
    pub fn authorize_url(&self) -> Result<String, ProviderError> {
        self.client
            .get_authorize_url(false)
            .map_err(|e| ProviderError::Auth(e.to_string()))
    }

    /// The `state` value the callback must echo back
    pub fn oauth_state(&self) -> &str {
        &self.client.oauth.state
    }

    /// Complete the authentication flow with an authorization code
    pub async fn authenticate_with_code(&self, code: &str) -> Result<(), ProviderError> {
        self.client
            .request_token(code)
            .await
            .map_err(|e| ProviderError::Auth(format!("failed to request access token: {}", e)))?;
        tracing::info!("Spotify access token obtained");
        Ok(())
    }

    /// Restore a token from the cache file, refreshing it when it has expired.
    ///
    /// Returns `false` when there is no usable cached token.
    pub async fn restore_session(&self) -> Result<bool, ProviderError> {
        if !self.client.config.cache_path.exists() {
            tracing::info!("No cached Spotify token found");
            return Ok(false);
        }

        // An unreadable cache is treated like a missing one so the browser flow can replace it
        let cached = match self.client.read_token_cache(true).await {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!("Ignoring unreadable token cache: {}", e);
                None
            }
        };

        let Some(token) = cached else {
            tracing::info!("No cached Spotify token found");
            return Ok(false);
        };

        let expired = token.is_expired();
        let refreshable = token.refresh_token.is_some();
        self.set_token(token).await?;

        if expired {
            if !refreshable {
                tracing::warn!("Cached Spotify token expired and cannot be refreshed");
                self.clear_token().await?;
                return Ok(false);
            }
            tracing::info!("Cached Spotify token expired, refreshing");
            if let Err(e) = self.client.refresh_token().await {
                tracing::warn!("Failed to refresh Spotify token: {}", e);
                self.clear_token().await?;
                return Ok(false);
            }
        }

        tracing::info!("Spotify session restored from cache");
        Ok(true)
    }

    /// Set a token for the client
    pub async fn set_token(&self, token: Token) -> Result<(), ProviderError> {
        let mut guard = self
            .client
            .token
            .lock()
            .await
            .map_err(|_| ProviderError::Auth("failed to lock token".to_string()))?;
        *guard = Some(token);
        Ok(())
    }

    async fn clear_token(&self) -> Result<(), ProviderError> {
        let mut guard = self
            .client
            .token
            .lock()
            .await
            .map_err(|_| ProviderError::Auth("failed to lock token".to_string()))?;
        *guard = None;
        Ok(())
    }

    /// Check that a token is loaded before calling the API
    async fn ensure_token(&self) -> Result<(), ProviderError> {
        let guard = self
            .client
            .token
            .lock()
            .await
            .map_err(|_| ProviderError::Auth("failed to lock token".to_string()))?;
        if guard.is_some() {
            Ok(())
        } else {
            Err(ProviderError::NotAuthenticated)
        }
    }

    pub async fn is_authenticated(&self) -> bool {
        self.ensure_token().await.is_ok()
    }

    /// Remove the cached token file
    pub fn clear_token_cache(&self) -> Result<bool, ProviderError> {
        remove_token_cache(&self.client.config.cache_path)
    }

    fn device(&self) -> Option<&str> {
        self.device_id.as_deref()
    }
}

#[async_trait]
impl MusicProvider for SpotifyProvider {
    async fn search_tracks(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Vec<CatalogEntry>, ProviderError> {
        self.ensure_token().await?;
        tracing::debug!("Searching tracks for '{}' (limit {})", query, limit);

        let result = self
            .client
            .search(query, SearchType::Track, None, None, Some(limit), None)
            .await
            .map_err(|e| ProviderError::Api(format!("search failed: {}", e)))?;

        Ok(match result {
            SearchResult::Tracks(page) => page.items.iter().filter_map(track_entry).collect(),
            _ => Vec::new(),
        })
    }

    async fn categories(&self, limit: u32) -> Result<Vec<Category>, ProviderError> {
        self.ensure_token().await?;

        let page = self
            .client
            .categories_manual(None, self.market.clone(), Some(limit), None)
            .await
            .map_err(|e| ProviderError::Api(format!("failed to fetch categories: {}", e)))?;

        Ok(page
            .items
            .into_iter()
            .map(|c| Category {
                id: c.id,
                name: c.name,
            })
            .collect())
    }

    async fn category_playlists(
        &self,
        category_id: &str,
        limit: u32,
    ) -> Result<Vec<CatalogEntry>, ProviderError> {
        self.ensure_token().await?;
        tracing::debug!("Fetching playlists for category {}", category_id);

        let page = self
            .client
            .category_playlists_manual(category_id, self.market.clone(), Some(limit), None)
            .await
            .map_err(|e| ProviderError::Api(format!("failed to fetch playlists: {}", e)))?;

        Ok(page
            .items
            .into_iter()
            .filter_map(|p| CatalogEntry::non_empty(p.name, p.id.uri()))
            .collect())
    }

    async fn playlist_tracks(
        &self,
        playlist: &str,
        limit: u32,
    ) -> Result<Vec<CatalogEntry>, ProviderError> {
        self.ensure_token().await?;

        let (_, id) = split_uri(playlist)
            .filter(|(kind, _)| kind == "playlist")
            .unwrap_or_else(|| ("playlist".to_string(), playlist.to_string()));
        let playlist_id =
            PlaylistId::from_id(id.as_str()).map_err(|e| ProviderError::InvalidId(e.to_string()))?;

        let page = self
            .client
            .playlist_items_manual(playlist_id, None, self.market.clone(), Some(limit), None)
            .await
            .map_err(|e| ProviderError::Api(format!("failed to fetch playlist items: {}", e)))?;

        Ok(page
            .items
            .iter()
            .filter_map(|item| match &item.track {
                Some(PlayableItem::Track(track)) => track_entry(track),
                _ => None,
            })
            .collect())
    }

    async fn start_track(&self, uri: &str) -> Result<(), ProviderError> {
        self.ensure_token().await?;
        let track_id =
            TrackId::from_id_or_uri(uri).map_err(|e| ProviderError::InvalidId(e.to_string()))?;

        self.client
            .start_uris_playback([PlayableId::Track(track_id)], self.device(), None, None)
            .await
            .map_err(|e| ProviderError::Api(format!("failed to start playback: {}", e)))?;
        tracing::info!("Started playback of {}", uri);
        Ok(())
    }

    async fn start_context(&self, uri: &str) -> Result<(), ProviderError> {
        self.ensure_token().await?;
        let (kind, id) =
            split_uri(uri).ok_or_else(|| ProviderError::InvalidId(format!("not a URI: {}", uri)))?;

        let invalid = |e: rspotify::model::IdError| ProviderError::InvalidId(e.to_string());
        let context = match kind.as_str() {
            "playlist" => PlayContextId::Playlist(PlaylistId::from_id(id.as_str()).map_err(invalid)?),
            "album" => PlayContextId::Album(AlbumId::from_id(id.as_str()).map_err(invalid)?),
            "artist" => PlayContextId::Artist(ArtistId::from_id(id.as_str()).map_err(invalid)?),
            other => {
                return Err(ProviderError::InvalidId(format!(
                    "cannot play a {} as a context",
                    other
                )))
            }
        };

        self.client
            .start_context_playback(context, self.device(), None, None)
            .await
            .map_err(|e| ProviderError::Api(format!("failed to start playback: {}", e)))?;
        tracing::info!("Started context playback of {}", uri);
        Ok(())
    }

    async fn pause(&self) -> Result<(), ProviderError> {
        self.ensure_token().await?;
        self.client
            .pause_playback(self.device())
            .await
            .map_err(|e| ProviderError::Api(format!("failed to pause playback: {}", e)))
    }

    async fn resume(&self) -> Result<(), ProviderError> {
        self.ensure_token().await?;
        self.client
            .resume_playback(self.device(), None)
            .await
            .map_err(|e| ProviderError::Api(format!("failed to resume playback: {}", e)))
    }

    async fn next(&self) -> Result<(), ProviderError> {
        self.ensure_token().await?;
        self.client
            .next_track(self.device())
            .await
            .map_err(|e| ProviderError::Api(format!("failed to skip track: {}", e)))
    }

    async fn current_playback(&self) -> Result<Option<NowPlaying>, ProviderError> {
        self.ensure_token().await?;

        let context = self
            .client
            .current_playback(None, None::<&[AdditionalType]>)
            .await
            .map_err(|e| ProviderError::Api(format!("failed to fetch playback state: {}", e)))?;

        Ok(context.map(|ctx| NowPlaying {
            is_playing: ctx.is_playing,
            track: ctx.item.as_ref().and_then(|item| match item {
                PlayableItem::Track(track) => track_entry(track),
                PlayableItem::Episode(episode) => {
                    CatalogEntry::non_empty(episode.name.clone(), episode.id.uri())
                }
            }),
            device_name: Some(ctx.device.name),
            progress_ms: ctx
                .progress
                .map(|d| d.num_milliseconds().max(0) as u64),
        }))
    }

    async fn devices(&self) -> Result<Vec<Device>, ProviderError> {
        self.ensure_token().await?;

        let devices = self
            .client
            .device()
            .await
            .map_err(|e| ProviderError::Api(format!("failed to list devices: {}", e)))?;

        Ok(devices
            .into_iter()
            .map(|d| Device {
                id: d.id,
                name: d.name,
                is_active: d.is_active,
            })
            .collect())
    }
}

/// "Title - First Artist" with the track URI; local files without an id are skipped
fn track_entry(track: &FullTrack) -> Option<CatalogEntry> {
    let uri = track.id.as_ref()?.uri();
    let name = match track.artists.first() {
        Some(artist) => format!("{} - {}", track.name, artist.name),
        None => track.name.clone(),
    };
    CatalogEntry::non_empty(name, uri)
}

/// Split a `spotify:<kind>:<id>` URI or an `open.spotify.com/<kind>/<id>` link
pub fn split_uri(input: &str) -> Option<(String, String)> {
    let input = input.trim();
    if let Some(rest) = input.strip_prefix("spotify:") {
        let (kind, id) = rest.split_once(':')?;
        return (!kind.is_empty() && !id.is_empty()).then(|| (kind.to_string(), id.to_string()));
    }

    let url = url::Url::parse(input).ok()?;
    if url.host_str() != Some("open.spotify.com") {
        return None;
    }
    let segments: Vec<&str> = url
        .path_segments()?
        .filter(|s| !s.is_empty() && !s.starts_with("intl-"))
        .collect();
    match segments.as_slice() {
        [kind, id] => Some((kind.to_string(), id.to_string())),
        _ => None,
    }
}

/// Delete a token cache file without needing client credentials.
///
/// Returns `false` when there was nothing to remove.
pub fn remove_token_cache(path: &Path) -> Result<bool, ProviderError> {
    if !path.exists() {
        return Ok(false);
    }
    std::fs::remove_file(path)
        .map_err(|e| ProviderError::Config(format!("failed to remove token cache: {}", e)))?;
    tracing::info!("Removed token cache {}", path.display());
    Ok(true)
}

/// Resolve an ISO 3166-1 alpha-2 code to rspotify's country enum
fn parse_country(code: &str) -> Option<Country> {
    serde_json::from_value(serde_json::Value::String(code.to_uppercase())).ok()
}
