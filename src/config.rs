/// Configuration management
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix for environment overrides, e.g. `MUSIC_ROOM_SPOTIFY__CLIENT_ID`
pub const ENV_PREFIX: &str = "MUSIC_ROOM";

/// Largest page size the Spotify Web API accepts
pub const MAX_LIMIT: u32 = 50;

const APP_DIR: &str = "music-room";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("configuration I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("unable to determine {0} directory")]
    NoDirectory(&'static str),
    #[error("{0} is not set (config file, MUSIC_ROOM_SPOTIFY__* or {1})")]
    MissingCredential(&'static str, &'static str),
    #[error("catalog.{0} must be between 1 and 50, got {1}")]
    InvalidLimit(&'static str, u32),
    #[error("config file already exists at {}", .0.display())]
    AlreadyExists(PathBuf),
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub spotify: SpotifyConfig,
    pub catalog: CatalogConfig,
}

/// General application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,
    /// Page URL the room label is appended to when building a share link
    pub share_base_url: String,
}

/// Spotify-specific configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotifyConfig {
    /// Spotify Client ID (OAuth application)
    pub client_id: Option<String>,
    /// Spotify Client Secret (OAuth application)
    pub client_secret: Option<String>,
    /// Redirect URI for OAuth flow; its host and port are where the callback listener binds
    pub redirect_uri: String,
    /// Space separated OAuth scopes
    pub scopes: String,
    /// Override for the Web API base URL
    pub api_base_url: Option<String>,
    /// Target device for playback commands; the active device when unset
    pub device_id: Option<String>,
}

/// Catalog browsing settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Market used for browse calls (ISO 3166-1 alpha-2)
    pub country: String,
    pub search_limit: u32,
    pub playlist_limit: u32,
    pub track_limit: u32,
    pub category_limit: u32,
    /// Curated categories offered in the browse picker, in display order
    pub categories: Vec<CategoryMapping>,
}

/// A curated label mapped onto a Spotify category id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMapping {
    pub label: String,
    pub id: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            share_base_url: "http://localhost:8501/".to_string(),
        }
    }
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: "http://127.0.0.1:8989/callback".to_string(),
            scopes: "user-library-read user-read-playback-state user-modify-playback-state"
                .to_string(),
            api_base_url: None,
            device_id: None,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        let categories = [
            ("Tamil", "0JQ5DAqbMKFEC4WFtoNRpw"),
            ("Hindi (Bollywood)", "0JQ5DAqbMKFEC4WFtoNRpw"),
            ("Telugu", "0JQ5DAqbMKFAXlCG6QvYQ4"),
            ("Punjabi", "0JQ5DAqbMKFCfObibaOZbv"),
            ("English", "0JQ5DAqbMKFDXXwE9BDJAr"),
        ]
        .into_iter()
        .map(|(label, id)| CategoryMapping {
            label: label.to_string(),
            id: id.to_string(),
        })
        .collect();

        Self {
            country: "IN".to_string(),
            search_limit: 5,
            playlist_limit: 5,
            track_limit: 20,
            category_limit: 20,
            categories,
        }
    }
}

impl SpotifyConfig {
    /// Client id and secret, or which one is missing
    pub fn credentials(&self) -> Result<(&str, &str), ConfigError> {
        let id = self
            .client_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingCredential("spotify.client_id", "CLIENT_ID"))?;
        let secret = self
            .client_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingCredential(
                "spotify.client_secret",
                "CLIENT_SECRET",
            ))?;
        Ok((id, secret))
    }
}

impl CatalogConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("search_limit", self.search_limit),
            ("playlist_limit", self.playlist_limit),
            ("track_limit", self.track_limit),
            ("category_limit", self.category_limit),
        ] {
            if value == 0 || value > MAX_LIMIT {
                return Err(ConfigError::InvalidLimit(name, value));
            }
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from the given file, or the default location.
    ///
    /// Layers, lowest precedence first: built-in defaults, the legacy
    /// `CLIENT_ID`/`CLIENT_SECRET`/`REDIRECT_URI` variables, the TOML file
    /// (optional), then `MUSIC_ROOM_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };

        let defaults = toml::to_string(&Self::default())?;
        let legacy = toml::to_string(&legacy_env_table())?;

        let config: Self = config::Config::builder()
            .add_source(config::File::from_str(&defaults, config::FileFormat::Toml))
            .add_source(config::File::from_str(&legacy, config::FileFormat::Toml))
            .add_source(config::File::from(path.as_path()).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        config.catalog.validate()?;
        tracing::debug!("Configuration loaded (file: {})", path.display());
        Ok(config)
    }

    /// Write a default configuration file, refusing to clobber an existing one
    pub fn write_default(path: Option<&Path>, force: bool) -> Result<PathBuf, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };
        if path.exists() && !force {
            return Err(ConfigError::AlreadyExists(path));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(&Self::default())?;
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// Get configuration directory path
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        Ok(dirs::config_dir()
            .ok_or(ConfigError::NoDirectory("config"))?
            .join(APP_DIR))
    }

    /// Get cache directory path
    pub fn cache_dir() -> Result<PathBuf, ConfigError> {
        Ok(dirs::cache_dir()
            .ok_or(ConfigError::NoDirectory("cache"))?
            .join(APP_DIR))
    }

    pub fn default_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Where rspotify keeps the OAuth token between runs
    pub fn token_cache_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("spotify_token.json"))
    }

    /// Log file used while the terminal UI owns the screen
    pub fn log_file_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::cache_dir()?.join("music-room.log"))
    }
}

/// The unprefixed variables older deployments read their secrets from
fn legacy_env_table() -> toml::Table {
    let mut spotify = toml::Table::new();
    for (key, var) in [
        ("client_id", "CLIENT_ID"),
        ("client_secret", "CLIENT_SECRET"),
        ("redirect_uri", "REDIRECT_URI"),
    ] {
        if let Ok(value) = std::env::var(var) {
            tracing::debug!("Using {} from environment", var);
            spotify.insert(key.to_string(), toml::Value::String(value));
        }
    }

    let mut root = toml::Table::new();
    if !spotify.is_empty() {
        root.insert("spotify".to_string(), toml::Value::Table(spotify));
    }
    root
}
