/// Music Room - browse Spotify and drive playback from a shared room label
pub mod config;
pub mod models;
pub mod providers;
pub mod session;
#[cfg(feature = "cli")]
pub mod ui;

pub use crate::config::Config;
pub use crate::models::{CatalogEntry, Category, Device, Listing, NowPlaying, PlaybackStatus};
pub use crate::providers::{MusicProvider, ProviderError};
pub use crate::session::{Session, SessionError};
