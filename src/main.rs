/// Main entry point for the Music Room CLI
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use music_room::config::Config;
use music_room::models::{format_progress, Listing};
use music_room::providers::oauth;
use music_room::providers::spotify::{self, SpotifyProvider};
use music_room::session::{self, Limits, Session};
use music_room::ui::{self, App};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "music-room",
    version,
    about = "Browse Spotify and control playback from a room",
    long_about = None
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); defaults to general.log_level
    #[arg(short, long)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the interactive UI
    Tui {
        /// Start inside this room, as if opened from a shared link
        #[arg(long)]
        room: Option<String>,
    },

    /// Sign in to Spotify
    Auth {
        /// Forget the cached token instead
        #[arg(long)]
        logout: bool,
    },

    /// Generate a room label or build a share link for one
    Room {
        #[command(subcommand)]
        action: RoomAction,
    },

    /// List browse categories
    Categories {
        /// Show the configured language picker instead of asking Spotify
        #[arg(long)]
        configured: bool,

        #[arg(short = 'n', long)]
        limit: Option<u32>,
    },

    /// List playlists of a category (configured label or category id)
    Playlists {
        category: String,

        #[arg(short = 'n', long)]
        limit: Option<u32>,
    },

    /// List tracks of a playlist
    Tracks {
        /// Playlist id, URI or link
        playlist: String,

        #[arg(short = 'n', long)]
        limit: Option<u32>,
    },

    /// Search for tracks
    Search {
        query: String,

        #[arg(short = 'n', long)]
        limit: Option<u32>,
    },

    /// Play a track, playlist, album or artist URI
    Play { uri: String },

    /// Pause playback
    Pause,

    /// Resume playback
    Resume,

    /// Skip to the next track
    Next,

    /// Show current playback status
    Status,

    /// List available playback devices
    Devices,

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum RoomAction {
    /// Generate a new room label
    New,
    /// Print the share link for a room label
    Link { room_id: String },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Write a default configuration file
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config decides the real log level, so loading it logs through a stderr-only subscriber
    let config = tracing::subscriber::with_default(
        bootstrap_subscriber(args.log_level.as_deref(), std::io::stderr),
        || Config::load(args.config.as_deref()),
    )
    .context("failed to load configuration")?;
    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.general.log_level.clone());
    let tui = matches!(args.command, None | Some(Command::Tui { .. }));
    init_logging(&level, tui)?;

    info!("Starting Music Room v{}", env!("CARGO_PKG_VERSION"));

    let limits = Limits::from(&config.catalog);

    match args.command {
        None => run_tui(&config, None).await?,
        Some(Command::Tui { room }) => run_tui(&config, room).await?,
        Some(Command::Auth { logout }) => handle_auth_command(&config, logout).await?,
        Some(Command::Room { action }) => handle_room_command(&config, action)?,
        Some(Command::Categories { configured, limit }) => {
            if configured {
                for category in &config.catalog.categories {
                    println!("{}\t{}", category.label, category.id);
                }
            } else {
                let provider = connect(&config).await?;
                let listing =
                    session::list_categories(&provider, limit.unwrap_or(limits.categories))
                        .await?;
                print_listing(&listing, |c| format!("{}\t{}", c.name, c.id));
            }
        }
        Some(Command::Playlists { category, limit }) => {
            let category_id = config
                .catalog
                .categories
                .iter()
                .find(|c| c.label.eq_ignore_ascii_case(&category))
                .map(|c| c.id.clone())
                .unwrap_or(category);
            let provider = connect(&config).await?;
            let listing = session::category_playlists(
                &provider,
                &category_id,
                limit.unwrap_or(limits.playlists),
            )
            .await?;
            print_listing(&listing, |p| format!("{}\t{}", p.name, p.uri));
        }
        Some(Command::Tracks { playlist, limit }) => {
            let provider = connect(&config).await?;
            let listing =
                session::playlist_tracks(&provider, &playlist, limit.unwrap_or(limits.tracks))
                    .await?;
            print_listing(&listing, |t| format!("{}\t{}", t.name, t.uri));
        }
        Some(Command::Search { query, limit }) => {
            let provider = connect(&config).await?;
            let listing =
                session::search_tracks(&provider, &query, limit.unwrap_or(limits.search)).await?;
            print_listing(&listing, |t| format!("{}\t{}", t.name, t.uri));
        }
        Some(Command::Play { uri }) => {
            let provider = connect(&config).await?;
            session::play_uri(&provider, &uri).await?;
            println!("Playing {}", uri);
        }
        Some(Command::Pause) => {
            let provider = connect(&config).await?;
            let report = Session::new().pause(&provider).await;
            println!("{}", report.message("Pause"));
            report.result?;
        }
        Some(Command::Resume) => {
            let provider = connect(&config).await?;
            let report = Session::new().resume(&provider).await;
            println!("{}", report.message("Resume"));
            report.result?;
        }
        Some(Command::Next) => {
            let provider = connect(&config).await?;
            let report = Session::new().next(&provider).await;
            println!("{}", report.message("Next"));
            report.result?;
        }
        Some(Command::Status) => handle_status_command(&config).await?,
        Some(Command::Devices) => {
            let provider = connect(&config).await?;
            let devices = session::list_devices(&provider).await?;
            if devices.is_empty() {
                println!("No devices available. Open Spotify on a device first.");
            }
            for device in devices {
                let marker = if device.is_active { "*" } else { " " };
                println!(
                    "{} {}\t{}",
                    marker,
                    device.name,
                    device.id.as_deref().unwrap_or("-")
                );
            }
        }
        Some(Command::Config { action }) => match action {
            ConfigAction::Init { force } => {
                let path = Config::write_default(args.config.as_deref(), force)?;
                println!("Wrote {}", path.display());
            }
            ConfigAction::Show => {
                print!("{}", toml::to_string_pretty(&redacted(&config))?);
            }
        },
    }

    Ok(())
}

fn targets(level: filter::LevelFilter) -> filter::Targets {
    filter::Targets::new()
        .with_default(level)
        .with_target("music_room", level)
        .with_target("hyper", filter::LevelFilter::WARN)
        .with_target("reqwest", filter::LevelFilter::WARN)
        .with_target("rustls", filter::LevelFilter::WARN)
}

/// Subscriber used while the configuration is loaded, before the real level is known
fn bootstrap_subscriber<W>(
    level: Option<&str>,
    writer: W,
) -> impl tracing::Subscriber + Send + Sync
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let level = level
        .and_then(|l| l.parse().ok())
        .unwrap_or(filter::LevelFilter::WARN);
    tracing_subscriber::registry()
        .with(targets(level))
        .with(tracing_subscriber::fmt::layer().with_writer(writer))
}

fn init_logging(level: &str, to_file: bool) -> Result<()> {
    let level_filter: filter::LevelFilter = level
        .parse()
        .with_context(|| format!("invalid log level '{}'", level))?;
    let filter = targets(level_filter);

    // The terminal UI owns the screen, so its logs go to a file
    let file_layer = if to_file {
        let path = Config::log_file_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file)),
        )
    } else {
        None
    };
    let stderr_layer = (!to_file).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();
    Ok(())
}

/// Build the Spotify client and make sure it holds a token
async fn connect(config: &Config) -> Result<SpotifyProvider> {
    let provider = SpotifyProvider::from_config(config)?;
    oauth::sign_in(&provider, &config.spotify.redirect_uri, |url| {
        println!("Open this URL in your browser to sign in to Spotify:\n\n  {}\n", url);
    })
    .await
    .context("Spotify authentication failed; run `music-room auth` to try again")?;
    Ok(provider)
}

async fn run_tui(config: &Config, room: Option<String>) -> Result<()> {
    let provider = connect(config).await?;
    let app = App::new(config, Session::from_room(room));
    info!("Starting TUI mode");
    ui::run(app, &provider).await?;
    Ok(())
}

async fn handle_auth_command(config: &Config, logout: bool) -> Result<()> {
    if logout {
        if spotify::remove_token_cache(&Config::token_cache_path()?)? {
            println!("Signed out of Spotify");
        } else {
            println!("No cached Spotify token to remove");
        }
        return Ok(());
    }
    connect(config).await?;
    println!("Signed in to Spotify");
    Ok(())
}

fn handle_room_command(config: &Config, action: RoomAction) -> Result<()> {
    let room_id = match action {
        RoomAction::New => {
            let mut session = Session::new();
            let room_id = session.create_room();
            println!("Room created! Your room ID is: {}", room_id);
            room_id
        }
        RoomAction::Link { room_id } => room_id,
    };
    let link = session::share_link(&config.general.share_base_url, &room_id)
        .context("general.share_base_url is not a valid URL")?;
    println!("Shareable link: {}", link);
    Ok(())
}

async fn handle_status_command(config: &Config) -> Result<()> {
    let provider = connect(config).await?;
    let mut session = Session::new();
    match session.refresh_status(&provider).await? {
        Some(now) => {
            println!("Playback status: {}", session.playback_status);
            if let Some(track) = &now.track {
                println!("Track: {}\t{}", track.name, track.uri);
            }
            if let Some(device) = &now.device_name {
                println!("Device: {}", device);
            }
            if let Some(progress) = now.progress_ms {
                println!("Progress: {}", format_progress(progress));
            }
        }
        None => println!("Nothing is playing"),
    }
    Ok(())
}

fn print_listing<T>(listing: &Listing<T>, line: impl Fn(&T) -> String) {
    match listing {
        Listing::Empty => println!("No results."),
        Listing::Results(items) => {
            for (i, item) in items.iter().enumerate() {
                println!("{:>2}. {}", i + 1, line(item));
            }
        }
    }
}

fn redacted(config: &Config) -> Config {
    let mut shown = config.clone();
    if shown.spotify.client_secret.is_some() {
        shown.spotify.client_secret = Some("********".to_string());
    }
    shown
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    fn load_with(level: Option<&str>) -> String {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[general]\nlog_level = \"info\"\n").unwrap();

        let out = Captured::default();
        tracing::subscriber::with_default(bootstrap_subscriber(level, out.clone()), || {
            Config::load(Some(&path))
        })
        .unwrap();
        out.text()
    }

    #[test]
    fn test_config_load_is_logged_at_requested_level() {
        assert!(load_with(Some("debug")).contains("Configuration loaded"));
    }

    #[test]
    fn test_bootstrap_defaults_to_warnings_only() {
        assert!(!load_with(None).contains("Configuration loaded"));
        assert!(!load_with(Some("not-a-level")).contains("Configuration loaded"));
    }
}
