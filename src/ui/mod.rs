pub mod components;
pub mod pages;
pub mod theme;

use crate::config::{CategoryMapping, Config};
use crate::models::{CatalogEntry, Listing, NowPlaying};
use crate::providers::MusicProvider;
use crate::session::{self, Limits, Session, SessionError};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::execute;
use ratatui::backend::CrosstermBackend;
use ratatui::widgets::ListState;
use ratatui::Terminal;
use std::io;
use std::time::Duration;

/// Which list or input currently receives keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Categories,
    Playlists,
    Tracks,
    SearchResults,
}

impl Focus {
    fn next(self) -> Self {
        match self {
            Focus::Categories => Focus::Playlists,
            Focus::Playlists => Focus::Tracks,
            Focus::Tracks => Focus::SearchResults,
            Focus::SearchResults => Focus::Categories,
        }
    }
}

/// Text entry state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    JoinRoom,
    Search,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Info,
    Success,
    Error,
}

/// What a key press asks the app to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    CreateRoom,
    JoinRoom(String),
    LoadPlaylists(String),
    LoadTracks(String),
    Search(String),
    SelectTrack(CatalogEntry),
    Play,
    Pause,
    Resume,
    Next,
    RefreshStatus,
    Quit,
}

/// A list pane: the last listing fetched plus the cursor
#[derive(Debug, Default)]
pub struct ListPane {
    pub listing: Option<Listing<CatalogEntry>>,
    pub state: ListState,
}

impl ListPane {
    fn set(&mut self, listing: Listing<CatalogEntry>) {
        self.state.select((!listing.is_empty()).then_some(0));
        self.listing = Some(listing);
    }

    fn clear(&mut self) {
        self.listing = None;
        self.state.select(None);
    }

    pub fn items(&self) -> &[CatalogEntry] {
        self.listing.as_ref().map(Listing::items).unwrap_or(&[])
    }

    pub fn selected(&self) -> Option<&CatalogEntry> {
        self.state.selected().and_then(|i| self.items().get(i))
    }

    fn move_by(&mut self, delta: isize) {
        let len = self.items().len();
        move_cursor(&mut self.state, len, delta);
    }
}

fn move_cursor(state: &mut ListState, len: usize, delta: isize) {
    if len == 0 {
        return;
    }
    let current = state.selected().unwrap_or(0) as isize;
    let next = (current + delta).rem_euclid(len as isize) as usize;
    state.select(Some(next));
}

/// Application UI state
pub struct App {
    pub session: Session,
    pub limits: Limits,
    pub share_base_url: String,
    pub categories: Vec<CategoryMapping>,
    pub category_state: ListState,
    pub playlists: ListPane,
    pub tracks: ListPane,
    pub search_results: ListPane,
    pub focus: Focus,
    pub input_mode: InputMode,
    pub input: String,
    pub message: Option<(String, MessageKind)>,
    pub now_playing: Option<NowPlaying>,
    pub exit: bool,
}

impl App {
    pub fn new(config: &Config, session: Session) -> Self {
        let mut category_state = ListState::default();
        if !config.catalog.categories.is_empty() {
            category_state.select(Some(0));
        }
        Self {
            session,
            limits: Limits::from(&config.catalog),
            share_base_url: config.general.share_base_url.clone(),
            categories: config.catalog.categories.clone(),
            category_state,
            playlists: ListPane::default(),
            tracks: ListPane::default(),
            search_results: ListPane::default(),
            focus: Focus::Categories,
            input_mode: InputMode::Normal,
            input: String::new(),
            message: None,
            now_playing: None,
            exit: false,
        }
    }

    pub fn in_room(&self) -> bool {
        self.session.room_id.is_some()
    }

    pub fn selected_category(&self) -> Option<&CategoryMapping> {
        self.category_state
            .selected()
            .and_then(|i| self.categories.get(i))
    }

    pub fn share_link(&self) -> Option<String> {
        let room = self.session.room_id.as_deref()?;
        session::share_link(&self.share_base_url, room).ok()
    }

    fn info(&mut self, text: impl Into<String>) {
        self.message = Some((text.into(), MessageKind::Info));
    }

    fn success(&mut self, text: impl Into<String>) {
        self.message = Some((text.into(), MessageKind::Success));
    }

    fn error(&mut self, text: impl Into<String>) {
        self.message = Some((text.into(), MessageKind::Error));
    }

    /// Translate a key press into an action, updating purely local state on the way
    pub fn handle_key(&mut self, key: KeyEvent) -> Action {
        if key.kind != KeyEventKind::Press {
            return Action::None;
        }

        match self.input_mode {
            InputMode::JoinRoom | InputMode::Search => self.handle_input_key(key.code),
            InputMode::Normal => self.handle_normal_key(key.code),
        }
    }

    fn handle_input_key(&mut self, code: KeyCode) -> Action {
        match code {
            KeyCode::Esc => {
                self.input_mode = InputMode::Normal;
                self.input.clear();
                Action::None
            }
            KeyCode::Backspace => {
                self.input.pop();
                Action::None
            }
            KeyCode::Char(c) => {
                self.input.push(c);
                Action::None
            }
            KeyCode::Enter => {
                let text = std::mem::take(&mut self.input);
                let mode = std::mem::replace(&mut self.input_mode, InputMode::Normal);
                match mode {
                    InputMode::JoinRoom if !text.is_empty() => Action::JoinRoom(text),
                    InputMode::Search if !text.trim().is_empty() => Action::Search(text),
                    _ => Action::None,
                }
            }
            _ => Action::None,
        }
    }

    fn handle_normal_key(&mut self, code: KeyCode) -> Action {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => Action::Quit,
            KeyCode::Char('c') => Action::CreateRoom,
            KeyCode::Char('j') => {
                self.input_mode = InputMode::JoinRoom;
                self.input.clear();
                Action::None
            }
            _ if !self.in_room() => Action::None,
            KeyCode::Char('/') => {
                self.input_mode = InputMode::Search;
                self.input.clear();
                self.focus = Focus::SearchResults;
                Action::None
            }
            KeyCode::Tab => {
                self.focus = self.focus.next();
                Action::None
            }
            KeyCode::Up => {
                self.move_focused(-1);
                Action::None
            }
            KeyCode::Down => {
                self.move_focused(1);
                Action::None
            }
            KeyCode::Enter => self.activate_focused(),
            KeyCode::Char('p') => Action::Play,
            KeyCode::Char('x') => Action::Pause,
            KeyCode::Char('r') => Action::Resume,
            KeyCode::Char('n') => Action::Next,
            KeyCode::Char('s') => Action::RefreshStatus,
            _ => Action::None,
        }
    }

    fn move_focused(&mut self, delta: isize) {
        match self.focus {
            Focus::Categories => {
                move_cursor(&mut self.category_state, self.categories.len(), delta)
            }
            Focus::Playlists => self.playlists.move_by(delta),
            Focus::Tracks => self.tracks.move_by(delta),
            Focus::SearchResults => self.search_results.move_by(delta),
        }
    }

    fn activate_focused(&mut self) -> Action {
        match self.focus {
            Focus::Categories => self
                .selected_category()
                .map(|c| Action::LoadPlaylists(c.id.clone()))
                .unwrap_or(Action::None),
            Focus::Playlists => self
                .playlists
                .selected()
                .map(|p| Action::LoadTracks(p.uri.clone()))
                .unwrap_or(Action::None),
            Focus::Tracks => self
                .tracks
                .selected()
                .cloned()
                .map(Action::SelectTrack)
                .unwrap_or(Action::None),
            Focus::SearchResults => self
                .search_results
                .selected()
                .cloned()
                .map(Action::SelectTrack)
                .unwrap_or(Action::None),
        }
    }

    /// Perform an action, calling the provider where it needs to
    pub async fn dispatch(&mut self, action: Action, provider: &dyn MusicProvider) {
        match action {
            Action::None => {}
            Action::Quit => self.exit = true,
            Action::CreateRoom => {
                let room = self.session.create_room();
                self.success(format!("Room created! Your room ID is: {}", room));
                self.enter_room(provider).await;
            }
            Action::JoinRoom(label) => match self.session.join_room(&label) {
                Ok(()) => {
                    self.success(format!("Joined room: {}", label));
                    self.enter_room(provider).await;
                }
                Err(e) => self.error(e.to_string()),
            },
            Action::LoadPlaylists(category_id) => {
                self.load_playlists(provider, &category_id).await
            }
            Action::LoadTracks(playlist) => self.load_tracks(provider, &playlist).await,
            Action::Search(query) => {
                match session::search_tracks(provider, &query, self.limits.search).await {
                    Ok(listing) => {
                        if let Some(first) = listing.items().first() {
                            self.session.select_track(first.clone());
                        } else {
                            self.info(format!("No results for '{}'", query.trim()));
                        }
                        self.search_results.set(listing);
                    }
                    Err(e) => self.report_error(e),
                }
            }
            Action::SelectTrack(entry) => {
                self.info(format!("Selected track: {}", entry.name));
                self.session.select_track(entry);
            }
            Action::Play => match self.session.play(provider).await {
                Ok(report) => self.report_command("Play", report),
                Err(e) => self.report_error(e),
            },
            Action::Pause => {
                let report = self.session.pause(provider).await;
                self.report_command("Pause", report);
            }
            Action::Resume => {
                let report = self.session.resume(provider).await;
                self.report_command("Resume", report);
            }
            Action::Next => {
                let report = self.session.next(provider).await;
                self.report_command("Next", report);
            }
            Action::RefreshStatus => match self.session.refresh_status(provider).await {
                Ok(now) => {
                    if now.is_none() {
                        self.info("Nothing is playing on any device");
                    } else {
                        self.info("Playback status refreshed");
                    }
                    self.now_playing = now;
                }
                Err(e) => self.report_error(e),
            },
        }
    }

    /// Initial load for a session opened straight into a room, as from a shared link
    pub async fn start(&mut self, provider: &dyn MusicProvider) {
        if let Some(room) = self.session.room_id.clone() {
            self.success(format!("Joined room: {}", room));
            self.enter_room(provider).await;
        }
    }

    async fn enter_room(&mut self, provider: &dyn MusicProvider) {
        self.playlists.clear();
        self.tracks.clear();
        self.search_results.clear();
        if let Some(category) = self.selected_category().map(|c| c.id.clone()) {
            self.load_playlists(provider, &category).await;
        }
    }

    /// Fetch playlists for a category and, like the picker defaulting to its first entry,
    /// the tracks of the first playlist
    async fn load_playlists(&mut self, provider: &dyn MusicProvider, category_id: &str) {
        self.tracks.clear();
        match session::category_playlists(provider, category_id, self.limits.playlists).await {
            Ok(listing) => {
                let first = listing.items().first().map(|p| p.uri.clone());
                self.playlists.set(listing);
                match first {
                    Some(uri) => self.load_tracks(provider, &uri).await,
                    None => self.info(
                        "No playlists found for the selected category. Try searching instead (/).",
                    ),
                }
            }
            Err(e) => {
                self.playlists.clear();
                self.report_error(e);
            }
        }
    }

    async fn load_tracks(&mut self, provider: &dyn MusicProvider, playlist: &str) {
        match session::playlist_tracks(provider, playlist, self.limits.tracks).await {
            Ok(listing) => {
                if let Some(first) = listing.items().first() {
                    self.session.select_track(first.clone());
                }
                self.tracks.set(listing);
            }
            Err(e) => {
                self.tracks.clear();
                self.report_error(e);
            }
        }
    }

    fn report_command(&mut self, action: &str, report: session::CommandReport) {
        let text = report.message(action);
        if report.succeeded() {
            self.success(text);
        } else {
            self.error(text);
        }
    }

    fn report_error(&mut self, err: SessionError) {
        tracing::warn!("{}", err);
        self.error(err.to_string());
    }
}

/// Run the interactive terminal UI until the user quits
pub async fn run(mut app: App, provider: &dyn MusicProvider) -> io::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = event_loop(&mut terminal, &mut app, provider).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    provider: &dyn MusicProvider,
) -> io::Result<()> {
    let theme = theme::Theme::spotify();
    app.start(provider).await;
    while !app.exit {
        terminal.draw(|f| pages::draw(f, app, &theme))?;

        if event::poll(Duration::from_millis(250))? {
            if let Event::Key(key) = event::read()? {
                let action = app.handle_key(key);
                app.dispatch(action, provider).await;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlaybackStatus;
    use crate::session::tests::FakeProvider;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            assert_eq!(app.handle_key(key(KeyCode::Char(c))), Action::None);
        }
    }

    fn browse_provider() -> FakeProvider {
        FakeProvider {
            playlists: vec![
                CatalogEntry::new("Hot Hits Tamil", "spotify:playlist:p1"),
                CatalogEntry::new("Kollywood", "spotify:playlist:p2"),
            ],
            ..FakeProvider::with_tracks(3)
        }
    }

    #[test]
    fn test_keys_ignored_outside_room() {
        let mut app = App::new(&Config::default(), Session::new());
        assert_eq!(app.handle_key(key(KeyCode::Char('p'))), Action::None);
        assert_eq!(app.handle_key(key(KeyCode::Char('c'))), Action::CreateRoom);
        assert_eq!(app.handle_key(key(KeyCode::Char('q'))), Action::Quit);
    }

    #[test]
    fn test_join_room_input() {
        let mut app = App::new(&Config::default(), Session::new());
        app.handle_key(key(KeyCode::Char('j')));
        assert_eq!(app.input_mode, InputMode::JoinRoom);
        type_text(&mut app, "abx");
        app.handle_key(key(KeyCode::Backspace));
        type_text(&mut app, "c");
        assert_eq!(
            app.handle_key(key(KeyCode::Enter)),
            Action::JoinRoom("abc".to_string())
        );
        assert_eq!(app.input_mode, InputMode::Normal);
        assert!(app.input.is_empty());
    }

    #[test]
    fn test_empty_search_submits_nothing() {
        let mut app = App::new(&Config::default(), Session::from_room(Some("r".into())));
        app.handle_key(key(KeyCode::Char('/')));
        type_text(&mut app, "  ");
        assert_eq!(app.handle_key(key(KeyCode::Enter)), Action::None);
    }

    #[tokio::test]
    async fn test_joining_loads_first_category_and_playlist() {
        let provider = browse_provider();
        let mut app = App::new(&Config::default(), Session::new());

        app.dispatch(Action::JoinRoom("living-room".to_string()), &provider)
            .await;

        assert_eq!(app.session.room_id.as_deref(), Some("living-room"));
        assert_eq!(app.playlists.items().len(), 2);
        assert_eq!(app.tracks.items().len(), 3);
        assert_eq!(
            app.session.selected_track.as_ref().map(|t| t.uri.as_str()),
            Some("spotify:track:0")
        );
        assert_eq!(
            provider.calls(),
            vec!["category:0JQ5DAqbMKFEC4WFtoNRpw", "playlist:spotify:playlist:p1"]
        );
    }

    #[tokio::test]
    async fn test_start_in_shared_room_loads_browse_lists() {
        let provider = browse_provider();
        let mut app = App::new(&Config::default(), Session::from_room(Some("abc123".into())));

        app.start(&provider).await;

        assert_eq!(app.playlists.items().len(), 2);
        assert_eq!(app.tracks.items().len(), 3);
        assert_eq!(
            app.session.selected_track.as_ref().map(|t| t.uri.as_str()),
            Some("spotify:track:0")
        );
        assert_eq!(app.session.room_id.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn test_start_without_room_calls_nothing() {
        let provider = browse_provider();
        let mut app = App::new(&Config::default(), Session::new());
        app.start(&provider).await;
        assert!(provider.calls().is_empty());
        assert!(app.playlists.listing.is_none());
    }

    #[tokio::test]
    async fn test_empty_category_shows_no_playlists_message() {
        let provider = FakeProvider::default();
        let mut app = App::new(&Config::default(), Session::new());
        app.dispatch(Action::CreateRoom, &provider).await;

        assert!(app.playlists.listing.as_ref().unwrap().is_empty());
        let (text, kind) = app.message.clone().unwrap();
        assert!(text.contains("No playlists found"));
        assert_eq!(kind, MessageKind::Info);
    }

    #[tokio::test]
    async fn test_select_from_tracks_and_play() {
        let provider = browse_provider();
        let mut app = App::new(&Config::default(), Session::new());
        app.dispatch(Action::CreateRoom, &provider).await;

        app.focus = Focus::Tracks;
        app.handle_key(key(KeyCode::Down));
        let action = app.handle_key(key(KeyCode::Enter));
        assert_eq!(
            action,
            Action::SelectTrack(CatalogEntry::new("Song 1 - Artist", "spotify:track:1"))
        );
        app.dispatch(action, &provider).await;

        let play = app.handle_key(key(KeyCode::Char('p')));
        app.dispatch(play, &provider).await;
        assert_eq!(app.session.playback_status, PlaybackStatus::Playing);
        assert!(provider.calls().contains(&"start_track:spotify:track:1".to_string()));
    }

    #[tokio::test]
    async fn test_failed_pause_reports_error_but_flags_paused() {
        let provider = FakeProvider {
            fail_playback: true,
            ..Default::default()
        };
        let mut app = App::new(&Config::default(), Session::from_room(Some("r".into())));
        app.session.playback_status = PlaybackStatus::Playing;

        app.dispatch(Action::Pause, &provider).await;
        assert_eq!(app.session.playback_status, PlaybackStatus::Paused);
        assert_eq!(app.message.as_ref().unwrap().1, MessageKind::Error);
    }

    #[tokio::test]
    async fn test_search_without_results() {
        let provider = FakeProvider::default();
        let mut app = App::new(&Config::default(), Session::from_room(Some("r".into())));
        app.dispatch(Action::Search("nothing here".to_string()), &provider)
            .await;
        assert!(app.search_results.listing.as_ref().unwrap().is_empty());
        assert!(app.message.as_ref().unwrap().0.contains("No results"));
    }

    #[test]
    fn test_cursor_wraps() {
        let mut state = ListState::default();
        move_cursor(&mut state, 3, -1);
        assert_eq!(state.selected(), Some(2));
        move_cursor(&mut state, 3, 1);
        assert_eq!(state.selected(), Some(0));
        let mut empty = ListState::default();
        move_cursor(&mut empty, 0, 1);
        assert_eq!(empty.selected(), None);
    }

    #[test]
    fn test_pane_moves_within_listing() {
        let mut pane = ListPane::default();
        pane.set(Listing::from_vec(vec![
            CatalogEntry::new("A - X", "spotify:track:a"),
            CatalogEntry::new("B - Y", "spotify:track:b"),
        ]));
        pane.move_by(1);
        assert_eq!(pane.selected().map(|t| t.uri.as_str()), Some("spotify:track:b"));
        pane.move_by(1);
        assert_eq!(pane.selected().map(|t| t.uri.as_str()), Some("spotify:track:a"));
    }
}
