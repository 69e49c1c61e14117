/// UI page components
use super::components::{PlaybackPanel, SelectList, TextInput};
use super::theme::Theme;
use super::{App, Focus, InputMode};
use crate::models::{CatalogEntry, Listing};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Padding, Paragraph, Wrap};

/// Draw whichever page the app is on
pub fn draw(f: &mut Frame, app: &mut App, theme: &Theme) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(8),
            Constraint::Length(3),
        ])
        .split(f.size());

    HeaderBar.render(f, chunks[0], app, theme);
    if app.in_room() {
        BrowsePage.render(f, chunks[1], app, theme);
    } else {
        RoomPage.render(f, chunks[1], app, theme);
    }
    MessageBar.render(f, chunks[2], app, theme);
}

pub struct HeaderBar;

impl HeaderBar {
    pub fn render(&self, f: &mut Frame, area: Rect, app: &App, theme: &Theme) {
        let mut text = vec![Line::from(Span::styled(
            "Music Room",
            Style::default()
                .fg(theme.primary)
                .add_modifier(Modifier::BOLD),
        ))];
        match (&app.session.room_id, app.share_link()) {
            (Some(room), Some(link)) => {
                text.push(Line::from(format!("Active room ID: {}", room)));
                text.push(Line::from(format!("Shareable link: {}", link)));
            }
            (Some(room), None) => text.push(Line::from(format!("Active room ID: {}", room))),
            (None, _) => text.push(Line::from("No room yet")),
        }
        let paragraph = Paragraph::new(text).block(Block::default().borders(Borders::BOTTOM));
        f.render_widget(paragraph, area);
    }
}

pub struct RoomPage;

impl RoomPage {
    pub fn render(&self, f: &mut Frame, area: Rect, app: &App, theme: &Theme) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(6), Constraint::Length(3)])
            .split(area);

        let text = vec![
            Line::from("Create a new room or join an existing one:"),
            Line::from(""),
            Line::from("  c) Create room"),
            Line::from("  j) Join room"),
            Line::from("  q) Quit"),
        ];
        let paragraph = Paragraph::new(text).block(
            Block::default()
                .title("Room Setup")
                .borders(Borders::ALL)
                .padding(Padding::uniform(1)),
        );
        f.render_widget(paragraph, chunks[0]);

        if app.input_mode == InputMode::JoinRoom {
            TextInput {
                title: "Enter room ID to join (Enter to confirm, Esc to cancel)",
                value: &app.input,
                active: true,
            }
            .render(f, chunks[1], theme);
        }
    }
}

pub struct BrowsePage;

impl BrowsePage {
    pub fn render(&self, f: &mut Frame, area: Rect, app: &mut App, theme: &Theme) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(6), Constraint::Length(7)])
            .split(area);
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(20),
                Constraint::Percentage(25),
                Constraint::Percentage(30),
                Constraint::Percentage(25),
            ])
            .split(rows[0]);

        let categories: Vec<String> = app.categories.iter().map(|c| c.label.clone()).collect();
        SelectList {
            title: "Music Language",
            options: Some(categories),
            empty_message: "No categories configured",
            focused: app.focus == Focus::Categories,
        }
        .render(f, columns[0], &mut app.category_state, theme);

        let playlists_title = app
            .selected_category()
            .map(|c| format!("Trending Playlists in {}", c.label))
            .unwrap_or_else(|| "Playlists".to_string());
        SelectList {
            title: &playlists_title,
            options: names(app.playlists.listing.as_ref()),
            empty_message: "No playlists found for the selected category.",
            focused: app.focus == Focus::Playlists,
        }
        .render(f, columns[1], &mut app.playlists.state, theme);

        SelectList {
            title: "Choose a song",
            options: names(app.tracks.listing.as_ref()),
            empty_message: "This playlist has no playable tracks.",
            focused: app.focus == Focus::Tracks,
        }
        .render(f, columns[2], &mut app.tracks.state, theme);

        SearchPanel.render(f, columns[3], app, theme);

        PlaybackPanel {
            selected: app.session.selected_track.as_ref().map(|t| t.name.as_str()),
            status: app.session.playback_status,
            now_playing: app.now_playing.as_ref(),
        }
        .render(f, rows[1], theme);
    }
}

pub struct SearchPanel;

impl SearchPanel {
    pub fn render(&self, f: &mut Frame, area: Rect, app: &mut App, theme: &Theme) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(3), Constraint::Min(3)])
            .split(area);

        let searching = app.input_mode == InputMode::Search;
        TextInput {
            title: "Or search manually (/)",
            value: if searching { &app.input } else { "" },
            active: searching,
        }
        .render(f, chunks[0], theme);

        SelectList {
            title: "Search results",
            options: names(app.search_results.listing.as_ref()),
            empty_message: "No results.",
            focused: app.focus == Focus::SearchResults,
        }
        .render(f, chunks[1], &mut app.search_results.state, theme);
    }
}

pub struct MessageBar;

impl MessageBar {
    pub fn render(&self, f: &mut Frame, area: Rect, app: &App, theme: &Theme) {
        let line = match &app.message {
            _ if app.in_room() && app.input_mode == InputMode::JoinRoom => {
                Line::from(format!("Join room (Enter/Esc): {}▏", app.input))
            }
            Some((text, kind)) => Line::from(Span::styled(text.clone(), theme.message(*kind))),
            None if app.in_room() => Line::from(
                "Tab: switch pane | ↑/↓: move | Enter: choose | /: search | c/j: room | q: quit",
            ),
            None => Line::from(""),
        };
        let paragraph = Paragraph::new(line)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::TOP));
        f.render_widget(paragraph, area);
    }
}

fn names(listing: Option<&Listing<CatalogEntry>>) -> Option<Vec<String>> {
    listing.map(|l| l.items().iter().map(|e| e.name.clone()).collect())
}
