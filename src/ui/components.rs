/// Reusable UI components
use super::theme::Theme;
use crate::models::{format_progress, NowPlaying, PlaybackStatus};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};

/// A selectable list that shows a message instead of an empty control
pub struct SelectList<'a> {
    pub title: &'a str,
    /// `None` when nothing has been fetched yet
    pub options: Option<Vec<String>>,
    pub empty_message: &'a str,
    pub focused: bool,
}

impl SelectList<'_> {
    pub fn render(&self, f: &mut Frame, area: Rect, state: &mut ListState, theme: &Theme) {
        let block = Block::default()
            .title(self.title)
            .borders(Borders::ALL)
            .border_style(theme.border(self.focused));

        match &self.options {
            Some(options) if !options.is_empty() => {
                let items: Vec<ListItem> = options.iter().map(|o| ListItem::new(o.as_str())).collect();
                let list = List::new(items)
                    .block(block)
                    .highlight_style(theme.highlight())
                    .highlight_symbol("➤ ");
                f.render_stateful_widget(list, area, state);
            }
            Some(_) => {
                let paragraph = Paragraph::new(self.empty_message)
                    .style(Style::default().fg(theme.muted))
                    .wrap(Wrap { trim: true })
                    .block(block);
                f.render_widget(paragraph, area);
            }
            None => f.render_widget(block, area),
        }
    }
}

/// Single-line text box
pub struct TextInput<'a> {
    pub title: &'a str,
    pub value: &'a str,
    pub active: bool,
}

impl TextInput<'_> {
    pub fn render(&self, f: &mut Frame, area: Rect, theme: &Theme) {
        let text = if self.active {
            format!("{}▏", self.value)
        } else if self.value.is_empty() {
            String::new()
        } else {
            self.value.to_string()
        };
        let paragraph = Paragraph::new(text).block(
            Block::default()
                .title(self.title)
                .borders(Borders::ALL)
                .border_style(theme.border(self.active)),
        );
        f.render_widget(paragraph, area);
    }
}

/// Selected track, local status flag and what the device last reported
pub struct PlaybackPanel<'a> {
    pub selected: Option<&'a str>,
    pub status: PlaybackStatus,
    pub now_playing: Option<&'a NowPlaying>,
}

impl PlaybackPanel<'_> {
    pub fn render(&self, f: &mut Frame, area: Rect, theme: &Theme) {
        let status_style = match self.status {
            PlaybackStatus::Playing => Style::default().fg(theme.success),
            PlaybackStatus::Paused => Style::default().fg(theme.accent),
        };

        let mut text = vec![
            Line::from(format!(
                "Selected track: {}",
                self.selected.unwrap_or("none")
            )),
            Line::from(vec![
                Span::raw("Playback status: "),
                Span::styled(self.status.to_string(), status_style),
            ]),
        ];

        if let Some(now) = self.now_playing {
            let track = now
                .track
                .as_ref()
                .map(|t| t.name.as_str())
                .unwrap_or("unknown");
            let device = now.device_name.as_deref().unwrap_or("unknown device");
            let progress = now
                .progress_ms
                .map(format_progress)
                .unwrap_or_else(|| "-".to_string());
            text.push(Line::from(format!(
                "Device reports: {} on {} at {}",
                track, device, progress
            )));
        }

        text.push(Line::from(""));
        text.push(Line::from(
            "p: Play | x: Pause | r: Resume | n: Next | s: Check status",
        ));

        let paragraph = Paragraph::new(text)
            .block(Block::default().title("Playback").borders(Borders::ALL));
        f.render_widget(paragraph, area);
    }
}
