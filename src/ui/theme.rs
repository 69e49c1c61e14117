/// Color themes and styling
use super::MessageKind;
use ratatui::style::{Color, Modifier, Style};

#[derive(Debug, Clone)]
pub struct Theme {
    pub primary: Color,
    pub accent: Color,
    pub foreground: Color,
    pub muted: Color,
    pub error: Color,
    pub success: Color,
}

impl Theme {
    pub fn spotify() -> Self {
        Self {
            primary: Color::Green,
            accent: Color::White,
            foreground: Color::White,
            muted: Color::DarkGray,
            error: Color::Red,
            success: Color::Green,
        }
    }

    /// Border style for a pane, brighter when it has focus
    pub fn border(&self, focused: bool) -> Style {
        if focused {
            Style::default().fg(self.primary)
        } else {
            Style::default().fg(self.muted)
        }
    }

    pub fn highlight(&self) -> Style {
        Style::default()
            .fg(self.primary)
            .add_modifier(Modifier::BOLD)
    }

    pub fn message(&self, kind: MessageKind) -> Style {
        match kind {
            MessageKind::Info => Style::default().fg(self.foreground),
            MessageKind::Success => Style::default().fg(self.success),
            MessageKind::Error => Style::default().fg(self.error),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::spotify()
    }
}
