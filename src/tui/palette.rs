//! Colors for the dark and light themes

use crate::state_machine::Theme;
use ratatui::style::{Color, Modifier, Style};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub text: Color,
    pub muted: Color,
    pub accent: Color,
    pub user: Color,
    pub assistant: Color,
    pub error: Color,
    pub success: Color,
    pub border: Color,
}

impl Palette {
    pub fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Dark => Self {
                text: Color::White,
                muted: Color::DarkGray,
                accent: Color::Cyan,
                user: Color::LightBlue,
                assistant: Color::LightGreen,
                error: Color::LightRed,
                success: Color::Green,
                border: Color::Gray,
            },
            Theme::Light => Self {
                text: Color::Black,
                muted: Color::Gray,
                accent: Color::Blue,
                user: Color::Magenta,
                assistant: Color::Green,
                error: Color::Red,
                success: Color::Green,
                border: Color::DarkGray,
            },
        }
    }

    pub fn text(&self) -> Style {
        Style::default().fg(self.text)
    }

    pub fn muted(&self) -> Style {
        Style::default().fg(self.muted)
    }

    pub fn accent(&self) -> Style {
        Style::default().fg(self.accent)
    }

    pub fn heading(&self, color: Color) -> Style {
        Style::default().fg(color).add_modifier(Modifier::BOLD)
    }

    pub fn code(&self) -> Style {
        Style::default().fg(self.accent).add_modifier(Modifier::DIM)
    }
}
