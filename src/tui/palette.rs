use ratatui::style::{Color, Modifier, Style};

use crate::store::Theme;

/// Colours for one theme.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Palette {
    pub text: Color,
    pub muted: Color,
    pub accent: Color,
    pub error: Color,
    pub warning: Color,
    pub success: Color,
    pub selected: Style,
    pub matched: Style,
    pub flash: Style,
}

impl Palette {
    pub(crate) fn for_theme(theme: Theme, colorfgbg: Option<&str>) -> Self {
        if theme.is_dark(colorfgbg) {
            Self::dark()
        } else {
            Self::light()
        }
    }

    fn dark() -> Self {
        Self {
            text: Color::White,
            muted: Color::DarkGray,
            accent: Color::Cyan,
            error: Color::LightRed,
            warning: Color::Yellow,
            success: Color::LightGreen,
            selected: Style::default().fg(Color::Black).bg(Color::Cyan),
            matched: Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            flash: Style::default().fg(Color::Black).bg(Color::Yellow),
        }
    }

    fn light() -> Self {
        Self {
            text: Color::Black,
            muted: Color::Gray,
            accent: Color::Blue,
            error: Color::Red,
            warning: Color::Rgb(0xb0, 0x6f, 0x00),
            success: Color::Green,
            selected: Style::default().fg(Color::White).bg(Color::Blue),
            matched: Style::default()
                .fg(Color::Magenta)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            flash: Style::default().fg(Color::Black).bg(Color::LightYellow),
        }
    }
}

/// Accent for a stream type tag; unknown tags share a neutral grey.
pub(crate) fn stream_type_color(stream_type: &str) -> Color {
    match stream_type {
        "Video" => Color::Rgb(0x0f, 0x23, 0x80),
        "Twitch" => Color::Rgb(0x64, 0x41, 0xa5),
        "TwitchVod" => Color::Rgb(0xff, 0x41, 0xa5),
        "External" => Color::Rgb(0xaf, 0x6c, 0x6c),
        "Members" => Color::Rgb(0xff, 0xd7, 0x00),
        _ => Color::Rgb(0x5e, 0x5e, 0x5e),
    }
}
