//! UI theme definition.

use ratatui::style::{Color, Modifier, Style};

/// Theme for the dashboard.
#[derive(Debug, Clone)]
pub struct Theme {
    // Basic styles
    pub normal_text: Style,
    pub selected_style: Style,
    pub block_style: Style,
    pub header_style: Style,
    pub title_style: Style,
    pub label_style: Style,
    pub value_style: Style,
    pub key_style: Style,
    pub help_style: Style,

    // Status line
    pub status_style: Style,
    pub error_style: Style,
    pub auto_on: Style,
    pub auto_off: Style,

    // Tool availability
    pub tool_ok: Style,
    pub tool_missing: Style,

    // Worker state buckets
    pub state_ok: Style,
    pub state_warn: Style,
    pub state_bad: Style,

    // Summary pills
    pub pill_style: Style,
    pub role_pill_style: Style,

    // Trends, matching the SVG strokes
    pub cpu_style: Style,
    pub mem_style: Style,
    pub baseline_style: Style,

    // Config editor
    pub disabled_style: Style,
    pub input_style: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            normal_text: Style::default().fg(Color::White),
            selected_style: Style::default().fg(Color::Black).bg(Color::White),
            block_style: Style::default(),
            header_style: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            title_style: Style::default()
                .fg(Color::White)
                .bg(Color::Rgb(0x31, 0x52, 0xa9))
                .add_modifier(Modifier::BOLD),
            label_style: Style::default().fg(Color::Gray),
            value_style: Style::default().fg(Color::White),
            key_style: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            help_style: Style::default().fg(Color::Gray),

            status_style: Style::default().fg(Color::White).bg(Color::DarkGray),
            error_style: Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            auto_on: Style::default().fg(Color::Green),
            auto_off: Style::default().fg(Color::Yellow),

            tool_ok: Style::default().fg(Color::Green),
            tool_missing: Style::default().fg(Color::Red),

            state_ok: Style::default().fg(Color::Green),
            state_warn: Style::default().fg(Color::Yellow),
            state_bad: Style::default().fg(Color::Red),

            pill_style: Style::default().fg(Color::Black).bg(Color::Rgb(0xdc, 0xe6, 0xf7)),
            role_pill_style: Style::default().fg(Color::Black).bg(Color::Rgb(0xe2, 0xf4, 0xee)),

            cpu_style: Style::default().fg(Color::Rgb(0x2b, 0x67, 0xdc)),
            mem_style: Style::default().fg(Color::Rgb(0x19, 0xa6, 0x8a)),
            baseline_style: Style::default().fg(Color::Rgb(0xcb, 0xd8, 0xf2)),

            disabled_style: Style::default().fg(Color::DarkGray),
            input_style: Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        }
    }
}
