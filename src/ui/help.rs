//! Help overlay showing keyboard shortcuts.

use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

use crate::ui::{Theme, ViewState};

const GLOBAL_KEYS: &[(&str, &str)] = &[
    ("q", "Quit"),
    ("?", "Toggle this help"),
    ("Tab", "Switch status / config view"),
    ("r", "Refresh now"),
    ("t", "Toggle auto refresh"),
    ("+ / -", "Poll interval up / down"),
    ("i", "Set poll interval"),
    ("[ / ]", "Previous / next run"),
];

const STATUS_KEYS: &[(&str, &str)] = &[
    ("j / k", "Select row"),
    ("Enter / l", "View log of selected row"),
    ("o", "View documents of selected row"),
    ("p / P", "PM status report / PM docs"),
    ("v", "View a server file"),
    ("s / d", "Start run / dry run"),
    ("x", "Stop selected run"),
    ("O m f g", "Edit orch id, model, effort, global prompt"),
    ("n", "Rename and save PM"),
    ("w", "Edit workspace"),
    ("e", "Export HTML snapshot"),
];

const CONFIG_KEYS: &[(&str, &str)] = &[
    ("j / k", "Select worker"),
    ("h / l", "Select column"),
    ("Enter", "Edit cell, cycle engine, toggle enabled"),
    ("Space", "Toggle enabled (saves)"),
    ("a / c", "Add codex / claude-cli worker"),
    ("x / X", "Remove selected / last worker"),
    ("A", "Auto-populate N workers"),
    ("N", "Set worker count"),
    ("E / D", "Enable / disable all"),
    ("R", "Renumber task ids"),
    ("s / L", "Save / load configuration"),
];

/// Help overlay.
pub struct HelpView;

impl HelpView {
    pub fn render(frame: &mut Frame, area: Rect, theme: &Theme, current_view: &ViewState) {
        let popup_area = Self::centered_rect(60, 80, area);
        frame.render_widget(Clear, popup_area);

        let help_block = Block::default()
            .title("orch-dash help")
            .borders(Borders::ALL)
            .style(theme.block_style);

        let (view_title, view_keys) = match current_view {
            ViewState::Status => ("Status view", STATUS_KEYS),
            ViewState::Config => ("Config view", CONFIG_KEYS),
        };

        let heading = |text: &str| {
            Line::from(Span::styled(
                text.to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ))
        };
        let mut lines = vec![heading("Global"), Line::from("")];
        lines.extend(GLOBAL_KEYS.iter().map(|(k, d)| key_line(k, d, theme)));
        lines.push(Line::from(""));
        lines.push(heading(view_title));
        lines.push(Line::from(""));
        lines.extend(view_keys.iter().map(|(k, d)| key_line(k, d, theme)));
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Inside a viewer: j/k scroll, y copy, Esc close",
            theme.help_style,
        )));

        let help_widget = Paragraph::new(lines)
            .block(help_block)
            .style(theme.normal_text)
            .alignment(Alignment::Left);

        frame.render_widget(help_widget, popup_area);
    }

    fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
        let popup_width = r.width * percent_x / 100;
        let popup_height = r.height * percent_y / 100;
        Rect {
            x: r.x + (r.width - popup_width) / 2,
            y: r.y + (r.height - popup_height) / 2,
            width: popup_width,
            height: popup_height,
        }
    }
}

fn key_line<'a>(key: &'a str, description: &'a str, theme: &Theme) -> Line<'a> {
    Line::from(vec![
        Span::styled(format!("{key:>10}"), theme.key_style),
        Span::raw(format!("  {description}")),
    ])
}
