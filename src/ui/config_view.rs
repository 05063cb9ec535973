//! Worker configuration editor.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState};
use ratatui::Frame;

use crate::state::{AppState, Engine, WorkerConfigEntry, WorkerEdit};
use crate::ui::escape::strip_control;
use crate::ui::Theme;

/// Editable columns, left to right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigColumn {
    Enabled,
    TaskId,
    Engine,
    Owner,
    Role,
    Repo,
    PromptFile,
}

impl ConfigColumn {
    pub const ALL: [ConfigColumn; 7] = [
        ConfigColumn::Enabled,
        ConfigColumn::TaskId,
        ConfigColumn::Engine,
        ConfigColumn::Owner,
        ConfigColumn::Role,
        ConfigColumn::Repo,
        ConfigColumn::PromptFile,
    ];

    pub fn title(self) -> &'static str {
        match self {
            ConfigColumn::Enabled => "On",
            ConfigColumn::TaskId => "Task",
            ConfigColumn::Engine => "Engine",
            ConfigColumn::Owner => "Owner",
            ConfigColumn::Role => "Role",
            ConfigColumn::Repo => "Repo",
            ConfigColumn::PromptFile => "Prompt file",
        }
    }

    fn position(self) -> usize {
        Self::ALL.iter().position(|c| *c == self).unwrap_or(0)
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.position() + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        Self::ALL[(self.position() + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    /// Whether the column takes free text.
    pub fn is_text(self) -> bool {
        !matches!(self, ConfigColumn::Enabled | ConfigColumn::Engine)
    }

    pub fn value(self, worker: &WorkerConfigEntry) -> String {
        match self {
            ConfigColumn::Enabled => if worker.enabled { "[x]" } else { "[ ]" }.to_string(),
            ConfigColumn::TaskId => worker.task_id.clone(),
            ConfigColumn::Engine => worker.engine.as_str().to_string(),
            ConfigColumn::Owner => worker.owner.clone(),
            ConfigColumn::Role => worker.role.clone(),
            ConfigColumn::Repo => worker.repo.clone(),
            ConfigColumn::PromptFile => worker.prompt_file.clone(),
        }
    }

    /// Edit for a submitted text value. `None` for non-text columns.
    pub fn text_edit(self, value: String) -> Option<WorkerEdit> {
        match self {
            ConfigColumn::TaskId => Some(WorkerEdit::TaskId(value)),
            ConfigColumn::Owner => Some(WorkerEdit::Owner(value)),
            ConfigColumn::Role => Some(WorkerEdit::Role(value)),
            ConfigColumn::Repo => Some(WorkerEdit::Repo(value)),
            ConfigColumn::PromptFile => Some(WorkerEdit::PromptFile(value)),
            ConfigColumn::Enabled | ConfigColumn::Engine => None,
        }
    }

    /// In-place edit for a non-text column: toggle or cycle.
    pub fn step_edit(self, worker: &WorkerConfigEntry) -> Option<WorkerEdit> {
        match self {
            ConfigColumn::Enabled => Some(WorkerEdit::Enabled(!worker.enabled)),
            ConfigColumn::Engine => Some(WorkerEdit::Engine(worker.engine.next())),
            _ => None,
        }
    }
}

pub struct ConfigView;

impl ConfigView {
    pub fn render(
        frame: &mut Frame,
        area: Rect,
        state: &AppState,
        theme: &Theme,
        table_state: &mut TableState,
        column: ConfigColumn,
    ) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Min(3)])
            .split(area);

        let mut summary = vec![Span::styled(state.config.summary(), theme.value_style)];
        if let Some(config) = state.config.config() {
            summary.push(Span::raw("  "));
            summary.push(Span::styled(
                format!("orch: {}", strip_control(&config.orch_id)),
                theme.label_style,
            ));
            let roles = config.enabled_roles();
            if !roles.is_empty() {
                summary.push(Span::raw("  "));
                summary.push(Span::styled(format!("roles: {roles}"), theme.label_style));
            }
        } else {
            summary.push(Span::styled("  (not loaded, L to load)", theme.disabled_style));
        }
        frame.render_widget(Paragraph::new(Line::from(summary)), chunks[0]);

        let workers = state.config.workers();
        if workers.is_empty() {
            table_state.select(None);
        } else {
            let selected = table_state.selected().unwrap_or(0).min(workers.len() - 1);
            table_state.select(Some(selected));
        }
        let selected = table_state.selected();

        let header = Row::new(ConfigColumn::ALL.map(|c| {
            let style = if c == column {
                theme.input_style
            } else {
                theme.header_style
            };
            Cell::from(c.title()).style(style)
        }));

        let rows = workers.iter().enumerate().map(|(i, worker)| {
            let row_style = if worker.enabled {
                theme.normal_text
            } else {
                theme.disabled_style
            };
            let cells = ConfigColumn::ALL.map(|c| {
                let cell = Cell::from(strip_control(&c.value(worker)).into_owned());
                if selected == Some(i) && c == column {
                    cell.style(theme.input_style)
                } else {
                    cell
                }
            });
            Row::new(cells).style(row_style)
        });

        let table = Table::new(
            rows,
            [
                Constraint::Length(4),
                Constraint::Length(12),
                Constraint::Length(14),
                Constraint::Length(12),
                Constraint::Length(12),
                Constraint::Length(14),
                Constraint::Min(20),
            ],
        )
        .header(header)
        .block(
            Block::default()
                .title(" Workers config ")
                .borders(Borders::ALL)
                .style(theme.block_style),
        )
        .highlight_style(theme.selected_style);

        frame.render_stateful_widget(table, chunks[1], table_state);
    }
}

/// Engine offered by the quick-add keys.
pub fn quick_add_engine(key: char) -> Option<Engine> {
    match key {
        'a' => Some(Engine::Codex),
        'c' => Some(Engine::ClaudeCli),
        _ => None,
    }
}
