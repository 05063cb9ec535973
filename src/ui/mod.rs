//! Terminal UI.
//!
//! The [`Ui`] controller owns view state only: which view is shown, table
//! selections and the line editor. Key presses are translated into an
//! [`UpdateKind`], usually a [`Command`] for the dashboard to execute, so
//! the UI never talks to the API itself.

pub mod config_view;
pub mod escape;
pub mod export;
pub mod help;
pub mod status_view;
pub mod theme;
pub mod trend;
pub mod viewer;
pub mod widgets;

pub use config_view::{ConfigColumn, ConfigView};
pub use help::HelpView;
pub use status_view::StatusView;
pub use theme::Theme;
pub use viewer::{TerminalSize, TerminalViewer, ViewerHost, ViewerPort};

use std::path::PathBuf;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use itertools::Itertools;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, TableState};
use ratatui::Frame;

use crate::dashboard::{Command, ControlField};
use crate::state::{display_pm_name, AppState};
use crate::ui::escape::strip_control;

/// Default file name offered by the export prompt.
pub const DEFAULT_SNAPSHOT_PATH: &str = "orch-dash-snapshot.html";

/// The result of updating the UI in response to user input.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateKind {
    Quit,
    ToggleHelp,
    /// Run a poll cycle right away.
    RefreshNow,
    Command(Command),
    /// Local message for the status line.
    Notice(String),
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    Status,
    Config,
}

/// What the line editor is collecting.
#[derive(Debug, Clone, PartialEq)]
pub enum InputTarget {
    Control(ControlField),
    Worker { index: usize, column: ConfigColumn },
    WorkerCount,
    AutoPopulate,
    ViewPath,
    ExportPath,
}

impl InputTarget {
    fn prompt(&self) -> String {
        match self {
            InputTarget::Control(field) => field.label().to_string(),
            InputTarget::Worker { index, column } => {
                format!("worker {} {}", index + 1, column.title().to_lowercase())
            }
            InputTarget::WorkerCount => "worker count (1-10)".to_string(),
            InputTarget::AutoPopulate => "auto-populate workers (1-10)".to_string(),
            InputTarget::ViewPath => "server path".to_string(),
            InputTarget::ExportPath => "export to".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Input {
    pub target: InputTarget,
    pub buffer: String,
}

/// Main UI controller.
pub struct Ui {
    state: ViewState,
    show_help: bool,
    theme: Theme,
    input: Option<Input>,
    status_table: TableState,
    config_table: TableState,
    column: ConfigColumn,
    terminal_width: u16,
    terminal_height: u16,
}

impl Default for Ui {
    fn default() -> Self {
        Self::new()
    }
}

impl Ui {
    pub fn new() -> Self {
        Self {
            state: ViewState::Status,
            show_help: false,
            theme: Theme::default(),
            input: None,
            status_table: TableState::default(),
            config_table: TableState::default(),
            column: ConfigColumn::Enabled,
            terminal_width: 80,
            terminal_height: 24,
        }
    }

    pub fn current_view(&self) -> ViewState {
        self.state
    }

    pub fn input(&self) -> Option<&Input> {
        self.input.as_ref()
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    pub fn handle_resize(&mut self, width: u16, height: u16) {
        self.terminal_width = width;
        self.terminal_height = height;
    }

    /// Rows to scroll per page in overlays.
    pub fn page_size(&self) -> usize {
        (self.terminal_height as usize).saturating_sub(6).max(1)
    }

    /// Handle keyboard input.
    pub fn handle_key_event(&mut self, key: KeyEvent, app: &AppState) -> UpdateKind {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return UpdateKind::Quit;
        }
        if self.input.is_some() {
            return self.handle_input_key(key, app);
        }
        if self.show_help {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                return UpdateKind::ToggleHelp;
            }
            return UpdateKind::Other;
        }

        match key.code {
            KeyCode::Char('q') => return UpdateKind::Quit,
            KeyCode::Char('?') | KeyCode::F(1) => return UpdateKind::ToggleHelp,
            KeyCode::Tab => {
                self.state = match self.state {
                    ViewState::Status => ViewState::Config,
                    ViewState::Config => ViewState::Status,
                };
                return UpdateKind::Other;
            }
            KeyCode::Char('r') => return UpdateKind::RefreshNow,
            KeyCode::Char('t') => return UpdateKind::Command(Command::ToggleAutoRefresh),
            KeyCode::Char('+') => return UpdateKind::Command(Command::AdjustInterval(1)),
            KeyCode::Char('-') => return UpdateKind::Command(Command::AdjustInterval(-1)),
            KeyCode::Char('[') => return UpdateKind::Command(Command::SelectPrevRun),
            KeyCode::Char(']') => return UpdateKind::Command(Command::SelectNextRun),
            KeyCode::Char('i') => {
                return self.begin(
                    InputTarget::Control(ControlField::PollSeconds),
                    app.controls.poll_seconds.to_string(),
                )
            }
            _ => {}
        }

        match self.state {
            ViewState::Status => self.handle_status_key(key, app),
            ViewState::Config => self.handle_config_key(key, app),
        }
    }

    fn begin(&mut self, target: InputTarget, buffer: String) -> UpdateKind {
        self.input = Some(Input { target, buffer });
        UpdateKind::Other
    }

    fn handle_status_key(&mut self, key: KeyEvent, app: &AppState) -> UpdateKind {
        let controls = &app.controls;
        match key.code {
            KeyCode::Down | KeyCode::Char('j') => {
                step_table(&mut self.status_table, StatusView::rows_for(app).len(), 1)
            }
            KeyCode::Up | KeyCode::Char('k') => {
                step_table(&mut self.status_table, StatusView::rows_for(app).len(), -1)
            }
            KeyCode::Enter | KeyCode::Char('l') => {
                return match self.selected_row(app) {
                    Some((_, true)) => UpdateKind::Command(Command::ViewPmReport),
                    Some((task, false)) => UpdateKind::Command(Command::ViewLog(task)),
                    None => UpdateKind::Other,
                }
            }
            KeyCode::Char('o') => {
                return match self.selected_row(app) {
                    Some((_, true)) => UpdateKind::Command(Command::ViewPmDocs),
                    Some((task, false)) => UpdateKind::Command(Command::ViewDocs(task)),
                    None => UpdateKind::Other,
                }
            }
            KeyCode::Char('p') => return UpdateKind::Command(Command::ViewPmReport),
            KeyCode::Char('P') => return UpdateKind::Command(Command::ViewPmDocs),
            KeyCode::Char('v') => return self.begin(InputTarget::ViewPath, String::new()),
            KeyCode::Char('s') => return UpdateKind::Command(Command::StartRun { dry_run: false }),
            KeyCode::Char('d') => return UpdateKind::Command(Command::StartRun { dry_run: true }),
            KeyCode::Char('x') => return UpdateKind::Command(Command::StopRun),
            KeyCode::Char('e') => {
                return self.begin(InputTarget::ExportPath, DEFAULT_SNAPSHOT_PATH.to_string())
            }
            KeyCode::Char('O') => {
                return self.begin(InputTarget::Control(ControlField::Orch), controls.orch.clone())
            }
            KeyCode::Char('m') => {
                return self.begin(InputTarget::Control(ControlField::Model), controls.model.clone())
            }
            KeyCode::Char('f') => {
                return self.begin(
                    InputTarget::Control(ControlField::ReasoningEffort),
                    controls.reasoning_effort.clone(),
                )
            }
            KeyCode::Char('g') => {
                return self.begin(
                    InputTarget::Control(ControlField::GlobalPrompt),
                    controls.global_prompt.clone(),
                )
            }
            KeyCode::Char('n') => {
                return self.begin(
                    InputTarget::Control(ControlField::PmName),
                    controls.pm_name.clone(),
                )
            }
            KeyCode::Char('w') => {
                return self.begin(
                    InputTarget::Control(ControlField::Workspace),
                    controls.workspace.clone(),
                )
            }
            _ => {}
        }
        UpdateKind::Other
    }

    /// Task id of the selected status row and whether it is the PM row.
    fn selected_row(&self, app: &AppState) -> Option<(String, bool)> {
        let rows = StatusView::rows_for(app);
        let row = rows.get(self.status_table.selected().unwrap_or(0))?;
        Some((row.task_id.clone(), row.is_pm))
    }

    fn handle_config_key(&mut self, key: KeyEvent, app: &AppState) -> UpdateKind {
        let workers = app.config.workers();
        let selected =
            Some(self.config_table.selected().unwrap_or(0)).filter(|i| *i < workers.len());
        match key.code {
            KeyCode::Down | KeyCode::Char('j') => step_table(&mut self.config_table, workers.len(), 1),
            KeyCode::Up | KeyCode::Char('k') => step_table(&mut self.config_table, workers.len(), -1),
            KeyCode::Right | KeyCode::Char('l') => self.column = self.column.next(),
            KeyCode::Left | KeyCode::Char('h') => self.column = self.column.prev(),
            KeyCode::Enter => {
                let Some(index) = selected else {
                    return UpdateKind::Other;
                };
                let worker = &workers[index];
                if self.column.is_text() {
                    let column = self.column;
                    return self.begin(InputTarget::Worker { index, column }, column.value(worker));
                }
                if let Some(edit) = self.column.step_edit(worker) {
                    return UpdateKind::Command(Command::EditWorker { index, edit });
                }
            }
            KeyCode::Char(' ') => {
                if let Some(index) = selected {
                    let edit = ConfigColumn::Enabled.step_edit(&workers[index]);
                    if let Some(edit) = edit {
                        return UpdateKind::Command(Command::EditWorker { index, edit });
                    }
                }
            }
            KeyCode::Char(c @ ('a' | 'c')) => {
                if let Some(engine) = config_view::quick_add_engine(c) {
                    return UpdateKind::Command(Command::AddWorker(engine));
                }
            }
            KeyCode::Char('x') => {
                if let Some(index) = selected {
                    return UpdateKind::Command(Command::RemoveWorker(index));
                }
            }
            KeyCode::Char('X') => return UpdateKind::Command(Command::PopWorker),
            KeyCode::Char('A') => return self.begin(InputTarget::AutoPopulate, String::new()),
            KeyCode::Char('N') => {
                return self.begin(InputTarget::WorkerCount, workers.len().max(1).to_string())
            }
            KeyCode::Char('E') => return UpdateKind::Command(Command::SetAllEnabled(true)),
            KeyCode::Char('D') => return UpdateKind::Command(Command::SetAllEnabled(false)),
            KeyCode::Char('R') => return UpdateKind::Command(Command::RenumberTaskIds),
            KeyCode::Char('s') => return UpdateKind::Command(Command::SaveConfig),
            KeyCode::Char('L') => return UpdateKind::Command(Command::LoadConfig),
            _ => {}
        }
        UpdateKind::Other
    }

    fn handle_input_key(&mut self, key: KeyEvent, _app: &AppState) -> UpdateKind {
        let Some(input) = self.input.as_mut() else {
            return UpdateKind::Other;
        };
        match key.code {
            KeyCode::Esc => {
                self.input = None;
                UpdateKind::Other
            }
            KeyCode::Backspace => {
                input.buffer.pop();
                UpdateKind::Other
            }
            KeyCode::Char(c) => {
                input.buffer.push(c);
                UpdateKind::Other
            }
            KeyCode::Enter => match self.input.take() {
                Some(input) => submit(input),
                None => UpdateKind::Other,
            },
            _ => UpdateKind::Other,
        }
    }

    /// Render the UI.
    pub fn render(&mut self, frame: &mut Frame, app: &AppState, viewers: &ViewerHost) {
        let area = frame.size();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(5),
                Constraint::Length(1),
            ])
            .split(area);

        self.render_header(frame, chunks[0], app);
        match self.state {
            ViewState::Status => {
                StatusView::render(frame, chunks[1], app, &self.theme, &mut self.status_table)
            }
            ViewState::Config => ConfigView::render(
                frame,
                chunks[1],
                app,
                &self.theme,
                &mut self.config_table,
                self.column,
            ),
        }
        self.render_status_line(frame, chunks[2], app);

        if self.show_help {
            HelpView::render(frame, area, &self.theme, &self.state);
        }
        viewers.render(frame, area, &self.theme);
    }

    fn render_header(&self, frame: &mut Frame, area: Rect, app: &AppState) {
        let theme = &self.theme;
        let controls = &app.controls;

        let mut tools = vec![Span::styled(" orch-dash ", theme.title_style), Span::raw(" ")];
        match &app.tools {
            Some(t) => {
                let (codex, codex_style) = if t.codex {
                    ("OK", theme.tool_ok)
                } else {
                    ("MISS", theme.tool_missing)
                };
                tools.push(Span::styled(format!("codex:{codex}"), codex_style));
                tools.push(Span::raw(" "));
                let claude = if t.claude {
                    Span::styled(
                        format!("claude:{}", strip_control(&t.claude_cmd)),
                        theme.tool_ok,
                    )
                } else {
                    Span::styled("claude:MISS", theme.tool_missing)
                };
                tools.push(claude);
            }
            None => tools.push(Span::styled("tools: ?", theme.label_style)),
        }
        if let Some(pm) = &app.pm {
            tools.push(Span::raw("  "));
            tools.push(Span::styled("PM ", theme.label_style));
            tools.push(Span::styled(
                strip_control(display_pm_name(&pm.pm_name)).into_owned(),
                theme.value_style,
            ));
            tools.push(Span::styled(
                format!(" {:.1}%", pm.progress_percent),
                theme.value_style,
            ));
            if !pm.last_update.is_empty() {
                tools.push(Span::styled(
                    format!(" updated {}", strip_control(&pm.last_update)),
                    theme.label_style,
                ));
            }
        }

        let field = |label: &str, value: &str| {
            [
                Span::styled(format!("{label} "), theme.label_style),
                Span::styled(
                    if value.is_empty() { "-".to_string() } else { strip_control(value).into_owned() },
                    theme.value_style,
                ),
                Span::raw("  "),
            ]
        };
        let mut line2: Vec<Span> = Vec::new();
        line2.extend(field("orch", &controls.orch));
        line2.extend(field("model", &controls.model));
        line2.extend(field("effort", &controls.reasoning_effort));
        line2.extend(field("workspace", &controls.workspace));
        line2.push(Span::styled(format!("poll {}s ", controls.poll_interval()), theme.label_style));
        line2.push(if controls.auto_refresh {
            Span::styled("auto:ON", theme.auto_on)
        } else {
            Span::styled("auto:OFF", theme.auto_off)
        });

        let run = app
            .runs
            .selected_summary()
            .map(|r| strip_control(&r.label()).into_owned())
            .or_else(|| app.runs.selected().map(str::to_string))
            .unwrap_or_else(|| "(none)".to_string());
        let mut line3 = vec![
            Span::styled("run ", theme.label_style),
            Span::styled(run, theme.value_style),
            Span::styled(
                format!("  [{}/{}]  ", run_position(app), app.runs.runs().len()),
                theme.label_style,
            ),
        ];
        line3.extend(field("prompt", &controls.global_prompt));
        if let Some(at) = app.last_update {
            line3.push(Span::styled(
                format!("last poll {}", at.format("%H:%M:%S")),
                theme.label_style,
            ));
        }

        frame.render_widget(
            Paragraph::new(vec![Line::from(tools), Line::from(line2), Line::from(line3)]),
            area,
        );
    }

    fn render_status_line(&self, frame: &mut Frame, area: Rect, app: &AppState) {
        let theme = &self.theme;
        let line = match &self.input {
            Some(input) => Line::from(vec![
                Span::styled(format!("{}: ", input.target.prompt()), theme.label_style),
                Span::styled(format!("{}_", input.buffer), theme.input_style),
                Span::styled("  (Enter apply, Esc cancel)", theme.help_style),
            ]),
            None => {
                let text = app.status_line.text().lines().join(" | ");
                let stamp = app
                    .status_line
                    .updated()
                    .map(|t| format!("[{}] ", t.format("%H:%M:%S")))
                    .unwrap_or_default();
                Line::from(vec![
                    Span::styled(format!("{stamp}{}", strip_control(&text)), theme.status_style),
                    Span::styled("  ? help", theme.help_style),
                ])
            }
        };
        frame.render_widget(Paragraph::new(line).style(theme.status_style), area);
    }
}

fn run_position(app: &AppState) -> usize {
    app.runs
        .selected()
        .and_then(|name| app.runs.runs().iter().position(|r| r.name == name))
        .map_or(0, |i| i + 1)
}

fn step_table(table: &mut TableState, len: usize, delta: isize) {
    if len == 0 {
        table.select(None);
        return;
    }
    let current = table.selected().unwrap_or(0).min(len - 1) as isize;
    let next = (current + delta).clamp(0, len as isize - 1);
    table.select(Some(next as usize));
}

/// Turns a finished line edit into an update.
fn submit(input: Input) -> UpdateKind {
    let Input { target, buffer } = input;
    match target {
        InputTarget::Control(ControlField::PmName) => {
            UpdateKind::Command(Command::SavePmName(buffer))
        }
        InputTarget::Control(field) => UpdateKind::Command(Command::SetControl(field, buffer)),
        InputTarget::Worker { index, column } => match column.text_edit(buffer) {
            Some(edit) => UpdateKind::Command(Command::EditWorker { index, edit }),
            None => UpdateKind::Other,
        },
        InputTarget::WorkerCount => match buffer.trim().parse() {
            Ok(n) => UpdateKind::Command(Command::ApplyWorkerCount(n)),
            Err(_) => UpdateKind::Notice(format!("worker count must be a number, got {buffer:?}")),
        },
        InputTarget::AutoPopulate => match buffer.trim().parse() {
            Ok(n) => UpdateKind::Command(Command::AutoPopulate(n)),
            Err(_) => UpdateKind::Notice(format!("worker count must be a number, got {buffer:?}")),
        },
        InputTarget::ViewPath => UpdateKind::Command(Command::ViewPath(buffer)),
        InputTarget::ExportPath => {
            let path = buffer.trim();
            if path.is_empty() {
                UpdateKind::Notice("export path is empty".to_string())
            } else {
                UpdateKind::Command(Command::ExportSnapshot(PathBuf::from(path)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Controls, WorkerEdit};
    use pretty_assertions::assert_eq;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(ui: &mut Ui, app: &AppState, text: &str) {
        for c in text.chars() {
            ui.handle_key_event(key(KeyCode::Char(c)), app);
        }
    }

    fn app_with_workers(n: i64) -> AppState {
        let mut app = AppState::new(Controls {
            orch: "DEMO".into(),
            ..Controls::default()
        });
        let controls = app.controls.clone();
        app.config.auto_populate(&controls, n);
        app
    }

    #[test]
    fn global_keys() {
        let mut ui = Ui::new();
        let app = AppState::default();
        assert_eq!(ui.handle_key_event(key(KeyCode::Char('q')), &app), UpdateKind::Quit);
        assert_eq!(ui.handle_key_event(key(KeyCode::Char('r')), &app), UpdateKind::RefreshNow);
        assert_eq!(
            ui.handle_key_event(key(KeyCode::Char('t')), &app),
            UpdateKind::Command(Command::ToggleAutoRefresh)
        );
        ui.handle_key_event(key(KeyCode::Tab), &app);
        assert_eq!(ui.current_view(), ViewState::Config);
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(ui.handle_key_event(ctrl_c, &app), UpdateKind::Quit);
    }

    #[test]
    fn pm_name_input_saves() {
        let mut ui = Ui::new();
        let app = AppState::default();
        ui.handle_key_event(key(KeyCode::Char('n')), &app);
        type_text(&mut ui, &app, "Lead");
        // 'q' is text while editing
        type_text(&mut ui, &app, "q");
        ui.handle_key_event(key(KeyCode::Backspace), &app);
        assert_eq!(
            ui.handle_key_event(key(KeyCode::Enter), &app),
            UpdateKind::Command(Command::SavePmName("Lead".into()))
        );
        assert!(ui.input().is_none());
    }

    #[test]
    fn escape_cancels_input() {
        let mut ui = Ui::new();
        let app = AppState::default();
        ui.handle_key_event(key(KeyCode::Char('O')), &app);
        type_text(&mut ui, &app, "X");
        assert_eq!(ui.handle_key_event(key(KeyCode::Esc), &app), UpdateKind::Other);
        assert!(ui.input().is_none());
    }

    #[test]
    fn space_toggles_enabled_on_selected_worker() {
        let mut ui = Ui::new();
        let app = app_with_workers(3);
        ui.handle_key_event(key(KeyCode::Tab), &app);
        ui.handle_key_event(key(KeyCode::Char('j')), &app);
        assert_eq!(
            ui.handle_key_event(key(KeyCode::Char(' ')), &app),
            UpdateKind::Command(Command::EditWorker {
                index: 1,
                edit: WorkerEdit::Enabled(false)
            })
        );
    }

    #[test]
    fn text_cell_edit_is_prefilled() {
        let mut ui = Ui::new();
        let app = app_with_workers(1);
        ui.handle_key_event(key(KeyCode::Tab), &app);
        ui.handle_key_event(key(KeyCode::Char('l')), &app);
        ui.handle_key_event(key(KeyCode::Char('l')), &app);
        ui.handle_key_event(key(KeyCode::Char('l')), &app);
        ui.handle_key_event(key(KeyCode::Enter), &app);
        assert_eq!(ui.input().unwrap().buffer, "Codex-A");
        type_text(&mut ui, &app, "2");
        assert_eq!(
            ui.handle_key_event(key(KeyCode::Enter), &app),
            UpdateKind::Command(Command::EditWorker {
                index: 0,
                edit: WorkerEdit::Owner("Codex-A2".into())
            })
        );
    }

    #[test]
    fn bad_worker_count_is_a_notice() {
        let mut ui = Ui::new();
        let app = app_with_workers(2);
        ui.handle_key_event(key(KeyCode::Tab), &app);
        ui.handle_key_event(key(KeyCode::Char('A')), &app);
        type_text(&mut ui, &app, "many");
        assert!(matches!(
            ui.handle_key_event(key(KeyCode::Enter), &app),
            UpdateKind::Notice(_)
        ));
    }

    #[test]
    fn log_key_without_rows_does_nothing() {
        let mut ui = Ui::new();
        let app = AppState::default();
        assert_eq!(ui.handle_key_event(key(KeyCode::Enter), &app), UpdateKind::Other);
    }
}
