//! Live status table.
//!
//! Row building is kept apart from drawing: [`StatusView::rows`] merges the
//! PM snapshot and the worker list into one presentation collection, and
//! the same rows feed both the terminal table and the HTML export.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState};
use ratatui::Frame;

use crate::api::{ManualEntry, PmStatus, RunStatus, WorkerState, WorkerStatus};
use crate::state::{display_pm_name, AppState, TimeSeriesStore};
use crate::ui::escape::strip_control;
use crate::ui::trend::{Trend, TrendRenderer, BAND, BASELINE_Y};
use crate::ui::widgets::{ProgressBar, TrendSparkline};
use crate::ui::Theme;

/// Memory is drawn at 1% of bar per 20 MB.
const MEM_MB_PER_PERCENT: f64 = 20.0;
const DEFAULT_PROGRESS_SOURCE: &str = "master_tasks";

/// Styling bucket for a worker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateClass {
    Ok,
    Warn,
    Bad,
}

impl StateClass {
    pub fn classify(state: &str) -> Self {
        match state.trim().to_uppercase().as_str() {
            "RUNNING" | "DONE" => StateClass::Ok,
            "EXITED" | "BLOCKED" => StateClass::Warn,
            _ => StateClass::Bad,
        }
    }

    pub fn css(self) -> &'static str {
        match self {
            StateClass::Ok => "ok",
            StateClass::Warn => "warn",
            StateClass::Bad => "bad",
        }
    }
}

/// A bar width in percent plus the printed reading.
#[derive(Debug, Clone, PartialEq)]
pub struct Meter {
    pub percent: f64,
    pub label: String,
}

/// One rendered table row.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusRow {
    pub task_id: String,
    pub owner: String,
    pub role: String,
    pub engine: String,
    pub pid: String,
    pub state: String,
    pub class: StateClass,
    /// `None` renders as `-`.
    pub cpu: Option<Meter>,
    pub mem: Option<Meter>,
    pub progress: f64,
    pub activity: String,
    pub state_hint: String,
    pub docs: u64,
    pub tokens: Option<f64>,
    pub is_pm: bool,
    pub trend: Option<Trend>,
}

pub struct StatusView;

impl StatusView {
    /// Builds the display rows. The PM row comes first when a PM snapshot
    /// exists; it is RUNNING while any worker runs and IDLE otherwise.
    pub fn rows(
        pm: Option<&PmStatus>,
        workers: &[WorkerStatus],
        history: &TimeSeriesStore,
    ) -> Vec<StatusRow> {
        let mut rows = Vec::with_capacity(workers.len() + 1);
        if let Some(pm) = pm {
            rows.push(pm_row(pm, workers));
        }
        rows.extend(workers.iter().map(|w| worker_row(w, history)));
        rows
    }

    pub fn rows_for(state: &AppState) -> Vec<StatusRow> {
        let workers = state
            .run_status
            .as_ref()
            .map_or(&[][..], |s| s.workers.as_slice());
        Self::rows(state.pm.as_ref(), workers, &state.history)
    }

    /// Draws summary, worker table, trend panel and manual lanes.
    pub fn render(
        frame: &mut Frame,
        area: Rect,
        state: &AppState,
        theme: &Theme,
        table_state: &mut TableState,
    ) {
        let rows = Self::rows_for(state);
        let manual = state
            .run_status
            .as_ref()
            .map_or(&[][..], |s| s.manual.as_slice());
        let manual_height = if manual.is_empty() {
            0
        } else {
            (manual.len() as u16 + 3).min(8)
        };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Min(5),
                Constraint::Length(manual_height),
            ])
            .split(area);

        render_summary(frame, chunks[0], state.run_status.as_ref(), theme);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(40), Constraint::Length(36)])
            .split(chunks[1]);

        if rows.is_empty() {
            table_state.select(None);
        } else {
            let selected = table_state.selected().unwrap_or(0).min(rows.len() - 1);
            table_state.select(Some(selected));
        }
        render_table(frame, body[0], &rows, theme, table_state);
        render_trend_panel(
            frame,
            body[1],
            table_state.selected().and_then(|i| rows.get(i)),
            theme,
        );

        if manual_height > 0 {
            render_manual(frame, chunks[2], manual, theme);
        }
    }
}

fn pm_row(pm: &PmStatus, workers: &[WorkerStatus]) -> StatusRow {
    let orch = if pm.orch_id.trim().is_empty() {
        "AGENT"
    } else {
        pm.orch_id.as_str()
    };
    let running = workers.iter().any(|w| w.state == WorkerState::Running);
    let state = if running { "RUNNING" } else { "IDLE" };
    let source = if pm.progress_source.is_empty() {
        DEFAULT_PROGRESS_SOURCE
    } else {
        pm.progress_source.as_str()
    };
    StatusRow {
        task_id: format!("{orch}-PM"),
        owner: display_pm_name(&pm.pm_name).to_string(),
        role: "PM/Orchestrator".to_string(),
        engine: "pm".to_string(),
        pid: "-".to_string(),
        state: state.to_string(),
        class: StateClass::classify(state),
        cpu: None,
        mem: None,
        progress: pm.progress_percent.clamp(0.0, 100.0),
        activity: format!("progress_source={source}"),
        state_hint: String::new(),
        docs: 1,
        tokens: None,
        is_pm: true,
        trend: None,
    }
}

fn worker_row(worker: &WorkerStatus, history: &TimeSeriesStore) -> StatusRow {
    let (cpu, mem) = worker
        .metrics
        .map_or((0.0, 0.0), |m| (m.cpu_percent.max(0.0), m.rss_mb.max(0.0)));
    let state = worker.state.to_string();
    StatusRow {
        task_id: worker.task_id.clone(),
        owner: worker.owner.clone(),
        role: worker.role.clone(),
        engine: worker.engine.clone(),
        pid: worker.pid.map(|p| p.to_string()).unwrap_or_default(),
        class: StateClass::classify(&state),
        state: if state.is_empty() { "-".to_string() } else { state },
        cpu: Some(Meter {
            percent: cpu.clamp(0.0, 100.0),
            label: format!("{cpu:.3}%"),
        }),
        mem: Some(Meter {
            percent: (mem / MEM_MB_PER_PERCENT).min(100.0),
            label: format!("{mem:.1}MB"),
        }),
        progress: worker.progress.clamp(0.0, 100.0),
        activity: worker.activity.clone(),
        state_hint: worker.state_hint.clone(),
        docs: worker.docs_count,
        tokens: worker.tokens.as_ref().and_then(|t| t.total),
        is_pm: false,
        trend: Some(TrendRenderer::render(&history.get(&worker.task_id))),
    }
}

fn state_style(class: StateClass, theme: &Theme) -> Style {
    match class {
        StateClass::Ok => theme.state_ok,
        StateClass::Warn => theme.state_warn,
        StateClass::Bad => theme.state_bad,
    }
}

fn meter_text(meter: &Option<Meter>) -> String {
    match meter {
        Some(m) => format!("{} {}", mini_bar(m.percent, 6), m.label),
        None => "-".to_string(),
    }
}

/// Text bar for table cells, `width` cells wide.
fn mini_bar(percent: f64, width: usize) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * width as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled.min(width)))
}

/// One-line block sparkline of a trend's CPU series.
fn mini_trend(trend: &Option<Trend>, width: usize) -> String {
    const LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
    let Some(trend) = trend else {
        return "-".to_string();
    };
    if trend.is_placeholder() {
        return "▁".repeat(width);
    }
    let points = &trend.cpu;
    let take = points.len().min(width);
    points[points.len() - take..]
        .iter()
        .map(|(_, y)| {
            let level = ((BASELINE_Y - y) / BAND * 7.0).round() as usize;
            LEVELS[level.min(7)]
        })
        .collect()
}

fn render_summary(frame: &mut Frame, area: Rect, status: Option<&RunStatus>, theme: &Theme) {
    let Some(status) = status else {
        let idle = Paragraph::new("no run selected").style(theme.label_style);
        frame.render_widget(idle, area);
        return;
    };
    let s = &status.summary;
    let mut spans = vec![
        Span::styled(format!("running:{}", s.running), theme.pill_style),
        Span::raw(" "),
        Span::styled(format!("total:{}", s.total), theme.pill_style),
        Span::raw(" "),
        Span::styled(format!("avg cpu:{:.2}%", s.avg_cpu), theme.pill_style),
        Span::raw(" "),
        Span::styled(format!("mem:{:.1}MB", s.mem_mb), theme.pill_style),
        Span::raw(" "),
        Span::styled(format!("tokens:{:.0}", s.tokens_total), theme.pill_style),
    ];
    if !status.model.is_empty() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("{} / {}", strip_control(&status.model), strip_control(&status.reasoning_effort)),
            theme.label_style,
        ));
    }
    let roles: Vec<Span> = status
        .role_summary
        .iter()
        .flat_map(|r| {
            [
                Span::styled(
                    format!(
                        "{} {:.1}% ({})",
                        strip_control(&r.role),
                        r.progress,
                        r.workers
                    ),
                    theme.role_pill_style,
                ),
                Span::raw(" "),
            ]
        })
        .collect();
    frame.render_widget(
        Paragraph::new(vec![Line::from(spans), Line::from(roles)]),
        area,
    );
}

fn render_table(
    frame: &mut Frame,
    area: Rect,
    rows: &[StatusRow],
    theme: &Theme,
    table_state: &mut TableState,
) {
    let header = Row::new(
        [
            "Task", "Owner", "Role", "Engine", "PID", "State", "CPU", "Mem", "Progress",
            "Activity", "Docs", "Trend",
        ]
        .map(|h| Cell::from(h).style(theme.header_style)),
    );

    let body = rows.iter().map(|row| {
        let mut state = strip_control(&row.state).into_owned();
        if !row.state_hint.is_empty() {
            state = format!("{state} ({})", strip_control(&row.state_hint));
        }
        let activity = if row.activity.is_empty() {
            "-".to_string()
        } else {
            strip_control(&row.activity).into_owned()
        };
        let docs = match row.tokens {
            Some(tokens) => format!("{} | {tokens:.0}t", row.docs),
            None => row.docs.to_string(),
        };
        Row::new(vec![
            Cell::from(strip_control(&row.task_id).into_owned()),
            Cell::from(strip_control(&row.owner).into_owned()),
            Cell::from(strip_control(&row.role).into_owned()),
            Cell::from(strip_control(&row.engine).into_owned()),
            Cell::from(row.pid.clone()),
            Cell::from(state).style(state_style(row.class, theme)),
            Cell::from(meter_text(&row.cpu)).style(theme.cpu_style),
            Cell::from(meter_text(&row.mem)).style(theme.mem_style),
            Cell::from(format!("{} {:.1}%", mini_bar(row.progress, 6), row.progress)),
            Cell::from(activity),
            Cell::from(docs),
            Cell::from(mini_trend(&row.trend, 10)).style(theme.cpu_style),
        ])
    });

    let table = Table::new(
        body,
        [
            Constraint::Length(12),
            Constraint::Length(10),
            Constraint::Length(14),
            Constraint::Length(11),
            Constraint::Length(7),
            Constraint::Length(10),
            Constraint::Length(16),
            Constraint::Length(16),
            Constraint::Length(13),
            Constraint::Min(12),
            Constraint::Length(6),
            Constraint::Length(10),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .title(" Workers ")
            .borders(Borders::ALL)
            .style(theme.block_style),
    )
    .highlight_style(theme.selected_style);

    frame.render_stateful_widget(table, area, table_state);
}

fn render_trend_panel(frame: &mut Frame, area: Rect, row: Option<&StatusRow>, theme: &Theme) {
    let title = match row {
        Some(row) => format!(" {} ", strip_control(&row.task_id)),
        None => " Trend ".to_string(),
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .style(theme.block_style);
    let inner = block.inner(area);
    frame.render_widget(block, area);
    if inner.height < 4 {
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(inner);

    match row {
        Some(row) if row.is_pm => {
            frame.render_widget(
                Paragraph::new("no metrics for the PM role").style(theme.label_style),
                chunks[0],
            );
            frame.render_widget(
                ProgressBar::new(row.progress / 100.0)
                    .style(theme.value_style)
                    .show_percentage(true),
                chunks[3],
            );
        }
        Some(row) => {
            if let Some(trend) = &row.trend {
                frame.render_widget(
                    TrendSparkline::new(trend)
                        .cpu_style(theme.cpu_style)
                        .mem_style(theme.mem_style)
                        .baseline_style(theme.baseline_style),
                    chunks[0],
                );
            }
            let legend = |label: &str, meter: &Option<Meter>, style: Style| {
                Line::from(vec![
                    Span::styled(format!("{label} "), style),
                    Span::raw(meter.as_ref().map_or("-".to_string(), |m| m.label.clone())),
                ])
            };
            frame.render_widget(
                Paragraph::new(legend("cpu", &row.cpu, theme.cpu_style)),
                chunks[1],
            );
            frame.render_widget(
                Paragraph::new(legend("mem", &row.mem, theme.mem_style)),
                chunks[2],
            );
            frame.render_widget(
                ProgressBar::new(row.progress / 100.0)
                    .show_percentage(true)
                    .dynamic_style(true),
                chunks[3],
            );
        }
        None => {
            frame.render_widget(
                Paragraph::new("no worker selected").style(theme.label_style),
                chunks[0],
            );
        }
    }
}

fn render_manual(frame: &mut Frame, area: Rect, manual: &[ManualEntry], theme: &Theme) {
    let header = Row::new(
        ["Task", "Owner", "Role", "Engine", "Repo", "Goal"]
            .map(|h| Cell::from(h).style(theme.header_style)),
    );
    let rows = manual.iter().map(|m| {
        Row::new(
            [&m.task_id, &m.owner, &m.role, &m.engine, &m.repo, &m.goal]
                .map(|v| Cell::from(strip_control(v).into_owned())),
        )
    });
    let table = Table::new(
        rows,
        [
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(14),
            Constraint::Length(14),
            Constraint::Length(16),
            Constraint::Min(10),
        ],
    )
    .header(header)
    .block(Block::default().title(" Manual lanes ").borders(Borders::ALL));
    frame.render_widget(table, area);
}
