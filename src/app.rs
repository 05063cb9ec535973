//! Application state and logic.
//!
//! The [`App`] wires the pieces together: the [`Dashboard`] executing
//! commands, the [`Ui`] translating keys, the [`ViewerHost`] drawing text
//! surfaces and the [`PollScheduler`] feeding cycle reports back through
//! the event stream.

use std::path::Path;
use std::time::Duration;

use color_eyre::Result;
use futures::StreamExt;
use ratatui::backend::Backend;
use ratatui::Terminal;
use tokio::sync::{mpsc, watch};
use tracing::info;

use crate::api::ApiClient;
use crate::dashboard::Dashboard;
use crate::event::{Event, EventHandler, DEFAULT_TICK_RATE};
use crate::monitor::{CycleReport, PollScheduler, RefreshSource, Refresher};
use crate::state::config::{DEFAULT_MODEL, DEFAULT_REASONING_EFFORT};
use crate::state::{AppState, Controls, DEFAULT_POLL_SECONDS};
use crate::ui::export::write_snapshot;
use crate::ui::viewer::{SystemClipboard, ViewerAction};
use crate::ui::{StatusView, TerminalSize, TerminalViewer, Ui, UpdateKind, ViewerHost};

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub base_url: String,
    pub poll_seconds: u64,
    pub auto_refresh: bool,
    pub orch: String,
    pub model: String,
    pub reasoning_effort: String,
    pub workspace: String,
    pub tick_rate: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8787".to_string(),
            poll_seconds: DEFAULT_POLL_SECONDS,
            auto_refresh: true,
            orch: String::new(),
            model: DEFAULT_MODEL.to_string(),
            reasoning_effort: DEFAULT_REASONING_EFFORT.to_string(),
            workspace: String::new(),
            tick_rate: DEFAULT_TICK_RATE,
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initial header controls.
    pub fn controls(&self) -> Controls {
        Controls {
            orch: self.orch.trim().to_uppercase(),
            model: self.model.clone(),
            reasoning_effort: self.reasoning_effort.clone(),
            workspace: self.workspace.clone(),
            poll_seconds: self.poll_seconds,
            auto_refresh: self.auto_refresh,
            ..Controls::default()
        }
    }
}

/// Main application.
pub struct App {
    dashboard: Dashboard,
    ui: Ui,
    viewers: ViewerHost,
    scheduler: PollScheduler<Refresher>,
    inputs: watch::Sender<crate::monitor::CycleInputs>,
    terminal_size: TerminalSize,
    should_quit: bool,
}

impl App {
    /// Builds the application. Cycle reports are sent to `reports`; the
    /// receiving end belongs to the [`EventHandler`].
    pub fn new(config: &AppConfig, reports: mpsc::UnboundedSender<CycleReport>) -> Result<Self> {
        let api = ApiClient::new(&config.base_url)?;
        let state = AppState::new(config.controls());
        let (inputs, inputs_rx) = watch::channel(state.cycle_inputs());
        let scheduler = PollScheduler::new(Refresher::new(api.clone()), inputs_rx, reports);

        let terminal_size = TerminalSize::default();
        let (viewer, viewers) =
            TerminalViewer::new(terminal_size.clone(), Box::new(SystemClipboard::default()));

        info!(base_url = %api.base_url(), "dashboard configured");
        Ok(Self {
            dashboard: Dashboard::new(api, state, Box::new(viewer)),
            ui: Ui::new(),
            viewers,
            scheduler,
            inputs,
            terminal_size,
            should_quit: false,
        })
    }

    pub fn state(&self) -> &AppState {
        &self.dashboard.state
    }

    /// Runs the main loop until the operator quits or the events end.
    pub async fn run<B: Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
        events: &mut EventHandler,
    ) -> Result<()> {
        let size = terminal.size()?;
        self.handle_resize(size.width, size.height);
        self.apply_schedule();

        while !self.should_quit {
            self.viewers.drain();
            terminal.draw(|frame| self.ui.render(frame, &self.dashboard.state, &self.viewers))?;

            match events.next().await {
                Some(event) => self.handle_event(event).await,
                None => break,
            }
        }
        info!("dashboard exiting");
        Ok(())
    }

    /// Runs the main loop on stdout with the crossterm backend.
    pub async fn run_with_crossterm(&mut self, events: &mut EventHandler) -> Result<()> {
        use ratatui::backend::CrosstermBackend;

        let mut terminal = Terminal::new(CrosstermBackend::new(std::io::stdout()))?;
        self.run(&mut terminal, events).await
    }

    async fn handle_event(&mut self, event: Event) {
        match event {
            Event::Key(key) => {
                self.viewers.drain();
                if self.viewers.is_active() {
                    if let ViewerAction::Copied(message) =
                        self.viewers.handle_key(key, self.ui.page_size())
                    {
                        self.dashboard.state.status_line.set(message);
                    }
                    return;
                }
                let update = self.ui.handle_key_event(key, &self.dashboard.state);
                self.apply_update(update).await;
            }
            Event::Resize(width, height) => self.handle_resize(width, height),
            Event::Tick => {}
            Event::Cycle(report) => {
                self.dashboard.state.apply_cycle(*report);
                self.publish_inputs();
            }
        }
    }

    async fn apply_update(&mut self, update: UpdateKind) {
        match update {
            UpdateKind::Quit => self.should_quit = true,
            UpdateKind::ToggleHelp => self.ui.toggle_help(),
            UpdateKind::RefreshNow => self.scheduler.refresh_now(),
            UpdateKind::Notice(message) => self.dashboard.state.status_line.set(message),
            UpdateKind::Command(command) => {
                let before = self.schedule();
                self.dashboard.execute(command).await;
                self.publish_inputs();
                if self.schedule() != before {
                    self.apply_schedule();
                }
            }
            UpdateKind::Other => {}
        }
    }

    fn handle_resize(&mut self, width: u16, height: u16) {
        self.ui.handle_resize(width, height);
        self.terminal_size.set(width, height);
    }

    fn schedule(&self) -> (u64, bool) {
        let controls = &self.dashboard.state.controls;
        (controls.poll_interval(), controls.auto_refresh)
    }

    fn apply_schedule(&mut self) {
        let (seconds, enabled) = self.schedule();
        self.scheduler.set_interval(seconds, enabled);
    }

    fn publish_inputs(&self) {
        self.inputs.send_replace(self.dashboard.state.cycle_inputs());
    }
}

/// Runs a single poll cycle and writes the resulting rows as HTML.
/// Returns the number of rows written.
pub async fn export_once(config: &AppConfig, path: &Path) -> Result<usize> {
    let api = ApiClient::new(&config.base_url)?;
    let mut state = AppState::new(config.controls());
    let report = Refresher::new(api).refresh(state.cycle_inputs()).await;
    state.apply_cycle(report);

    let rows = StatusView::rows_for(&state);
    let title = match state.runs.selected() {
        Some(run) => format!("orch-dash {run}"),
        None => "orch-dash".to_string(),
    };
    write_snapshot(path, &rows, &title)?;
    if !state.status_line.is_empty() {
        tracing::warn!(message = %state.status_line.text(), "snapshot taken with failures");
    }
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn controls_follow_the_config() {
        let config = AppConfig {
            orch: " demo ".into(),
            poll_seconds: 7,
            auto_refresh: false,
            workspace: "/srv/work".into(),
            ..AppConfig::default()
        };
        let controls = config.controls();
        assert_eq!(controls.orch, "DEMO");
        assert_eq!(controls.poll_seconds, 7);
        assert!(!controls.auto_refresh);
        assert_eq!(controls.workspace, "/srv/work");
        assert_eq!(controls.model, DEFAULT_MODEL);
    }

    #[tokio::test]
    async fn export_once_writes_rows_from_one_cycle() {
        use serde_json::json;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        let routes = [
            ("/api/tools", json!({ "ok": true, "codex": true })),
            ("/api/pm", json!({ "ok": true, "pm_name": "Lead", "orch": "DEMO" })),
            ("/api/runs", json!({ "ok": true, "runs": [{ "name": "run-1", "orch_id": "DEMO" }], "latest": "run-1" })),
            ("/api/config/DEMO", json!({ "ok": true, "config": {} })),
            ("/api/run/run-1/status", json!({ "ok": true, "workers": [{ "task_id": "DEMO-T1", "state": "RUNNING" }] })),
        ];
        for (route, body) in routes {
            Mock::given(method("GET"))
                .and(path(route))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
                .mount(&server)
                .await;
        }

        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("snap.html");
        let config = AppConfig {
            base_url: server.uri(),
            orch: "demo".into(),
            ..AppConfig::default()
        };
        let rows = export_once(&config, &out).await.unwrap();
        assert_eq!(rows, 2);
        let html = std::fs::read_to_string(out).unwrap();
        assert!(html.contains("DEMO-PM"));
        assert!(html.contains("DEMO-T1"));
    }
}
