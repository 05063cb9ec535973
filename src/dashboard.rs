//! Operator commands.
//!
//! The input layer turns key presses into [`Command`]s and the
//! [`Dashboard`] executes them against the API and the application state.
//! Nothing here depends on a rendering surface; failures end up on the
//! status line and the view keeps its last good state.

use std::path::PathBuf;

use itertools::Itertools;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, StartRequest, LOG_TAIL_LINES};
use crate::error::{DashError, Result};
use crate::state::config::non_empty_or;
use crate::state::{
    AppState, EditEffect, Engine, WorkerEdit, MAX_POLL_SECONDS, MIN_POLL_SECONDS,
};
use crate::ui::export::write_snapshot;
use crate::ui::status_view::StatusView;
use crate::ui::viewer::ViewerPort;

/// Server file behind the PM "view" action.
pub const PM_REPORT_PATH: &str = "orchestrator/status_report.md";

/// Orchestrator documents listed by the PM docs action.
pub const PM_DOCS: [&str; 5] = [
    "orchestrator/master_tasks.md",
    "orchestrator/integration.md",
    "orchestrator/inbox.md",
    "orchestrator/results.md",
    "orchestrator/status_report.md",
];

/// Header control targeted by [`Command::SetControl`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlField {
    Orch,
    Model,
    ReasoningEffort,
    GlobalPrompt,
    PmName,
    PollSeconds,
    Workspace,
}

impl ControlField {
    pub fn label(self) -> &'static str {
        match self {
            ControlField::Orch => "orch id",
            ControlField::Model => "model",
            ControlField::ReasoningEffort => "reasoning effort",
            ControlField::GlobalPrompt => "global prompt",
            ControlField::PmName => "pm name",
            ControlField::PollSeconds => "poll seconds",
            ControlField::Workspace => "workspace",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SavePmName(String),
    SaveConfig,
    LoadConfig,
    StartRun { dry_run: bool },
    StopRun,
    ViewLog(String),
    ViewDocs(String),
    ViewPmReport,
    ViewPmDocs,
    ViewPath(String),
    AddWorker(Engine),
    RemoveWorker(usize),
    PopWorker,
    AutoPopulate(i64),
    ApplyWorkerCount(i64),
    SetAllEnabled(bool),
    RenumberTaskIds,
    EditWorker { index: usize, edit: WorkerEdit },
    SelectRun(String),
    SelectNextRun,
    SelectPrevRun,
    SetControl(ControlField, String),
    ToggleAutoRefresh,
    AdjustInterval(i64),
    ExportSnapshot(PathBuf),
}

impl Command {
    /// Operation name used in failure messages.
    fn label(&self) -> &'static str {
        match self {
            Command::SavePmName(_) => "pm save",
            Command::SaveConfig => "save",
            Command::LoadConfig => "load",
            Command::StartRun { .. } => "start",
            Command::StopRun => "stop",
            Command::ViewLog(_) => "log",
            Command::ViewDocs(_) => "docs",
            Command::ViewPmReport | Command::ViewPath(_) => "read",
            Command::SelectRun(_) | Command::SelectNextRun | Command::SelectPrevRun => "status",
            Command::ExportSnapshot(_) => "export",
            _ => "command",
        }
    }
}

/// Executes operator commands.
pub struct Dashboard {
    pub state: AppState,
    api: ApiClient,
    viewer: Box<dyn ViewerPort>,
}

impl Dashboard {
    pub fn new(api: ApiClient, state: AppState, viewer: Box<dyn ViewerPort>) -> Self {
        Self { state, api, viewer }
    }

    /// Runs `command`; any failure is written to the status line.
    pub async fn execute(&mut self, command: Command) {
        let label = command.label();
        debug!(?command, "executing command");
        if let Err(err) = self.run(command).await {
            let message = match &err {
                DashError::Validation(_) | DashError::Environment(_) | DashError::ConfigLoad(_) => {
                    err.to_string()
                }
                _ => format!("{label} failed: {err}"),
            };
            warn!(%message, "command failed");
            self.state.status_line.set(message);
        }
    }

    async fn run(&mut self, command: Command) -> Result<()> {
        match command {
            Command::SavePmName(name) => self.save_pm_name(name).await,
            Command::SaveConfig => {
                self.save_config(false).await;
                Ok(())
            }
            Command::LoadConfig => self.load_config().await,
            Command::StartRun { dry_run } => self.start_run(dry_run).await,
            Command::StopRun => self.stop_run().await,
            Command::ViewLog(task) => self.view_log(&task).await,
            Command::ViewDocs(task) => self.view_docs(&task).await,
            Command::ViewPmReport => self.view_pm_report().await,
            Command::ViewPmDocs => {
                self.viewer.open("PM docs", &PM_DOCS.join("\n"))?;
                self.state.status_line.set("PM docs list opened");
                Ok(())
            }
            Command::ViewPath(path) => self.view_path(&path).await,
            Command::AddWorker(engine) => {
                // No-op at the cap.
                if !self.state.config.add_worker(&self.state.controls, engine) {
                    debug!("worker cap reached, add ignored");
                }
                Ok(())
            }
            Command::RemoveWorker(index) => {
                self.state.config.remove_worker(index);
                Ok(())
            }
            Command::PopWorker => {
                self.state.config.pop_worker();
                Ok(())
            }
            Command::AutoPopulate(n) => {
                self.state.config.auto_populate(&self.state.controls, n);
                Ok(())
            }
            Command::ApplyWorkerCount(n) => {
                self.state.config.apply_worker_count(&self.state.controls, n);
                Ok(())
            }
            Command::SetAllEnabled(enabled) => {
                self.state.config.set_all_enabled(&self.state.controls, enabled);
                Ok(())
            }
            Command::RenumberTaskIds => {
                self.state.config.renumber_task_ids(&self.state.controls);
                Ok(())
            }
            Command::EditWorker { index, edit } => {
                if self.state.config.apply_edit(index, edit) == Some(EditEffect::SaveSilently) {
                    self.save_config(true).await;
                }
                Ok(())
            }
            Command::SelectRun(name) => {
                if self.state.runs.select(&name) {
                    self.refresh_status().await?;
                }
                Ok(())
            }
            Command::SelectNextRun => {
                self.state.runs.select_next();
                self.refresh_status().await
            }
            Command::SelectPrevRun => {
                self.state.runs.select_prev();
                self.refresh_status().await
            }
            Command::SetControl(field, value) => self.set_control(field, value),
            Command::ToggleAutoRefresh => {
                let controls = &mut self.state.controls;
                controls.auto_refresh = !controls.auto_refresh;
                Ok(())
            }
            Command::AdjustInterval(delta) => {
                let controls = &mut self.state.controls;
                controls.poll_seconds = (controls.poll_seconds as i64 + delta)
                    .clamp(MIN_POLL_SECONDS as i64, MAX_POLL_SECONDS as i64)
                    as u64;
                Ok(())
            }
            Command::ExportSnapshot(path) => {
                let rows = StatusView::rows_for(&self.state);
                let title = match self.state.runs.selected() {
                    Some(run) => format!("orch-dash {run}"),
                    None => "orch-dash".to_string(),
                };
                write_snapshot(&path, &rows, &title)?;
                self.state
                    .status_line
                    .set(format!("snapshot written: {}", path.display()));
                Ok(())
            }
        }
    }

    async fn save_config(&mut self, silent: bool) -> bool {
        let state = &mut self.state;
        state
            .config
            .save(&self.api, &state.controls, &mut state.status_line, silent)
            .await
    }

    async fn load_config(&mut self) -> Result<()> {
        let orch_id = self.state.controls.orch_id();
        let config = self.state.config.load(&self.api, &orch_id).await?;
        self.state.controls.adopt_config(config, &orch_id);
        let message = format!("config loaded: {orch_id} | {}", self.state.config.summary());
        info!(%orch_id, "configuration loaded");
        self.state.status_line.set(message);
        Ok(())
    }

    async fn save_pm_name(&mut self, name: String) -> Result<()> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(DashError::Validation("pm name is empty".into()));
        }
        self.state.controls.pm_name = name.clone();
        self.api.save_pm(&name).await?;
        info!(pm_name = %name, "pm name saved");
        self.state.status_line.set(format!("pm saved: {name}"));

        match self.api.pm().await {
            Ok(pm) => self.state.adopt_saved_pm(pm),
            Err(err) => warn!(error = %err, "pm refresh after save failed"),
        }
        Ok(())
    }

    async fn start_run(&mut self, dry_run: bool) -> Result<()> {
        if !self.save_config(true).await {
            return Err(DashError::Validation("start blocked: config save failed".into()));
        }

        let controls = &self.state.controls;
        let request = StartRequest {
            orch_id: controls.orch_id(),
            model: non_empty_or(&controls.model, crate::state::config::DEFAULT_MODEL),
            reasoning_effort: non_empty_or(
                &controls.reasoning_effort,
                crate::state::config::DEFAULT_REASONING_EFFORT,
            ),
            pm_request: controls.global_prompt.trim().to_string(),
            dry_run,
        };
        info!(orch_id = %request.orch_id, dry_run, "starting run");
        let output = self.api.start(&request).await?;
        self.state.status_line.set(output.transcript());

        self.reload_run().await;
        Ok(())
    }

    async fn stop_run(&mut self) -> Result<()> {
        let Some(run) = self.state.runs.selected().map(str::to_string) else {
            return Err(DashError::Validation("no run selected".into()));
        };
        info!(run = %run, "stopping run");
        let output = self.api.stop(&run).await?;
        self.state.status_line.set(output.transcript());

        self.reload_run().await;
        Ok(())
    }

    /// Refreshes the run list and the selected run's status after a
    /// start or stop.
    async fn reload_run(&mut self) {
        let filter = self.state.controls.orch_filter();
        match self.state.runs.refresh(&self.api, &filter).await {
            Ok(Some(adopted)) => self.state.controls.orch = adopted,
            Ok(None) => {}
            Err(err) => {
                self.state.status_line.set(format!("runs failed: {err}"));
                return;
            }
        }
        if let Err(err) = self.refresh_status().await {
            self.state.status_line.set(format!("status failed: {err}"));
        }
    }

    async fn refresh_status(&mut self) -> Result<()> {
        let Some(run) = self.state.runs.selected().map(str::to_string) else {
            return Ok(());
        };
        let status = self.api.run_status(&run).await?;
        self.state.apply_run_status(status);
        Ok(())
    }

    async fn view_log(&mut self, task: &str) -> Result<()> {
        let Some(run) = self.state.runs.selected().map(str::to_string) else {
            debug!(task, "log requested without a selected run");
            return Ok(());
        };
        if task.is_empty() {
            return Ok(());
        }
        let log = self.api.log_tail(&run, task, LOG_TAIL_LINES).await?;
        self.viewer.open(&format!("{task} log"), &log.text)?;
        self.state.status_line.set(format!("{task} log opened"));
        Ok(())
    }

    async fn view_docs(&mut self, task: &str) -> Result<()> {
        let Some(run) = self.state.runs.selected().map(str::to_string) else {
            debug!(task, "docs requested without a selected run");
            return Ok(());
        };
        if task.is_empty() {
            return Ok(());
        }
        let listing = self.api.documents(&run, task).await?;
        let docs = listing
            .tasks
            .into_iter()
            .next()
            .map(|t| t.documents)
            .unwrap_or_default();
        let title = format!("{task} docs");
        if docs.is_empty() {
            self.viewer.open(&title, "(no docs)")?;
            return Ok(());
        }
        let text = docs
            .iter()
            .map(|d| format!("{}\t{}\t{}\t{}", d.kind, d.path, d.size, d.mtime))
            .join("\n");
        self.viewer.open(&title, &text)?;
        self.state
            .status_line
            .set(format!("{task} docs opened ({})", docs.len()));
        Ok(())
    }

    async fn view_pm_report(&mut self) -> Result<()> {
        let file = self.api.read(PM_REPORT_PATH).await?;
        self.viewer.open("PM Status Report", &file.text)?;
        self.state.status_line.set("PM status_report opened");
        Ok(())
    }

    /// Opens any server file. A read failure opens a viewer with the error.
    async fn view_path(&mut self, path: &str) -> Result<()> {
        let path = path.trim();
        if path.is_empty() {
            return Err(DashError::Validation("path is empty".into()));
        }
        match self.api.read(path).await {
            Ok(file) => {
                let title = if file.path.is_empty() {
                    path.to_string()
                } else {
                    file.path
                };
                self.viewer.open(&title, &file.text)?;
            }
            Err(err) => {
                self.viewer.open("read failed", &err.to_string())?;
            }
        }
        Ok(())
    }

    fn set_control(&mut self, field: ControlField, value: String) -> Result<()> {
        let controls = &mut self.state.controls;
        match field {
            ControlField::Orch => controls.orch = value.trim().to_uppercase(),
            ControlField::Model => controls.model = value.trim().to_string(),
            ControlField::ReasoningEffort => controls.reasoning_effort = value.trim().to_string(),
            ControlField::GlobalPrompt => controls.global_prompt = value,
            ControlField::PmName => controls.pm_name = value,
            ControlField::Workspace => controls.workspace = value.trim().to_string(),
            ControlField::PollSeconds => {
                let seconds: u64 = value.trim().parse().map_err(|_| {
                    DashError::Validation(format!("poll seconds must be a number, got {value:?}"))
                })?;
                controls.poll_seconds = seconds.clamp(MIN_POLL_SECONDS, MAX_POLL_SECONDS);
            }
        }
        debug!(field = field.label(), "control updated");
        Ok(())
    }
}
