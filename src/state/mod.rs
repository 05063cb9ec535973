//! Application state.
//!
//! Everything the dashboard knows lives in one [`AppState`] owned by the UI
//! task. Poll results arrive as a [`CycleReport`] and are folded in by
//! [`AppState::apply_cycle`] in one synchronous step, so a render never sees
//! a half-applied cycle.

pub mod config;
pub mod history;
pub mod runs;

pub use config::{ConfigModel, EditEffect, Engine, OrchestratorConfig, WorkerConfigEntry, WorkerEdit};
pub use history::{History, TimeSeriesStore, HISTORY_LEN};
pub use runs::{RunRegistry, RunsRefresh};

use chrono::{DateTime, Local};
use tracing::{debug, warn};

use crate::api::{PmStatus, RunStatus, ToolStatus};
use crate::monitor::{CycleInputs, CycleReport};

pub const DEFAULT_POLL_SECONDS: u64 = 3;
pub const MIN_POLL_SECONDS: u64 = 1;
pub const MAX_POLL_SECONDS: u64 = 30;
pub const DEFAULT_PM_NAME: &str = "Codex-PM";

/// Operator-editable header controls.
#[derive(Debug, Clone, PartialEq)]
pub struct Controls {
    /// Orchestrator id as typed; may be blank.
    pub orch: String,
    pub model: String,
    pub reasoning_effort: String,
    pub global_prompt: String,
    pub workspace: String,
    /// PM display name pending a save.
    pub pm_name: String,
    pub poll_seconds: u64,
    pub auto_refresh: bool,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            orch: String::new(),
            model: config::DEFAULT_MODEL.to_string(),
            reasoning_effort: config::DEFAULT_REASONING_EFFORT.to_string(),
            global_prompt: String::new(),
            workspace: String::new(),
            pm_name: String::new(),
            poll_seconds: DEFAULT_POLL_SECONDS,
            auto_refresh: true,
        }
    }
}

impl Controls {
    /// Trimmed, upper-cased orchestrator filter; empty when blank.
    pub fn orch_filter(&self) -> String {
        self.orch.trim().to_uppercase()
    }

    /// Orchestrator id with the `AGENT` fallback.
    pub fn orch_id(&self) -> String {
        let filter = self.orch_filter();
        if filter.is_empty() {
            config::DEFAULT_ORCH_ID.to_string()
        } else {
            filter
        }
    }

    pub fn poll_interval(&self) -> u64 {
        self.poll_seconds.clamp(MIN_POLL_SECONDS, MAX_POLL_SECONDS)
    }

    /// Mirrors a freshly loaded configuration into the header controls.
    pub fn adopt_config(&mut self, config: &OrchestratorConfig, requested_orch: &str) {
        self.orch = if config.orch_id.trim().is_empty() {
            requested_orch.to_string()
        } else {
            config.orch_id.clone()
        };
        let defaults = &config.defaults;
        if let Some(model) = defaults.model.as_deref().filter(|m| !m.is_empty()) {
            self.model = model.to_string();
        }
        if let Some(effort) = defaults.reasoning_effort.as_deref().filter(|e| !e.is_empty()) {
            self.reasoning_effort = effort.to_string();
        }
        self.global_prompt = defaults.global_prompt.clone().unwrap_or_default();
        if !config.workspace.is_empty() {
            self.workspace = config.workspace.clone();
        }
    }
}

/// The single status text area.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusLine {
    text: String,
    updated: Option<DateTime<Local>>,
}

impl StatusLine {
    pub fn set(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.updated = Some(Local::now());
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn updated(&self) -> Option<DateTime<Local>> {
        self.updated
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Application state.
#[derive(Debug, Default)]
pub struct AppState {
    pub controls: Controls,
    pub config: ConfigModel,
    pub history: TimeSeriesStore,
    pub runs: RunRegistry,
    pub tools: Option<ToolStatus>,
    pub pm: Option<PmStatus>,
    pub run_status: Option<RunStatus>,
    pub status_line: StatusLine,
    /// Local time of the last applied cycle.
    pub last_update: Option<DateTime<Local>>,
    pub cycles_applied: u64,
}

impl AppState {
    pub fn new(controls: Controls) -> Self {
        Self {
            controls,
            ..Self::default()
        }
    }

    /// Snapshot of what the next poll cycle needs to know.
    pub fn cycle_inputs(&self) -> CycleInputs {
        CycleInputs {
            orch_filter: self.controls.orch_filter(),
            config_orch: self.controls.orch_id(),
            selected_run: self.runs.selected().map(str::to_string),
            config_loaded: self.config.is_loaded(),
        }
    }

    /// Folds one finished poll cycle into the state.
    pub fn apply_cycle(&mut self, report: CycleReport) {
        let mut failures = Vec::new();

        match report.tools {
            Some(Ok(tools)) => self.tools = Some(tools),
            Some(Err(err)) => failures.push(format!("tools failed: {err}")),
            None => {}
        }

        match report.pm {
            Some(Ok(pm)) => self.fold_pm(pm),
            Some(Err(err)) => failures.push(format!("pm failed: {err}")),
            None => {}
        }

        match report.runs {
            Some(Ok(refresh)) => {
                if let Some(adopted) = refresh.adopted_filter {
                    self.controls.orch = adopted;
                }
                self.runs.apply(refresh.listing);
            }
            Some(Err(err)) => failures.push(format!("runs failed: {err}")),
            None => {}
        }

        match report.config {
            // Never clobber a configuration the operator is already editing.
            Some(Ok(config)) if !self.config.is_loaded() => {
                let requested = self.controls.orch_id();
                self.controls.adopt_config(&config, &requested);
                self.config.replace(config);
            }
            Some(Ok(_)) => debug!("cycle config ignored, local configuration present"),
            Some(Err(err)) => failures.push(err.to_string()),
            None => {}
        }

        match report.status {
            Some((run, Ok(status))) if self.runs.selected() == Some(run.as_str()) => {
                self.apply_run_status(status);
            }
            Some((run, Ok(_))) => debug!(run = %run, "stale run status dropped"),
            Some((_, Err(err))) => failures.push(format!("status failed: {err}")),
            None => {}
        }

        if !failures.is_empty() {
            let message = failures.join(" | ");
            warn!(%message, "poll cycle had failures");
            self.status_line.set(message);
        }
        self.last_update = Some(Local::now());
        self.cycles_applied += 1;
    }

    /// Records metrics for every worker and keeps the snapshot.
    pub fn apply_run_status(&mut self, status: RunStatus) {
        for worker in status.workers.iter().filter(|w| !w.task_id.is_empty()) {
            let metrics = worker.metrics.as_ref();
            self.history.record(
                &worker.task_id,
                metrics.map(|m| m.cpu_percent),
                metrics.map(|m| m.rss_mb),
            );
        }
        self.run_status = Some(status);
    }

    /// Adopts a PM snapshot. The name input follows the server unless the
    /// operator has typed something different.
    pub fn fold_pm(&mut self, pm: PmStatus) {
        let previous = self
            .pm
            .as_ref()
            .map(|p| display_pm_name(&p.pm_name).to_string());
        let input = self.controls.pm_name.trim();
        if input.is_empty() || previous.as_deref() == Some(input) {
            self.controls.pm_name = display_pm_name(&pm.pm_name).to_string();
        }
        self.pm = Some(pm);
    }

    /// Adopts a PM snapshot fetched after a name save. The server's name
    /// always replaces the input.
    pub fn adopt_saved_pm(&mut self, pm: PmStatus) {
        self.controls.pm_name = display_pm_name(&pm.pm_name).to_string();
        self.pm = Some(pm);
    }
}

/// PM name with the `Codex-PM` fallback.
pub fn display_pm_name(name: &str) -> &str {
    if name.trim().is_empty() {
        DEFAULT_PM_NAME
    } else {
        name
    }
}
