//! Editable worker-pool configuration.
//!
//! The configuration is edited locally and only reconciled with the server on
//! an explicit load or a successful save. Workers are identified by their
//! position in the list, so every mutation here is index based.

use itertools::Itertools;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::api::{lenient, ApiClient};
use crate::error::{DashError, Result};
use crate::state::{Controls, StatusLine};

/// Hard cap on the number of workers in one pool.
pub const MAX_WORKERS: usize = 10;
pub const DEFAULT_ORCH_ID: &str = "AGENT";
pub const DEFAULT_MODEL: &str = "gpt-5.3-codex";
pub const DEFAULT_REASONING_EFFORT: &str = "xhigh";
pub const DEFAULT_SANDBOX: &str = "workspace-write";
pub const DEFAULT_APPROVAL: &str = "never";
pub const DEFAULT_CLAUDE_CMD: &str = "claude";
const DEFAULT_REPO: &str = "orchestrator";
const DEFAULT_SCOPE_PATH: &str = "orchestrator/dashboard.py";

/// The two-element claude invocation template.
pub fn default_claude_args() -> Vec<String> {
    vec!["--print".to_string(), "{prompt}".to_string()]
}

/// Executor backing a worker lane.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Engine {
    Codex,
    ClaudeCli,
    ClaudeManual,
    Manual,
    Other(String),
}

impl Engine {
    /// Engines offered by the editor, in cycling order.
    pub const CHOICES: [Engine; 4] = [
        Engine::Codex,
        Engine::ClaudeCli,
        Engine::ClaudeManual,
        Engine::Manual,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Engine::Codex => "codex",
            Engine::ClaudeCli => "claude-cli",
            Engine::ClaudeManual => "claude-manual",
            Engine::Manual => "manual",
            Engine::Other(raw) => raw,
        }
    }

    /// Next engine in [`Engine::CHOICES`]; unknown engines restart at codex.
    pub fn next(&self) -> Engine {
        let pos = Self::CHOICES.iter().position(|e| e == self);
        match pos {
            Some(i) => Self::CHOICES[(i + 1) % Self::CHOICES.len()].clone(),
            None => Engine::Codex,
        }
    }
}

impl From<String> for Engine {
    fn from(raw: String) -> Self {
        match raw.trim() {
            "" | "codex" => Engine::Codex,
            "claude-cli" => Engine::ClaudeCli,
            "claude-manual" => Engine::ClaudeManual,
            "manual" => Engine::Manual,
            other => Engine::Other(other.to_string()),
        }
    }
}

impl Serialize for Engine {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Engine {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        lenient::string(deserializer).map(Engine::from)
    }
}

/// Anything but an explicit `false` counts as enabled.
fn enabled_flag<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value != Value::Bool(false))
}

fn default_enabled() -> bool {
    true
}

fn string_list<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<Vec<String>>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
        ),
        _ => None,
    })
}

/// One lane of the worker pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfigEntry {
    #[serde(default, deserialize_with = "lenient::string")]
    pub task_id: String,
    #[serde(default = "default_enabled", deserialize_with = "enabled_flag")]
    pub enabled: bool,
    #[serde(default = "default_engine")]
    pub engine: Engine,
    #[serde(default, deserialize_with = "lenient::string")]
    pub owner: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub role: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub repo: String,
    #[serde(default, deserialize_with = "lenient::seq_or_empty")]
    pub scope_paths: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub goal: String,
    #[serde(default, deserialize_with = "lenient::seq_or_empty")]
    pub done_when: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub prompt_file: String,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub work_method: Option<String>,
    /// Keys this client does not model, kept for the round trip.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_engine() -> Engine {
    Engine::Codex
}

impl WorkerConfigEntry {
    /// Fresh entry for position `index` (0-based) under `orch_id`.
    pub fn generate(index: usize, engine: Engine, orch_id: &str) -> Self {
        let number = index + 1;
        let (owner, role) = match engine {
            Engine::ClaudeCli => ("Claude".to_string(), "UI-Relay".to_string()),
            _ => {
                let letter = char::from(b'A' + (index % 26) as u8);
                (format!("Codex-{letter}"), "Worker".to_string())
            }
        };
        Self {
            task_id: format!("{orch_id}-T{number}"),
            enabled: true,
            engine,
            owner,
            role,
            repo: DEFAULT_REPO.to_string(),
            scope_paths: vec![DEFAULT_SCOPE_PATH.to_string()],
            goal: String::new(),
            done_when: Vec::new(),
            prompt_file: format!("orchestrator/runner/prompts/{orch_id}-T{number}.md"),
            work_method: None,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Guards {
    #[serde(default, deserialize_with = "lenient::opt_bool", skip_serializing_if = "Option::is_none")]
    pub read_only_guard: Option<bool>,
    #[serde(default, deserialize_with = "lenient::opt_bool", skip_serializing_if = "Option::is_none")]
    pub history_readonly_guard: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunDirPolicy {
    #[serde(default, deserialize_with = "lenient::opt_bool", rename = "single_run_dir", skip_serializing_if = "Option::is_none")]
    pub single: Option<bool>,
    #[serde(default, deserialize_with = "lenient::opt_bool", rename = "clean_run_dir", skip_serializing_if = "Option::is_none")]
    pub clean: Option<bool>,
    #[serde(default, deserialize_with = "lenient::opt_bool", rename = "prune_legacy_runs", skip_serializing_if = "Option::is_none")]
    pub prune_legacy: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClaudeDefaults {
    #[serde(default, deserialize_with = "lenient::opt_string", rename = "claude_cmd", skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_bool", rename = "claude_continue", skip_serializing_if = "Option::is_none")]
    pub continue_session: Option<bool>,
    #[serde(
        default,
        rename = "claude_args",
        deserialize_with = "string_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub args: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient::opt_bool", rename = "claude_stdin", skip_serializing_if = "Option::is_none")]
    pub use_stdin: Option<bool>,
}

/// Pool-wide defaults. Stored flat on the wire; grouped here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub global_prompt: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string", rename = "sandbox", skip_serializing_if = "Option::is_none")]
    pub sandbox_mode: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_string", rename = "approval", skip_serializing_if = "Option::is_none")]
    pub approval_mode: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_bool", rename = "search", skip_serializing_if = "Option::is_none")]
    pub search_enabled: Option<bool>,
    #[serde(flatten)]
    pub guards: Guards,
    #[serde(flatten)]
    pub run_dir: RunDirPolicy,
    #[serde(flatten)]
    pub claude: ClaudeDefaults,
    #[serde(default, deserialize_with = "string_list", skip_serializing_if = "Option::is_none")]
    pub pm_last_selected: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient::opt_string", skip_serializing_if = "Option::is_none")]
    pub pm_last_request: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Stored configuration for one orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default, deserialize_with = "lenient::string")]
    pub orch_id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub workspace: String,
    #[serde(default, deserialize_with = "lenient::object_or_default")]
    pub defaults: Defaults,
    #[serde(default, deserialize_with = "lenient::seq_or_empty")]
    pub workers: Vec<WorkerConfigEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OrchestratorConfig {
    /// Default pool used when nothing has been loaded yet.
    pub fn with_defaults(controls: &Controls) -> Self {
        Self {
            orch_id: controls.orch_id(),
            workspace: controls.workspace.clone(),
            defaults: Defaults {
                model: Some(non_empty_or(&controls.model, DEFAULT_MODEL)),
                reasoning_effort: Some(non_empty_or(
                    &controls.reasoning_effort,
                    DEFAULT_REASONING_EFFORT,
                )),
                global_prompt: Some(controls.global_prompt.clone()),
                sandbox_mode: Some(DEFAULT_SANDBOX.to_string()),
                approval_mode: Some(DEFAULT_APPROVAL.to_string()),
                search_enabled: Some(false),
                guards: Guards {
                    read_only_guard: Some(true),
                    history_readonly_guard: Some(true),
                },
                run_dir: RunDirPolicy {
                    single: Some(true),
                    clean: Some(true),
                    prune_legacy: Some(true),
                },
                claude: ClaudeDefaults {
                    cmd: Some(DEFAULT_CLAUDE_CMD.to_string()),
                    continue_session: Some(true),
                    args: Some(default_claude_args()),
                    use_stdin: Some(false),
                },
                ..Defaults::default()
            },
            workers: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Applies the fallbacks required before a save.
    pub fn normalize(&mut self, controls: &Controls) {
        let from_controls = controls.orch_filter();
        self.orch_id = if !from_controls.is_empty() {
            from_controls
        } else if !self.orch_id.trim().is_empty() {
            self.orch_id.trim().to_uppercase()
        } else {
            DEFAULT_ORCH_ID.to_string()
        };

        let defaults = &mut self.defaults;
        defaults.model = Some(non_empty_or(&controls.model, DEFAULT_MODEL));
        defaults.reasoning_effort = Some(non_empty_or(
            &controls.reasoning_effort,
            DEFAULT_REASONING_EFFORT,
        ));
        defaults.global_prompt = Some(controls.global_prompt.clone());
        defaults.guards.read_only_guard = Some(defaults.guards.read_only_guard != Some(false));
        defaults.guards.history_readonly_guard =
            Some(defaults.guards.history_readonly_guard != Some(false));
        let cmd = defaults.claude.cmd.take().filter(|c| !c.is_empty());
        defaults.claude.cmd = Some(cmd.unwrap_or_else(|| DEFAULT_CLAUDE_CMD.to_string()));
        defaults.claude.continue_session = Some(defaults.claude.continue_session != Some(false));
        if defaults.claude.args.is_none() {
            defaults.claude.args = Some(default_claude_args());
        }
        defaults.pm_last_selected = Some(
            self.workers
                .iter()
                .filter(|w| w.enabled)
                .map(|w| w.task_id.clone())
                .collect(),
        );
        defaults.pm_last_request = Some(controls.global_prompt.clone());
    }

    /// `Worker:2, UI-Relay:1` over enabled workers, in first-seen order.
    pub fn enabled_roles(&self) -> String {
        let mut counts: Vec<(String, usize)> = Vec::new();
        for worker in self.workers.iter().filter(|w| w.enabled) {
            let role = if worker.role.is_empty() { "Worker" } else { &worker.role };
            match counts.iter_mut().find(|(name, _)| name == role) {
                Some((_, n)) => *n += 1,
                None => counts.push((role.to_string(), 1)),
            }
        }
        counts
            .iter()
            .map(|(role, n)| format!("{role}:{n}"))
            .join(", ")
    }
}

/// Trimmed `value`, or `fallback` when it is blank.
pub(crate) fn non_empty_or(value: &str, fallback: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

/// A single operator edit on one worker row.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEdit {
    TaskId(String),
    Owner(String),
    Role(String),
    Engine(Engine),
    Repo(String),
    PromptFile(String),
    Enabled(bool),
}

/// Follow-up required after an edit was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditEffect {
    /// Text edits wait for an explicit save.
    Batched,
    /// Enable toggles must reach the server before the next run start.
    SaveSilently,
}

/// In-memory owner of the editable configuration.
#[derive(Debug, Default)]
pub struct ConfigModel {
    config: Option<OrchestratorConfig>,
}

impl ConfigModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.config.is_some()
    }

    pub fn config(&self) -> Option<&OrchestratorConfig> {
        self.config.as_ref()
    }

    pub fn workers(&self) -> &[WorkerConfigEntry] {
        self.config.as_ref().map_or(&[], |c| c.workers.as_slice())
    }

    /// Builds the default configuration when none is present.
    pub fn ensure(&mut self, controls: &Controls) -> &mut OrchestratorConfig {
        self.config
            .get_or_insert_with(|| OrchestratorConfig::with_defaults(controls))
    }

    /// Replaces all local state with a configuration from the server.
    pub fn replace(&mut self, config: OrchestratorConfig) {
        debug!(orch_id = %config.orch_id, workers = config.workers.len(), "configuration replaced");
        self.config = Some(config);
    }

    /// Fetches the stored configuration for `orch_id` without adopting it.
    pub async fn fetch(api: &ApiClient, orch_id: &str) -> Result<OrchestratorConfig> {
        api.config(orch_id).await.map_err(|err| match err {
            DashError::Api(message) => DashError::ConfigLoad(message),
            other => other,
        })
    }

    /// Fetches the stored configuration for `orch_id` and adopts it.
    pub async fn load(&mut self, api: &ApiClient, orch_id: &str) -> Result<&OrchestratorConfig> {
        let config = Self::fetch(api, orch_id).await?;
        debug!(orch_id = %config.orch_id, workers = config.workers.len(), "configuration loaded");
        Ok(self.config.insert(config))
    }

    /// Normalizes and persists the configuration. Failures are reported on
    /// the status line unless `silent`.
    pub async fn save(
        &mut self,
        api: &ApiClient,
        controls: &Controls,
        status: &mut StatusLine,
        silent: bool,
    ) -> bool {
        let config = self.ensure(controls);
        config.normalize(controls);
        let payload = config.clone();

        match api.save_config(&payload.orch_id, &payload).await {
            Ok(receipt) => {
                info!(orch_id = %payload.orch_id, path = %receipt.path, "configuration saved");
                if !silent {
                    status.set(format!(
                        "saved: {} | roles: {}",
                        receipt.path,
                        payload.enabled_roles()
                    ));
                }
                true
            }
            Err(err) => {
                warn!(orch_id = %payload.orch_id, error = %err, "configuration save failed");
                if !silent {
                    status.set(format!("save failed: {err}"));
                }
                false
            }
        }
    }

    /// Appends a generated worker; no-op at the cap.
    pub fn add_worker(&mut self, controls: &Controls, engine: Engine) -> bool {
        let orch_id = controls.orch_id();
        let config = self.ensure(controls);
        if config.workers.len() >= MAX_WORKERS {
            return false;
        }
        let index = config.workers.len();
        config
            .workers
            .push(WorkerConfigEntry::generate(index, engine, &orch_id));
        true
    }

    /// Removes the worker at `index`; no-op when out of range.
    pub fn remove_worker(&mut self, index: usize) -> bool {
        match self.config.as_mut() {
            Some(config) if index < config.workers.len() => {
                config.workers.remove(index);
                true
            }
            _ => false,
        }
    }

    /// Removes the last worker; no-op on an empty list.
    pub fn pop_worker(&mut self) -> bool {
        self.config
            .as_mut()
            .and_then(|config| config.workers.pop())
            .is_some()
    }

    /// Regenerates the whole pool with `n` workers clamped to `1..=10`.
    /// Position 1 runs claude-cli, every other position codex.
    pub fn auto_populate(&mut self, controls: &Controls, n: i64) {
        let count = n.clamp(1, MAX_WORKERS as i64) as usize;
        let orch_id = controls.orch_id();
        let config = self.ensure(controls);
        config.workers = (0..count)
            .map(|i| {
                let engine = if i == 1 { Engine::ClaudeCli } else { Engine::Codex };
                WorkerConfigEntry::generate(i, engine, &orch_id)
            })
            .collect();
    }

    /// Grows with codex workers or shrinks from the end to reach `n`
    /// (clamped to `1..=10`), keeping the entries that remain.
    pub fn apply_worker_count(&mut self, controls: &Controls, n: i64) {
        let count = n.clamp(1, MAX_WORKERS as i64) as usize;
        let orch_id = controls.orch_id();
        let config = self.ensure(controls);
        while config.workers.len() < count {
            let index = config.workers.len();
            config
                .workers
                .push(WorkerConfigEntry::generate(index, Engine::Codex, &orch_id));
        }
        config.workers.truncate(count);
    }

    pub fn set_all_enabled(&mut self, controls: &Controls, enabled: bool) {
        for worker in self.ensure(controls).workers.iter_mut() {
            worker.enabled = enabled;
        }
    }

    /// Rewrites every task id to `{orch}-T{position}`.
    pub fn renumber_task_ids(&mut self, controls: &Controls) {
        let orch_id = controls.orch_id();
        if let Some(config) = self.config.as_mut() {
            for (i, worker) in config.workers.iter_mut().enumerate() {
                worker.task_id = format!("{orch_id}-T{}", i + 1);
            }
        }
    }

    /// Applies one field edit in place. `None` when `index` does not exist.
    pub fn apply_edit(&mut self, index: usize, edit: WorkerEdit) -> Option<EditEffect> {
        let worker = self.config.as_mut()?.workers.get_mut(index)?;
        let effect = match edit {
            WorkerEdit::TaskId(v) => {
                worker.task_id = v;
                EditEffect::Batched
            }
            WorkerEdit::Owner(v) => {
                worker.owner = v;
                EditEffect::Batched
            }
            WorkerEdit::Role(v) => {
                worker.role = v;
                EditEffect::Batched
            }
            WorkerEdit::Engine(v) => {
                worker.engine = v;
                EditEffect::Batched
            }
            WorkerEdit::Repo(v) => {
                worker.repo = v;
                EditEffect::Batched
            }
            WorkerEdit::PromptFile(v) => {
                worker.prompt_file = v;
                EditEffect::Batched
            }
            WorkerEdit::Enabled(v) => {
                worker.enabled = v;
                EditEffect::SaveSilently
            }
        };
        Some(effect)
    }

    /// `workers: 3/10 | global_prompt: ON`
    pub fn summary(&self) -> String {
        let (count, prompt_on) = match &self.config {
            Some(config) => (
                config.workers.len(),
                config
                    .defaults
                    .global_prompt
                    .as_deref()
                    .is_some_and(|p| !p.trim().is_empty()),
            ),
            None => (0, false),
        };
        format!(
            "workers: {count}/{MAX_WORKERS} | global_prompt: {}",
            if prompt_on { "ON" } else { "OFF" }
        )
    }
}
