//! Wire types for the orchestrator status API.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::lenient;

/// Availability of the two external tool integrations.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ToolStatus {
    #[serde(default)]
    pub codex: bool,
    #[serde(default)]
    pub claude: bool,
    #[serde(default, deserialize_with = "lenient::string")]
    pub claude_cmd: String,
}

/// One CPU/memory reading for a process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct MetricSample {
    #[serde(default, deserialize_with = "lenient::number")]
    pub cpu_percent: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub rss_mb: f64,
}

/// Snapshot of the PM/orchestrator role.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PmStatus {
    #[serde(default, deserialize_with = "lenient::string")]
    pub pm_name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub last_update: String,
    #[serde(default, rename = "progress", deserialize_with = "lenient::number")]
    pub progress_percent: f64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub progress_source: String,
    #[serde(default, rename = "orch", alias = "orch_id", deserialize_with = "lenient::string")]
    pub orch_id: String,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub pid: Option<u64>,
    #[serde(default, deserialize_with = "lenient::opt_object")]
    pub metrics: Option<MetricSample>,
}

/// One entry of the run selector.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RunSummary {
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, rename = "running", deserialize_with = "lenient::count")]
    pub running_count: u64,
    #[serde(default, rename = "total", deserialize_with = "lenient::count")]
    pub total_count: u64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub orch_id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub mtime: String,
}

impl RunSummary {
    /// Selector label, `name (running/total)`.
    pub fn label(&self) -> String {
        format!("{} ({}/{})", self.name, self.running_count, self.total_count)
    }
}

/// Result of `/api/runs`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RunListing {
    #[serde(default, deserialize_with = "lenient::seq_or_empty")]
    pub runs: Vec<RunSummary>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub latest: String,
}

impl RunListing {
    pub fn latest(&self) -> Option<&str> {
        Some(self.latest.as_str()).filter(|name| !name.is_empty())
    }
}

/// Worker lifecycle state as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerState {
    Running,
    Done,
    Exited,
    Blocked,
    Other(String),
}

impl Default for WorkerState {
    fn default() -> Self {
        WorkerState::Other(String::new())
    }
}

impl From<String> for WorkerState {
    fn from(raw: String) -> Self {
        let upper = raw.trim().to_uppercase();
        match upper.as_str() {
            "RUNNING" => WorkerState::Running,
            "DONE" => WorkerState::Done,
            "EXITED" => WorkerState::Exited,
            "BLOCKED" => WorkerState::Blocked,
            _ => WorkerState::Other(upper),
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Running => write!(f, "RUNNING"),
            WorkerState::Done => write!(f, "DONE"),
            WorkerState::Exited => write!(f, "EXITED"),
            WorkerState::Blocked => write!(f, "BLOCKED"),
            WorkerState::Other(raw) => write!(f, "{raw}"),
        }
    }
}

fn worker_state<'de, D>(deserializer: D) -> Result<WorkerState, D::Error>
where
    D: serde::Deserializer<'de>,
{
    lenient::string(deserializer).map(WorkerState::from)
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TokenUsage {
    #[serde(default, deserialize_with = "lenient::opt_number")]
    pub total: Option<f64>,
}

/// A polled worker row.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WorkerStatus {
    #[serde(default, deserialize_with = "lenient::string")]
    pub task_id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub owner: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub role: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub engine: String,
    #[serde(default, deserialize_with = "lenient::opt_u64")]
    pub pid: Option<u64>,
    #[serde(default, deserialize_with = "worker_state")]
    pub state: WorkerState,
    #[serde(default, deserialize_with = "lenient::number")]
    pub progress: f64,
    #[serde(default, deserialize_with = "lenient::string")]
    pub activity: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub state_hint: String,
    #[serde(default, deserialize_with = "lenient::count")]
    pub docs_count: u64,
    #[serde(default, deserialize_with = "lenient::opt_object")]
    pub metrics: Option<MetricSample>,
    #[serde(default, deserialize_with = "lenient::opt_object")]
    pub tokens: Option<TokenUsage>,
}

/// A manually driven lane listed in the run manifest.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ManualEntry {
    #[serde(default, deserialize_with = "lenient::string")]
    pub task_id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub owner: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub role: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub engine: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub repo: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub goal: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RoleSummary {
    #[serde(default, deserialize_with = "lenient::string")]
    pub role: String,
    #[serde(default, deserialize_with = "lenient::number")]
    pub progress: f64,
    #[serde(default, deserialize_with = "lenient::count")]
    pub workers: u64,
}

/// Run-wide totals.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RunTotals {
    #[serde(default, deserialize_with = "lenient::count")]
    pub running: u64,
    #[serde(default, deserialize_with = "lenient::count")]
    pub total: u64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub avg_cpu: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub mem_mb: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub tokens_total: f64,
}

/// Result of `/api/run/{run}/status`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RunStatus {
    #[serde(default, deserialize_with = "lenient::string")]
    pub orch_id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub model: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub reasoning_effort: String,
    #[serde(default, deserialize_with = "lenient::seq_or_empty")]
    pub workers: Vec<WorkerStatus>,
    #[serde(default, deserialize_with = "lenient::seq_or_empty")]
    pub manual: Vec<ManualEntry>,
    #[serde(default, deserialize_with = "lenient::seq_or_empty")]
    pub role_summary: Vec<RoleSummary>,
    #[serde(default, deserialize_with = "lenient::object_or_default")]
    pub summary: RunTotals,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LogTail {
    #[serde(default, deserialize_with = "lenient::string")]
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DocumentMeta {
    #[serde(default, deserialize_with = "lenient::string")]
    pub kind: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub label: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub path: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub size: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub mtime: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TaskDocuments {
    #[serde(default, deserialize_with = "lenient::string")]
    pub task_id: String,
    #[serde(default, deserialize_with = "lenient::seq_or_empty")]
    pub documents: Vec<DocumentMeta>,
}

/// Result of `/api/run/{run}/documents`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DocumentListing {
    #[serde(default, deserialize_with = "lenient::seq_or_empty")]
    pub tasks: Vec<TaskDocuments>,
}

/// Result of `/api/read`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FileText {
    #[serde(default, deserialize_with = "lenient::string")]
    pub path: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub text: String,
}

/// Acknowledgement of a save request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SaveReceipt {
    #[serde(default, deserialize_with = "lenient::string")]
    pub path: String,
}

/// Outcome of a start/stop script invocation on the server.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CommandOutput {
    #[serde(default)]
    pub ok: bool,
    #[serde(default, deserialize_with = "lenient::opt_number")]
    pub code: Option<f64>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub stdout: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub stderr: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub error: String,
}

impl CommandOutput {
    /// Text shown on the status line: stdout, then stderr on its own line.
    pub fn transcript(&self) -> String {
        let mut out = self.stdout.trim_end().to_string();
        if !self.stderr.trim().is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(self.stderr.trim_end());
        }
        if out.trim().is_empty() && !self.error.is_empty() {
            out = self.error.clone();
        }
        out
    }
}

/// Body of `POST /api/start`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StartRequest {
    pub orch_id: String,
    pub model: String,
    pub reasoning_effort: String,
    pub pm_request: String,
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn worker_state_is_case_insensitive() {
        assert_eq!(WorkerState::from("running".to_string()), WorkerState::Running);
        assert_eq!(WorkerState::from(" Blocked ".to_string()), WorkerState::Blocked);
        assert_eq!(
            WorkerState::from("failed".to_string()),
            WorkerState::Other("FAILED".to_string())
        );
    }

    #[test]
    fn run_status_tolerates_sparse_rows() {
        let raw = json!({
            "ok": true,
            "workers": [
                {"task_id": "AGENT-T1", "state": "RUNNING", "pid": 12,
                 "metrics": {"cpu_percent": "3.5", "rss_mb": null}},
                {"task_id": "AGENT-T2"}
            ],
            "summary": null
        });
        let status: RunStatus = serde_json::from_value(raw).unwrap();
        assert_eq!(status.workers.len(), 2);
        assert_eq!(status.workers[0].state, WorkerState::Running);
        assert_eq!(
            status.workers[0].metrics,
            Some(MetricSample { cpu_percent: 3.5, rss_mb: 0.0 })
        );
        assert_eq!(status.workers[1].metrics, None);
        assert_eq!(status.summary, RunTotals::default());
    }

    #[test]
    fn command_transcript_joins_streams() {
        let out = CommandOutput {
            stdout: "started".into(),
            stderr: "warn: slow".into(),
            ..Default::default()
        };
        assert_eq!(out.transcript(), "started\nwarn: slow");
    }
}
