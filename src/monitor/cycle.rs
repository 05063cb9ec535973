//! One refresh cycle against the status API.

use async_trait::async_trait;
use tracing::debug;

use crate::api::{ApiClient, PmStatus, RunStatus, ToolStatus};
use crate::error::Result;
use crate::state::config::{ConfigModel, OrchestratorConfig};
use crate::state::runs::{resolve_selection, RunRegistry, RunsRefresh};

/// State snapshot taken when a cycle starts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleInputs {
    /// Trimmed, upper-cased orchestrator filter; may be empty.
    pub orch_filter: String,
    /// Orchestrator id used when a configuration has to be fetched.
    pub config_orch: String,
    pub selected_run: Option<String>,
    pub config_loaded: bool,
}

/// Everything one cycle fetched. `None` means the step did not run.
#[derive(Debug, Default)]
pub struct CycleReport {
    pub tools: Option<Result<ToolStatus>>,
    pub pm: Option<Result<PmStatus>>,
    pub runs: Option<Result<RunsRefresh>>,
    pub config: Option<Result<OrchestratorConfig>>,
    /// Status together with the run it was fetched for.
    pub status: Option<(String, Result<RunStatus>)>,
}

/// Produces cycle reports. The live implementation is [`Refresher`].
#[async_trait]
pub trait RefreshSource: Send + Sync + 'static {
    async fn refresh(&self, inputs: CycleInputs) -> CycleReport;
}

/// Runs the cycle steps in order against the HTTP API.
#[derive(Debug, Clone)]
pub struct Refresher {
    api: ApiClient,
}

impl Refresher {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl RefreshSource for Refresher {
    async fn refresh(&self, inputs: CycleInputs) -> CycleReport {
        let tools = self.api.tools().await;
        let pm = self.api.pm().await;
        let runs = RunRegistry::fetch(&self.api, &inputs.orch_filter).await;

        // A failed listing keeps the previous pick so the status still loads.
        let (run, orch) = match &runs {
            Ok(refresh) => (
                resolve_selection(inputs.selected_run.as_deref(), &refresh.listing),
                refresh
                    .adopted_filter
                    .clone()
                    .unwrap_or_else(|| inputs.config_orch.clone()),
            ),
            Err(_) => (inputs.selected_run.clone(), inputs.config_orch.clone()),
        };

        let config = if inputs.config_loaded {
            None
        } else {
            Some(ConfigModel::fetch(&self.api, &orch).await)
        };

        let status = match run {
            Some(run) => {
                let status = self.api.run_status(&run).await;
                Some((run, status))
            }
            None => None,
        };

        debug!(
            tools = tools.is_ok(),
            pm = pm.is_ok(),
            runs = runs.is_ok(),
            "refresh cycle finished"
        );
        CycleReport {
            tools: Some(tools),
            pm: Some(pm),
            runs: Some(runs),
            config,
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DashError;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount(server: &MockServer, route: &str, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn failing_step_does_not_stop_the_cycle() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tools"))
            .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
            .mount(&server)
            .await;
        mount(&server, "/api/pm", json!({"ok": true, "pm_name": "Lead"})).await;
        mount(
            &server,
            "/api/runs",
            json!({"ok": true, "runs": [{"name": "r1", "orch_id": "DEMO"}], "latest": "r1"}),
        )
        .await;
        mount(&server, "/api/config/DEMO", json!({"ok": true, "config": {"orch_id": "DEMO"}})).await;
        mount(&server, "/api/run/r1/status", json!({"ok": true, "workers": []})).await;

        let refresher = Refresher::new(ApiClient::new(&server.uri()).unwrap());
        let report = refresher
            .refresh(CycleInputs {
                orch_filter: "DEMO".into(),
                config_orch: "DEMO".into(),
                selected_run: None,
                config_loaded: false,
            })
            .await;

        assert!(matches!(report.tools, Some(Err(DashError::Network(_)))));
        assert_eq!(report.pm.unwrap().unwrap().pm_name, "Lead");
        assert_eq!(report.config.unwrap().unwrap().orch_id, "DEMO");
        let (run, status) = report.status.unwrap();
        assert_eq!(run, "r1");
        assert!(status.is_ok());
    }

    #[tokio::test]
    async fn loaded_config_is_not_refetched() {
        let server = MockServer::start().await;
        mount(&server, "/api/tools", json!({"codex": true})).await;
        mount(&server, "/api/pm", json!({"ok": true})).await;
        mount(&server, "/api/runs", json!({"ok": true, "runs": []})).await;

        let refresher = Refresher::new(ApiClient::new(&server.uri()).unwrap());
        let report = refresher
            .refresh(CycleInputs {
                config_loaded: true,
                ..CycleInputs::default()
            })
            .await;

        assert!(report.config.is_none());
        assert!(report.status.is_none());
        let requests = server.received_requests().await.unwrap();
        assert!(requests.iter().all(|r| !r.url.path().starts_with("/api/config")));
    }
}
