//! Operator commands end to end against a mocked backend.

use std::sync::{Arc, Mutex};

use orch_dash::api::{ApiClient, RunListing};
use orch_dash::dashboard::{Command, Dashboard};
use orch_dash::error::Result;
use orch_dash::state::{AppState, Controls, Engine, WorkerEdit};
use orch_dash::ui::viewer::{ViewerHandle, ViewerPort};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Viewer that records what was opened.
#[derive(Clone, Default)]
struct RecordingViewer {
    opened: Arc<Mutex<Vec<(String, String)>>>,
}

impl ViewerPort for RecordingViewer {
    fn open(&mut self, title: &str, text: &str) -> Result<ViewerHandle> {
        let mut opened = self.opened.lock().unwrap();
        opened.push((title.to_string(), text.to_string()));
        Ok(ViewerHandle {
            id: opened.len() as u64,
            title: title.to_string(),
        })
    }
}

fn dashboard(server: &MockServer, viewer: RecordingViewer) -> Dashboard {
    let api = ApiClient::new(&server.uri()).unwrap();
    let controls = Controls {
        orch: "DEMO".into(),
        ..Controls::default()
    };
    Dashboard::new(api, AppState::new(controls), Box::new(viewer))
}

#[tokio::test]
async fn enabled_toggle_saves_once_and_silently() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/config/save"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "path": "cfg/DEMO.json" })))
        .expect(1)
        .mount(&server)
        .await;

    let mut dash = dashboard(&server, RecordingViewer::default());
    dash.execute(Command::AutoPopulate(3)).await;
    dash.execute(Command::EditWorker {
        index: 2,
        edit: WorkerEdit::Enabled(false),
    })
    .await;

    assert!(dash.state.status_line.is_empty());
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["orch_id"], "DEMO");
    assert_eq!(body["config"]["workers"][2]["enabled"], false);
    assert_eq!(body["config"]["workers"][0]["enabled"], true);
}

#[tokio::test]
async fn text_edits_wait_for_an_explicit_save() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/config/save"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "path": "cfg/DEMO.json" })))
        .expect(1)
        .mount(&server)
        .await;

    let mut dash = dashboard(&server, RecordingViewer::default());
    dash.execute(Command::AutoPopulate(2)).await;
    dash.execute(Command::EditWorker {
        index: 0,
        edit: WorkerEdit::Role("Reviewer".into()),
    })
    .await;
    assert!(server.received_requests().await.unwrap().is_empty());

    dash.execute(Command::SaveConfig).await;
    assert_eq!(
        dash.state.status_line.text(),
        "saved: cfg/DEMO.json | roles: Reviewer:1, UI-Relay:1"
    );
}

#[tokio::test]
async fn log_without_selected_run_issues_no_request() {
    let server = MockServer::start().await;
    let viewer = RecordingViewer::default();
    let mut dash = dashboard(&server, viewer.clone());

    dash.execute(Command::ViewLog("DEMO-T1".into())).await;
    dash.execute(Command::ViewDocs("DEMO-T1".into())).await;

    assert!(server.received_requests().await.unwrap().is_empty());
    assert!(viewer.opened.lock().unwrap().is_empty());
    assert!(dash.state.status_line.is_empty());
}

#[tokio::test]
async fn unreadable_path_opens_an_error_viewer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/read"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": false, "error": "outside workspace" })))
        .mount(&server)
        .await;

    let viewer = RecordingViewer::default();
    let mut dash = dashboard(&server, viewer.clone());
    dash.execute(Command::ViewPath("../etc/passwd".into())).await;

    let opened = viewer.opened.lock().unwrap();
    assert_eq!(
        *opened,
        vec![("read failed".to_string(), "outside workspace".to_string())]
    );
}

#[tokio::test]
async fn run_selection_loads_the_new_run_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/run/run-2/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "workers": [{ "task_id": "DEMO-T1", "state": "RUNNING", "metrics": { "cpu_percent": 5, "rss_mb": 80 } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut dash = dashboard(&server, RecordingViewer::default());
    let listing: RunListing = serde_json::from_value(json!({
        "runs": [{ "name": "run-1" }, { "name": "run-2" }],
        "latest": "run-1"
    }))
    .unwrap();
    dash.state.runs.apply(listing);

    dash.execute(Command::SelectNextRun).await;
    assert_eq!(dash.state.runs.selected(), Some("run-2"));
    let history = dash.state.history.get("DEMO-T1");
    assert_eq!(history.cpu.iter().copied().collect::<Vec<_>>(), vec![5.0]);
    assert_eq!(history.mem.iter().copied().collect::<Vec<_>>(), vec![80.0]);
}

#[tokio::test]
async fn saved_pm_name_is_replaced_by_the_server_value() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/pm/save"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/pm"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "pm_name": "LEAD" })))
        .mount(&server)
        .await;

    let mut dash = dashboard(&server, RecordingViewer::default());
    dash.execute(Command::SavePmName("lead".into())).await;

    assert_eq!(dash.state.controls.pm_name, "LEAD");
    assert_eq!(dash.state.status_line.text(), "pm saved: lead");
}

#[tokio::test]
async fn adding_past_the_worker_cap_is_a_silent_no_op() {
    let server = MockServer::start().await;
    let mut dash = dashboard(&server, RecordingViewer::default());
    dash.execute(Command::AutoPopulate(10)).await;

    dash.execute(Command::AddWorker(Engine::Codex)).await;

    assert_eq!(dash.state.config.workers().len(), 10);
    assert!(dash.state.status_line.is_empty());
    assert!(server.received_requests().await.unwrap().is_empty());
}
