//! Save-then-load against a backend that stores what it is given.

use std::sync::{Arc, Mutex};

use orch_dash::api::ApiClient;
use orch_dash::error::DashError;
use orch_dash::state::{ConfigModel, Controls, Engine, StatusLine, WorkerEdit};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

#[derive(Clone, Default)]
struct Store(Arc<Mutex<Option<Value>>>);

struct SaveConfig(Store);

impl Respond for SaveConfig {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap();
        let orch = body["orch_id"].as_str().unwrap_or_default().to_string();
        *self.0 .0.lock().unwrap() = Some(body["config"].clone());
        ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "path": format!("cfg/{orch}.json") }))
    }
}

struct LoadConfig(Store);

impl Respond for LoadConfig {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        match self.0 .0.lock().unwrap().clone() {
            Some(config) => ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "config": config })),
            None => ResponseTemplate::new(200).set_body_json(json!({ "ok": false, "error": "no config" })),
        }
    }
}

async fn backend() -> (MockServer, Store) {
    let server = MockServer::start().await;
    let store = Store::default();
    Mock::given(method("POST"))
        .and(path("/api/config/save"))
        .respond_with(SaveConfig(store.clone()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/config/DEMO"))
        .respond_with(LoadConfig(store.clone()))
        .mount(&server)
        .await;
    (server, store)
}

fn controls() -> Controls {
    Controls {
        orch: "demo".into(),
        global_prompt: "finish the relay".into(),
        workspace: "/srv/work".into(),
        ..Controls::default()
    }
}

#[tokio::test]
async fn saved_configuration_loads_back_unchanged() {
    let (server, _store) = backend().await;
    let api = ApiClient::new(&server.uri()).unwrap();
    let controls = controls();

    let mut local = ConfigModel::new();
    local.auto_populate(&controls, 3);
    local.add_worker(&controls, Engine::Manual);
    local.apply_edit(2, WorkerEdit::Enabled(false));
    local.apply_edit(0, WorkerEdit::Owner("Codex-Lead".into()));
    local
        .ensure(&controls)
        .extra
        .insert("schema".into(), json!({ "version": 2 }));

    let mut status = StatusLine::default();
    assert!(local.save(&api, &controls, &mut status, false).await);
    assert_eq!(status.text(), "saved: cfg/DEMO.json | roles: Worker:2, UI-Relay:1");

    let mut remote = ConfigModel::new();
    let loaded = remote.load(&api, "DEMO").await.unwrap().clone();
    assert_eq!(Some(&loaded), local.config());
    assert_eq!(loaded.extra["schema"], json!({ "version": 2 }));
    assert_eq!(
        loaded.defaults.pm_last_selected,
        Some(vec!["DEMO-T1".to_string(), "DEMO-T2".to_string(), "DEMO-T4".to_string()])
    );
}

#[tokio::test]
async fn missing_configuration_is_a_load_error() {
    let (server, _store) = backend().await;
    let api = ApiClient::new(&server.uri()).unwrap();

    let mut model = ConfigModel::new();
    let err = model.load(&api, "DEMO").await.unwrap_err();
    assert!(matches!(err, DashError::ConfigLoad(ref m) if m == "no config"));
    assert!(!model.is_loaded());
}

#[tokio::test]
async fn partial_server_configuration_is_filled_with_empty_defaults() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/config/DEMO"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "config": { "orch_id": "DEMO", "workers": null } })),
        )
        .mount(&server)
        .await;
    let api = ApiClient::new(&server.uri()).unwrap();

    let mut model = ConfigModel::new();
    let config = model.load(&api, "DEMO").await.unwrap();
    assert!(config.workers.is_empty());
    assert_eq!(config.defaults.model, None);
}
