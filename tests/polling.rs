//! Poll scheduler driving state updates under paused time.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use orch_dash::api::{RunListing, RunStatus};
use orch_dash::monitor::{CycleInputs, CycleReport, PollScheduler, RefreshSource};
use orch_dash::state::{AppState, Controls, RunsRefresh};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Duration};

/// Serves one run whose single worker reports a rising CPU reading.
#[derive(Default)]
struct FakeBackend {
    seen: Arc<Mutex<Vec<CycleInputs>>>,
}

#[async_trait]
impl RefreshSource for FakeBackend {
    async fn refresh(&self, inputs: CycleInputs) -> CycleReport {
        let cycle = {
            let mut seen = self.seen.lock().unwrap();
            seen.push(inputs);
            seen.len()
        };
        let listing: RunListing =
            serde_json::from_value(json!({ "runs": [{ "name": "run-1", "orch_id": "DEMO" }], "latest": "run-1" }))
                .unwrap();
        let status: RunStatus = serde_json::from_value(json!({
            "workers": [{ "task_id": "DEMO-T1", "state": "RUNNING",
                          "metrics": { "cpu_percent": cycle * 10, "rss_mb": 64 } }]
        }))
        .unwrap();
        CycleReport {
            runs: Some(Ok(RunsRefresh {
                listing,
                adopted_filter: None,
            })),
            status: Some(("run-1".to_string(), Ok(status))),
            ..CycleReport::default()
        }
    }
}

fn setup() -> (
    AppState,
    PollScheduler<FakeBackend>,
    watch::Sender<CycleInputs>,
    mpsc::UnboundedReceiver<CycleReport>,
    Arc<Mutex<Vec<CycleInputs>>>,
) {
    let state = AppState::new(Controls {
        orch: "DEMO".into(),
        ..Controls::default()
    });
    let backend = FakeBackend::default();
    let seen = Arc::clone(&backend.seen);
    let (inputs_tx, inputs_rx) = watch::channel(state.cycle_inputs());
    let (tx, rx) = mpsc::unbounded_channel();
    let scheduler = PollScheduler::new(backend, inputs_rx, tx);
    (state, scheduler, inputs_tx, rx, seen)
}

#[tokio::test(start_paused = true)]
async fn disabling_after_one_cycle_freezes_the_state() {
    let (mut state, mut scheduler, _inputs, mut rx, _seen) = setup();

    scheduler.set_interval(3, true);
    let report = rx.recv().await.unwrap();
    state.apply_cycle(report);
    scheduler.set_interval(3, false);

    time::sleep(Duration::from_secs(10)).await;
    while let Ok(report) = rx.try_recv() {
        state.apply_cycle(report);
    }

    assert_eq!(state.cycles_applied, 1);
    assert_eq!(state.runs.selected(), Some("run-1"));
    assert_eq!(state.history.get("DEMO-T1").len(), 1);
    assert!(state.status_line.is_empty());
}

#[tokio::test(start_paused = true)]
async fn later_cycles_see_published_inputs_and_extend_history() {
    let (mut state, mut scheduler, inputs, mut rx, seen) = setup();

    scheduler.set_interval(3, true);
    for _ in 0..3 {
        let report = rx.recv().await.unwrap();
        state.apply_cycle(report);
        inputs.send_replace(state.cycle_inputs());
    }
    scheduler.set_interval(3, false);

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen[0].selected_run, None);
    assert_eq!(seen[1].selected_run.as_deref(), Some("run-1"));
    assert_eq!(seen[2].orch_filter, "DEMO");

    let history = state.history.get("DEMO-T1");
    assert_eq!(history.cpu.iter().copied().collect::<Vec<_>>(), vec![10.0, 20.0, 30.0]);
    assert_eq!(state.cycles_applied, 3);
}
