//! Run selector state.

use tracing::{debug, info};

use crate::api::{ApiClient, RunListing, RunSummary};
use crate::error::Result;

/// Outcome of one listing request, before it is applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunsRefresh {
    pub listing: RunListing,
    /// Orchestrator id taken over from the unfiltered fallback listing.
    pub adopted_filter: Option<String>,
}

/// Known runs and the operator's current pick.
#[derive(Debug, Default)]
pub struct RunRegistry {
    runs: Vec<RunSummary>,
    selected: Option<String>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lists runs for `orch_filter`. When a non-empty filter matches nothing,
    /// the unfiltered listing is used instead and the first run's
    /// orchestrator id is reported for adoption.
    pub async fn fetch(api: &ApiClient, orch_filter: &str) -> Result<RunsRefresh> {
        let filter = orch_filter.trim().to_uppercase();
        let listing = api.runs(Some(&filter)).await?;
        if !listing.runs.is_empty() || filter.is_empty() {
            return Ok(RunsRefresh {
                listing,
                adopted_filter: None,
            });
        }

        let listing = api.runs(None).await?;
        let adopted_filter = listing
            .runs
            .first()
            .map(|run| run.orch_id.clone())
            .filter(|id| !id.is_empty());
        if let Some(adopted) = &adopted_filter {
            info!(from = %filter, to = %adopted, "no runs for orchestrator, adopting listed one");
        }
        Ok(RunsRefresh {
            listing,
            adopted_filter,
        })
    }

    /// Fetches and applies in one go. Returns the adopted filter, if any.
    pub async fn refresh(&mut self, api: &ApiClient, orch_filter: &str) -> Result<Option<String>> {
        let refresh = Self::fetch(api, orch_filter).await?;
        self.apply(refresh.listing);
        Ok(refresh.adopted_filter)
    }

    /// Replaces the listing and re-resolves the selection.
    pub fn apply(&mut self, listing: RunListing) {
        self.selected = resolve_selection(self.selected.as_deref(), &listing);
        debug!(runs = listing.runs.len(), selected = ?self.selected, "run listing applied");
        self.runs = listing.runs;
    }

    pub fn runs(&self) -> &[RunSummary] {
        &self.runs
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn selected_summary(&self) -> Option<&RunSummary> {
        let name = self.selected.as_deref()?;
        self.runs.iter().find(|run| run.name == name)
    }

    /// Selects `name` if it is listed.
    pub fn select(&mut self, name: &str) -> bool {
        if self.runs.iter().any(|run| run.name == name) {
            self.selected = Some(name.to_string());
            true
        } else {
            false
        }
    }

    pub fn select_next(&mut self) {
        self.step(1);
    }

    pub fn select_prev(&mut self) {
        self.step(-1);
    }

    fn step(&mut self, delta: isize) {
        if self.runs.is_empty() {
            self.selected = None;
            return;
        }
        let len = self.runs.len() as isize;
        let next = match self.selected_position() {
            Some(pos) => (pos as isize + delta).rem_euclid(len),
            None if delta < 0 => len - 1,
            None => 0,
        };
        self.selected = Some(self.runs[next as usize].name.clone());
    }

    fn selected_position(&self) -> Option<usize> {
        let name = self.selected.as_deref()?;
        self.runs.iter().position(|run| run.name == name)
    }
}

/// Keeps `previous` if still listed, else the server's latest, else nothing.
pub fn resolve_selection(previous: Option<&str>, listing: &RunListing) -> Option<String> {
    let listed = |name: &str| listing.runs.iter().any(|run| run.name == name);
    match previous {
        Some(prev) if listed(prev) => Some(prev.to_string()),
        _ => listing.latest().map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn run(name: &str, orch: &str) -> RunSummary {
        RunSummary {
            name: name.to_string(),
            orch_id: orch.to_string(),
            ..RunSummary::default()
        }
    }

    fn listing(names: &[&str], latest: &str) -> RunListing {
        RunListing {
            runs: names.iter().map(|n| run(n, "A")).collect(),
            latest: latest.to_string(),
        }
    }

    #[test]
    fn selection_prefers_previous_then_latest() {
        let l = listing(&["r1", "r2"], "r2");
        assert_eq!(resolve_selection(Some("r1"), &l), Some("r1".to_string()));
        assert_eq!(resolve_selection(Some("gone"), &l), Some("r2".to_string()));
        assert_eq!(resolve_selection(None, &l), Some("r2".to_string()));
        assert_eq!(resolve_selection(Some("gone"), &listing(&["r1"], "")), None);
    }

    #[test]
    fn stepping_wraps() {
        let mut registry = RunRegistry::new();
        registry.apply(listing(&["a", "b", "c"], ""));
        assert_eq!(registry.selected(), None);
        registry.select_prev();
        assert_eq!(registry.selected(), Some("c"));
        registry.select_next();
        assert_eq!(registry.selected(), Some("a"));
        assert!(!registry.select("zzz"));
        assert!(registry.select("b"));
        assert_eq!(registry.selected_summary().map(|r| r.name.as_str()), Some("b"));
    }

    #[tokio::test]
    async fn empty_filtered_listing_falls_back_and_adopts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/runs"))
            .and(query_param("orch", "STALE"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true, "runs": []})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/runs"))
            .and(query_param_is_missing("orch"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "runs": [
                    {"name": "run-9", "orch_id": "REAL", "running": 1, "total": 3},
                    {"name": "run-8", "orch_id": "OTHER", "running": 0, "total": 2}
                ],
                "latest": "run-9"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = ApiClient::new(&server.uri()).unwrap();
        let mut registry = RunRegistry::new();
        let adopted = registry.refresh(&api, "stale").await.unwrap();

        assert_eq!(adopted.as_deref(), Some("REAL"));
        assert_eq!(registry.runs().len(), 2);
        assert_eq!(registry.selected(), Some("run-9"));
        assert_eq!(registry.runs()[0].label(), "run-9 (1/3)");
    }
}
