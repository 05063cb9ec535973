//! orch-dash library
//!
//! Core components of the orchestrator dashboard: the API client, the
//! application state, the poll scheduler, operator commands and the
//! terminal UI.

pub mod api;
pub mod app;
pub mod dashboard;
pub mod error;
pub mod event;
pub mod monitor;
pub mod state;
pub mod ui;
