//! `sk-client` — typed Super-Kanban HTTP client.
//!
//! Provides the [`SuperKanbanApi`] trait that the exporter, reconciler,
//! and session controller program against, and the production
//! [`SuperKanbanClient`] implementation backed by `reqwest` with split
//! read/write auth scopes and per-request timeout budgets.

mod auth;
mod rest;
mod types;

pub mod api;

pub use api::SuperKanbanApi;
pub use auth::{normalize_base_url, AuthScope, AuthScopes};
pub use rest::SuperKanbanClient;
pub use types::*;
