//! `sk-controller` — the SK-sync session controller.
//!
//! Exposes the agent-callable spawn tool (entity upsert + task lock +
//! reuse-or-spawn) and the lifecycle hooks that reconcile terminal
//! session state, task status, and the wake-parent-on-end notification.

mod controller;
mod outcome;
mod tools;
mod tracker;
mod traits;

pub use controller::{SkSyncController, SpawnLevel, SpawnRequest, SpawnResponse, SubagentEvent};
pub use outcome::map_outcome;
pub use tracker::{RunEntry, RunTracker};
pub use traits::{
    GatewayRpc, SessionsApi, SpawnSessionRequest, SpawnSessionResult, WakeDeliver, WakeRequest,
};
