//! Connection state engine
//!
//! Classification, per-connection state machines, reconciliation of the two
//! backend collections, lifecycle commands, bandwidth sampling and the
//! polling scheduler that drives it all.

pub mod auth;
pub mod bandwidth;
pub mod classifier;
pub mod commands;
pub mod fsm;
pub mod latency;
pub mod reconciler;
pub mod scheduler;

// Public re-exports
pub use classifier::StatusClassifier;
pub use commands::CleanupReport;
pub use fsm::{actions_for, AllowedActions, ConnectionFsm, FsmEvent};
pub use reconciler::ConnectionReconciler;
pub use scheduler::{PollScheduler, VpnCommand, VpnEvent, VpnHandle};
