use serde::Serialize;
use shared::{domain::DocumentPath, protocol::Snapshot};

pub mod alerts;
pub mod selection;
pub mod settings;
pub mod subscriptions;
pub mod views;

pub use alerts::{AlertMonitor, AlertSink, AlertTracker};
pub use selection::ConsoleState;
pub use settings::{load_or_init_settings, save_settings};
pub use subscriptions::SubscriptionManager;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConsoleEvent {
    Snapshot {
        path: DocumentPath,
        snapshot: Snapshot,
    },
    /// A read for a watched path failed; the listener stays attached.
    SubscriptionError {
        path: DocumentPath,
        message: String,
    },
}
