//! High-severity alerting, decoupled from rendering.
//!
//! [`AlertTracker`] is the pure decision; [`AlertMonitor`] wires it to the
//! console event stream and an [`AlertSink`].

use std::{collections::HashSet, sync::Arc};

use shared::domain::{Incident, IncidentId};
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::ConsoleEvent;

/// Receives one call per incidents snapshot that produced new alerts.
pub trait AlertSink: Send + Sync {
    fn alert(&self, incidents: &[Incident]);
}

pub fn should_alert(incident: &Incident, seen: &HashSet<IncidentId>) -> bool {
    incident.priority.is_high_severity() && !seen.contains(&incident.id)
}

#[derive(Debug, Default)]
pub struct AlertTracker {
    seen: HashSet<IncidentId>,
    baseline_taken: bool,
}

impl AlertTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the incidents that warrant an alert in this snapshot.
    ///
    /// An empty snapshot never settles the initial load. If the first
    /// non-empty snapshot arrives while audio alerts are off, everything in it
    /// is marked seen silently; with audio on it alerts like any other.
    /// Lower-severity and muted incidents are not marked seen afterwards, so a
    /// later escalation or unmute still alerts once.
    pub fn observe(&mut self, incidents: &[Incident], audio_enabled: bool) -> Vec<Incident> {
        if incidents.is_empty() {
            return Vec::new();
        }
        let initial_load = !self.baseline_taken;
        self.baseline_taken = true;
        if !audio_enabled {
            if initial_load {
                self.seen
                    .extend(incidents.iter().map(|incident| incident.id.clone()));
            }
            return Vec::new();
        }

        let fresh: Vec<Incident> = incidents
            .iter()
            .filter(|incident| should_alert(incident, &self.seen))
            .cloned()
            .collect();
        self.seen
            .extend(fresh.iter().map(|incident| incident.id.clone()));
        fresh
    }

    pub fn has_seen(&self, id: &IncidentId) -> bool {
        self.seen.contains(id)
    }
}

pub struct AlertMonitor {
    task: JoinHandle<()>,
}

impl AlertMonitor {
    /// Consumes incidents and settings snapshots from `events`. Settings
    /// snapshots update the audio toggle; `audio_enabled` applies until one
    /// arrives.
    pub fn spawn(
        events: broadcast::Receiver<ConsoleEvent>,
        sink: Arc<dyn AlertSink>,
        audio_enabled: bool,
    ) -> Self {
        let task = tokio::spawn(run_monitor(events, sink, audio_enabled));
        Self { task }
    }

    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for AlertMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_monitor(
    mut events: broadcast::Receiver<ConsoleEvent>,
    sink: Arc<dyn AlertSink>,
    mut audio_enabled: bool,
) {
    let mut tracker = AlertTracker::new();
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "alert monitor lagged behind console events");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        let ConsoleEvent::Snapshot { snapshot, .. } = event else {
            continue;
        };
        if let Some(incidents) = snapshot.incidents() {
            let fresh = tracker.observe(incidents, audio_enabled);
            if !fresh.is_empty() {
                info!(count = fresh.len(), "high-severity incidents arrived");
                sink.alert(&fresh);
            }
        } else if let Some(settings) = snapshot.settings() {
            if settings.audio_alerts != audio_enabled {
                debug!(audio_alerts = settings.audio_alerts, "audio alert toggle changed");
            }
            audio_enabled = settings.audio_alerts;
        }
    }
    debug!("alert monitor stopped");
}

#[cfg(test)]
#[path = "tests/alerts_tests.rs"]
mod tests;
