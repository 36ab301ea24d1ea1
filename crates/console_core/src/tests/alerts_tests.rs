use super::*;
use chrono::{TimeZone, Utc};
use shared::{
    domain::{
        DocumentPath, IncidentPriority, IncidentStatus, OperatorId, OperatorSettings, Subject,
    },
    protocol::Snapshot,
};
use std::{sync::Mutex, time::Duration};

fn incident(id: &str, priority: IncidentPriority) -> Incident {
    Incident {
        id: IncidentId::from(id),
        title: format!("Signal #{id}"),
        kind: "Structure Fire".into(),
        priority,
        status: IncidentStatus::Active,
        location: "Warehouse District, Dock 4".into(),
        sector: "Industrial Zone".into(),
        icon: "local_fire_department".into(),
        date: None,
        subject: Subject::default(),
        revision: 0,
        created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
    }
}

fn ids(incidents: &[Incident]) -> Vec<&str> {
    incidents.iter().map(|incident| incident.id.as_str()).collect()
}

#[test]
fn predicate_requires_high_severity_and_unseen() {
    let mut seen = HashSet::new();
    assert!(should_alert(&incident("a", IncidentPriority::High), &seen));
    assert!(should_alert(&incident("a", IncidentPriority::Critical), &seen));
    assert!(!should_alert(&incident("a", IncidentPriority::Medium), &seen));
    assert!(!should_alert(&incident("a", IncidentPriority::Low), &seen));

    seen.insert(IncidentId::from("a"));
    assert!(!should_alert(&incident("a", IncidentPriority::Critical), &seen));
}

#[test]
fn muted_first_load_is_a_silent_baseline() {
    let mut tracker = AlertTracker::new();
    let baseline = vec![incident("4092", IncidentPriority::Critical)];
    assert!(tracker.observe(&baseline, false).is_empty());
    assert!(tracker.has_seen(&IncidentId::from("4092")));

    assert!(tracker.observe(&baseline, true).is_empty());
}

#[test]
fn first_load_with_audio_on_alerts_for_critical_already_in_feed() {
    let mut tracker = AlertTracker::new();
    let snapshot = vec![
        incident("4092", IncidentPriority::Critical),
        incident("4091", IncidentPriority::Medium),
    ];
    assert_eq!(ids(&tracker.observe(&snapshot, true)), vec!["4092"]);
    assert!(tracker.observe(&snapshot, true).is_empty());
}

#[test]
fn empty_first_snapshot_does_not_settle_the_baseline() {
    let mut tracker = AlertTracker::new();
    assert!(tracker.observe(&[], false).is_empty());

    let snapshot = vec![incident("4093", IncidentPriority::High)];
    assert!(tracker.observe(&snapshot, false).is_empty());
    assert!(tracker.has_seen(&IncidentId::from("4093")));
}

#[test]
fn new_high_severity_incident_alerts_exactly_once() {
    let mut tracker = AlertTracker::new();
    tracker.observe(&[], true);

    let snapshot = vec![
        incident("4093", IncidentPriority::High),
        incident("4094", IncidentPriority::Low),
    ];
    assert_eq!(ids(&tracker.observe(&snapshot, true)), vec!["4093"]);
    assert!(tracker.observe(&snapshot, true).is_empty());
}

#[test]
fn escalated_incident_alerts_after_it_turns_high() {
    let mut tracker = AlertTracker::new();
    tracker.observe(&[], true);

    assert!(tracker
        .observe(&[incident("4094", IncidentPriority::Medium)], true)
        .is_empty());
    assert_eq!(
        ids(&tracker.observe(&[incident("4094", IncidentPriority::High)], true)),
        vec!["4094"]
    );
}

#[test]
fn muted_audio_suppresses_alerts_without_marking_seen() {
    let mut tracker = AlertTracker::new();
    tracker.observe(&[incident("4090", IncidentPriority::Low)], true);

    let snapshot = vec![incident("4095", IncidentPriority::Critical)];
    assert!(tracker.observe(&snapshot, false).is_empty());
    assert!(!tracker.has_seen(&IncidentId::from("4095")));
    assert_eq!(ids(&tracker.observe(&snapshot, true)), vec!["4095"]);
}

#[derive(Default)]
struct RecordingSink {
    batches: Mutex<Vec<Vec<String>>>,
}

impl AlertSink for RecordingSink {
    fn alert(&self, incidents: &[Incident]) {
        self.batches
            .lock()
            .unwrap()
            .push(incidents.iter().map(|i| i.id.to_string()).collect());
    }
}

fn incidents_event(incidents: Vec<Incident>) -> ConsoleEvent {
    ConsoleEvent::Snapshot {
        path: DocumentPath::Incidents,
        snapshot: Snapshot::Incidents(incidents),
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn monitor_follows_the_audio_toggle_from_settings_snapshots() {
    let (events, rx) = broadcast::channel(16);
    let sink = Arc::new(RecordingSink::default());
    let monitor = AlertMonitor::spawn(rx, sink.clone(), true);

    events
        .send(incidents_event(vec![incident("4090", IncidentPriority::Low)]))
        .unwrap();
    events
        .send(ConsoleEvent::Snapshot {
            path: DocumentPath::OperatorSettings(OperatorId::from("884-Alpha")),
            snapshot: Snapshot::Settings(Some(OperatorSettings {
                audio_alerts: false,
                ..OperatorSettings::default()
            })),
        })
        .unwrap();
    events
        .send(incidents_event(vec![incident("4096", IncidentPriority::High)]))
        .unwrap();
    settle().await;
    assert!(sink.batches.lock().unwrap().is_empty());

    events
        .send(ConsoleEvent::Snapshot {
            path: DocumentPath::OperatorSettings(OperatorId::from("884-Alpha")),
            snapshot: Snapshot::Settings(Some(OperatorSettings::default())),
        })
        .unwrap();
    events
        .send(incidents_event(vec![incident("4096", IncidentPriority::High)]))
        .unwrap();
    settle().await;
    assert_eq!(*sink.batches.lock().unwrap(), vec![vec!["4096".to_string()]]);

    monitor.stop();
}

#[tokio::test]
async fn stopped_monitor_no_longer_alerts() {
    let (events, rx) = broadcast::channel(16);
    let sink = Arc::new(RecordingSink::default());
    let monitor = AlertMonitor::spawn(rx, sink.clone(), true);

    events.send(incidents_event(vec![])).unwrap();
    settle().await;
    monitor.stop();
    settle().await;

    let _ = events.send(incidents_event(vec![incident("4097", IncidentPriority::Critical)]));
    settle().await;
    assert!(sink.batches.lock().unwrap().is_empty());
}
