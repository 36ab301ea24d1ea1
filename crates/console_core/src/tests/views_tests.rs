use super::*;
use chrono::{TimeZone, Utc};
use shared::domain::{IncidentId, IncidentStatus, Subject};

fn incident(
    id: &str,
    kind: &str,
    priority: IncidentPriority,
    status: IncidentStatus,
    created_secs: i64,
) -> Incident {
    Incident {
        id: IncidentId::from(id),
        title: format!("Signal #{id}"),
        kind: kind.into(),
        priority,
        status,
        location: "Main St & 4th Ave".into(),
        sector: "Downtown Sector".into(),
        icon: "warning".into(),
        date: None,
        subject: Subject::default(),
        revision: 0,
        created_at: Utc.timestamp_opt(created_secs, 0).unwrap(),
    }
}

fn sample() -> Vec<Incident> {
    vec![
        incident("4092", "Medical Emergency", IncidentPriority::Critical, IncidentStatus::Active, 10),
        incident("4091", "Structure Fire", IncidentPriority::High, IncidentStatus::Pending, 20),
        incident("4088", "Traffic Collision", IncidentPriority::Medium, IncidentStatus::Resolved, 30),
        incident("4087", "Noise Complaint", IncidentPriority::Low, IncidentStatus::Cancelled, 40),
        incident("4086", "Medical Emergency", IncidentPriority::High, IncidentStatus::Resolved, 50),
    ]
}

fn ids(incidents: &[&Incident]) -> Vec<String> {
    incidents.iter().map(|incident| incident.id.to_string()).collect()
}

#[test]
fn active_feed_hides_closed_incidents() {
    let incidents = sample();
    assert_eq!(ids(&active_feed(&incidents, "")), vec!["4092", "4091"]);
}

#[test]
fn search_is_case_insensitive_across_fields() {
    let incidents = sample();
    assert_eq!(ids(&active_feed(&incidents, "FIRE")), vec!["4091"]);
    assert_eq!(ids(&active_feed(&incidents, "4092")), vec!["4092"]);
    assert_eq!(active_feed(&incidents, "main st").len(), 2);
    assert!(active_feed(&incidents, "harbor").is_empty());
}

#[test]
fn history_is_newest_first_and_filters_by_priority() {
    let incidents = sample();
    let all = history(&incidents, &HistoryFilter::default());
    assert_eq!(ids(&all), vec!["4086", "4087", "4088"]);

    let high = history(
        &incidents,
        &HistoryFilter {
            query: "medical".into(),
            priority: Some(IncidentPriority::High),
        },
    );
    assert_eq!(ids(&high), vec!["4086"]);
}

#[test]
fn markers_cover_every_variant() {
    assert_eq!(priority_marker(IncidentPriority::Critical), "!!!");
    assert_eq!(priority_marker(IncidentPriority::Low).trim(), "");
    assert_eq!(sender_tag(LogSender::Ai), "[AI ]");
    assert_eq!(sender_tag(LogSender::Operator), "[OPR]");
}
