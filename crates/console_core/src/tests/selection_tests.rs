use super::*;
use chrono::Utc;
use shared::domain::{IncidentPriority, IncidentStatus, Subject};

fn incident(id: &str, status: IncidentStatus) -> Incident {
    Incident {
        id: IncidentId::from(id),
        title: format!("Signal #{id}"),
        kind: "Medical Emergency".into(),
        priority: IncidentPriority::High,
        status,
        location: "142 West St, Apartment 4B".into(),
        sector: "Downtown Sector".into(),
        icon: "medical_services".into(),
        date: None,
        subject: Subject::default(),
        revision: 0,
        created_at: Utc::now(),
    }
}

#[test]
fn first_snapshot_auto_selects_first_incident() {
    let mut state = ConsoleState::new();
    assert!(state.selected().is_none());

    state.apply_incidents(vec![
        incident("4092", IncidentStatus::Active),
        incident("4091", IncidentStatus::Active),
    ]);
    assert_eq!(state.selected_id(), Some(&IncidentId::from("4092")));
}

#[test]
fn selection_tracks_fresh_snapshots() {
    let mut state = ConsoleState::new();
    state.apply_incidents(vec![
        incident("4092", IncidentStatus::Active),
        incident("4091", IncidentStatus::Active),
    ]);
    assert!(state.select(&IncidentId::from("4091")));

    state.apply_incidents(vec![
        incident("4092", IncidentStatus::Active),
        incident("4091", IncidentStatus::Pending),
    ]);
    let selected = state.selected().expect("selected");
    assert_eq!(selected.id.as_str(), "4091");
    assert_eq!(selected.status, IncidentStatus::Pending);
}

#[test]
fn selecting_unknown_incident_is_refused() {
    let mut state = ConsoleState::new();
    state.apply_incidents(vec![incident("4092", IncidentStatus::Active)]);
    assert!(!state.select(&IncidentId::from("9999")));
    assert_eq!(state.selected_id(), Some(&IncidentId::from("4092")));
}

#[test]
fn empty_snapshot_leaves_nothing_selected() {
    let mut state = ConsoleState::new();
    state.apply_incidents(Vec::new());
    assert!(state.selected_id().is_none());

    state.apply_incidents(vec![incident("4092", IncidentStatus::Active)]);
    assert_eq!(state.selected_id(), Some(&IncidentId::from("4092")));

    state.clear_selection();
    assert!(state.selected().is_none());
}
