use std::sync::Arc;

use incident_api::{
    append_operator_message, dispatch, escalate, list_logs, resolve, ApiContext,
    ConfirmedTransition, PreConfirmed,
};
use shared::{
    domain::{IncidentPriority, IncidentStatus, LogSender, NewIncident, Subject, UnitType},
    error::ErrorCode,
};
use storage::{RecordStore, Storage};

#[tokio::test]
async fn full_incident_lifecycle_survives_store_reopen() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("console.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    let incident = storage
        .create_incident(NewIncident {
            title: "Signal #4091".into(),
            kind: "Fire Alarm".into(),
            priority: IncidentPriority::Medium,
            status: IncidentStatus::Active,
            location: "88 Industrial Way".into(),
            sector: "Industrial Zone".into(),
            icon: "local_fire_department".into(),
            date: None,
            subject: Subject {
                name: "Sarah Connor".into(),
                age: 32,
                ..Subject::default()
            },
        })
        .await
        .expect("incident");
    let ctx = ApiContext::new(Arc::new(storage.clone()));

    dispatch(&ctx, &incident.id, UnitType::Fire)
        .await
        .expect("dispatch");
    escalate(&ctx, &incident.id).await.expect("escalate");
    append_operator_message(&ctx, &incident.id, "Engine 4 on scene")
        .await
        .expect("message");
    let outcome = resolve(&ctx, &incident.id, &PreConfirmed)
        .await
        .expect("resolve");
    assert!(matches!(outcome, ConfirmedTransition::Applied(_)));

    let err = dispatch(&ctx, &incident.id, UnitType::Police)
        .await
        .expect_err("resolved incident is terminal");
    assert_eq!(err.code, ErrorCode::InvalidState);
    drop(ctx);
    drop(storage);

    let reopened = Storage::new(&database_url).await.expect("reopen");
    let stored = reopened
        .get_incident(&incident.id)
        .await
        .expect("get")
        .expect("present");
    assert_eq!(stored.status, IncidentStatus::Resolved);
    assert_eq!(stored.priority, IncidentPriority::High);
    assert!(stored.date.is_some());

    let ctx = ApiContext::new(Arc::new(reopened));
    let senders: Vec<LogSender> = list_logs(&ctx, &incident.id)
        .await
        .expect("logs")
        .into_iter()
        .map(|entry| entry.sender)
        .collect();
    assert_eq!(
        senders,
        vec![
            LogSender::System,
            LogSender::System,
            LogSender::Operator,
            LogSender::Operator,
        ]
    );
}
