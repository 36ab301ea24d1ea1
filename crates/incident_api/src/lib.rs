//! Incident lifecycle rules.
//!
//! Every operation reads the incident fresh from the record store, checks the
//! transition against the current status, then issues its field write and its
//! log append as two independent store writes. Store failures never escape as
//! raw errors: they are logged and returned as [`ErrorCode::StoreUnavailable`].

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use shared::{
    domain::{
        Incident, IncidentId, IncidentPatch, IncidentPriority, IncidentStatus, LogMessage,
        LogSender, NewLogEntry, UnitType,
    },
    error::{ApiError, ErrorCode},
};
use storage::RecordStore;
use tracing::{error, info, warn};

pub const RESOLVE_PROMPT: &str =
    "Confirm resolution: This will archive the signal and notify all responding units.";
pub const FALSE_ALARM_PROMPT: &str = "Are you sure you want to mark this as a False Alarm?";
pub const RESOLVED_LOG: &str = "Signal marked as RESOLVED. All units standing down.";
pub const FALSE_ALARM_LOG: &str = "Signal marked as FALSE ALARM. Closing dispatch request.";

#[derive(Clone)]
pub struct ApiContext {
    pub store: Arc<dyn RecordStore>,
}

impl ApiContext {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }
}

/// Human-in-the-loop gate for closing a live incident.
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Confirmation already given out of band, e.g. a `--yes` flag.
pub struct PreConfirmed;

impl Confirm for PreConfirmed {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

/// Result of a transition that wrote both the incident and its log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub incident: Incident,
    pub log: LogMessage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConfirmedTransition {
    Applied(Transition),
    /// The operator declined; nothing was written.
    Declined,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Escalation {
    Escalated {
        from: IncidentPriority,
        transition: Transition,
    },
    /// Already at the top of the scale. Not an error.
    AlreadyCritical,
}

pub async fn get_incident(ctx: &ApiContext, incident_id: &IncidentId) -> Result<Incident, ApiError> {
    ctx.store
        .get_incident(incident_id)
        .await
        .map_err(store_unavailable)?
        .ok_or_else(|| ApiError::new(ErrorCode::NotFound, format!("incident {incident_id}")))
}

pub async fn list_incidents(ctx: &ApiContext) -> Result<Vec<Incident>, ApiError> {
    ctx.store.list_incidents().await.map_err(store_unavailable)
}

pub async fn list_logs(ctx: &ApiContext, incident_id: &IncidentId) -> Result<Vec<LogMessage>, ApiError> {
    ctx.store
        .list_logs(incident_id)
        .await
        .map_err(store_unavailable)
}

pub async fn dispatch(
    ctx: &ApiContext,
    incident_id: &IncidentId,
    unit: UnitType,
) -> Result<Transition, ApiError> {
    let incident = get_incident(ctx, incident_id).await?;
    ensure_not_terminal(&incident, "dispatch")?;

    let log = append_log(
        ctx,
        incident_id,
        LogSender::System,
        format!("Dispatching {unit} units to {}...", incident.location),
    )
    .await?;
    let incident = update(ctx, incident_id, IncidentPatch::status(IncidentStatus::Pending)).await?;

    info!(%incident_id, %unit, "units dispatched");
    Ok(Transition { incident, log })
}

pub async fn escalate(ctx: &ApiContext, incident_id: &IncidentId) -> Result<Escalation, ApiError> {
    let incident = get_incident(ctx, incident_id).await?;
    let from = incident.priority;
    let Some(to) = from.escalated() else {
        info!(%incident_id, "escalation skipped; already at maximum priority");
        return Ok(Escalation::AlreadyCritical);
    };

    let incident = update(ctx, incident_id, IncidentPatch::priority(to)).await?;
    let log = append_log(
        ctx,
        incident_id,
        LogSender::System,
        format!("ALERT: Incident priority escalated to {to}."),
    )
    .await?;

    info!(%incident_id, %from, %to, "incident escalated");
    Ok(Escalation::Escalated {
        from,
        transition: Transition { incident, log },
    })
}

pub async fn resolve(
    ctx: &ApiContext,
    incident_id: &IncidentId,
    confirmer: &dyn Confirm,
) -> Result<ConfirmedTransition, ApiError> {
    let incident = get_incident(ctx, incident_id).await?;
    ensure_not_terminal(&incident, "resolve")?;
    if !confirmer.confirm(RESOLVE_PROMPT) {
        info!(%incident_id, "resolution declined by operator");
        return Ok(ConfirmedTransition::Declined);
    }

    let patch = IncidentPatch {
        status: Some(IncidentStatus::Resolved),
        date: Some(Utc::now().date_naive()),
        ..IncidentPatch::default()
    };
    let incident = update(ctx, incident_id, patch).await?;
    let log = append_log(ctx, incident_id, LogSender::Operator, RESOLVED_LOG.to_string()).await?;

    info!(%incident_id, "incident resolved");
    Ok(ConfirmedTransition::Applied(Transition { incident, log }))
}

pub async fn mark_false_alarm(
    ctx: &ApiContext,
    incident_id: &IncidentId,
    confirmer: &dyn Confirm,
) -> Result<ConfirmedTransition, ApiError> {
    let incident = get_incident(ctx, incident_id).await?;
    ensure_not_terminal(&incident, "mark as false alarm")?;
    if !confirmer.confirm(FALSE_ALARM_PROMPT) {
        info!(%incident_id, "false alarm declined by operator");
        return Ok(ConfirmedTransition::Declined);
    }

    let incident = update(ctx, incident_id, IncidentPatch::status(IncidentStatus::Cancelled)).await?;
    let log = append_log(ctx, incident_id, LogSender::Operator, FALSE_ALARM_LOG.to_string()).await?;

    info!(%incident_id, "incident cancelled as false alarm");
    Ok(ConfirmedTransition::Applied(Transition { incident, log }))
}

/// Appends an operator transmission. Blank input is dropped without error.
pub async fn append_operator_message(
    ctx: &ApiContext,
    incident_id: &IncidentId,
    text: &str,
) -> Result<Option<LogMessage>, ApiError> {
    let content = text.trim();
    if content.is_empty() {
        return Ok(None);
    }
    get_incident(ctx, incident_id).await?;
    let log = append_log(ctx, incident_id, LogSender::Operator, content.to_string()).await?;
    Ok(Some(log))
}

fn ensure_not_terminal(incident: &Incident, action: &str) -> Result<(), ApiError> {
    if incident.status.is_terminal() {
        warn!(incident_id = %incident.id, status = %incident.status, action, "transition rejected");
        return Err(ApiError::new(
            ErrorCode::InvalidState,
            format!(
                "incident {} is already {}; cannot {action}",
                incident.id, incident.status
            ),
        ));
    }
    Ok(())
}

async fn update(
    ctx: &ApiContext,
    incident_id: &IncidentId,
    patch: IncidentPatch,
) -> Result<Incident, ApiError> {
    ctx.store
        .update_incident(incident_id, patch)
        .await
        .map_err(store_unavailable)
}

async fn append_log(
    ctx: &ApiContext,
    incident_id: &IncidentId,
    sender: LogSender,
    content: String,
) -> Result<LogMessage, ApiError> {
    ctx.store
        .append_log(incident_id, NewLogEntry::new(sender, content))
        .await
        .map_err(store_unavailable)
}

fn store_unavailable(err: anyhow::Error) -> ApiError {
    error!(error = %err, "record store operation failed");
    ApiError::new(ErrorCode::StoreUnavailable, err.to_string())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
