use std::cmp::Reverse;

use shared::domain::{Incident, IncidentPriority, LogSender};

/// Case-insensitive match over title, type, location and id. Empty matches all.
pub fn matches_search(incident: &Incident, query: &str) -> bool {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return true;
    }
    [
        incident.title.as_str(),
        incident.kind.as_str(),
        incident.location.as_str(),
        incident.id.as_str(),
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(&query))
}

/// Live incidents: anything not yet resolved or cancelled.
pub fn active_feed<'a>(incidents: &'a [Incident], query: &str) -> Vec<&'a Incident> {
    incidents
        .iter()
        .filter(|incident| !incident.status.is_terminal())
        .filter(|incident| matches_search(incident, query))
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub query: String,
    pub priority: Option<IncidentPriority>,
}

/// Closed incidents, newest first.
pub fn history<'a>(incidents: &'a [Incident], filter: &HistoryFilter) -> Vec<&'a Incident> {
    let mut closed: Vec<&Incident> = incidents
        .iter()
        .filter(|incident| incident.status.is_terminal())
        .filter(|incident| matches_search(incident, &filter.query))
        .filter(|incident| filter.priority.map_or(true, |p| incident.priority == p))
        .collect();
    closed.sort_by_key(|incident| Reverse((incident.created_at, incident.id.clone())));
    closed
}

pub fn priority_marker(priority: IncidentPriority) -> &'static str {
    match priority {
        IncidentPriority::Critical => "!!!",
        IncidentPriority::High => "!! ",
        IncidentPriority::Medium => "!  ",
        IncidentPriority::Low => "   ",
    }
}

pub fn sender_tag(sender: LogSender) -> &'static str {
    match sender {
        LogSender::System => "[SYS]",
        LogSender::Operator => "[OPR]",
        LogSender::User => "[USR]",
        LogSender::Ai => "[AI ]",
    }
}

#[cfg(test)]
#[path = "tests/views_tests.rs"]
mod tests;
