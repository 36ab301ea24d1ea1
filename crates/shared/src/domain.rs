use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(IncidentId);
id_newtype!(OperatorId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LogMessageId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IncidentStatus {
    Active,
    /// A response has been dispatched and is en route or working.
    #[serde(rename = "dispatched")]
    Pending,
    Resolved,
    Cancelled,
}

impl IncidentStatus {
    pub fn is_terminal(self) -> bool {
        match self {
            IncidentStatus::Active | IncidentStatus::Pending => false,
            IncidentStatus::Resolved | IncidentStatus::Cancelled => true,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IncidentStatus::Active => "Active",
            IncidentStatus::Pending => "dispatched",
            IncidentStatus::Resolved => "Resolved",
            IncidentStatus::Cancelled => "Cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Active" => Some(IncidentStatus::Active),
            "dispatched" => Some(IncidentStatus::Pending),
            "Resolved" => Some(IncidentStatus::Resolved),
            "Cancelled" => Some(IncidentStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum IncidentPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl IncidentPriority {
    /// The next step up, or `None` at `Critical`.
    pub fn escalated(self) -> Option<Self> {
        match self {
            IncidentPriority::Low => Some(IncidentPriority::Medium),
            IncidentPriority::Medium => Some(IncidentPriority::High),
            IncidentPriority::High => Some(IncidentPriority::Critical),
            IncidentPriority::Critical => None,
        }
    }

    pub fn is_high_severity(self) -> bool {
        match self {
            IncidentPriority::High | IncidentPriority::Critical => true,
            IncidentPriority::Low | IncidentPriority::Medium => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IncidentPriority::Low => "Low",
            IncidentPriority::Medium => "Medium",
            IncidentPriority::High => "High",
            IncidentPriority::Critical => "Critical",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(IncidentPriority::Low),
            "medium" => Some(IncidentPriority::Medium),
            "high" => Some(IncidentPriority::High),
            "critical" => Some(IncidentPriority::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for IncidentPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogSender {
    System,
    Operator,
    User,
    #[serde(rename = "AI")]
    Ai,
}

impl LogSender {
    pub fn as_str(self) -> &'static str {
        match self {
            LogSender::System => "System",
            LogSender::Operator => "Operator",
            LogSender::User => "User",
            LogSender::Ai => "AI",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "System" => Some(LogSender::System),
            "Operator" => Some(LogSender::Operator),
            "User" => Some(LogSender::User),
            "AI" => Some(LogSender::Ai),
            _ => None,
        }
    }
}

impl fmt::Display for LogSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitType {
    Police,
    Medical,
    Fire,
}

impl UnitType {
    pub fn as_str(self) -> &'static str {
        match self {
            UnitType::Police => "Police",
            UnitType::Medical => "Medical",
            UnitType::Fire => "Fire",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "police" => Some(UnitType::Police),
            "medical" | "ems" => Some(UnitType::Medical),
            "fire" => Some(UnitType::Fire),
            _ => None,
        }
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub name: String,
    pub age: u32,
    pub gender: String,
    #[serde(default)]
    pub conditions: Vec<String>,
    pub phone: String,
    pub blood_type: String,
    pub emergency_contact: String,
    #[serde(default)]
    pub languages: Vec<String>,
    pub photo: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Incident {
    pub id: IncidentId,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub priority: IncidentPriority,
    pub status: IncidentStatus,
    pub location: String,
    pub sector: String,
    pub icon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    pub subject: Subject,
    pub revision: i64,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied by ingestion; the store assigns id, revision and timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIncident {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub priority: IncidentPriority,
    pub status: IncidentStatus,
    pub location: String,
    pub sector: String,
    pub icon: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    pub subject: Subject,
}

/// Partial update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncidentPatch {
    pub status: Option<IncidentStatus>,
    pub priority: Option<IncidentPriority>,
    pub date: Option<NaiveDate>,
}

impl IncidentPatch {
    pub fn status(status: IncidentStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn priority(priority: IncidentPriority) -> Self {
        Self {
            priority: Some(priority),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.priority.is_none() && self.date.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMessage {
    pub id: LogMessageId,
    pub incident_id: IncidentId,
    pub sender: LogSender,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLogEntry {
    pub sender: LogSender,
    pub content: String,
}

impl NewLogEntry {
    pub fn new(sender: LogSender, content: impl Into<String>) -> Self {
        Self {
            sender,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorSettings {
    pub display_name: String,
    pub operator_id: String,
    pub email: String,
    pub real_time_feed: bool,
    pub audio_alerts: bool,
    pub dark_mode_engine: bool,
    pub ai_dispatch: bool,
    pub photo_url: String,
}

impl Default for OperatorSettings {
    fn default() -> Self {
        Self {
            display_name: "Officer K. Deckard".into(),
            operator_id: "884-Alpha".into(),
            email: "deckard.k@omni-guard.gov".into(),
            real_time_feed: true,
            audio_alerts: true,
            dark_mode_engine: true,
            ai_dispatch: false,
            photo_url: String::new(),
        }
    }
}

/// Address of a subscribable document or query in the record store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum DocumentPath {
    Incidents,
    Incident(IncidentId),
    IncidentLogs(IncidentId),
    OperatorSettings(OperatorId),
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentPath::Incidents => f.write_str("incidents"),
            DocumentPath::Incident(id) => write!(f, "incidents/{id}"),
            DocumentPath::IncidentLogs(id) => write!(f, "incidents/{id}/logs"),
            DocumentPath::OperatorSettings(id) => write!(f, "operatorSettings/{id}"),
        }
    }
}
