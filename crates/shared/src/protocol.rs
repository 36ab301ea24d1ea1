use serde::{Deserialize, Serialize};

use crate::domain::{DocumentPath, Incident, LogMessage, OperatorSettings};

/// Push notification emitted by the record store after a write lands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreChange {
    pub path: DocumentPath,
}

/// Current contents of a [`DocumentPath`] at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Snapshot {
    Incidents(Vec<Incident>),
    Incident(Option<Incident>),
    Logs(Vec<LogMessage>),
    Settings(Option<OperatorSettings>),
}

impl Snapshot {
    pub fn incidents(&self) -> Option<&[Incident]> {
        match self {
            Snapshot::Incidents(incidents) => Some(incidents),
            Snapshot::Incident(_) | Snapshot::Logs(_) | Snapshot::Settings(_) => None,
        }
    }

    pub fn settings(&self) -> Option<&OperatorSettings> {
        match self {
            Snapshot::Settings(settings) => settings.as_ref(),
            Snapshot::Incidents(_) | Snapshot::Incident(_) | Snapshot::Logs(_) => None,
        }
    }
}
