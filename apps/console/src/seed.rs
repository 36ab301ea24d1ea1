//! Demo signals for an empty store, standing in for the ingestion pipeline.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use shared::domain::{Incident, IncidentPriority, IncidentStatus, NewIncident, Subject};
use storage::RecordStore;
use tracing::info;

struct SeedSignal {
    number: u32,
    kind: &'static str,
    priority: IncidentPriority,
    status: IncidentStatus,
    location: &'static str,
    sector: &'static str,
    icon: &'static str,
    closed_on: Option<(i32, u32, u32)>,
    subject: SeedSubject,
}

struct SeedSubject {
    name: &'static str,
    age: u32,
    gender: &'static str,
    conditions: &'static [&'static str],
    phone: &'static str,
    blood_type: &'static str,
    emergency_contact: &'static str,
    languages: &'static [&'static str],
}

const UNKNOWN_SUBJECT: SeedSubject = SeedSubject {
    name: "Unknown",
    age: 0,
    gender: "N/A",
    conditions: &[],
    phone: "N/A",
    blood_type: "N/A",
    emergency_contact: "N/A",
    languages: &[],
};

// Closed signals come first so the store clock orders them oldest to newest.
const SIGNALS: &[SeedSignal] = &[
    SeedSignal {
        number: 4085,
        kind: "Heart Attack",
        priority: IncidentPriority::Critical,
        status: IncidentStatus::Resolved,
        location: "Central Park South",
        sector: "Uptown",
        icon: "emergency",
        closed_on: Some((2025, 5, 12)),
        subject: SeedSubject {
            name: "Tony Stark",
            age: 48,
            gender: "Male",
            conditions: &["Heart Implant"],
            phone: "Jarvis",
            blood_type: "A+",
            emergency_contact: "Pepper Potts",
            languages: &["English"],
        },
    },
    SeedSignal {
        number: 4086,
        kind: "Burglary",
        priority: IncidentPriority::Medium,
        status: IncidentStatus::Cancelled,
        location: "99 Tech Plaza",
        sector: "North Hub",
        icon: "home_repair_service",
        closed_on: Some((2025, 5, 13)),
        subject: SeedSubject {
            name: "Alice Wonder",
            age: 28,
            gender: "Female",
            conditions: &[],
            phone: "+1 555-123-000",
            blood_type: "B-",
            emergency_contact: "Hatter",
            languages: &["English"],
        },
    },
    SeedSignal {
        number: 4087,
        kind: "Traffic Violation",
        priority: IncidentPriority::Low,
        status: IncidentStatus::Resolved,
        location: "5th Ave & Broadway",
        sector: "Times Square",
        icon: "traffic",
        closed_on: Some((2025, 5, 14)),
        subject: SeedSubject {
            name: "Michael Scott",
            age: 42,
            gender: "Male",
            conditions: &[],
            phone: "+1 555-SCRANTON",
            blood_type: "O-",
            emergency_contact: "Dwight Schrute",
            languages: &["English"],
        },
    },
    SeedSignal {
        number: 4088,
        kind: "Assault",
        priority: IncidentPriority::Critical,
        status: IncidentStatus::Resolved,
        location: "Metro Station Entrance",
        sector: "South Side",
        icon: "gavel",
        closed_on: Some((2025, 5, 14)),
        subject: UNKNOWN_SUBJECT,
    },
    SeedSignal {
        number: 4092,
        kind: "Medical Emergency",
        priority: IncidentPriority::High,
        status: IncidentStatus::Active,
        location: "142 West St, Apartment 4B",
        sector: "Downtown Sector",
        icon: "medical_services",
        closed_on: None,
        subject: SeedSubject {
            name: "John Doe",
            age: 45,
            gender: "Male",
            conditions: &["Diabetic", "Hypertension"],
            phone: "+1 (555) 012-3456",
            blood_type: "O+",
            emergency_contact: "Jane Doe (Wife)",
            languages: &["English", "Spanish"],
        },
    },
    SeedSignal {
        number: 4091,
        kind: "Fire Alarm",
        priority: IncidentPriority::Medium,
        status: IncidentStatus::Active,
        location: "88 Industrial Way",
        sector: "Industrial Zone",
        icon: "local_fire_department",
        closed_on: None,
        subject: SeedSubject {
            name: "Sarah Connor",
            age: 32,
            gender: "Female",
            conditions: &["None"],
            phone: "+1 (555) 987-6543",
            blood_type: "A-",
            emergency_contact: "Kyle Reese",
            languages: &["English"],
        },
    },
];

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl SeedSubject {
    fn to_subject(&self) -> Subject {
        Subject {
            name: self.name.into(),
            age: self.age,
            gender: self.gender.into(),
            conditions: owned(self.conditions),
            phone: self.phone.into(),
            blood_type: self.blood_type.into(),
            emergency_contact: self.emergency_contact.into(),
            languages: owned(self.languages),
            photo: String::new(),
        }
    }
}

impl SeedSignal {
    fn to_new_incident(&self) -> NewIncident {
        NewIncident {
            title: format!("Signal #{}", self.number),
            kind: self.kind.into(),
            priority: self.priority,
            status: self.status,
            location: self.location.into(),
            sector: self.sector.into(),
            icon: self.icon.into(),
            date: self
                .closed_on
                .and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            subject: self.subject.to_subject(),
        }
    }
}

/// Inserts the demo signals unless the store already holds incidents.
/// Returns the created incidents, empty when nothing was seeded.
pub async fn seed_demo_incidents(store: &dyn RecordStore) -> Result<Vec<Incident>> {
    let existing = store
        .list_incidents()
        .await
        .context("failed to list incidents before seeding")?;
    if !existing.is_empty() {
        info!(count = existing.len(), "store already holds incidents; skipping seed");
        return Ok(Vec::new());
    }

    let mut created = Vec::with_capacity(SIGNALS.len());
    for signal in SIGNALS {
        let incident = store
            .create_incident(signal.to_new_incident())
            .await
            .with_context(|| format!("failed to seed signal #{}", signal.number))?;
        created.push(incident);
    }
    info!(count = created.len(), "seeded demo incidents");
    Ok(created)
}

#[cfg(test)]
#[path = "tests/seed_tests.rs"]
mod tests;
