use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use futures::{stream, stream::BoxStream, StreamExt};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, warn};
use uuid::Uuid;

use shared::{
    domain::{
        DocumentPath, Incident, IncidentId, IncidentPatch, IncidentPriority, IncidentStatus,
        LogMessage, LogMessageId, LogSender, NewIncident, NewLogEntry, OperatorId,
        OperatorSettings, Subject,
    },
    protocol::{Snapshot, StoreChange},
};

const CHANGE_FEED_CAPACITY: usize = 256;
const CLOSED_ON_FORMAT: &str = "%Y-%m-%d";

/// Document store the console reads from and writes to.
///
/// Writes are last-write-wins and not transactional across calls. Every
/// successful write publishes one [`StoreChange`] per [`DocumentPath`] it
/// touched on the feed returned by [`RecordStore::changes`].
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_incident(&self, id: &IncidentId) -> Result<Option<Incident>>;
    async fn list_incidents(&self) -> Result<Vec<Incident>>;
    async fn create_incident(&self, incident: NewIncident) -> Result<Incident>;
    async fn update_incident(&self, id: &IncidentId, patch: IncidentPatch) -> Result<Incident>;
    /// Applies `patch` only while the stored revision equals `expected_revision`.
    /// Returns `None` when the revision has moved on.
    async fn update_incident_if_revision(
        &self,
        id: &IncidentId,
        expected_revision: i64,
        patch: IncidentPatch,
    ) -> Result<Option<Incident>>;
    async fn append_log(&self, id: &IncidentId, entry: NewLogEntry) -> Result<LogMessage>;
    /// Log entries ordered by store timestamp, then store id.
    async fn list_logs(&self, id: &IncidentId) -> Result<Vec<LogMessage>>;
    async fn get_settings(&self, operator_id: &OperatorId) -> Result<Option<OperatorSettings>>;
    async fn put_settings(&self, operator_id: &OperatorId, settings: &OperatorSettings)
        -> Result<()>;
    fn changes(&self) -> broadcast::Receiver<StoreChange>;

    async fn snapshot(&self, path: &DocumentPath) -> Result<Snapshot> {
        let snapshot = match path {
            DocumentPath::Incidents => Snapshot::Incidents(self.list_incidents().await?),
            DocumentPath::Incident(id) => Snapshot::Incident(self.get_incident(id).await?),
            DocumentPath::IncidentLogs(id) => Snapshot::Logs(self.list_logs(id).await?),
            DocumentPath::OperatorSettings(operator_id) => {
                Snapshot::Settings(self.get_settings(operator_id).await?)
            }
        };
        Ok(snapshot)
    }
}

/// Streams the current snapshot of `path`, then a fresh one after every
/// change to it, until the stream is dropped.
///
/// The change feed is attached before the initial read so no write between
/// the two is missed. A lagging receiver re-reads instead of failing.
pub fn subscribe(
    store: Arc<dyn RecordStore>,
    path: DocumentPath,
) -> BoxStream<'static, Result<Snapshot>> {
    let changes = BroadcastStream::new(store.changes());

    let initial = {
        let store = store.clone();
        let path = path.clone();
        stream::once(async move { store.snapshot(&path).await })
    };

    let filter_path = path.clone();
    let updates = changes
        .filter_map(move |change| {
            let wanted = match change {
                Ok(change) => change.path == filter_path,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(path = %filter_path, skipped, "change feed lagged; resyncing");
                    true
                }
            };
            futures::future::ready(wanted.then_some(()))
        })
        .then(move |()| {
            let store = store.clone();
            let path = path.clone();
            async move { store.snapshot(&path).await }
        });

    initial.chain(updates).boxed()
}

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
    changes: broadcast::Sender<StoreChange>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        // Shared-cache in-memory databases raise table-lock errors under
        // concurrent writers, so they get a single connection.
        let max_connections = if sqlite_path(database_url).is_some() { 5 } else { 1 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Ok(Self { pool, changes })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    fn publish(&self, path: DocumentPath) {
        debug!(%path, "publishing store change");
        // No receivers is fine; nobody is watching yet.
        let _ = self.changes.send(StoreChange { path });
    }

    fn publish_incident(&self, id: &IncidentId) {
        self.publish(DocumentPath::Incident(id.clone()));
        self.publish(DocumentPath::Incidents);
    }
}

const INCIDENT_COLUMNS: &str = "id, title, kind, priority, status, location, sector, icon, \
     closed_on, subject_json, revision, created_at_us";

#[async_trait]
impl RecordStore for Storage {
    async fn get_incident(&self, id: &IncidentId) -> Result<Option<Incident>> {
        let row = sqlx::query(&format!(
            "SELECT {INCIDENT_COLUMNS} FROM incidents WHERE id = ?"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(incident_from_row).transpose()
    }

    async fn list_incidents(&self) -> Result<Vec<Incident>> {
        let rows = sqlx::query(&format!(
            "SELECT {INCIDENT_COLUMNS} FROM incidents ORDER BY created_at_us ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(incident_from_row).collect()
    }

    async fn create_incident(&self, incident: NewIncident) -> Result<Incident> {
        let id = IncidentId(Uuid::new_v4().to_string());
        let subject_json =
            serde_json::to_string(&incident.subject).context("failed to encode subject")?;
        let row = sqlx::query(&format!(
            "INSERT INTO incidents (id, title, kind, priority, status, location, sector, icon, \
             closed_on, subject_json, revision, created_at_us)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?)
             RETURNING {INCIDENT_COLUMNS}"
        ))
        .bind(id.as_str())
        .bind(&incident.title)
        .bind(&incident.kind)
        .bind(incident.priority.as_str())
        .bind(incident.status.as_str())
        .bind(&incident.location)
        .bind(&incident.sector)
        .bind(&incident.icon)
        .bind(incident.date.map(format_closed_on))
        .bind(subject_json)
        .bind(Utc::now().timestamp_micros())
        .fetch_one(&self.pool)
        .await?;
        let created = incident_from_row(&row)?;
        self.publish_incident(&created.id);
        Ok(created)
    }

    async fn update_incident(&self, id: &IncidentId, patch: IncidentPatch) -> Result<Incident> {
        if patch.is_empty() {
            bail!("empty patch for incident {id}");
        }
        let row = sqlx::query(&format!(
            "UPDATE incidents
             SET status = COALESCE(?, status),
                 priority = COALESCE(?, priority),
                 closed_on = COALESCE(?, closed_on),
                 revision = revision + 1
             WHERE id = ?
             RETURNING {INCIDENT_COLUMNS}"
        ))
        .bind(patch.status.map(IncidentStatus::as_str))
        .bind(patch.priority.map(IncidentPriority::as_str))
        .bind(patch.date.map(format_closed_on))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            bail!("incident {id} not found");
        };
        let updated = incident_from_row(&row)?;
        self.publish_incident(id);
        Ok(updated)
    }

    async fn update_incident_if_revision(
        &self,
        id: &IncidentId,
        expected_revision: i64,
        patch: IncidentPatch,
    ) -> Result<Option<Incident>> {
        if patch.is_empty() {
            bail!("empty patch for incident {id}");
        }
        let row = sqlx::query(&format!(
            "UPDATE incidents
             SET status = COALESCE(?, status),
                 priority = COALESCE(?, priority),
                 closed_on = COALESCE(?, closed_on),
                 revision = revision + 1
             WHERE id = ? AND revision = ?
             RETURNING {INCIDENT_COLUMNS}"
        ))
        .bind(patch.status.map(IncidentStatus::as_str))
        .bind(patch.priority.map(IncidentPriority::as_str))
        .bind(patch.date.map(format_closed_on))
        .bind(id.as_str())
        .bind(expected_revision)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let updated = incident_from_row(&row)?;
        self.publish_incident(id);
        Ok(Some(updated))
    }

    async fn append_log(&self, id: &IncidentId, entry: NewLogEntry) -> Result<LogMessage> {
        let row = sqlx::query(
            "INSERT INTO incident_logs (incident_id, sender, content, created_at_us)
             VALUES (?, ?, ?, ?)
             RETURNING id, incident_id, sender, content, created_at_us",
        )
        .bind(id.as_str())
        .bind(entry.sender.as_str())
        .bind(&entry.content)
        .bind(Utc::now().timestamp_micros())
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("failed to append log entry for incident {id}"))?;
        let message = log_from_row(&row)?;
        self.publish(DocumentPath::IncidentLogs(id.clone()));
        Ok(message)
    }

    async fn list_logs(&self, id: &IncidentId) -> Result<Vec<LogMessage>> {
        let rows = sqlx::query(
            "SELECT id, incident_id, sender, content, created_at_us
             FROM incident_logs
             WHERE incident_id = ?
             ORDER BY created_at_us ASC, id ASC",
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(log_from_row).collect()
    }

    async fn get_settings(&self, operator_id: &OperatorId) -> Result<Option<OperatorSettings>> {
        let row = sqlx::query("SELECT settings_json FROM operator_settings WHERE operator_id = ?")
            .bind(operator_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let raw: String = row.try_get(0)?;
        let settings = serde_json::from_str(&raw)
            .with_context(|| format!("corrupt settings document for operator {operator_id}"))?;
        Ok(Some(settings))
    }

    async fn put_settings(
        &self,
        operator_id: &OperatorId,
        settings: &OperatorSettings,
    ) -> Result<()> {
        let raw = serde_json::to_string(settings).context("failed to encode settings")?;
        sqlx::query(
            "INSERT INTO operator_settings (operator_id, settings_json, updated_at_us)
             VALUES (?, ?, ?)
             ON CONFLICT(operator_id) DO UPDATE SET
                settings_json = excluded.settings_json,
                updated_at_us = excluded.updated_at_us",
        )
        .bind(operator_id.as_str())
        .bind(raw)
        .bind(Utc::now().timestamp_micros())
        .execute(&self.pool)
        .await?;
        self.publish(DocumentPath::OperatorSettings(operator_id.clone()));
        Ok(())
    }

    fn changes(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

fn incident_from_row(row: &SqliteRow) -> Result<Incident> {
    let priority: String = row.try_get("priority")?;
    let status: String = row.try_get("status")?;
    let closed_on: Option<String> = row.try_get("closed_on")?;
    let subject_json: String = row.try_get("subject_json")?;
    let subject: Subject =
        serde_json::from_str(&subject_json).context("corrupt incident subject")?;

    Ok(Incident {
        id: IncidentId(row.try_get("id")?),
        title: row.try_get("title")?,
        kind: row.try_get("kind")?,
        priority: IncidentPriority::parse(&priority)
            .ok_or_else(|| anyhow!("unknown incident priority '{priority}'"))?,
        status: IncidentStatus::parse(&status)
            .ok_or_else(|| anyhow!("unknown incident status '{status}'"))?,
        location: row.try_get("location")?,
        sector: row.try_get("sector")?,
        icon: row.try_get("icon")?,
        date: closed_on.as_deref().map(parse_closed_on).transpose()?,
        subject,
        revision: row.try_get("revision")?,
        created_at: from_micros(row.try_get("created_at_us")?)?,
    })
}

fn log_from_row(row: &SqliteRow) -> Result<LogMessage> {
    let sender: String = row.try_get("sender")?;
    Ok(LogMessage {
        id: LogMessageId(row.try_get("id")?),
        incident_id: IncidentId(row.try_get("incident_id")?),
        sender: LogSender::parse(&sender)
            .ok_or_else(|| anyhow!("unknown log sender '{sender}'"))?,
        content: row.try_get("content")?,
        timestamp: from_micros(row.try_get("created_at_us")?)?,
    })
}

fn from_micros(micros: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros).ok_or_else(|| anyhow!("timestamp out of range: {micros}"))
}

fn format_closed_on(date: NaiveDate) -> String {
    date.format(CLOSED_ON_FORMAT).to_string()
}

fn parse_closed_on(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, CLOSED_ON_FORMAT)
        .with_context(|| format!("invalid closure date '{raw}'"))
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
