//! SQLite-backed alert store. The dedup check and insert run in one IMMEDIATE transaction, which
//! takes the database write lock up front, so two processes sharing the file cannot both emit.

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::alerts::{Alert, AlertStore, AlertSummary, InsertOutcome, Severity};
use crate::error::AlertError;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const COLUMNS: &str = "alert_id, shipment_id, alert_type, severity, title, message, metadata, \
                       triggered_at, is_active, resolved_at, resolved_by";

pub struct SqliteAlertStore {
    conn: Mutex<Connection>,
}

fn millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, AlertError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| AlertError::Decode(format!("timestamp out of range: {ms}")))
}

/// Raw row; decoded outside the rusqlite row callback so decode failures keep their own error.
struct AlertRow {
    alert_id: String,
    shipment_id: String,
    alert_type: String,
    severity: String,
    title: String,
    message: String,
    metadata: String,
    triggered_at: i64,
    is_active: bool,
    resolved_at: Option<i64>,
    resolved_by: Option<String>,
}

impl AlertRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            alert_id: row.get(0)?,
            shipment_id: row.get(1)?,
            alert_type: row.get(2)?,
            severity: row.get(3)?,
            title: row.get(4)?,
            message: row.get(5)?,
            metadata: row.get(6)?,
            triggered_at: row.get(7)?,
            is_active: row.get(8)?,
            resolved_at: row.get(9)?,
            resolved_by: row.get(10)?,
        })
    }

    fn decode(self) -> Result<Alert, AlertError> {
        let alert_id = Uuid::parse_str(&self.alert_id)
            .map_err(|e| AlertError::Decode(format!("alert_id {:?}: {e}", self.alert_id)))?;
        let severity = Severity::parse(&self.severity)
            .ok_or_else(|| AlertError::Decode(format!("severity {:?}", self.severity)))?;
        let metadata = serde_json::from_str(&self.metadata)
            .map_err(|e| AlertError::Decode(format!("metadata: {e}")))?;
        Ok(Alert {
            alert_id,
            shipment_id: self.shipment_id,
            alert_type: self.alert_type,
            severity,
            title: self.title,
            message: self.message,
            metadata,
            triggered_at: from_millis(self.triggered_at)?,
            is_active: self.is_active,
            resolved_at: self.resolved_at.map(from_millis).transpose()?,
            resolved_by: self.resolved_by,
        })
    }
}

impl SqliteAlertStore {
    /// Open or create the store at `path`.
    pub fn open(path: &Path) -> Result<Self, AlertError> {
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, AlertError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, AlertError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS alerts (
                alert_id TEXT PRIMARY KEY,
                shipment_id TEXT NOT NULL,
                alert_type TEXT NOT NULL,
                severity TEXT NOT NULL,
                title TEXT NOT NULL,
                message TEXT NOT NULL,
                metadata TEXT NOT NULL,
                triggered_at INTEGER NOT NULL,
                is_active INTEGER NOT NULL,
                resolved_at INTEGER,
                resolved_by TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_alerts_key ON alerts(shipment_id, alert_type, is_active);
            CREATE INDEX IF NOT EXISTS idx_alerts_triggered ON alerts(triggered_at);
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn fetch(conn: &Connection, alert_id: Uuid) -> Result<Option<Alert>, AlertError> {
        let row = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM alerts WHERE alert_id = ?1"),
                params![alert_id.to_string()],
                AlertRow::read,
            )
            .optional()?;
        row.map(AlertRow::decode).transpose()
    }
}

impl AlertStore for SqliteAlertStore {
    fn insert_if_no_active(
        &self,
        alert: &Alert,
        since: DateTime<Utc>,
    ) -> Result<InsertOutcome, AlertError> {
        let metadata = serde_json::to_string(&alert.metadata)?;
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT alert_id FROM alerts
                 WHERE shipment_id = ?1 AND alert_type = ?2 AND is_active = 1 AND triggered_at > ?3
                 ORDER BY triggered_at DESC LIMIT 1",
                params![alert.shipment_id, alert.alert_type, millis(since)],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = existing {
            let id = Uuid::parse_str(&id)
                .map_err(|e| AlertError::Decode(format!("alert_id {id:?}: {e}")))?;
            // Dropping the transaction rolls it back.
            return Ok(InsertOutcome::Conflict(id));
        }

        tx.execute(
            &format!(
                "INSERT INTO alerts ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
            ),
            params![
                alert.alert_id.to_string(),
                alert.shipment_id,
                alert.alert_type,
                alert.severity.as_str(),
                alert.title,
                alert.message,
                metadata,
                millis(alert.triggered_at),
                alert.is_active,
                alert.resolved_at.map(millis),
                alert.resolved_by,
            ],
        )?;
        tx.commit()?;
        debug!(alert_id = %alert.alert_id, shipment_id = %alert.shipment_id, "alert stored");
        Ok(InsertOutcome::Inserted)
    }

    fn resolve(
        &self,
        alert_id: Uuid,
        resolved_by: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<Alert, AlertError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut alert = Self::fetch(&tx, alert_id)?.ok_or(AlertError::NotFound(alert_id))?;
        alert.resolve(resolved_by, at)?;
        tx.execute(
            "UPDATE alerts SET is_active = 0, resolved_at = ?2, resolved_by = ?3
             WHERE alert_id = ?1 AND is_active = 1",
            params![alert_id.to_string(), millis(at), resolved_by],
        )?;
        tx.commit()?;
        Ok(alert)
    }

    fn get(&self, alert_id: Uuid) -> Result<Option<Alert>, AlertError> {
        Self::fetch(&self.conn.lock(), alert_id)
    }

    fn active_alerts(&self, limit: usize) -> Result<Vec<Alert>, AlertError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM alerts WHERE is_active = 1 ORDER BY triggered_at DESC LIMIT ?1"
        ))?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(params![limit], AlertRow::read)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(AlertRow::decode).collect()
    }

    fn summary(&self, since: DateTime<Utc>) -> Result<AlertSummary, AlertError> {
        let conn = self.conn.lock();
        let (total, active, high): (i64, Option<i64>, Option<i64>) = conn.query_row(
            "SELECT COUNT(*), SUM(is_active), SUM(severity = 'High')
             FROM alerts WHERE triggered_at >= ?1",
            params![millis(since)],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        let total = total.max(0) as u64;
        let active = active.unwrap_or(0).max(0) as u64;
        let high = high.unwrap_or(0).max(0) as u64;
        Ok(AlertSummary {
            total,
            active,
            resolved: total - active,
            high,
            medium: total - high,
        })
    }
}
