//! SQLite-based store implementation

use chrono::{DateTime, Utc};
use parkdesk_util::{ChargeId, SessionId};
use rusqlite::{Connection, OptionalExtension, Row, params};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::{AuditEvent, AuditEventType, Store, StoreError, StoreResult, UnsettledCharge};

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

/// Ledger row as stored, before decoding amounts and timestamps
struct ChargeRow {
    charge_id: String,
    session_id: String,
    vehicle_number: Option<String>,
    fee_amount: String,
    exited_at: String,
    last_error: String,
    settled_at: Option<String>,
}

const CHARGE_COLUMNS: &str =
    "charge_id, session_id, vehicle_number, fee_amount, exited_at, last_error, settled_at";

impl ChargeRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            charge_id: row.get(0)?,
            session_id: row.get(1)?,
            vehicle_number: row.get(2)?,
            fee_amount: row.get(3)?,
            exited_at: row.get(4)?,
            last_error: row.get(5)?,
            settled_at: row.get(6)?,
        })
    }

    fn decode(self) -> StoreResult<UnsettledCharge> {
        let fee_amount = Decimal::from_str(&self.fee_amount).map_err(|e| {
            StoreError::Serialization(format!("bad fee_amount {:?}: {e}", self.fee_amount))
        })?;

        Ok(UnsettledCharge {
            charge_id: ChargeId::new(self.charge_id),
            session_id: SessionId::new(self.session_id),
            vehicle_number: self.vehicle_number,
            fee_amount,
            exited_at: parse_timestamp(&self.exited_at)?,
            last_error: self.last_error,
            settled_at: self.settled_at.as_deref().map(parse_timestamp).transpose()?,
        })
    }
}

fn parse_timestamp(s: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Serialization(format!("bad timestamp {s:?}: {e}")))
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("store lock poisoned".into()))
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- Audit log (append-only)
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                event_json TEXT NOT NULL
            );

            -- Overstay charges not collected at exit
            CREATE TABLE IF NOT EXISTS unsettled_charges (
                charge_id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                vehicle_number TEXT,
                fee_amount TEXT NOT NULL,
                exited_at TEXT NOT NULL,
                last_error TEXT NOT NULL,
                settled_at TEXT
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp);
            CREATE INDEX IF NOT EXISTS idx_charges_open ON unsettled_charges(settled_at, exited_at);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }
}

impl Store for SqliteStore {
    fn append_audit(&self, mut event: AuditEvent) -> StoreResult<()> {
        let conn = self.conn()?;
        let event_json = serde_json::to_string(&event.event)?;

        conn.execute(
            "INSERT INTO audit_log (timestamp, event_json) VALUES (?, ?)",
            params![event.timestamp.to_rfc3339(), event_json],
        )?;

        event.id = conn.last_insert_rowid();
        debug!(event_id = event.id, "Audit event appended");

        Ok(())
    }

    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, event_json FROM audit_log ORDER BY id DESC LIMIT ?",
        )?;

        let rows = stmt.query_map([limit], |row| {
            let id: i64 = row.get(0)?;
            let timestamp_str: String = row.get(1)?;
            let event_json: String = row.get(2)?;
            Ok((id, timestamp_str, event_json))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, timestamp_str, event_json) = row?;
            let timestamp = parse_timestamp(&timestamp_str)?;
            let event: AuditEventType = serde_json::from_str(&event_json)?;

            events.push(AuditEvent {
                id,
                timestamp,
                event,
            });
        }

        Ok(events)
    }

    fn record_unsettled_charge(&self, charge: &UnsettledCharge) -> StoreResult<()> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO unsettled_charges
                (charge_id, session_id, vehicle_number, fee_amount, exited_at, last_error, settled_at)
            VALUES (?, ?, ?, ?, ?, ?, NULL)
            ON CONFLICT(charge_id)
            DO UPDATE SET last_error = excluded.last_error, settled_at = NULL
            "#,
            params![
                charge.charge_id.as_str(),
                charge.session_id.as_str(),
                charge.vehicle_number,
                charge.fee_amount.to_string(),
                charge.exited_at.to_rfc3339(),
                charge.last_error,
            ],
        )?;

        debug!(
            charge_id = %charge.charge_id,
            session_id = %charge.session_id,
            fee = %charge.fee_amount,
            "Unsettled charge recorded"
        );
        Ok(())
    }

    fn get_charge(&self, charge_id: &ChargeId) -> StoreResult<Option<UnsettledCharge>> {
        let conn = self.conn()?;

        let row = conn
            .query_row(
                &format!("SELECT {CHARGE_COLUMNS} FROM unsettled_charges WHERE charge_id = ?"),
                [charge_id.as_str()],
                ChargeRow::from_row,
            )
            .optional()?;

        row.map(ChargeRow::decode).transpose()
    }

    fn list_unsettled_charges(&self) -> StoreResult<Vec<UnsettledCharge>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {CHARGE_COLUMNS} FROM unsettled_charges \
             WHERE settled_at IS NULL ORDER BY exited_at ASC"
        ))?;

        let rows = stmt.query_map([], ChargeRow::from_row)?;

        let mut charges = Vec::new();
        for row in rows {
            charges.push(row?.decode()?);
        }
        Ok(charges)
    }

    fn update_charge_error(&self, charge_id: &ChargeId, error: &str) -> StoreResult<()> {
        let conn = self.conn()?;

        let updated = conn.execute(
            "UPDATE unsettled_charges SET last_error = ? WHERE charge_id = ? AND settled_at IS NULL",
            params![error, charge_id.as_str()],
        )?;

        if updated == 0 {
            return Err(StoreError::NotFound(format!("unsettled charge {charge_id}")));
        }
        Ok(())
    }

    fn mark_charge_settled(&self, charge_id: &ChargeId, at: DateTime<Utc>) -> StoreResult<bool> {
        let conn = self.conn()?;

        let updated = conn.execute(
            "UPDATE unsettled_charges SET settled_at = ? WHERE charge_id = ? AND settled_at IS NULL",
            params![at.to_rfc3339(), charge_id.as_str()],
        )?;

        debug!(charge_id = %charge_id, updated, "Charge settlement recorded");
        Ok(updated > 0)
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn charge(id: &str, hour: u32) -> UnsettledCharge {
        UnsettledCharge {
            charge_id: ChargeId::new(id),
            session_id: SessionId::new(format!("PS-{id}")),
            vehicle_number: Some("KL01AB1234".into()),
            fee_amount: Decimal::new(4050, 2),
            exited_at: Utc.with_ymd_and_hms(2025, 1, 15, hour, 0, 0).unwrap(),
            last_error: "connection reset".into(),
            settled_at: None,
        }
    }

    #[test]
    fn test_in_memory_store() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.is_healthy());
    }

    #[test]
    fn test_audit_log() {
        let store = SqliteStore::in_memory().unwrap();

        store
            .append_audit(AuditEvent::new(AuditEventType::ConsoleStarted))
            .unwrap();
        store
            .append_audit(AuditEvent::new(AuditEventType::ChargeReconciled {
                charge_id: ChargeId::new("ovs-1"),
            }))
            .unwrap();

        let events = store.get_recent_audits(10).unwrap();
        assert_eq!(events.len(), 2);
        // Newest first
        assert!(matches!(
            events[0].event,
            AuditEventType::ChargeReconciled { .. }
        ));
        assert!(matches!(events[1].event, AuditEventType::ConsoleStarted));
    }

    #[test]
    fn test_ledger_roundtrip_keeps_exact_amount() {
        let store = SqliteStore::in_memory().unwrap();
        store.record_unsettled_charge(&charge("ovs-1", 10)).unwrap();

        let stored = store.get_charge(&ChargeId::new("ovs-1")).unwrap().unwrap();
        assert_eq!(stored, charge("ovs-1", 10));
        assert_eq!(stored.fee_amount.to_string(), "40.50");
    }

    #[test]
    fn test_unsettled_listing_order_and_settlement() {
        let store = SqliteStore::in_memory().unwrap();
        store.record_unsettled_charge(&charge("late", 14)).unwrap();
        store.record_unsettled_charge(&charge("early", 9)).unwrap();

        let open = store.list_unsettled_charges().unwrap();
        let ids: Vec<_> = open.iter().map(|c| c.charge_id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);

        let now = Utc.with_ymd_and_hms(2025, 1, 15, 18, 0, 0).unwrap();
        assert!(store.mark_charge_settled(&ChargeId::new("early"), now).unwrap());
        // Second settlement is a no-op
        assert!(!store.mark_charge_settled(&ChargeId::new("early"), now).unwrap());

        let open = store.list_unsettled_charges().unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].charge_id.as_str(), "late");

        let settled = store.get_charge(&ChargeId::new("early")).unwrap().unwrap();
        assert!(settled.is_settled());
    }

    #[test]
    fn test_rerecord_updates_error() {
        let store = SqliteStore::in_memory().unwrap();
        store.record_unsettled_charge(&charge("ovs-1", 10)).unwrap();

        let mut again = charge("ovs-1", 10);
        again.last_error = "HTTP 502".into();
        store.record_unsettled_charge(&again).unwrap();

        let open = store.list_unsettled_charges().unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].last_error, "HTTP 502");

        store
            .update_charge_error(&ChargeId::new("ovs-1"), "timeout")
            .unwrap();
        assert_eq!(
            store.get_charge(&ChargeId::new("ovs-1")).unwrap().unwrap().last_error,
            "timeout"
        );
        assert!(matches!(
            store.update_charge_error(&ChargeId::new("missing"), "x"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("parkdesk.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.record_unsettled_charge(&charge("ovs-9", 11)).unwrap();
        }

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(reopened.list_unsettled_charges().unwrap().len(), 1);
    }
}
