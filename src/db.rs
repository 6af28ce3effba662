// 🗃️ SQLite Archive Backend
// Snapshots as JSON payload rows + an events table as audit trail
// ("Every archive decision is an event", including no-ops)

use crate::error::LedgerResult;
use crate::snapshot::Snapshot;
use crate::store::SnapshotStore;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Archive audit event
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub period: u32,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(event_type: &str, period: u32, data: serde_json::Value, actor: &str) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            period,
            data,
            actor: actor.to_string(),
        }
    }
}

pub fn setup_database(conn: &Connection) -> LedgerResult<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Snapshots Table (one row per period, append-only)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS snapshots (
            period INTEGER PRIMARY KEY,
            snapshot_id TEXT UNIQUE NOT NULL,
            built_at TEXT NOT NULL,
            source TEXT NOT NULL,
            signature TEXT NOT NULL,
            participant_count INTEGER NOT NULL,
            payload TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            period INTEGER NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_period ON events(period)",
        [],
    )?;

    Ok(())
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> LedgerResult<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, period, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.period,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// All events in insertion order
pub fn get_events(conn: &Connection) -> LedgerResult<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, period, data, actor
         FROM events
         ORDER BY id ASC",
    )?;

    let events = stmt
        .query_map([], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(4)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?
                    .with_timezone(&Utc),
                event_type: row.get(2)?,
                period: row.get(3)?,
                data: serde_json::from_str(&data_json)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?,
                actor: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

// ============================================================================
// SQLITE STORE
// ============================================================================

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> LedgerResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        setup_database(&conn)?;
        Ok(SqliteStore { conn })
    }

    pub fn open_in_memory() -> LedgerResult<Self> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;
        Ok(SqliteStore { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn events(&self) -> LedgerResult<Vec<Event>> {
        get_events(&self.conn)
    }
}

impl SnapshotStore for SqliteStore {
    fn periods(&self) -> LedgerResult<Vec<u32>> {
        let mut stmt = self
            .conn
            .prepare("SELECT period FROM snapshots ORDER BY period ASC")?;
        let periods = stmt
            .query_map([], |row| row.get::<_, u32>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(periods)
    }

    fn read(&self, period: u32) -> LedgerResult<Option<Snapshot>> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM snapshots WHERE period = ?1",
                params![period],
                |row| row.get(0),
            )
            .optional()?;

        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn persist(&mut self, snapshot: &Snapshot) -> LedgerResult<()> {
        let payload = serde_json::to_string(snapshot)?;
        let tx = self.conn.transaction()?;

        // PRIMARY KEY on period: an existing period is never overwritten
        tx.execute(
            "INSERT INTO snapshots (
                period, snapshot_id, built_at, source, signature, participant_count, payload
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                snapshot.period,
                snapshot.snapshot_id,
                snapshot.built_at.to_rfc3339(),
                snapshot.source,
                snapshot.signature,
                snapshot.count() as i64,
                payload,
            ],
        )?;

        let event = Event::new(
            "snapshot_archived",
            snapshot.period,
            serde_json::json!({
                "signature": snapshot.signature,
                "participants": snapshot.count(),
                "source": snapshot.source,
            }),
            "snapshot_builder",
        );
        insert_event(&tx, &event)?;

        tx.commit()?;
        Ok(())
    }

    fn note_unchanged(&mut self, latest_period: u32, signature: &str) -> LedgerResult<()> {
        let event = Event::new(
            "archive_unchanged",
            latest_period,
            serde_json::json!({ "signature": signature }),
            "snapshot_builder",
        );
        insert_event(&self.conn, &event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::participant::{Participant, Trend};
    use crate::store::AppendOutcome;

    fn entry(id: &str, power: f64) -> Participant {
        Participant {
            id: id.to_string(),
            name: id.to_uppercase(),
            faction: "Blue".to_string(),
            power,
            observed_power: power,
            trend: Trend::New,
            rank: 1,
            win_rate: None,
            elimination_period: None,
            is_eliminated: false,
        }
    }

    #[test]
    fn test_idempotency_append_twice() {
        let mut store = SqliteStore::open_in_memory().unwrap();

        let first = store
            .append(Snapshot::new(0, "roster.csv", vec![entry("p1", 3.0)]))
            .unwrap();
        let second = store
            .append(Snapshot::new(1, "roster.csv", vec![entry("p1", 3.0)]))
            .unwrap();

        assert_eq!(first, AppendOutcome::Archived { period: 0 });
        assert_eq!(second, AppendOutcome::Unchanged { latest_period: 0 });
        assert_eq!(store.periods().unwrap(), vec![0]);

        let events = store.events().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "snapshot_archived");
        assert_eq!(events[1].event_type, "archive_unchanged");
    }

    #[test]
    fn test_read_range_and_latest() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        for (period, power) in [(0, 1.0), (1, 2.0), (2, 3.0)] {
            store.append(Snapshot::new(period, "t", vec![entry("p1", power)])).unwrap();
        }

        let range = store.read_range(1, 2).unwrap();
        assert_eq!(range.len(), 2);
        assert_eq!(range[1].get("p1").unwrap().power, 3.0);
        assert_eq!(store.latest().unwrap().unwrap().period, 2);
    }

    #[test]
    fn test_read_range_missing_periods() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.append(Snapshot::new(0, "t", vec![entry("p1", 1.0)])).unwrap();

        match store.read_range(0, 3) {
            Err(LedgerError::MissingPeriod { missing }) => assert_eq!(missing, vec![1, 2, 3]),
            other => panic!("expected MissingPeriod, got {:?}", other.map(|v| v.len())),
        }
    }
}
