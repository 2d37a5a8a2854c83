use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Event for audit trail: every write leaves a row behind
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

/// Open (or create) the database file and make sure the schema exists
pub fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database at {}", path.display()))?;

    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    setup_database(&conn)?;
    log::debug!("database ready at {}", path.display());
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Cascade deletes (bank -> payments, institution -> savings) need this per connection
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Banks
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS banks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            logo_path TEXT,
            credit_limit REAL,
            statement_day INTEGER,
            payment_day INTEGER
        )",
        [],
    )?;

    // ==========================================================================
    // Card payments (one row per bank per billing period, or per MSI installment)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS card_payments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            bank_id INTEGER NOT NULL REFERENCES banks(id) ON DELETE CASCADE,
            card_type TEXT NOT NULL,
            debt REAL NOT NULL,
            minimum_payment REAL,
            due_date TEXT NOT NULL,
            period TEXT NOT NULL,
            is_paid INTEGER NOT NULL DEFAULT 0,
            note TEXT,
            msi_group_id TEXT,
            msi_description TEXT,
            msi_current INTEGER,
            msi_total INTEGER,
            msi_total_amount REAL,
            msi_monthly_amount REAL
        )",
        [],
    )?;

    // ==========================================================================
    // Payment history (snapshot of settled payments; survives bank deletion)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS payment_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            bank_id INTEGER NOT NULL,
            bank_name TEXT NOT NULL,
            debt REAL NOT NULL,
            minimum_payment REAL,
            due_date TEXT NOT NULL,
            paid_date TEXT NOT NULL,
            note TEXT
        )",
        [],
    )?;

    // ==========================================================================
    // Financial institutions and savings positions
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS institutions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            logo_path TEXT,
            investment_type TEXT NOT NULL,
            annual_yield REAL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS savings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            institution_id INTEGER NOT NULL REFERENCES institutions(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            description TEXT,
            created_on TEXT NOT NULL,
            card_amount REAL,
            stock_quantity REAL,
            stock_price REAL,
            stock_symbol TEXT,
            crypto_quantity REAL,
            crypto_price REAL,
            crypto_symbol TEXT,
            cetes_amount REAL,
            cetes_term_days INTEGER,
            cetes_rate REAL
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
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_payments_due ON card_payments(due_date)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_payments_bank_period ON card_payments(bank_id, period)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_payments_msi_group ON card_payments(msi_group_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_savings_institution ON savings(institution_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Record an audit event; a failing audit write never fails the caller
pub fn record_event(
    conn: &Connection,
    event_type: &str,
    entity_type: &str,
    entity_id: impl ToString,
    data: serde_json::Value,
) {
    let event = Event::new(event_type, entity_type, &entity_id.to_string(), data, "card_tracker");
    if let Err(e) = insert_event(conn, &event) {
        log::warn!("failed to record {} event: {}", event_type, e);
    }
}

/// Get events for a specific entity
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC, id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp_str)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?
                    .with_timezone(&Utc),
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json)
                    .map_err(|_| rusqlite::Error::InvalidQuery)?,
                actor: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

/// Read a stored "YYYY-MM-DD" column back into a NaiveDate
pub(crate) fn date_column(value: String, idx: usize) -> rusqlite::Result<chrono::NaiveDate> {
    crate::period::parse_date(&value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
