// 🏦 Bank Entity - issuer of the cards we track
//
// A bank carries its billing calendar: the statement-cut day and the
// payment-due day. MSI plans cannot be generated without the payment day.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::record_event;
use crate::error::{check_day_of_month, TrackerError};

// ============================================================================
// BANK ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bank {
    /// Row id (0 until inserted)
    #[serde(default)]
    pub id: i64,

    /// Display name, e.g. "BBVA", "Santander"
    pub name: String,

    /// Path to a logo image; stored as-is, never read
    pub logo_path: Option<String>,

    /// Predefined credit limit
    pub credit_limit: Option<f64>,

    /// Statement-cut day of month (1-31)
    pub statement_day: Option<u32>,

    /// Payment-due day of month (1-31)
    pub payment_day: Option<u32>,
}

impl Bank {
    pub fn new(name: impl Into<String>) -> Self {
        Bank {
            id: 0,
            name: name.into(),
            logo_path: None,
            credit_limit: None,
            statement_day: None,
            payment_day: None,
        }
    }

    pub fn with_payment_day(mut self, day: u32) -> Self {
        self.payment_day = Some(day);
        self
    }

    pub fn with_statement_day(mut self, day: u32) -> Self {
        self.statement_day = Some(day);
        self
    }

    pub fn with_credit_limit(mut self, limit: f64) -> Self {
        self.credit_limit = Some(limit);
        self
    }

    /// Check if a string matches this bank name (case-insensitive, either direction)
    pub fn matches(&self, bank_string: &str) -> bool {
        let needle = bank_string.trim().to_lowercase();
        if needle.is_empty() {
            return false;
        }
        let name = self.name.to_lowercase();
        name.contains(&needle) || needle.contains(&name)
    }

    pub fn validate(&self) -> Result<(), TrackerError> {
        check_day_of_month(self.statement_day)?;
        check_day_of_month(self.payment_day)?;
        if let Some(limit) = self.credit_limit {
            if !limit.is_finite() || limit < 0.0 {
                return Err(TrackerError::InvalidAmount(limit));
            }
        }
        Ok(())
    }

    /// Credit usage for a given debt, when this bank has a positive limit
    pub fn credit_usage(&self, debt: f64) -> Option<CreditUsage> {
        self.credit_limit.and_then(|limit| CreditUsage::compute(debt, limit))
    }

    fn from_row(row: &Row) -> rusqlite::Result<Bank> {
        Ok(Bank {
            id: row.get(0)?,
            name: row.get(1)?,
            logo_path: row.get(2)?,
            credit_limit: row.get(3)?,
            statement_day: row.get(4)?,
            payment_day: row.get(5)?,
        })
    }
}

// ============================================================================
// CREDIT USAGE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UsageLevel {
    /// Under 50% of the limit
    Low,
    /// 50% to 79%
    Medium,
    /// 80% and above
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CreditUsage {
    pub limit: f64,
    pub available: f64,
    /// Whole percent, truncated
    pub percent: i64,
    pub level: UsageLevel,
}

impl CreditUsage {
    pub fn compute(debt: f64, limit: f64) -> Option<CreditUsage> {
        if limit.is_nan() || limit <= 0.0 {
            return None;
        }

        let percent = (debt / limit * 100.0) as i64;
        let level = match percent {
            p if p >= 80 => UsageLevel::High,
            p if p >= 50 => UsageLevel::Medium,
            _ => UsageLevel::Low,
        };

        Some(CreditUsage {
            limit,
            available: limit - debt,
            percent,
            level,
        })
    }

    /// Fraction of the limit in use, clamped to 0.0..=1.0 (for progress bars)
    pub fn ratio(&self) -> f64 {
        (self.percent as f64 / 100.0).clamp(0.0, 1.0)
    }
}

// ============================================================================
// REPOSITORY
// ============================================================================

const BANK_COLUMNS: &str = "id, name, logo_path, credit_limit, statement_day, payment_day";

pub fn insert_bank(conn: &Connection, bank: &Bank) -> Result<i64> {
    bank.validate()?;

    conn.execute(
        "INSERT INTO banks (name, logo_path, credit_limit, statement_day, payment_day)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            bank.name,
            bank.logo_path,
            bank.credit_limit,
            bank.statement_day,
            bank.payment_day,
        ],
    )
    .context("Failed to insert bank")?;

    let id = conn.last_insert_rowid();
    record_event(conn, "bank_created", "bank", id, serde_json::json!({ "name": bank.name }));
    log::debug!("inserted bank {} ({})", id, bank.name);
    Ok(id)
}

pub fn update_bank(conn: &Connection, bank: &Bank) -> Result<()> {
    bank.validate()?;

    let changed = conn.execute(
        "UPDATE banks
         SET name = ?2, logo_path = ?3, credit_limit = ?4, statement_day = ?5, payment_day = ?6
         WHERE id = ?1",
        params![
            bank.id,
            bank.name,
            bank.logo_path,
            bank.credit_limit,
            bank.statement_day,
            bank.payment_day,
        ],
    )?;

    if changed == 0 {
        return Err(TrackerError::BankNotFound(bank.id).into());
    }

    record_event(conn, "bank_updated", "bank", bank.id, serde_json::to_value(bank)?);
    Ok(())
}

/// Delete a bank; its pending card payments go with it (history is kept)
pub fn delete_bank(conn: &Connection, id: i64) -> Result<()> {
    let changed = conn.execute("DELETE FROM banks WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(TrackerError::BankNotFound(id).into());
    }

    record_event(conn, "bank_deleted", "bank", id, serde_json::json!({}));
    Ok(())
}

pub fn get_bank_by_id(conn: &Connection, id: i64) -> Result<Option<Bank>> {
    let bank = conn
        .query_row(
            &format!("SELECT {} FROM banks WHERE id = ?1", BANK_COLUMNS),
            params![id],
            Bank::from_row,
        )
        .optional()?;
    Ok(bank)
}

/// All banks, name ascending
pub fn get_all_banks(conn: &Connection) -> Result<Vec<Bank>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM banks ORDER BY name COLLATE NOCASE ASC",
        BANK_COLUMNS
    ))?;

    let banks = stmt
        .query_map([], Bank::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(banks)
}

// ============================================================================
// BANK REGISTRY
// ============================================================================

/// In-memory lookup over a loaded set of banks
///
/// Used wherever a list of payments needs bank names or days without going
/// back to the database per row.
#[derive(Debug, Clone, Default)]
pub struct BankRegistry {
    banks: Vec<Bank>,
}

impl BankRegistry {
    pub fn new(banks: Vec<Bank>) -> Self {
        BankRegistry { banks }
    }

    pub fn load(conn: &Connection) -> Result<Self> {
        Ok(BankRegistry::new(get_all_banks(conn)?))
    }

    pub fn find_by_id(&self, id: i64) -> Option<&Bank> {
        self.banks.iter().find(|b| b.id == id)
    }

    /// Exact (case-insensitive) name match first, then partial match
    pub fn find_by_name(&self, name: &str) -> Option<&Bank> {
        let lower = name.trim().to_lowercase();
        self.banks
            .iter()
            .find(|b| b.name.to_lowercase() == lower)
            .or_else(|| self.banks.iter().find(|b| b.matches(name)))
    }

    /// Resolve "3" (id) or "BBVA" (name)
    pub fn resolve(&self, key: &str) -> Option<&Bank> {
        match key.trim().parse::<i64>() {
            Ok(id) => self.find_by_id(id),
            Err(_) => self.find_by_name(key),
        }
    }

    pub fn name_of(&self, id: i64) -> Option<&str> {
        self.find_by_id(id).map(|b| b.name.as_str())
    }

    pub fn all(&self) -> &[Bank] {
        &self.banks
    }

    pub fn count(&self) -> usize {
        self.banks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_events_for_entity, setup_database};

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    #[test]
    fn test_bank_crud() {
        let conn = test_conn();

        let bank = Bank::new("BBVA").with_payment_day(15).with_credit_limit(20000.0);
        let id = insert_bank(&conn, &bank).unwrap();

        let mut stored = get_bank_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(stored.name, "BBVA");
        assert_eq!(stored.payment_day, Some(15));
        assert_eq!(stored.statement_day, None);

        stored.statement_day = Some(28);
        update_bank(&conn, &stored).unwrap();
        assert_eq!(
            get_bank_by_id(&conn, id).unwrap().unwrap().statement_day,
            Some(28)
        );

        delete_bank(&conn, id).unwrap();
        assert!(get_bank_by_id(&conn, id).unwrap().is_none());

        let events = get_events_for_entity(&conn, "bank", &id.to_string()).unwrap();
        assert_eq!(events.len(), 3);

        println!("✅ Bank CRUD test passed");
    }

    #[test]
    fn test_banks_sorted_by_name() {
        let conn = test_conn();
        insert_bank(&conn, &Bank::new("Santander")).unwrap();
        insert_bank(&conn, &Bank::new("american express")).unwrap();
        insert_bank(&conn, &Bank::new("BBVA")).unwrap();

        let names: Vec<String> = get_all_banks(&conn)
            .unwrap()
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(names, vec!["american express", "BBVA", "Santander"]);
    }

    #[test]
    fn test_invalid_payment_day_rejected() {
        let conn = test_conn();
        let err = insert_bank(&conn, &Bank::new("Bad").with_payment_day(32)).unwrap_err();
        assert_eq!(
            err.downcast_ref::<TrackerError>(),
            Some(&TrackerError::InvalidDayOfMonth(32))
        );
    }

    #[test]
    fn test_update_missing_bank() {
        let conn = test_conn();
        let mut ghost = Bank::new("Ghost");
        ghost.id = 99;
        let err = update_bank(&conn, &ghost).unwrap_err();
        assert_eq!(
            err.downcast_ref::<TrackerError>(),
            Some(&TrackerError::BankNotFound(99))
        );
    }

    #[test]
    fn test_credit_usage_levels() {
        let usage = CreditUsage::compute(4000.0, 10000.0).unwrap();
        assert_eq!(usage.percent, 40);
        assert_eq!(usage.level, UsageLevel::Low);
        assert_eq!(usage.available, 6000.0);

        let usage = CreditUsage::compute(5000.0, 10000.0).unwrap();
        assert_eq!(usage.level, UsageLevel::Medium);

        let usage = CreditUsage::compute(7999.0, 10000.0).unwrap();
        assert_eq!(usage.percent, 79);
        assert_eq!(usage.level, UsageLevel::Medium);

        let usage = CreditUsage::compute(12000.0, 10000.0).unwrap();
        assert_eq!(usage.level, UsageLevel::High);
        assert_eq!(usage.available, -2000.0);
        assert_eq!(usage.ratio(), 1.0);

        assert!(CreditUsage::compute(100.0, 0.0).is_none());
        assert!(Bank::new("No limit").credit_usage(100.0).is_none());

        println!("✅ Credit usage test passed");
    }

    #[test]
    fn test_registry_lookup() {
        let mut bbva = Bank::new("BBVA");
        bbva.id = 1;
        let mut santander = Bank::new("Santander");
        santander.id = 2;
        let registry = BankRegistry::new(vec![bbva, santander]);

        assert_eq!(registry.resolve("2").unwrap().name, "Santander");
        assert_eq!(registry.resolve("bbva").unwrap().id, 1);
        assert_eq!(registry.resolve("santa").unwrap().id, 2);
        assert!(registry.resolve("Banorte").is_none());
        assert_eq!(registry.name_of(1), Some("BBVA"));
        assert_eq!(registry.count(), 2);
    }
}
