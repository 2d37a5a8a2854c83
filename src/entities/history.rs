// 🧾 Payment History - snapshots of settled card payments
//
// Marking a payment as paid moves it here: the snapshot keeps the bank
// name so the record survives the bank being deleted later.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::db::{date_column, record_event};
use crate::entities::bank::get_bank_by_id;
use crate::entities::payment::get_payment_by_id;
use crate::error::TrackerError;
use crate::period::format_date;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    #[serde(default)]
    pub id: i64,
    pub bank_id: i64,
    /// Bank name at the time of payment
    pub bank_name: String,
    pub debt: f64,
    pub minimum_payment: Option<f64>,
    pub due_date: NaiveDate,
    /// Day the user marked the payment as paid
    pub paid_date: NaiveDate,
    pub note: Option<String>,
}

impl PaymentRecord {
    /// Paid after the due date
    pub fn was_late(&self) -> bool {
        self.paid_date > self.due_date
    }

    fn from_row(row: &Row) -> rusqlite::Result<PaymentRecord> {
        Ok(PaymentRecord {
            id: row.get(0)?,
            bank_id: row.get(1)?,
            bank_name: row.get(2)?,
            debt: row.get(3)?,
            minimum_payment: row.get(4)?,
            due_date: date_column(row.get(5)?, 5)?,
            paid_date: date_column(row.get(6)?, 6)?,
            note: row.get(7)?,
        })
    }
}

const HISTORY_COLUMNS: &str =
    "id, bank_id, bank_name, debt, minimum_payment, due_date, paid_date, note";

pub fn insert_history(conn: &Connection, record: &PaymentRecord) -> Result<i64> {
    conn.execute(
        "INSERT INTO payment_history (
            bank_id, bank_name, debt, minimum_payment, due_date, paid_date, note
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            record.bank_id,
            record.bank_name,
            record.debt,
            record.minimum_payment,
            format_date(record.due_date),
            format_date(record.paid_date),
            record.note,
        ],
    )
    .context("Failed to insert payment history record")?;

    Ok(conn.last_insert_rowid())
}

/// Settle a card payment: snapshot it into history and delete the original
///
/// Both writes happen in one transaction.
pub fn mark_paid_and_archive(
    conn: &Connection,
    payment_id: i64,
    paid_on: NaiveDate,
) -> Result<PaymentRecord> {
    let tx = conn.unchecked_transaction()?;

    let payment = get_payment_by_id(&tx, payment_id)?
        .ok_or(TrackerError::PaymentNotFound(payment_id))?;
    let bank = get_bank_by_id(&tx, payment.bank_id)?
        .ok_or(TrackerError::BankNotFound(payment.bank_id))?;

    let mut record = PaymentRecord {
        id: 0,
        bank_id: bank.id,
        bank_name: bank.name,
        debt: payment.debt,
        minimum_payment: payment.minimum_payment,
        due_date: payment.due_date,
        paid_date: paid_on,
        note: payment.note.clone(),
    };
    record.id = insert_history(&tx, &record)?;

    tx.execute("DELETE FROM card_payments WHERE id = ?1", params![payment_id])?;

    record_event(
        &tx,
        "payment_archived",
        "card_payment",
        payment_id,
        serde_json::json!({
            "history_id": record.id,
            "bank": record.bank_name,
            "debt": record.debt,
            "paid_date": format_date(paid_on),
        }),
    );

    tx.commit()?;
    log::info!(
        "payment {} ({}, {:.2}) archived as history {}",
        payment_id,
        record.bank_name,
        record.debt,
        record.id
    );
    Ok(record)
}

/// All history, most recent payment first
pub fn get_all_history(conn: &Connection) -> Result<Vec<PaymentRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM payment_history ORDER BY paid_date DESC, id DESC",
        HISTORY_COLUMNS
    ))?;
    let records = stmt
        .query_map([], PaymentRecord::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

pub fn get_history_by_bank(conn: &Connection, bank_id: i64) -> Result<Vec<PaymentRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM payment_history WHERE bank_id = ?1 ORDER BY paid_date DESC, id DESC",
        HISTORY_COLUMNS
    ))?;
    let records = stmt
        .query_map(params![bank_id], PaymentRecord::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

pub fn delete_history(conn: &Connection, id: i64) -> Result<()> {
    let changed = conn.execute("DELETE FROM payment_history WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(TrackerError::HistoryNotFound(id).into());
    }
    record_event(conn, "history_deleted", "payment_history", id, serde_json::json!({}));
    Ok(())
}

// ============================================================================
// CSV EXPORT
// ============================================================================

#[derive(Debug, Serialize)]
struct HistoryCsvRow<'a> {
    #[serde(rename = "Paid_Date")]
    paid_date: String,
    #[serde(rename = "Due_Date")]
    due_date: String,
    #[serde(rename = "Bank")]
    bank: &'a str,
    #[serde(rename = "Debt")]
    debt: f64,
    #[serde(rename = "Minimum_Payment")]
    minimum_payment: Option<f64>,
    #[serde(rename = "Note")]
    note: Option<&'a str>,
}

/// Write history as CSV; returns the number of rows written
pub fn export_history_csv<W: Write>(records: &[PaymentRecord], writer: W) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);

    for record in records {
        wtr.serialize(HistoryCsvRow {
            paid_date: format_date(record.paid_date),
            due_date: format_date(record.due_date),
            bank: &record.bank_name,
            debt: record.debt,
            minimum_payment: record.minimum_payment,
            note: record.note.as_deref(),
        })
        .context("Failed to write history row")?;
    }

    wtr.flush()?;
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::setup_database;
    use crate::entities::bank::{delete_bank, insert_bank, Bank};
    use crate::entities::payment::{get_all_payments, insert_payment, CardPayment, CREDIT};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn setup() -> (Connection, i64, i64) {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        let bank_id = insert_bank(&conn, &Bank::new("Santander").with_payment_day(10)).unwrap();
        let payment = CardPayment::new(bank_id, CREDIT, 4200.0, date(2025, 11, 10))
            .with_minimum(Some(300.0))
            .with_note(Some("súper".to_string()));
        let payment_id = insert_payment(&conn, &payment).unwrap();
        (conn, bank_id, payment_id)
    }

    #[test]
    fn test_mark_paid_moves_payment_to_history() {
        let (conn, bank_id, payment_id) = setup();

        let record = mark_paid_and_archive(&conn, payment_id, date(2025, 11, 8)).unwrap();

        assert_eq!(record.bank_id, bank_id);
        assert_eq!(record.bank_name, "Santander");
        assert_eq!(record.debt, 4200.0);
        assert_eq!(record.minimum_payment, Some(300.0));
        assert_eq!(record.due_date, date(2025, 11, 10));
        assert_eq!(record.paid_date, date(2025, 11, 8));
        assert_eq!(record.note.as_deref(), Some("súper"));
        assert!(!record.was_late());

        assert!(get_all_payments(&conn).unwrap().is_empty());
        let history = get_all_history(&conn).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0], record);

        println!("✅ Mark-paid archive test passed");
    }

    #[test]
    fn test_mark_paid_unknown_payment() {
        let (conn, _, _) = setup();
        let err = mark_paid_and_archive(&conn, 999, date(2025, 11, 8)).unwrap_err();
        assert_eq!(
            err.downcast_ref::<TrackerError>(),
            Some(&TrackerError::PaymentNotFound(999))
        );
        assert!(get_all_history(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_history_survives_bank_deletion() {
        let (conn, bank_id, payment_id) = setup();
        mark_paid_and_archive(&conn, payment_id, date(2025, 11, 12)).unwrap();

        delete_bank(&conn, bank_id).unwrap();

        let history = get_history_by_bank(&conn, bank_id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].bank_name, "Santander");
        assert!(history[0].was_late());
    }

    #[test]
    fn test_history_order_and_delete() {
        let (conn, bank_id, _) = setup();
        for (paid, debt) in [(date(2025, 9, 1), 100.0), (date(2025, 10, 1), 200.0)] {
            insert_history(
                &conn,
                &PaymentRecord {
                    id: 0,
                    bank_id,
                    bank_name: "Santander".to_string(),
                    debt,
                    minimum_payment: None,
                    due_date: paid,
                    paid_date: paid,
                    note: None,
                },
            )
            .unwrap();
        }

        let history = get_all_history(&conn).unwrap();
        assert_eq!(history[0].debt, 200.0);
        assert_eq!(history[1].debt, 100.0);

        delete_history(&conn, history[0].id).unwrap();
        let err = delete_history(&conn, history[0].id).unwrap_err();
        assert_eq!(
            err.downcast_ref::<TrackerError>(),
            Some(&TrackerError::HistoryNotFound(history[0].id))
        );
        assert_eq!(get_all_history(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_export_csv() {
        let (conn, _, payment_id) = setup();
        mark_paid_and_archive(&conn, payment_id, date(2025, 11, 8)).unwrap();

        let mut buffer = Vec::new();
        let written = export_history_csv(&get_all_history(&conn).unwrap(), &mut buffer).unwrap();
        assert_eq!(written, 1);

        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("Paid_Date,Due_Date,Bank,Debt,Minimum_Payment,Note")
        );
        assert_eq!(lines.next(), Some("2025-11-08,2025-11-10,Santander,4200.0,300.0,súper"));

        println!("✅ History CSV export test passed");
    }
}
