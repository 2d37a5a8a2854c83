// 💳 Card Payment - one payment obligation for one bank and one billing period
//
// The period is always derived from the due date. MSI installments are plain
// card payments carrying InstallmentInfo; they are paid, listed and reminded
// like any other payment.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::{date_column, record_event};
use crate::error::TrackerError;
use crate::period::{format_date, MonthPeriod};

pub const CREDIT: &str = "Credit";
pub const DEBIT: &str = "Debit";

// ============================================================================
// INSTALLMENT METADATA
// ============================================================================

/// Present only on payments generated from an MSI plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallmentInfo {
    /// "msi_<uuid>", shared by every installment of one purchase
    pub group_id: String,
    pub description: String,
    /// 1-based index of this installment
    pub current: u32,
    pub total: u32,
    pub total_amount: f64,
    pub monthly_amount: f64,
}

impl InstallmentInfo {
    pub fn label(&self) -> String {
        format!("MSI {}/{}", self.current, self.total)
    }

    pub fn is_last(&self) -> bool {
        self.current == self.total
    }
}

// ============================================================================
// CARD PAYMENT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CardPayment {
    pub id: i64,
    pub bank_id: i64,
    /// "Credit" or "Debit"
    pub card_type: String,
    pub debt: f64,
    pub minimum_payment: Option<f64>,
    pub due_date: NaiveDate,
    period: MonthPeriod,
    pub is_paid: bool,
    pub note: Option<String>,
    pub installment: Option<InstallmentInfo>,
}

impl CardPayment {
    pub fn new(bank_id: i64, card_type: &str, debt: f64, due_date: NaiveDate) -> Self {
        CardPayment {
            id: 0,
            bank_id,
            card_type: card_type.to_string(),
            debt,
            minimum_payment: None,
            due_date,
            period: MonthPeriod::from_date(due_date),
            is_paid: false,
            note: None,
            installment: None,
        }
    }

    pub fn with_minimum(mut self, minimum: Option<f64>) -> Self {
        self.minimum_payment = minimum;
        self
    }

    pub fn with_note(mut self, note: Option<String>) -> Self {
        self.note = note.filter(|n| !n.trim().is_empty());
        self
    }

    /// Billing period ("YYYY-MM") of the due date
    pub fn period(&self) -> MonthPeriod {
        self.period
    }

    /// Move the due date; the period follows
    pub fn set_due_date(&mut self, due_date: NaiveDate) {
        self.due_date = due_date;
        self.period = MonthPeriod::from_date(due_date);
    }

    pub fn is_installment(&self) -> bool {
        self.installment.is_some()
    }

    pub fn validate(&self) -> Result<(), TrackerError> {
        if !self.debt.is_finite() || self.debt < 0.0 {
            return Err(TrackerError::InvalidAmount(self.debt));
        }
        if let Some(min) = self.minimum_payment {
            if !min.is_finite() || min < 0.0 {
                return Err(TrackerError::InvalidAmount(min));
            }
        }
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<CardPayment> {
        let due_date = date_column(row.get(5)?, 5)?;
        let group_id: Option<String> = row.get(9)?;

        let installment = match group_id {
            Some(group_id) => Some(InstallmentInfo {
                group_id,
                description: row.get::<_, Option<String>>(10)?.unwrap_or_default(),
                current: row.get::<_, Option<u32>>(11)?.unwrap_or(1),
                total: row.get::<_, Option<u32>>(12)?.unwrap_or(1),
                total_amount: row.get::<_, Option<f64>>(13)?.unwrap_or(0.0),
                monthly_amount: row.get::<_, Option<f64>>(14)?.unwrap_or(0.0),
            }),
            None => None,
        };

        Ok(CardPayment {
            id: row.get(0)?,
            bank_id: row.get(1)?,
            card_type: row.get(2)?,
            debt: row.get(3)?,
            minimum_payment: row.get(4)?,
            due_date,
            // period column is informational; the date is the source of truth
            period: MonthPeriod::from_date(due_date),
            is_paid: row.get(7)?,
            note: row.get(8)?,
            installment,
        })
    }
}

// ============================================================================
// REPOSITORY
// ============================================================================

const PAYMENT_COLUMNS: &str = "id, bank_id, card_type, debt, minimum_payment, due_date, period,
    is_paid, note, msi_group_id, msi_description, msi_current, msi_total,
    msi_total_amount, msi_monthly_amount";

/// Insert without auditing (shared by single inserts and MSI batches)
pub(crate) fn insert_payment_row(conn: &Connection, payment: &CardPayment) -> Result<i64> {
    payment.validate()?;

    let msi = payment.installment.as_ref();
    conn.execute(
        "INSERT INTO card_payments (
            bank_id, card_type, debt, minimum_payment, due_date, period, is_paid, note,
            msi_group_id, msi_description, msi_current, msi_total,
            msi_total_amount, msi_monthly_amount
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            payment.bank_id,
            payment.card_type,
            payment.debt,
            payment.minimum_payment,
            format_date(payment.due_date),
            payment.period.to_string(),
            payment.is_paid,
            payment.note,
            msi.map(|m| m.group_id.as_str()),
            msi.map(|m| m.description.as_str()),
            msi.map(|m| m.current),
            msi.map(|m| m.total),
            msi.map(|m| m.total_amount),
            msi.map(|m| m.monthly_amount),
        ],
    )
    .with_context(|| format!("Failed to insert card payment for bank {}", payment.bank_id))?;

    Ok(conn.last_insert_rowid())
}

pub fn insert_payment(conn: &Connection, payment: &CardPayment) -> Result<i64> {
    let id = insert_payment_row(conn, payment)?;
    record_event(
        conn,
        "payment_created",
        "card_payment",
        id,
        serde_json::json!({
            "bank_id": payment.bank_id,
            "debt": payment.debt,
            "due_date": format_date(payment.due_date),
        }),
    );
    log::debug!("inserted card payment {} due {}", id, payment.due_date);
    Ok(id)
}

pub fn update_payment(conn: &Connection, payment: &CardPayment) -> Result<()> {
    payment.validate()?;

    let changed = conn.execute(
        "UPDATE card_payments
         SET bank_id = ?2, card_type = ?3, debt = ?4, minimum_payment = ?5,
             due_date = ?6, period = ?7, is_paid = ?8, note = ?9
         WHERE id = ?1",
        params![
            payment.id,
            payment.bank_id,
            payment.card_type,
            payment.debt,
            payment.minimum_payment,
            format_date(payment.due_date),
            payment.period.to_string(),
            payment.is_paid,
            payment.note,
        ],
    )?;

    if changed == 0 {
        return Err(TrackerError::PaymentNotFound(payment.id).into());
    }

    record_event(conn, "payment_updated", "card_payment", payment.id, serde_json::to_value(payment)?);
    Ok(())
}

pub fn delete_payment(conn: &Connection, id: i64) -> Result<()> {
    let changed = conn.execute("DELETE FROM card_payments WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(TrackerError::PaymentNotFound(id).into());
    }
    record_event(conn, "payment_deleted", "card_payment", id, serde_json::json!({}));
    Ok(())
}

pub fn get_payment_by_id(conn: &Connection, id: i64) -> Result<Option<CardPayment>> {
    let payment = conn
        .query_row(
            &format!("SELECT {} FROM card_payments WHERE id = ?1", PAYMENT_COLUMNS),
            params![id],
            CardPayment::from_row,
        )
        .optional()?;
    Ok(payment)
}

fn query_payments(
    conn: &Connection,
    filter: &str,
    args: &[&dyn rusqlite::ToSql],
) -> Result<Vec<CardPayment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM card_payments {} ORDER BY due_date ASC, id ASC",
        PAYMENT_COLUMNS, filter
    ))?;

    let payments = stmt
        .query_map(args, CardPayment::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(payments)
}

/// All payments, due date ascending
pub fn get_all_payments(conn: &Connection) -> Result<Vec<CardPayment>> {
    query_payments(conn, "", params![])
}

/// Unpaid payments, due date ascending
pub fn get_pending_payments(conn: &Connection) -> Result<Vec<CardPayment>> {
    query_payments(conn, "WHERE is_paid = 0", params![])
}

pub fn get_payments_by_group(conn: &Connection, group_id: &str) -> Result<Vec<CardPayment>> {
    query_payments(conn, "WHERE msi_group_id = ?1", params![group_id])
}

/// First payment registered for a bank in a billing period
pub fn get_payment_by_bank_and_period(
    conn: &Connection,
    bank_id: i64,
    period: MonthPeriod,
) -> Result<Option<CardPayment>> {
    let period = period.to_string();
    let payments = query_payments(
        conn,
        "WHERE bank_id = ?1 AND period = ?2",
        params![bank_id, period],
    )?;
    Ok(payments.into_iter().next())
}

/// Sum of unpaid debt (0 when nothing is pending)
pub fn total_pending_debt(conn: &Connection) -> Result<f64> {
    let total: Option<f64> = conn.query_row(
        "SELECT SUM(debt) FROM card_payments WHERE is_paid = 0",
        [],
        |row| row.get(0),
    )?;
    Ok(total.unwrap_or(0.0))
}
