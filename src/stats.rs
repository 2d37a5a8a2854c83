// 📊 Statistics - aggregate queries for the dashboard and the stats command

use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;

use crate::db::date_column;
use crate::entities::institution::InvestmentType;
use crate::entities::payment::total_pending_debt;

/// Number of month-periods in the debt trend
pub const PERIOD_LIMIT: usize = 6;

/// Number of paid dates in the history trend
pub const PAID_DATE_LIMIT: usize = 12;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodTotal {
    /// "YYYY-MM"
    pub period: String,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BankTotal {
    pub bank_id: i64,
    pub bank_name: String,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaidDateTotal {
    pub paid_date: NaiveDate,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeTotal {
    pub investment_type: InvestmentType,
    pub total: f64,
}

/// Debt per billing period over all payments, most recent period first
pub fn debts_by_period(conn: &Connection) -> Result<Vec<PeriodTotal>> {
    let mut stmt = conn.prepare(
        "SELECT period, SUM(debt) AS total
         FROM card_payments
         GROUP BY period
         ORDER BY period DESC
         LIMIT ?1",
    )?;

    let totals = stmt
        .query_map([PERIOD_LIMIT as i64], |row| {
            Ok(PeriodTotal {
                period: row.get(0)?,
                total: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(totals)
}

/// Unpaid debt per bank, largest first
pub fn pending_debts_by_bank(conn: &Connection) -> Result<Vec<BankTotal>> {
    let mut stmt = conn.prepare(
        "SELECT b.id, b.name, SUM(p.debt) AS total
         FROM card_payments p
         INNER JOIN banks b ON p.bank_id = b.id
         WHERE p.is_paid = 0
         GROUP BY b.id, b.name
         ORDER BY total DESC",
    )?;

    let totals = stmt
        .query_map([], |row| {
            Ok(BankTotal {
                bank_id: row.get(0)?,
                bank_name: row.get(1)?,
                total: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(totals)
}

/// Amount paid per paid date, most recent first
pub fn history_by_paid_date(conn: &Connection) -> Result<Vec<PaidDateTotal>> {
    let mut stmt = conn.prepare(
        "SELECT paid_date, SUM(debt) AS total
         FROM payment_history
         GROUP BY paid_date
         ORDER BY paid_date DESC
         LIMIT ?1",
    )?;

    let totals = stmt
        .query_map([PAID_DATE_LIMIT as i64], |row| {
            Ok(PaidDateTotal {
                paid_date: date_column(row.get(0)?, 0)?,
                total: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(totals)
}

/// Savings value per investment type, largest first
///
/// Each type sums its own value column; stocks and crypto use the unit price.
pub fn savings_totals_by_type(conn: &Connection) -> Result<Vec<TypeTotal>> {
    let mut stmt = conn.prepare(
        "SELECT i.investment_type, SUM(
             CASE i.investment_type
                 WHEN 'Card' THEN s.card_amount
                 WHEN 'Stocks' THEN s.stock_price
                 WHEN 'Crypto' THEN s.crypto_price
                 WHEN 'CETES' THEN s.cetes_amount
                 ELSE 0
             END
         ) AS total
         FROM savings s
         INNER JOIN institutions i ON s.institution_id = i.id
         GROUP BY i.investment_type
         ORDER BY total DESC",
    )?;

    let totals = stmt
        .query_map([], |row| {
            let tag: String = row.get(0)?;
            let investment_type = tag.parse::<InvestmentType>().map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, e.into())
            })?;
            Ok(TypeTotal {
                investment_type,
                total: row.get::<_, Option<f64>>(1)?.unwrap_or(0.0),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(totals)
}

/// Everything the stats views show, in one read
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackerStats {
    pub total_pending: f64,
    pub debts_by_period: Vec<PeriodTotal>,
    pub pending_by_bank: Vec<BankTotal>,
    pub paid_by_date: Vec<PaidDateTotal>,
    pub savings_by_type: Vec<TypeTotal>,
}

impl TrackerStats {
    pub fn load(conn: &Connection) -> Result<Self> {
        Ok(TrackerStats {
            total_pending: total_pending_debt(conn)?,
            debts_by_period: debts_by_period(conn)?,
            pending_by_bank: pending_debts_by_bank(conn)?,
            paid_by_date: history_by_paid_date(conn)?,
            savings_by_type: savings_totals_by_type(conn)?,
        })
    }

    pub fn total_savings(&self) -> f64 {
        self.savings_by_type.iter().map(|t| t.total).sum()
    }
}
