// 💰 Savings Position - money held at one financial institution
//
// The value shape depends on the institution's investment type. In memory
// it is an enum; on disk the columns of the other shapes stay NULL.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::db::{date_column, record_event};
use crate::entities::institution::{get_institution_by_id, Institution, InvestmentType};
use crate::error::TrackerError;
use crate::period::format_date;

// ============================================================================
// VALUE SHAPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SavingsValue {
    /// Balance held on a savings card
    Card { amount: f64 },

    Stocks {
        quantity: f64,
        unit_price: f64,
        ticker: Option<String>,
    },

    Crypto {
        quantity: f64,
        unit_price: f64,
        ticker: Option<String>,
    },

    /// Fixed-term bond purchase
    Cetes {
        amount: f64,
        term_days: Option<u32>,
        rate: Option<f64>,
    },
}

impl SavingsValue {
    pub fn investment_type(&self) -> InvestmentType {
        match self {
            SavingsValue::Card { .. } => InvestmentType::Card,
            SavingsValue::Stocks { .. } => InvestmentType::Stocks,
            SavingsValue::Crypto { .. } => InvestmentType::Crypto,
            SavingsValue::Cetes { .. } => InvestmentType::Cetes,
        }
    }

    /// Value used for totals and sorting
    ///
    /// Stocks and crypto report the recorded unit price, not quantity x price.
    pub fn current_value(&self) -> f64 {
        match self {
            SavingsValue::Card { amount } => *amount,
            SavingsValue::Stocks { unit_price, .. } => *unit_price,
            SavingsValue::Crypto { unit_price, .. } => *unit_price,
            SavingsValue::Cetes { amount, .. } => *amount,
        }
    }

    /// Principal that earns the institution's yield (Card and CETES only)
    pub fn yield_principal(&self) -> Option<f64> {
        match self {
            SavingsValue::Card { amount } | SavingsValue::Cetes { amount, .. } => Some(*amount),
            _ => None,
        }
    }

    pub fn ticker(&self) -> Option<&str> {
        match self {
            SavingsValue::Stocks { ticker, .. } | SavingsValue::Crypto { ticker, .. } => {
                ticker.as_deref()
            }
            _ => None,
        }
    }

    fn amounts(&self) -> Vec<f64> {
        match self {
            SavingsValue::Card { amount } => vec![*amount],
            SavingsValue::Stocks { quantity, unit_price, .. }
            | SavingsValue::Crypto { quantity, unit_price, .. } => vec![*quantity, *unit_price],
            SavingsValue::Cetes { amount, rate, .. } => {
                let mut v = vec![*amount];
                v.extend(rate.iter().copied());
                v
            }
        }
    }
}

// ============================================================================
// SAVINGS ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Savings {
    #[serde(default)]
    pub id: i64,
    pub institution_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_on: NaiveDate,
    pub value: SavingsValue,
}

impl Savings {
    pub fn new(institution_id: i64, name: impl Into<String>, created_on: NaiveDate, value: SavingsValue) -> Self {
        Savings {
            id: 0,
            institution_id,
            name: name.into(),
            description: None,
            created_on,
            value,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn current_value(&self) -> f64 {
        self.value.current_value()
    }

    /// Reject a value shape that does not belong to the institution's type
    pub fn check_against(&self, institution: &Institution) -> Result<(), TrackerError> {
        let found = self.value.investment_type();
        if found != institution.investment_type {
            return Err(TrackerError::ValueShapeMismatch {
                institution: institution.name.clone(),
                expected: institution.investment_type.to_string(),
                found: found.to_string(),
            });
        }

        if let Some(bad) = self.value.amounts().into_iter().find(|v| !v.is_finite() || *v < 0.0) {
            return Err(TrackerError::InvalidAmount(bad));
        }

        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Savings> {
        let card_amount: Option<f64> = row.get(5)?;
        let stock_quantity: Option<f64> = row.get(6)?;
        let crypto_quantity: Option<f64> = row.get(9)?;
        let cetes_amount: Option<f64> = row.get(12)?;

        // The populated column group decides the shape
        let value = if let Some(amount) = card_amount {
            SavingsValue::Card { amount }
        } else if let Some(quantity) = stock_quantity {
            SavingsValue::Stocks {
                quantity,
                unit_price: row.get::<_, Option<f64>>(7)?.unwrap_or(0.0),
                ticker: row.get(8)?,
            }
        } else if let Some(quantity) = crypto_quantity {
            SavingsValue::Crypto {
                quantity,
                unit_price: row.get::<_, Option<f64>>(10)?.unwrap_or(0.0),
                ticker: row.get(11)?,
            }
        } else {
            SavingsValue::Cetes {
                amount: cetes_amount.unwrap_or(0.0),
                term_days: row.get(13)?,
                rate: row.get(14)?,
            }
        };

        Ok(Savings {
            id: row.get(0)?,
            institution_id: row.get(1)?,
            name: row.get(2)?,
            description: row.get(3)?,
            created_on: date_column(row.get(4)?, 4)?,
            value,
        })
    }
}

/// Column values for one row; everything outside the active shape is NULL
#[derive(Default)]
struct ValueColumns<'a> {
    card_amount: Option<f64>,
    stock_quantity: Option<f64>,
    stock_price: Option<f64>,
    stock_symbol: Option<&'a str>,
    crypto_quantity: Option<f64>,
    crypto_price: Option<f64>,
    crypto_symbol: Option<&'a str>,
    cetes_amount: Option<f64>,
    cetes_term_days: Option<u32>,
    cetes_rate: Option<f64>,
}

impl<'a> From<&'a SavingsValue> for ValueColumns<'a> {
    fn from(value: &'a SavingsValue) -> Self {
        match value {
            SavingsValue::Card { amount } => ValueColumns {
                card_amount: Some(*amount),
                ..Default::default()
            },
            SavingsValue::Stocks { quantity, unit_price, ticker } => ValueColumns {
                stock_quantity: Some(*quantity),
                stock_price: Some(*unit_price),
                stock_symbol: ticker.as_deref(),
                ..Default::default()
            },
            SavingsValue::Crypto { quantity, unit_price, ticker } => ValueColumns {
                crypto_quantity: Some(*quantity),
                crypto_price: Some(*unit_price),
                crypto_symbol: ticker.as_deref(),
                ..Default::default()
            },
            SavingsValue::Cetes { amount, term_days, rate } => ValueColumns {
                cetes_amount: Some(*amount),
                cetes_term_days: *term_days,
                cetes_rate: *rate,
                ..Default::default()
            },
        }
    }
}

// ============================================================================
// REPOSITORY
// ============================================================================

const SAVINGS_COLUMNS: &str = "id, institution_id, name, description, created_on,
    card_amount, stock_quantity, stock_price, stock_symbol,
    crypto_quantity, crypto_price, crypto_symbol,
    cetes_amount, cetes_term_days, cetes_rate";

fn load_institution(conn: &Connection, id: i64) -> Result<Institution> {
    Ok(get_institution_by_id(conn, id)?.ok_or(TrackerError::InstitutionNotFound(id))?)
}

pub fn insert_savings(conn: &Connection, savings: &Savings) -> Result<i64> {
    let institution = load_institution(conn, savings.institution_id)?;
    savings.check_against(&institution)?;

    let cols = ValueColumns::from(&savings.value);
    conn.execute(
        "INSERT INTO savings (
            institution_id, name, description, created_on,
            card_amount, stock_quantity, stock_price, stock_symbol,
            crypto_quantity, crypto_price, crypto_symbol,
            cetes_amount, cetes_term_days, cetes_rate
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            savings.institution_id,
            savings.name,
            savings.description,
            format_date(savings.created_on),
            cols.card_amount,
            cols.stock_quantity,
            cols.stock_price,
            cols.stock_symbol,
            cols.crypto_quantity,
            cols.crypto_price,
            cols.crypto_symbol,
            cols.cetes_amount,
            cols.cetes_term_days,
            cols.cetes_rate,
        ],
    )
    .context("Failed to insert savings position")?;

    let id = conn.last_insert_rowid();
    record_event(
        conn,
        "savings_created",
        "savings",
        id,
        serde_json::json!({
            "institution": institution.name,
            "value": savings.current_value(),
        }),
    );
    Ok(id)
}

pub fn update_savings(conn: &Connection, savings: &Savings) -> Result<()> {
    let institution = load_institution(conn, savings.institution_id)?;
    savings.check_against(&institution)?;

    let cols = ValueColumns::from(&savings.value);
    let changed = conn.execute(
        "UPDATE savings SET
            institution_id = ?2, name = ?3, description = ?4, created_on = ?5,
            card_amount = ?6, stock_quantity = ?7, stock_price = ?8, stock_symbol = ?9,
            crypto_quantity = ?10, crypto_price = ?11, crypto_symbol = ?12,
            cetes_amount = ?13, cetes_term_days = ?14, cetes_rate = ?15
         WHERE id = ?1",
        params![
            savings.id,
            savings.institution_id,
            savings.name,
            savings.description,
            format_date(savings.created_on),
            cols.card_amount,
            cols.stock_quantity,
            cols.stock_price,
            cols.stock_symbol,
            cols.crypto_quantity,
            cols.crypto_price,
            cols.crypto_symbol,
            cols.cetes_amount,
            cols.cetes_term_days,
            cols.cetes_rate,
        ],
    )?;

    if changed == 0 {
        return Err(TrackerError::SavingsNotFound(savings.id).into());
    }

    record_event(conn, "savings_updated", "savings", savings.id, serde_json::to_value(savings)?);
    Ok(())
}

pub fn delete_savings(conn: &Connection, id: i64) -> Result<()> {
    let changed = conn.execute("DELETE FROM savings WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(TrackerError::SavingsNotFound(id).into());
    }
    record_event(conn, "savings_deleted", "savings", id, serde_json::json!({}));
    Ok(())
}

pub fn get_savings_by_id(conn: &Connection, id: i64) -> Result<Option<Savings>> {
    let savings = conn
        .query_row(
            &format!("SELECT {} FROM savings WHERE id = ?1", SAVINGS_COLUMNS),
            params![id],
            Savings::from_row,
        )
        .optional()?;
    Ok(savings)
}

/// All positions, newest first
pub fn get_all_savings(conn: &Connection) -> Result<Vec<Savings>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM savings ORDER BY created_on DESC, id DESC",
        SAVINGS_COLUMNS
    ))?;
    let savings = stmt
        .query_map([], Savings::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(savings)
}

pub fn get_savings_by_institution(conn: &Connection, institution_id: i64) -> Result<Vec<Savings>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM savings WHERE institution_id = ?1 ORDER BY created_on DESC, id DESC",
        SAVINGS_COLUMNS
    ))?;
    let savings = stmt
        .query_map(params![institution_id], Savings::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(savings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::setup_database;
    use crate::entities::institution::{delete_institution, insert_institution};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn setup() -> (Connection, i64, i64) {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        let nu = insert_institution(&conn, &Institution::new("Nu", InvestmentType::Card).with_yield(14.0)).unwrap();
        let gbm = insert_institution(&conn, &Institution::new("GBM", InvestmentType::Stocks)).unwrap();
        (conn, nu, gbm)
    }

    #[test]
    fn test_current_value_per_shape() {
        assert_eq!(SavingsValue::Card { amount: 1500.0 }.current_value(), 1500.0);
        assert_eq!(
            SavingsValue::Stocks { quantity: 10.0, unit_price: 180.0, ticker: Some("AAPL".into()) }
                .current_value(),
            180.0
        );
        assert_eq!(
            SavingsValue::Crypto { quantity: 0.5, unit_price: 60000.0, ticker: None }.current_value(),
            60000.0
        );
        assert_eq!(
            SavingsValue::Cetes { amount: 10000.0, term_days: Some(28), rate: Some(11.0) }
                .current_value(),
            10000.0
        );
    }

    #[test]
    fn test_roundtrip_each_shape() {
        let (conn, nu, gbm) = setup();

        let card = Savings::new(nu, "Cajita", date(2025, 5, 1), SavingsValue::Card { amount: 2500.0 })
            .with_description("fondo de emergencia");
        let stocks = Savings::new(
            gbm,
            "Apple",
            date(2025, 6, 1),
            SavingsValue::Stocks { quantity: 3.0, unit_price: 3400.0, ticker: Some("AAPL".into()) },
        );

        let card_id = insert_savings(&conn, &card).unwrap();
        let stocks_id = insert_savings(&conn, &stocks).unwrap();

        let loaded = get_savings_by_id(&conn, card_id).unwrap().unwrap();
        assert_eq!(loaded.value, card.value);
        assert_eq!(loaded.description.as_deref(), Some("fondo de emergencia"));

        let loaded = get_savings_by_id(&conn, stocks_id).unwrap().unwrap();
        assert_eq!(loaded.value, stocks.value);
        assert_eq!(loaded.value.ticker(), Some("AAPL"));

        // Newest first
        let all = get_all_savings(&conn).unwrap();
        assert_eq!(all[0].id, stocks_id);
        assert_eq!(all[1].id, card_id);

        println!("✅ Savings roundtrip test passed");
    }

    #[test]
    fn test_other_shape_columns_stay_null() {
        let (conn, nu, _) = setup();
        let id = insert_savings(
            &conn,
            &Savings::new(nu, "Cajita", date(2025, 5, 1), SavingsValue::Card { amount: 100.0 }),
        )
        .unwrap();

        let non_null: i64 = conn
            .query_row(
                "SELECT (stock_quantity IS NOT NULL) + (crypto_quantity IS NOT NULL)
                      + (cetes_amount IS NOT NULL) FROM savings WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(non_null, 0);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let (conn, nu, _) = setup();
        let wrong = Savings::new(
            nu,
            "BTC",
            date(2025, 5, 1),
            SavingsValue::Crypto { quantity: 1.0, unit_price: 10.0, ticker: None },
        );

        let err = insert_savings(&conn, &wrong).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TrackerError>(),
            Some(TrackerError::ValueShapeMismatch { .. })
        ));
        assert!(get_all_savings(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_negative_amount_rejected() {
        let (conn, nu, _) = setup();
        let err = insert_savings(
            &conn,
            &Savings::new(nu, "Bad", date(2025, 5, 1), SavingsValue::Card { amount: -5.0 }),
        )
        .unwrap_err();
        assert_eq!(
            err.downcast_ref::<TrackerError>(),
            Some(&TrackerError::InvalidAmount(-5.0))
        );
    }

    #[test]
    fn test_update_and_cascade_delete() {
        let (conn, nu, _) = setup();
        let id = insert_savings(
            &conn,
            &Savings::new(nu, "Cajita", date(2025, 5, 1), SavingsValue::Card { amount: 100.0 }),
        )
        .unwrap();

        let mut savings = get_savings_by_id(&conn, id).unwrap().unwrap();
        savings.value = SavingsValue::Card { amount: 250.0 };
        update_savings(&conn, &savings).unwrap();
        assert_eq!(get_savings_by_id(&conn, id).unwrap().unwrap().current_value(), 250.0);
        assert_eq!(get_savings_by_institution(&conn, nu).unwrap().len(), 1);

        delete_institution(&conn, nu).unwrap();
        assert!(get_savings_by_id(&conn, id).unwrap().is_none());
    }

    #[test]
    fn test_missing_position_not_found() {
        let (conn, nu, _) = setup();
        let mut ghost = Savings::new(nu, "Ghost", date(2025, 5, 1), SavingsValue::Card { amount: 1.0 });
        ghost.id = 42;

        let err = update_savings(&conn, &ghost).unwrap_err();
        assert_eq!(
            err.downcast_ref::<TrackerError>(),
            Some(&TrackerError::SavingsNotFound(42))
        );

        let err = delete_savings(&conn, 42).unwrap_err();
        assert_eq!(
            err.downcast_ref::<TrackerError>(),
            Some(&TrackerError::SavingsNotFound(42))
        );
    }
}
