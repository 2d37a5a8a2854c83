// 🏛️ Financial Institution - where savings are held
//
// The investment type decides which value shape its savings positions use
// and whether a configured annual yield applies.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::db::record_event;
use crate::error::TrackerError;

// ============================================================================
// INVESTMENT TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvestmentType {
    /// Savings card / cash-equivalent account with an annual yield
    Card,

    /// Stock brokerage
    Stocks,

    /// Crypto exchange
    Crypto,

    /// Fixed-term government bonds
    Cetes,
}

impl InvestmentType {
    pub const ALL: [InvestmentType; 4] = [
        InvestmentType::Card,
        InvestmentType::Stocks,
        InvestmentType::Crypto,
        InvestmentType::Cetes,
    ];

    /// Stored tag
    pub fn as_str(&self) -> &'static str {
        match self {
            InvestmentType::Card => "Card",
            InvestmentType::Stocks => "Stocks",
            InvestmentType::Crypto => "Crypto",
            InvestmentType::Cetes => "CETES",
        }
    }

    /// Only these types carry a configurable annual yield
    pub fn has_yield(&self) -> bool {
        matches!(self, InvestmentType::Card | InvestmentType::Cetes)
    }
}

impl fmt::Display for InvestmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvestmentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "card" | "tarjeta" => Ok(InvestmentType::Card),
            "stocks" | "acciones" => Ok(InvestmentType::Stocks),
            "crypto" | "cripto" => Ok(InvestmentType::Crypto),
            "cetes" => Ok(InvestmentType::Cetes),
            other => Err(format!("unknown investment type '{}'", other)),
        }
    }
}

// ============================================================================
// INSTITUTION ENTITY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Institution {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    pub logo_path: Option<String>,
    pub investment_type: InvestmentType,
    /// Annual yield in percent (e.g. 10.5)
    pub annual_yield: Option<f64>,
}

impl Institution {
    pub fn new(name: impl Into<String>, investment_type: InvestmentType) -> Self {
        Institution {
            id: 0,
            name: name.into(),
            logo_path: None,
            investment_type,
            annual_yield: None,
        }
    }

    pub fn with_yield(mut self, annual_yield: f64) -> Self {
        self.annual_yield = Some(annual_yield);
        self
    }

    pub fn validate(&self) -> Result<(), TrackerError> {
        if let Some(rate) = self.annual_yield {
            if !rate.is_finite() || rate < 0.0 {
                return Err(TrackerError::InvalidYield(rate));
            }
        }
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Institution> {
        let tag: String = row.get(3)?;
        let investment_type = tag.parse::<InvestmentType>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                e.into(),
            )
        })?;

        Ok(Institution {
            id: row.get(0)?,
            name: row.get(1)?,
            logo_path: row.get(2)?,
            investment_type,
            annual_yield: row.get(4)?,
        })
    }
}

// ============================================================================
// REPOSITORY
// ============================================================================

const INSTITUTION_COLUMNS: &str = "id, name, logo_path, investment_type, annual_yield";

pub fn insert_institution(conn: &Connection, institution: &Institution) -> Result<i64> {
    institution.validate()?;

    conn.execute(
        "INSERT INTO institutions (name, logo_path, investment_type, annual_yield)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            institution.name,
            institution.logo_path,
            institution.investment_type.as_str(),
            institution.annual_yield,
        ],
    )
    .context("Failed to insert institution")?;

    let id = conn.last_insert_rowid();
    record_event(
        conn,
        "institution_created",
        "institution",
        id,
        serde_json::json!({
            "name": institution.name,
            "investment_type": institution.investment_type.as_str(),
        }),
    );
    Ok(id)
}

/// The investment type can only change while the institution holds no savings
pub fn update_institution(conn: &Connection, institution: &Institution) -> Result<()> {
    institution.validate()?;

    let stored = get_institution_by_id(conn, institution.id)?
        .ok_or(TrackerError::InstitutionNotFound(institution.id))?;
    if stored.investment_type != institution.investment_type {
        let positions: i64 = conn.query_row(
            "SELECT COUNT(*) FROM savings WHERE institution_id = ?1",
            params![institution.id],
            |row| row.get(0),
        )?;
        if positions > 0 {
            log::warn!(
                "refusing to change {} from {} to {}: {} position(s) held",
                stored.name,
                stored.investment_type,
                institution.investment_type,
                positions
            );
            return Err(TrackerError::InvestmentTypeLocked {
                institution: stored.name,
                positions: positions as usize,
            }
            .into());
        }
    }

    let changed = conn.execute(
        "UPDATE institutions
         SET name = ?2, logo_path = ?3, investment_type = ?4, annual_yield = ?5
         WHERE id = ?1",
        params![
            institution.id,
            institution.name,
            institution.logo_path,
            institution.investment_type.as_str(),
            institution.annual_yield,
        ],
    )?;

    if changed == 0 {
        return Err(TrackerError::InstitutionNotFound(institution.id).into());
    }

    record_event(
        conn,
        "institution_updated",
        "institution",
        institution.id,
        serde_json::to_value(institution)?,
    );
    Ok(())
}

/// Delete an institution together with its savings positions
pub fn delete_institution(conn: &Connection, id: i64) -> Result<()> {
    let changed = conn.execute("DELETE FROM institutions WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(TrackerError::InstitutionNotFound(id).into());
    }
    record_event(conn, "institution_deleted", "institution", id, serde_json::json!({}));
    Ok(())
}

pub fn get_institution_by_id(conn: &Connection, id: i64) -> Result<Option<Institution>> {
    let institution = conn
        .query_row(
            &format!("SELECT {} FROM institutions WHERE id = ?1", INSTITUTION_COLUMNS),
            params![id],
            Institution::from_row,
        )
        .optional()?;
    Ok(institution)
}

/// All institutions, name ascending
pub fn get_all_institutions(conn: &Connection) -> Result<Vec<Institution>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM institutions ORDER BY name COLLATE NOCASE ASC",
        INSTITUTION_COLUMNS
    ))?;
    let institutions = stmt
        .query_map([], Institution::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(institutions)
}

pub fn get_institutions_by_type(
    conn: &Connection,
    investment_type: InvestmentType,
) -> Result<Vec<Institution>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM institutions WHERE investment_type = ?1 ORDER BY name COLLATE NOCASE ASC",
        INSTITUTION_COLUMNS
    ))?;
    let institutions = stmt
        .query_map(params![investment_type.as_str()], Institution::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(institutions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::setup_database;

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    #[test]
    fn test_investment_type_tags() {
        for t in InvestmentType::ALL {
            assert_eq!(t.as_str().parse::<InvestmentType>().unwrap(), t);
        }
        assert_eq!("Tarjeta".parse::<InvestmentType>().unwrap(), InvestmentType::Card);
        assert_eq!("acciones".parse::<InvestmentType>().unwrap(), InvestmentType::Stocks);
        assert!("bonds".parse::<InvestmentType>().is_err());

        assert!(InvestmentType::Card.has_yield());
        assert!(InvestmentType::Cetes.has_yield());
        assert!(!InvestmentType::Stocks.has_yield());
        assert!(!InvestmentType::Crypto.has_yield());
    }

    #[test]
    fn test_institution_crud() {
        let conn = test_conn();

        let id = insert_institution(
            &conn,
            &Institution::new("Nu", InvestmentType::Card).with_yield(14.75),
        )
        .unwrap();
        insert_institution(&conn, &Institution::new("Bitso", InvestmentType::Crypto)).unwrap();
        insert_institution(&conn, &Institution::new("CetesDirecto", InvestmentType::Cetes)).unwrap();

        let mut nu = get_institution_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(nu.investment_type, InvestmentType::Card);
        assert_eq!(nu.annual_yield, Some(14.75));

        nu.annual_yield = Some(13.0);
        update_institution(&conn, &nu).unwrap();
        assert_eq!(
            get_institution_by_id(&conn, id).unwrap().unwrap().annual_yield,
            Some(13.0)
        );

        let names: Vec<String> = get_all_institutions(&conn)
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["Bitso", "CetesDirecto", "Nu"]);

        let crypto = get_institutions_by_type(&conn, InvestmentType::Crypto).unwrap();
        assert_eq!(crypto.len(), 1);
        assert_eq!(crypto[0].name, "Bitso");

        delete_institution(&conn, id).unwrap();
        assert!(get_institution_by_id(&conn, id).unwrap().is_none());

        println!("✅ Institution CRUD test passed");
    }

    #[test]
    fn test_type_change_blocked_while_savings_held() {
        use crate::entities::savings::{delete_savings, insert_savings, Savings, SavingsValue};
        use chrono::NaiveDate;

        let conn = test_conn();
        let id = insert_institution(&conn, &Institution::new("Nu", InvestmentType::Card)).unwrap();
        let position = insert_savings(
            &conn,
            &Savings::new(
                id,
                "Cajita",
                NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
                SavingsValue::Card { amount: 5000.0 },
            ),
        )
        .unwrap();

        let mut nu = get_institution_by_id(&conn, id).unwrap().unwrap();
        nu.investment_type = InvestmentType::Stocks;
        let err = update_institution(&conn, &nu).unwrap_err();
        assert_eq!(
            err.downcast_ref::<TrackerError>(),
            Some(&TrackerError::InvestmentTypeLocked {
                institution: "Nu".to_string(),
                positions: 1,
            })
        );
        assert_eq!(
            get_institution_by_id(&conn, id).unwrap().unwrap().investment_type,
            InvestmentType::Card
        );

        // Same type: other fields still editable
        nu.investment_type = InvestmentType::Card;
        nu.name = "Nu México".to_string();
        update_institution(&conn, &nu).unwrap();

        // Empty institution: type is free to change
        delete_savings(&conn, position).unwrap();
        nu.investment_type = InvestmentType::Stocks;
        update_institution(&conn, &nu).unwrap();
        assert_eq!(
            get_institution_by_id(&conn, id).unwrap().unwrap().investment_type,
            InvestmentType::Stocks
        );

        println!("✅ Investment type lock test passed");
    }

    #[test]
    fn test_invalid_yield_rejected() {
        let conn = test_conn();

        for rate in [-5.0, f64::NAN, f64::INFINITY] {
            let err = insert_institution(
                &conn,
                &Institution::new("Bad", InvestmentType::Card).with_yield(rate),
            )
            .unwrap_err();
            assert!(matches!(
                err.downcast_ref::<TrackerError>(),
                Some(TrackerError::InvalidYield(_))
            ));
        }
        assert!(get_all_institutions(&conn).unwrap().is_empty());

        let id = insert_institution(&conn, &Institution::new("Nu", InvestmentType::Card).with_yield(0.0)).unwrap();
        let mut nu = get_institution_by_id(&conn, id).unwrap().unwrap();
        nu.annual_yield = Some(-1.0);
        assert!(update_institution(&conn, &nu).is_err());
        assert_eq!(get_institution_by_id(&conn, id).unwrap().unwrap().annual_yield, Some(0.0));
    }

    #[test]
    fn test_delete_missing_institution() {
        let conn = test_conn();
        let err = delete_institution(&conn, 5).unwrap_err();
        assert_eq!(
            err.downcast_ref::<TrackerError>(),
            Some(&TrackerError::InstitutionNotFound(5))
        );
    }
}
