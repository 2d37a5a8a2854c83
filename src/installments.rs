// 📆 MSI Installment Plans (Meses Sin Intereses)
//
// A purchase of `total` split evenly across N months becomes N card
// payments sharing one group id. Installment i is due in (start + i) on the
// bank's payment day, clamped to the length of that month.

use anyhow::Result;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::db::record_event;
use crate::entities::bank::{get_bank_by_id, Bank};
use crate::entities::payment::{
    get_payments_by_group, insert_payment_row, CardPayment, InstallmentInfo, CREDIT,
};
use crate::error::TrackerError;
use crate::period::MonthPeriod;

pub const GROUP_PREFIX: &str = "msi_";

// ============================================================================
// MONTH COUNT
// ============================================================================

/// The plan lengths banks offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum MonthCount {
    Three,
    Six,
    Nine,
    Twelve,
    Eighteen,
    TwentyFour,
}

impl MonthCount {
    pub const ALL: [MonthCount; 6] = [
        MonthCount::Three,
        MonthCount::Six,
        MonthCount::Nine,
        MonthCount::Twelve,
        MonthCount::Eighteen,
        MonthCount::TwentyFour,
    ];

    pub fn months(&self) -> u32 {
        match self {
            MonthCount::Three => 3,
            MonthCount::Six => 6,
            MonthCount::Nine => 9,
            MonthCount::Twelve => 12,
            MonthCount::Eighteen => 18,
            MonthCount::TwentyFour => 24,
        }
    }
}

impl TryFrom<u32> for MonthCount {
    type Error = TrackerError;

    fn try_from(months: u32) -> Result<Self, Self::Error> {
        MonthCount::ALL
            .into_iter()
            .find(|m| m.months() == months)
            .ok_or(TrackerError::InvalidMonthCount(months))
    }
}

impl From<MonthCount> for u32 {
    fn from(count: MonthCount) -> Self {
        count.months()
    }
}

impl fmt::Display for MonthCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} months", self.months())
    }
}

// ============================================================================
// PLAN REQUEST / RESULT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallmentRequest {
    pub bank_id: i64,
    pub description: String,
    pub total_amount: f64,
    pub months: MonthCount,
    /// Period of the first installment
    pub start: MonthPeriod,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstallmentPlan {
    pub group_id: String,
    pub bank_name: String,
    pub monthly_amount: f64,
    pub payments: Vec<CardPayment>,
}

pub fn new_group_id() -> String {
    format!("{}{}", GROUP_PREFIX, uuid::Uuid::new_v4())
}

/// Build the N installments for a plan (no I/O)
///
/// Fails with `MissingPaymentDay` when the bank has no payment day, and
/// with `InvalidAmount` for a non-positive or non-finite total. A plan
/// running past year 9999 fails with `InvalidDate`. Nothing is produced on
/// failure.
pub fn generate_installments(
    bank: &Bank,
    request: &InstallmentRequest,
) -> Result<Vec<CardPayment>, TrackerError> {
    let payment_day = bank
        .payment_day
        .ok_or_else(|| TrackerError::MissingPaymentDay(bank.name.clone()))?;

    let total = request.total_amount;
    if !total.is_finite() || total <= 0.0 {
        return Err(TrackerError::InvalidAmount(total));
    }

    let count = request.months.months();
    let monthly_amount = total / count as f64;
    let group_id = new_group_id();

    let payments = (0..count)
        .map(|i| {
            let period = request.start.plus_months(i)?;
            let due_date = period.at_day_clamped(payment_day)?;

            let mut payment = CardPayment::new(bank.id, CREDIT, monthly_amount, due_date);
            payment.installment = Some(InstallmentInfo {
                group_id: group_id.clone(),
                description: request.description.clone(),
                current: i + 1,
                total: count,
                total_amount: total,
                monthly_amount,
            });
            Ok(payment)
        })
        .collect::<Result<Vec<_>, TrackerError>>()?;

    Ok(payments)
}

/// Generate and persist a plan; all installments are written or none
pub fn create_installment_plan(
    conn: &Connection,
    request: &InstallmentRequest,
) -> Result<InstallmentPlan> {
    let bank = get_bank_by_id(conn, request.bank_id)?
        .ok_or(TrackerError::BankNotFound(request.bank_id))?;

    let mut payments = match generate_installments(&bank, request) {
        Ok(payments) => payments,
        Err(e) => {
            log::warn!("MSI plan '{}' not created: {}", request.description, e);
            return Err(e.into());
        }
    };

    let tx = conn.unchecked_transaction()?;
    for payment in payments.iter_mut() {
        payment.id = insert_payment_row(&tx, payment)?;
    }

    let group_id = payments
        .first()
        .and_then(|p| p.installment.as_ref())
        .map(|m| m.group_id.clone())
        .unwrap_or_default();
    let monthly_amount = request.total_amount / request.months.months() as f64;

    record_event(
        &tx,
        "msi_plan_created",
        "msi_group",
        &group_id,
        serde_json::json!({
            "bank": bank.name,
            "description": request.description,
            "total_amount": request.total_amount,
            "months": request.months.months(),
            "start": request.start.to_string(),
        }),
    );
    tx.commit()?;

    log::info!(
        "MSI plan {} created: {} x {:.2} at {}",
        group_id,
        request.months.months(),
        monthly_amount,
        bank.name
    );

    Ok(InstallmentPlan {
        group_id,
        bank_name: bank.name,
        monthly_amount,
        payments,
    })
}

/// Installments of one plan, in due-date order
pub fn get_installment_group(conn: &Connection, group_id: &str) -> Result<Vec<CardPayment>> {
    get_payments_by_group(conn, group_id)
}

/// Delete every remaining installment of a plan; returns how many were removed
pub fn delete_installment_group(conn: &Connection, group_id: &str) -> Result<usize> {
    let deleted = conn.execute(
        "DELETE FROM card_payments WHERE msi_group_id = ?1",
        rusqlite::params![group_id],
    )?;

    if deleted > 0 {
        record_event(
            conn,
            "msi_plan_deleted",
            "msi_group",
            group_id,
            serde_json::json!({ "deleted": deleted }),
        );
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::setup_database;
    use crate::entities::bank::insert_bank;
    use crate::entities::payment::get_all_payments;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn bank_with_day(day: Option<u32>) -> Bank {
        let mut bank = Bank::new("BBVA");
        bank.id = 1;
        bank.payment_day = day;
        bank
    }

    fn request(total: f64, months: MonthCount, start: &str) -> InstallmentRequest {
        InstallmentRequest {
            bank_id: 1,
            description: "Laptop".to_string(),
            total_amount: total,
            months,
            start: start.parse().unwrap(),
        }
    }

    #[test]
    fn test_900_over_three_months() {
        let bank = bank_with_day(Some(15));
        let payments = generate_installments(&bank, &request(900.0, MonthCount::Three, "2025-11")).unwrap();

        assert_eq!(payments.len(), 3);
        let group = &payments[0].installment.as_ref().unwrap().group_id;
        assert!(group.starts_with("msi_"));

        for (i, p) in payments.iter().enumerate() {
            let info = p.installment.as_ref().unwrap();
            assert_eq!(p.debt, 300.0);
            assert_eq!(info.current, i as u32 + 1);
            assert_eq!(info.total, 3);
            assert_eq!(&info.group_id, group);
            assert_eq!(info.total_amount, 900.0);
            assert_eq!(info.monthly_amount, 300.0);
            assert_eq!(info.description, "Laptop");
            assert_eq!(p.card_type, CREDIT);
            assert!(p.minimum_payment.is_none());
            assert!(!p.is_paid);
        }

        assert_eq!(payments[0].due_date, date(2025, 11, 15));
        assert_eq!(payments[1].due_date, date(2025, 12, 15));
        assert_eq!(payments[2].due_date, date(2026, 1, 15));
        assert_eq!(payments[2].period().to_string(), "2026-01");

        println!("✅ MSI 900/3 test passed");
    }

    #[test]
    fn test_amounts_sum_to_total_for_every_count() {
        let bank = bank_with_day(Some(10));
        for total in [1.0, 999.99, 12345.67, 100000.0] {
            for months in MonthCount::ALL {
                let payments = generate_installments(&bank, &request(total, months, "2025-01")).unwrap();
                assert_eq!(payments.len() as u32, months.months());

                let sum: f64 = payments.iter().map(|p| p.debt).sum();
                assert_relative_eq!(sum, total, epsilon = 1e-6);

                let indices: Vec<u32> = payments
                    .iter()
                    .map(|p| p.installment.as_ref().unwrap().current)
                    .collect();
                let expected: Vec<u32> = (1..=months.months()).collect();
                assert_eq!(indices, expected);
            }
        }
    }

    #[test]
    fn test_due_day_clamped_to_month_length() {
        let bank = bank_with_day(Some(31));
        let payments = generate_installments(&bank, &request(600.0, MonthCount::Six, "2025-01")).unwrap();

        let due: Vec<NaiveDate> = payments.iter().map(|p| p.due_date).collect();
        assert_eq!(
            due,
            vec![
                date(2025, 1, 31),
                date(2025, 2, 28),
                date(2025, 3, 31),
                date(2025, 4, 30),
                date(2025, 5, 31),
                date(2025, 6, 30),
            ]
        );
    }

    #[test]
    fn test_plan_past_year_9999_rejected() {
        let bank = bank_with_day(Some(15));

        let last = generate_installments(&bank, &request(300.0, MonthCount::Three, "9999-10")).unwrap();
        assert_eq!(last[2].due_date, date(9999, 12, 15));

        let err = generate_installments(&bank, &request(300.0, MonthCount::Six, "9999-10")).unwrap_err();
        assert!(matches!(err, TrackerError::InvalidDate(_)));

        println!("✅ Year-range MSI test passed");
    }

    #[test]
    fn test_leap_february() {
        let bank = bank_with_day(Some(30));
        let payments = generate_installments(&bank, &request(300.0, MonthCount::Three, "2024-01")).unwrap();
        assert_eq!(payments[1].due_date, date(2024, 2, 29));
    }

    #[test]
    fn test_missing_payment_day_produces_nothing() {
        let bank = bank_with_day(None);
        let err = generate_installments(&bank, &request(900.0, MonthCount::Three, "2025-11")).unwrap_err();
        assert_eq!(err, TrackerError::MissingPaymentDay("BBVA".to_string()));
    }

    #[test]
    fn test_invalid_totals() {
        let bank = bank_with_day(Some(5));
        for total in [0.0, -100.0, f64::NAN] {
            assert!(generate_installments(&bank, &request(total, MonthCount::Three, "2025-11")).is_err());
        }
    }

    #[test]
    fn test_month_count_parsing() {
        assert_eq!(MonthCount::try_from(18).unwrap(), MonthCount::Eighteen);
        assert_eq!(
            MonthCount::try_from(4),
            Err(TrackerError::InvalidMonthCount(4))
        );
        assert_eq!(u32::from(MonthCount::TwentyFour), 24);
    }

    #[test]
    fn test_create_and_delete_plan() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        let bank_id = insert_bank(&conn, &Bank::new("Banorte").with_payment_day(31)).unwrap();

        let plan = create_installment_plan(
            &conn,
            &InstallmentRequest {
                bank_id,
                description: "Refrigerador".to_string(),
                total_amount: 1200.0,
                months: MonthCount::Six,
                start: "2025-09".parse().unwrap(),
            },
        )
        .unwrap();

        assert_eq!(plan.bank_name, "Banorte");
        assert_eq!(plan.monthly_amount, 200.0);
        assert_eq!(plan.payments.len(), 6);
        assert!(plan.payments.iter().all(|p| p.id > 0));

        let stored = get_installment_group(&conn, &plan.group_id).unwrap();
        assert_eq!(stored.len(), 6);
        assert_eq!(stored[0].due_date, date(2025, 9, 30));
        assert_eq!(stored[1].due_date, date(2025, 10, 31));
        assert_eq!(stored[5].installment.as_ref().unwrap().current, 6);
        assert!(stored[5].installment.as_ref().unwrap().is_last());

        assert_eq!(delete_installment_group(&conn, &plan.group_id).unwrap(), 6);
        assert!(get_all_payments(&conn).unwrap().is_empty());
        assert_eq!(delete_installment_group(&conn, &plan.group_id).unwrap(), 0);

        println!("✅ MSI plan persistence test passed");
    }

    #[test]
    fn test_create_plan_without_payment_day_writes_nothing() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        let bank_id = insert_bank(&conn, &Bank::new("HSBC")).unwrap();

        let err = create_installment_plan(
            &conn,
            &InstallmentRequest {
                bank_id,
                description: "TV".to_string(),
                total_amount: 900.0,
                months: MonthCount::Three,
                start: "2025-11".parse().unwrap(),
            },
        )
        .unwrap_err();

        assert_eq!(
            err.downcast_ref::<TrackerError>(),
            Some(&TrackerError::MissingPaymentDay("HSBC".to_string()))
        );
        assert!(get_all_payments(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_create_plan_unknown_bank() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let err = create_installment_plan(&conn, &request(900.0, MonthCount::Three, "2025-11")).unwrap_err();
        assert_eq!(
            err.downcast_ref::<TrackerError>(),
            Some(&TrackerError::BankNotFound(1))
        );
    }
}
