// ⚠️ Domain errors
//
// Repository functions return anyhow::Result; these are the failures callers
// may want to match on (downcast_ref::<TrackerError>()).

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackerError {
    #[error("bank not found: {0}")]
    BankNotFound(i64),

    #[error("card payment not found: {0}")]
    PaymentNotFound(i64),

    #[error("financial institution not found: {0}")]
    InstitutionNotFound(i64),

    #[error("savings position not found: {0}")]
    SavingsNotFound(i64),

    #[error("payment record not found: {0}")]
    HistoryNotFound(i64),

    /// MSI plans need the bank's payment-due day to place each installment
    #[error("bank '{0}' has no payment day configured")]
    MissingPaymentDay(String),

    #[error("invalid MSI month count {0} (expected 3, 6, 9, 12, 18 or 24)")]
    InvalidMonthCount(u32),

    #[error("invalid amount: {0}")]
    InvalidAmount(f64),

    #[error("invalid day of month {0} (expected 1-31)")]
    InvalidDayOfMonth(u32),

    #[error("savings value is {found} but institution '{institution}' is {expected}")]
    ValueShapeMismatch {
        institution: String,
        expected: String,
        found: String,
    },

    #[error("invalid date '{0}'")]
    InvalidDate(String),

    /// Existing positions are stored in the shape of the current type
    #[error("institution '{institution}' still holds {positions} savings position(s); its investment type cannot change")]
    InvestmentTypeLocked { institution: String, positions: usize },

    #[error("invalid annual yield: {0}")]
    InvalidYield(f64),
}

/// Validate an optional day-of-month field (statement cut / payment day)
pub fn check_day_of_month(day: Option<u32>) -> Result<(), TrackerError> {
    match day {
        Some(d) if !(1..=31).contains(&d) => Err(TrackerError::InvalidDayOfMonth(d)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_of_month_bounds() {
        assert!(check_day_of_month(None).is_ok());
        assert!(check_day_of_month(Some(1)).is_ok());
        assert!(check_day_of_month(Some(31)).is_ok());
        assert_eq!(
            check_day_of_month(Some(0)),
            Err(TrackerError::InvalidDayOfMonth(0))
        );
        assert_eq!(
            check_day_of_month(Some(32)),
            Err(TrackerError::InvalidDayOfMonth(32))
        );
    }

    #[test]
    fn test_error_messages() {
        let err = TrackerError::MissingPaymentDay("BBVA".to_string());
        assert_eq!(err.to_string(), "bank 'BBVA' has no payment day configured");

        let err = TrackerError::InvalidMonthCount(5);
        assert!(err.to_string().contains("5"));

        println!("✅ Error message test passed");
    }
}
