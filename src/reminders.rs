// 🔔 Due-Date Reminders
//
// One pass over unpaid payments. A payment fires at exactly 3 days before
// its due date and again on the due date itself. A day the check does not
// run is simply skipped; nothing is retried or escalated.

use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;

use crate::entities::bank::BankRegistry;
use crate::entities::payment::{get_pending_payments, CardPayment};
use crate::period::days_until;

pub const DAYS_BEFORE: i64 = 3;

/// Added to the payment id so both reminders for a payment have distinct ids
pub const DUE_TODAY_ID_OFFSET: i64 = 10000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReminderKind {
    ThreeDaysBefore,
    DueToday,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reminder {
    pub payment_id: i64,
    pub notification_id: i64,
    pub kind: ReminderKind,
    pub bank_name: String,
    pub debt: f64,
    pub due_date: NaiveDate,
    pub title: String,
    pub message: String,
}

impl Reminder {
    fn for_payment(payment: &CardPayment, bank_name: &str, kind: ReminderKind) -> Self {
        let (notification_id, title, message) = match kind {
            ReminderKind::ThreeDaysBefore => (
                payment.id,
                "⚠️ Payment reminder".to_string(),
                format!(
                    "{} days left to pay {}. Debt: ${:.2}",
                    DAYS_BEFORE, bank_name, payment.debt
                ),
            ),
            ReminderKind::DueToday => (
                payment.id + DUE_TODAY_ID_OFFSET,
                "🚨 Payment due TODAY".to_string(),
                format!("{} payment is due today. Debt: ${:.2}", bank_name, payment.debt),
            ),
        };

        Reminder {
            payment_id: payment.id,
            notification_id,
            kind,
            bank_name: bank_name.to_string(),
            debt: payment.debt,
            due_date: payment.due_date,
            title,
            message,
        }
    }
}

/// Reminders due today for the given payments (paid ones are ignored)
pub fn check_due_reminders(
    payments: &[CardPayment],
    banks: &BankRegistry,
    today: NaiveDate,
) -> Vec<Reminder> {
    payments
        .iter()
        .filter(|p| !p.is_paid)
        .filter_map(|p| {
            let kind = match days_until(today, p.due_date) {
                DAYS_BEFORE => ReminderKind::ThreeDaysBefore,
                0 => ReminderKind::DueToday,
                _ => return None,
            };
            let bank_name = banks.name_of(p.bank_id).unwrap_or("Unknown bank");
            Some(Reminder::for_payment(p, bank_name, kind))
        })
        .collect()
}

// ============================================================================
// DELIVERY
// ============================================================================

/// Delivery channel for reminders
pub trait Notifier {
    fn notify(&self, reminder: &Reminder) -> Result<()>;
}

/// Writes reminders to the log
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, reminder: &Reminder) -> Result<()> {
        log::info!(
            "[notification {}] {} - {}",
            reminder.notification_id,
            reminder.title,
            reminder.message
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CheckOutcome {
    Success { fired: usize },
    /// Notifications are turned off
    Skipped,
    Failure,
}

fn deliver_due_reminders(conn: &Connection, today: NaiveDate, notifier: &dyn Notifier) -> Result<usize> {
    let payments = get_pending_payments(conn)?;
    let banks = BankRegistry::load(conn)?;

    let reminders = check_due_reminders(&payments, &banks, today);
    for reminder in &reminders {
        notifier.notify(reminder)?;
    }
    Ok(reminders.len())
}

/// Scheduled entry point: never propagates an error
pub fn run_reminder_check(
    conn: &Connection,
    today: NaiveDate,
    notifier: &dyn Notifier,
    enabled: bool,
) -> CheckOutcome {
    if !enabled {
        log::debug!("reminder check skipped: notifications disabled");
        return CheckOutcome::Skipped;
    }

    match deliver_due_reminders(conn, today, notifier) {
        Ok(fired) => {
            log::info!("reminder check for {}: {} notification(s)", today, fired);
            CheckOutcome::Success { fired }
        }
        Err(e) => {
            log::error!("reminder check failed: {:#}", e);
            CheckOutcome::Failure
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::setup_database;
    use crate::entities::bank::{insert_bank, Bank};
    use crate::entities::payment::{insert_payment, CREDIT};
    use chrono::Duration;
    use std::cell::RefCell;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn payment(id: i64, bank_id: i64, due: NaiveDate) -> CardPayment {
        let mut p = CardPayment::new(bank_id, CREDIT, 1500.5, due);
        p.id = id;
        p
    }

    fn registry() -> BankRegistry {
        let mut bbva = Bank::new("BBVA");
        bbva.id = 1;
        BankRegistry::new(vec![bbva])
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: RefCell<Vec<i64>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, reminder: &Reminder) -> Result<()> {
            self.sent.borrow_mut().push(reminder.notification_id);
            Ok(())
        }
    }

    struct FailingNotifier;

    impl Notifier for FailingNotifier {
        fn notify(&self, _reminder: &Reminder) -> Result<()> {
            anyhow::bail!("channel closed")
        }
    }

    #[test]
    fn test_three_days_before() {
        let today = date(2025, 11, 12);
        let reminders = check_due_reminders(&[payment(7, 1, date(2025, 11, 15))], &registry(), today);

        assert_eq!(reminders.len(), 1);
        assert_eq!(reminders[0].kind, ReminderKind::ThreeDaysBefore);
        assert_eq!(reminders[0].notification_id, 7);
        assert_eq!(reminders[0].message, "3 days left to pay BBVA. Debt: $1500.50");
    }

    #[test]
    fn test_due_today_uses_offset_id() {
        let today = date(2025, 11, 15);
        let reminders = check_due_reminders(&[payment(7, 1, today)], &registry(), today);

        assert_eq!(reminders.len(), 1);
        assert_eq!(reminders[0].kind, ReminderKind::DueToday);
        assert_eq!(reminders[0].notification_id, 10007);

        println!("✅ Due-today reminder test passed");
    }

    #[test]
    fn test_other_distances_are_silent() {
        let today = date(2025, 11, 10);
        let payments: Vec<CardPayment> = [-1, 1, 2, 4, 30]
            .iter()
            .map(|d| payment(1, 1, today + Duration::days(*d)))
            .collect();
        assert!(check_due_reminders(&payments, &registry(), today).is_empty());
    }

    #[test]
    fn test_paid_and_unknown_bank() {
        let today = date(2025, 11, 12);
        let mut paid = payment(1, 1, date(2025, 11, 15));
        paid.is_paid = true;
        let orphan = payment(2, 99, today);

        let reminders = check_due_reminders(&[paid, orphan], &registry(), today);
        assert_eq!(reminders.len(), 1);
        assert_eq!(reminders[0].payment_id, 2);
        assert_eq!(reminders[0].bank_name, "Unknown bank");
    }

    #[test]
    fn test_run_reminder_check() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        let bank_id = insert_bank(&conn, &Bank::new("Nu")).unwrap();

        let today = date(2025, 11, 12);
        let soon = insert_payment(&conn, &CardPayment::new(bank_id, CREDIT, 100.0, date(2025, 11, 15))).unwrap();
        let now = insert_payment(&conn, &CardPayment::new(bank_id, CREDIT, 200.0, today)).unwrap();
        insert_payment(&conn, &CardPayment::new(bank_id, CREDIT, 300.0, date(2025, 11, 30))).unwrap();

        let notifier = RecordingNotifier::default();
        let outcome = run_reminder_check(&conn, today, &notifier, true);
        assert_eq!(outcome, CheckOutcome::Success { fired: 2 });

        let mut sent = notifier.sent.borrow().clone();
        sent.sort();
        assert_eq!(sent, vec![soon, now + DUE_TODAY_ID_OFFSET]);

        println!("✅ Reminder check test passed");
    }

    #[test]
    fn test_disabled_and_failing_checks() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        let bank_id = insert_bank(&conn, &Bank::new("Nu")).unwrap();
        let today = date(2025, 11, 12);
        insert_payment(&conn, &CardPayment::new(bank_id, CREDIT, 200.0, today)).unwrap();

        assert_eq!(run_reminder_check(&conn, today, &LogNotifier, false), CheckOutcome::Skipped);
        assert_eq!(run_reminder_check(&conn, today, &FailingNotifier, true), CheckOutcome::Failure);

        // Missing schema is reported, not raised
        let empty = Connection::open_in_memory().unwrap();
        assert_eq!(run_reminder_check(&empty, today, &LogNotifier, true), CheckOutcome::Failure);
    }
}
