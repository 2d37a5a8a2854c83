// Card Tracker - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod filters;
pub mod input;
pub mod installments;
pub mod period;
pub mod reminders;
pub mod returns;
pub mod stats;

// Re-export commonly used types
pub use config::{init_logging, Config};
pub use db::{open_database, setup_database, get_events_for_entity, insert_event, Event};
pub use entities::{
    Bank, BankRegistry, CreditUsage, UsageLevel,
    CardPayment, InstallmentInfo, PaymentRecord,
    Institution, InvestmentType,
    Savings, SavingsValue,
};
pub use error::TrackerError;
pub use filters::{DueDateFilter, InvestmentFilter, SavingsFilter, SavingsSort};
pub use installments::{
    create_installment_plan, generate_installments, InstallmentPlan, InstallmentRequest, MonthCount,
};
pub use period::MonthPeriod;
pub use reminders::{
    check_due_reminders, run_reminder_check, CheckOutcome, LogNotifier, Notifier, Reminder,
    ReminderKind,
};
pub use returns::{
    project_returns, project_yield, savings_with_returns, ReturnPeriod, ReturnProjection,
    ReturnsSummary, SavingsReturn,
};
pub use stats::TrackerStats;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
