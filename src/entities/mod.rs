// Entity models and their SQLite repositories
//
// Each entity module holds:
// - the record type (row id + values)
// - from_row mapping and insert/update/delete/query functions on &Connection
// - an audit event for every write

pub mod bank;
pub mod history;
pub mod institution;
pub mod payment;
pub mod savings;

pub use bank::{Bank, BankRegistry, CreditUsage, UsageLevel};
pub use history::PaymentRecord;
pub use institution::{Institution, InvestmentType};
pub use payment::{CardPayment, InstallmentInfo};
pub use savings::{Savings, SavingsValue};
