// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use std::fs::File;
use std::path::PathBuf;

use card_tracker::entities::bank::{
    delete_bank, get_all_banks, insert_bank, update_bank, Bank, BankRegistry,
};
use card_tracker::entities::history::{
    delete_history, export_history_csv, get_all_history, get_history_by_bank, mark_paid_and_archive,
};
use card_tracker::entities::institution::{
    delete_institution, get_all_institutions, get_institution_by_id, get_institutions_by_type,
    insert_institution, update_institution, Institution, InvestmentType,
};
use card_tracker::entities::payment::{
    delete_payment, get_all_payments, get_payment_by_id, get_pending_payments, insert_payment,
    update_payment, CardPayment, CREDIT, DEBIT,
};
use card_tracker::entities::savings::{
    delete_savings, get_all_savings, get_savings_by_id, insert_savings, update_savings, Savings,
    SavingsValue,
};
use card_tracker::filters::{DueDateFilter, InvestmentFilter, SavingsFilter, SavingsSort};
use card_tracker::input::{coerce_amount, coerce_amount_or_zero, coerce_optional_amount};
use card_tracker::installments::{
    create_installment_plan, delete_installment_group, get_installment_group, InstallmentRequest, MonthCount,
};
use card_tracker::period::{days_until, parse_date, MonthPeriod};
use card_tracker::reminders::{run_reminder_check, CheckOutcome, LogNotifier};
use card_tracker::returns::{savings_with_returns, ReturnPeriod, ReturnsSummary};
use card_tracker::stats::TrackerStats;
use card_tracker::{init_logging, Config, TrackerError};

#[derive(Parser)]
#[command(name = "card-tracker", version, about = "Card payments, MSI plans and savings tracker")]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Manage banks
    Bank {
        #[command(subcommand)]
        cmd: BankCmd,
    },
    /// Manage card payments
    Payment {
        #[command(subcommand)]
        cmd: PaymentCmd,
    },
    /// Interest-free installment plans
    Msi {
        #[command(subcommand)]
        cmd: MsiCmd,
    },
    /// Settled payments
    History {
        #[command(subcommand)]
        cmd: HistoryCmd,
    },
    /// Manage financial institutions
    Institution {
        #[command(subcommand)]
        cmd: InstitutionCmd,
    },
    /// Manage savings positions
    Savings {
        #[command(subcommand)]
        cmd: SavingsCmd,
    },
    /// Projected yield of savings
    Returns {
        #[arg(long, default_value = "monthly")]
        period: ReturnPeriod,
    },
    /// Debt and savings statistics
    Stats,
    /// Run the due-date reminder check (meant for a daily cron job)
    Remind {
        /// Check as of this date instead of today
        #[arg(long, value_parser = parse_day)]
        today: Option<NaiveDate>,
    },
    /// Interactive terminal dashboard (default)
    Dashboard,
}

#[derive(Subcommand)]
enum BankCmd {
    Add {
        name: String,
        #[arg(long)]
        payment_day: Option<u32>,
        #[arg(long)]
        statement_day: Option<u32>,
        #[arg(long, value_parser = parse_amount)]
        limit: Option<f64>,
        #[arg(long)]
        logo: Option<String>,
    },
    /// Change only the given fields; a blank --limit clears it
    Edit {
        /// Bank id or name
        bank: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        payment_day: Option<u32>,
        #[arg(long)]
        statement_day: Option<u32>,
        #[arg(long)]
        limit: Option<String>,
        #[arg(long)]
        logo: Option<String>,
    },
    List,
    Delete {
        /// Bank id or name
        bank: String,
    },
}

#[derive(Subcommand)]
enum PaymentCmd {
    Add {
        /// Bank id or name
        bank: String,
        #[arg(value_parser = parse_amount)]
        debt: f64,
        /// Due date (YYYY-MM-DD)
        #[arg(value_parser = parse_day)]
        due: NaiveDate,
        #[arg(long, value_parser = parse_amount)]
        minimum: Option<f64>,
        #[arg(long)]
        note: Option<String>,
        /// Debit card instead of credit
        #[arg(long)]
        debit: bool,
    },
    List {
        /// Override the configured due-date window
        #[arg(long = "show")]
        show: Option<DueDateFilter>,
        /// Only unpaid payments
        #[arg(long)]
        pending: bool,
    },
    /// Change only the given fields; a blank --minimum clears it
    Edit {
        id: i64,
        #[arg(long, value_parser = parse_amount)]
        debt: Option<f64>,
        #[arg(long, value_parser = parse_day)]
        due: Option<NaiveDate>,
        #[arg(long)]
        minimum: Option<String>,
        #[arg(long)]
        note: Option<String>,
    },
    /// Mark as paid and move to history
    Pay {
        id: i64,
        #[arg(long, value_parser = parse_day)]
        on: Option<NaiveDate>,
    },
    Delete {
        id: i64,
    },
}

#[derive(Subcommand)]
enum MsiCmd {
    Create {
        /// Bank id or name
        bank: String,
        #[arg(value_parser = parse_amount)]
        total: f64,
        /// 3, 6, 9, 12, 18 or 24
        #[arg(value_parser = parse_months)]
        months: MonthCount,
        description: String,
        /// First installment period (YYYY-MM), default this month
        #[arg(long)]
        start: Option<MonthPeriod>,
    },
    Show {
        group: String,
    },
    Delete {
        group: String,
    },
}

#[derive(Subcommand)]
enum HistoryCmd {
    List {
        /// Bank id or name
        #[arg(long)]
        bank: Option<String>,
    },
    Export {
        file: PathBuf,
    },
    Delete {
        id: i64,
    },
}

#[derive(Subcommand)]
enum InstitutionCmd {
    Add {
        name: String,
        /// card, stocks, crypto or cetes
        investment_type: InvestmentType,
        /// Annual yield in percent
        #[arg(long = "yield", value_parser = parse_amount)]
        annual_yield: Option<f64>,
        #[arg(long)]
        logo: Option<String>,
    },
    /// Change only the given fields; a blank --yield clears it
    Edit {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        /// Only while the institution holds no savings
        #[arg(long = "type")]
        investment_type: Option<InvestmentType>,
        #[arg(long = "yield")]
        annual_yield: Option<String>,
        #[arg(long)]
        logo: Option<String>,
    },
    List {
        #[arg(long = "type")]
        investment_type: Option<InvestmentType>,
    },
    Delete {
        id: i64,
    },
}

#[derive(Subcommand)]
enum SavingsCmd {
    Add {
        institution: i64,
        name: String,
        /// Card and CETES amount
        #[arg(long, value_parser = parse_amount)]
        amount: Option<f64>,
        /// Stocks and crypto quantity
        #[arg(long, value_parser = parse_amount)]
        quantity: Option<f64>,
        /// Stocks and crypto unit price
        #[arg(long, value_parser = parse_amount)]
        price: Option<f64>,
        #[arg(long)]
        ticker: Option<String>,
        #[arg(long)]
        term_days: Option<u32>,
        #[arg(long, value_parser = parse_amount)]
        rate: Option<f64>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_parser = parse_day)]
        date: Option<NaiveDate>,
    },
    /// Change only the given fields; a blank --quantity or --price means 0
    Edit {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, value_parser = parse_amount)]
        amount: Option<f64>,
        #[arg(long)]
        quantity: Option<String>,
        #[arg(long)]
        price: Option<String>,
        #[arg(long)]
        ticker: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    List {
        #[arg(long = "type", default_value = "all")]
        investment_type: InvestmentFilter,
        #[arg(long)]
        institution: Option<i64>,
        /// value-desc, value-asc, date-desc, date-asc, name-asc, name-desc
        #[arg(long, default_value = "date-desc")]
        sort: SavingsSort,
        #[arg(long, default_value = "")]
        search: String,
    },
    Delete {
        id: i64,
    },
}

fn parse_amount(s: &str) -> Result<f64, String> {
    coerce_amount(s).ok_or_else(|| format!("'{}' is not an amount", s))
}

fn parse_day(s: &str) -> Result<NaiveDate, String> {
    parse_date(s).map_err(|e| e.to_string())
}

fn parse_months(s: &str) -> Result<MonthCount, String> {
    let months: u32 = s.trim().parse().map_err(|_| format!("'{}' is not a number", s))?;
    MonthCount::try_from(months).map_err(|e| e.to_string())
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn main() {
    init_logging();

    if let Err(err) = run() {
        eprintln!("❌ {:#}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config;
    let conn = config.open_database()?;

    match cli.command.unwrap_or(Command::Dashboard) {
        Command::Bank { cmd } => run_bank(&conn, cmd),
        Command::Payment { cmd } => run_payment(&conn, &config, cmd),
        Command::Msi { cmd } => run_msi(&conn, cmd),
        Command::History { cmd } => run_history(&conn, cmd),
        Command::Institution { cmd } => run_institution(&conn, cmd),
        Command::Savings { cmd } => run_savings(&conn, cmd),
        Command::Returns { period } => run_returns(&conn, period),
        Command::Stats => run_stats(&conn),
        Command::Remind { today: on } => run_remind(&conn, &config, on.unwrap_or_else(today)),
        Command::Dashboard => run_ui_mode(&conn, &config),
    }
}

fn resolve_bank(conn: &Connection, key: &str) -> Result<Bank> {
    let registry = BankRegistry::load(conn)?;
    registry
        .resolve(key)
        .cloned()
        .with_context(|| format!("no bank matches '{}'", key))
}

// ============================================================================
// BANKS
// ============================================================================

fn run_bank(conn: &Connection, cmd: BankCmd) -> Result<()> {
    match cmd {
        BankCmd::Add { name, payment_day, statement_day, limit, logo } => {
            let bank = Bank {
                id: 0,
                name,
                logo_path: logo,
                credit_limit: limit,
                statement_day,
                payment_day,
            };
            let id = insert_bank(conn, &bank)?;
            println!("✅ Bank '{}' added (id {})", bank.name, id);
        }
        BankCmd::Edit { bank, name, payment_day, statement_day, limit, logo } => {
            let mut bank = resolve_bank(conn, &bank)?;
            if let Some(name) = name {
                bank.name = name;
            }
            if payment_day.is_some() {
                bank.payment_day = payment_day;
            }
            if statement_day.is_some() {
                bank.statement_day = statement_day;
            }
            if let Some(raw) = limit {
                bank.credit_limit = coerce_optional_amount(Some(&raw));
            }
            if logo.is_some() {
                bank.logo_path = logo;
            }
            update_bank(conn, &bank)?;
            println!("✅ Bank {} updated: '{}'", bank.id, bank.name);
        }
        BankCmd::List => {
            let banks = get_all_banks(conn)?;
            println!("🏦 {} bank(s)", banks.len());
            for bank in banks {
                println!(
                    "  {:>3}  {:<20} cut: {:>4}  pay: {:>4}  limit: {}",
                    bank.id,
                    bank.name,
                    day_label(bank.statement_day),
                    day_label(bank.payment_day),
                    bank.credit_limit.map(|l| format!("{:.2}", l)).unwrap_or_else(|| "-".into()),
                );
            }
        }
        BankCmd::Delete { bank } => {
            let bank = resolve_bank(conn, &bank)?;
            delete_bank(conn, bank.id)?;
            println!("🗑️  Bank '{}' deleted with its pending payments", bank.name);
        }
    }
    Ok(())
}

fn day_label(day: Option<u32>) -> String {
    day.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())
}

// ============================================================================
// PAYMENTS
// ============================================================================

fn run_payment(conn: &Connection, config: &Config, cmd: PaymentCmd) -> Result<()> {
    match cmd {
        PaymentCmd::Add { bank, debt, due, minimum, note, debit } => {
            let bank = resolve_bank(conn, &bank)?;
            let card_type = if debit { DEBIT } else { CREDIT };
            let payment = CardPayment::new(bank.id, card_type, debt, due)
                .with_minimum(minimum)
                .with_note(note);
            let id = insert_payment(conn, &payment)?;
            println!(
                "✅ Payment {} added: {} ${:.2} due {} ({})",
                id,
                bank.name,
                debt,
                due,
                payment.period()
            );
        }
        PaymentCmd::List { show, pending } => {
            let banks = BankRegistry::load(conn)?;
            let payments = if pending {
                get_pending_payments(conn)?
            } else {
                get_all_payments(conn)?
            };

            let today = today();
            let window = show.unwrap_or(config.window);
            let visible = window.apply(&payments, today);

            println!("💳 {} payment(s) [{}]", visible.len(), window.label());
            for p in &visible {
                let bank_name = banks.name_of(p.bank_id).unwrap_or("?");
                let status = if p.is_paid {
                    "paid".to_string()
                } else {
                    format!("{:>3}d", days_until(today, p.due_date))
                };
                let extra = p
                    .installment
                    .as_ref()
                    .map(|m| format!("{} {}", m.label(), m.description))
                    .or_else(|| p.note.clone())
                    .unwrap_or_default();
                println!(
                    "  {:>4}  {}  {:<16} {:>12.2}  {}  {}",
                    p.id, p.due_date, bank_name, p.debt, status, extra
                );

                if let Some(usage) = banks.find_by_id(p.bank_id).and_then(|b| b.credit_usage(p.debt)) {
                    println!(
                        "        usage {}% ({:?}), available {:.2}",
                        usage.percent, usage.level, usage.available
                    );
                }
            }
        }
        PaymentCmd::Edit { id, debt, due, minimum, note } => {
            let mut payment = get_payment_by_id(conn, id)?.ok_or(TrackerError::PaymentNotFound(id))?;
            if let Some(debt) = debt {
                payment.debt = debt;
            }
            if let Some(due) = due {
                payment.set_due_date(due);
            }
            if let Some(raw) = minimum {
                payment.minimum_payment = coerce_optional_amount(Some(&raw));
            }
            if note.is_some() {
                payment = payment.with_note(note);
            }
            update_payment(conn, &payment)?;
            println!(
                "✅ Payment {} updated: ${:.2} due {} ({})",
                id,
                payment.debt,
                payment.due_date,
                payment.period()
            );
        }
        PaymentCmd::Pay { id, on } => {
            let record = mark_paid_and_archive(conn, id, on.unwrap_or_else(today))?;
            println!(
                "✅ Payment {} paid: {} ${:.2} (history {})",
                id, record.bank_name, record.debt, record.id
            );
            if record.was_late() {
                println!("⚠️  Paid {} after the due date {}", record.paid_date, record.due_date);
            }
        }
        PaymentCmd::Delete { id } => {
            delete_payment(conn, id)?;
            println!("🗑️  Payment {} deleted", id);
        }
    }
    Ok(())
}

// ============================================================================
// MSI PLANS
// ============================================================================

fn run_msi(conn: &Connection, cmd: MsiCmd) -> Result<()> {
    match cmd {
        MsiCmd::Create { bank, total, months, description, start } => {
            let bank = resolve_bank(conn, &bank)?;
            let request = InstallmentRequest {
                bank_id: bank.id,
                description,
                total_amount: total,
                months,
                start: start.unwrap_or_else(|| MonthPeriod::from_date(today())),
            };

            let plan = create_installment_plan(conn, &request)?;
            println!(
                "✅ MSI plan {} created at {}: {} x ${:.2}",
                plan.group_id, plan.bank_name, months.months(), plan.monthly_amount
            );
            for p in &plan.payments {
                let label = p.installment.as_ref().map(|m| m.label()).unwrap_or_default();
                println!("  {:>4}  {}  {:>10.2}  {}", p.id, p.due_date, p.debt, label);
            }
        }
        MsiCmd::Show { group } => {
            let payments = get_installment_group(conn, &group)?;
            if payments.is_empty() {
                bail!("no installments left in plan {}", group);
            }
            println!("🧾 Plan {}", group);
            for p in &payments {
                if let Some(m) = &p.installment {
                    println!(
                        "  {:>4}  {}  {:>10.2}  {}  {}",
                        p.id,
                        p.due_date,
                        p.debt,
                        m.label(),
                        m.description
                    );
                }
            }
        }
        MsiCmd::Delete { group } => {
            let deleted = delete_installment_group(conn, &group)?;
            println!("🗑️  {} installment(s) of plan {} deleted", deleted, group);
        }
    }
    Ok(())
}

// ============================================================================
// HISTORY
// ============================================================================

fn run_history(conn: &Connection, cmd: HistoryCmd) -> Result<()> {
    match cmd {
        HistoryCmd::List { bank } => {
            let records = match bank {
                Some(key) => get_history_by_bank(conn, resolve_bank(conn, &key)?.id)?,
                None => get_all_history(conn)?,
            };
            println!("🧾 {} settled payment(s)", records.len());
            for r in &records {
                println!(
                    "  {:>4}  paid {}  due {}  {:<16} {:>12.2}{}",
                    r.id,
                    r.paid_date,
                    r.due_date,
                    r.bank_name,
                    r.debt,
                    if r.was_late() { "  (late)" } else { "" }
                );
            }
        }
        HistoryCmd::Export { file } => {
            let records = get_all_history(conn)?;
            let out = File::create(&file)
                .with_context(|| format!("Failed to create {}", file.display()))?;
            let written = export_history_csv(&records, out)?;
            println!("✅ Exported {} record(s) to {}", written, file.display());
        }
        HistoryCmd::Delete { id } => {
            delete_history(conn, id)?;
            println!("🗑️  History record {} deleted", id);
        }
    }
    Ok(())
}

// ============================================================================
// INSTITUTIONS & SAVINGS
// ============================================================================

fn run_institution(conn: &Connection, cmd: InstitutionCmd) -> Result<()> {
    match cmd {
        InstitutionCmd::Add { name, investment_type, annual_yield, logo } => {
            let mut institution = Institution::new(name, investment_type);
            institution.annual_yield = annual_yield;
            institution.logo_path = logo;
            let id = insert_institution(conn, &institution)?;
            println!("✅ Institution '{}' added (id {})", institution.name, id);
        }
        InstitutionCmd::Edit { id, name, investment_type, annual_yield, logo } => {
            let mut institution =
                get_institution_by_id(conn, id)?.ok_or(TrackerError::InstitutionNotFound(id))?;
            if let Some(name) = name {
                institution.name = name;
            }
            if let Some(t) = investment_type {
                institution.investment_type = t;
            }
            if let Some(raw) = annual_yield {
                institution.annual_yield = coerce_optional_amount(Some(&raw));
            }
            if logo.is_some() {
                institution.logo_path = logo;
            }
            update_institution(conn, &institution)?;
            println!("✅ Institution {} updated: '{}'", id, institution.name);
        }
        InstitutionCmd::List { investment_type } => {
            let institutions = match investment_type {
                Some(t) => get_institutions_by_type(conn, t)?,
                None => get_all_institutions(conn)?,
            };
            println!("🏛️  {} institution(s)", institutions.len());
            for i in institutions {
                println!(
                    "  {:>3}  {:<20} {:<7} {}",
                    i.id,
                    i.name,
                    i.investment_type,
                    i.annual_yield.map(|y| format!("{:.2}%", y)).unwrap_or_default()
                );
            }
        }
        InstitutionCmd::Delete { id } => {
            delete_institution(conn, id)?;
            println!("🗑️  Institution {} deleted with its savings", id);
        }
    }
    Ok(())
}

fn run_savings(conn: &Connection, cmd: SavingsCmd) -> Result<()> {
    match cmd {
        SavingsCmd::Add {
            institution,
            name,
            amount,
            quantity,
            price,
            ticker,
            term_days,
            rate,
            description,
            date,
        } => {
            let inst = get_institution_by_id(conn, institution)?
                .with_context(|| format!("institution {} not found", institution))?;

            let value = match inst.investment_type {
                InvestmentType::Card => SavingsValue::Card {
                    amount: amount.context("--amount is required for a Card institution")?,
                },
                InvestmentType::Stocks => SavingsValue::Stocks {
                    quantity: quantity.context("--quantity is required for stocks")?,
                    unit_price: price.context("--price is required for stocks")?,
                    ticker,
                },
                InvestmentType::Crypto => SavingsValue::Crypto {
                    quantity: quantity.context("--quantity is required for crypto")?,
                    unit_price: price.context("--price is required for crypto")?,
                    ticker,
                },
                InvestmentType::Cetes => SavingsValue::Cetes {
                    amount: amount.context("--amount is required for CETES")?,
                    term_days,
                    rate,
                },
            };

            let mut savings = Savings::new(inst.id, name, date.unwrap_or_else(today), value);
            savings.description = description;
            let id = insert_savings(conn, &savings)?;
            println!(
                "✅ Savings '{}' added at {} (id {}): ${:.2}",
                savings.name,
                inst.name,
                id,
                savings.current_value()
            );
        }
        SavingsCmd::Edit { id, name, amount, quantity, price, ticker, description } => {
            let mut savings = get_savings_by_id(conn, id)?.ok_or(TrackerError::SavingsNotFound(id))?;
            if let Some(name) = name {
                savings.name = name;
            }
            if description.is_some() {
                savings.description = description;
            }
            patch_value(&mut savings.value, amount, quantity, price, ticker);
            update_savings(conn, &savings)?;
            println!(
                "✅ Savings {} updated: '{}' ${:.2}",
                id,
                savings.name,
                savings.current_value()
            );
        }
        SavingsCmd::List { investment_type, institution, sort, search } => {
            let institutions = get_all_institutions(conn)?;
            let filter = SavingsFilter {
                investment_type,
                institution_id: institution,
                sort,
                search,
            };
            let savings = filter.apply(&get_all_savings(conn)?, &institutions);

            let total: f64 = savings.iter().map(|s| s.current_value()).sum();
            println!("💰 {} position(s), total ${:.2}", savings.len(), total);
            for s in &savings {
                let inst_name = institutions
                    .iter()
                    .find(|i| i.id == s.institution_id)
                    .map(|i| i.name.as_str())
                    .unwrap_or("?");
                println!(
                    "  {:>4}  {}  {:<24} {:<16} {:>12.2}",
                    s.id,
                    s.created_on,
                    s.name,
                    inst_name,
                    s.current_value()
                );
            }
        }
        SavingsCmd::Delete { id } => {
            delete_savings(conn, id)?;
            println!("🗑️  Savings position {} deleted", id);
        }
    }
    Ok(())
}

/// Apply edits that fit the position's shape; the rest are ignored
fn patch_value(
    value: &mut SavingsValue,
    amount: Option<f64>,
    quantity: Option<String>,
    price: Option<String>,
    new_ticker: Option<String>,
) {
    match value {
        SavingsValue::Card { amount: current } | SavingsValue::Cetes { amount: current, .. } => {
            if let Some(amount) = amount {
                *current = amount;
            }
        }
        SavingsValue::Stocks { quantity: q, unit_price, ticker }
        | SavingsValue::Crypto { quantity: q, unit_price, ticker } => {
            if let Some(raw) = quantity {
                *q = coerce_amount_or_zero(&raw);
            }
            if let Some(raw) = price {
                *unit_price = coerce_amount_or_zero(&raw);
            }
            if new_ticker.is_some() {
                *ticker = new_ticker;
            }
        }
    }
}

fn run_returns(conn: &Connection, period: ReturnPeriod) -> Result<()> {
    let returns = savings_with_returns(&get_all_savings(conn)?, &get_all_institutions(conn)?);
    let summary = ReturnsSummary::from_returns(&returns, period);

    println!("📈 Projected {} returns", period.label());
    for r in &returns {
        println!(
            "  {:<24} {:<16} {:>6.2}%  {:>12.2} -> {:>10.2}",
            r.savings.name,
            r.institution.name,
            r.annual_rate,
            r.amount,
            r.returns.for_period(period)
        );
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(
        "  Invested: ${:.2}   Yield: ${:.2}",
        summary.total_invested, summary.total_yield
    );
    Ok(())
}

fn run_stats(conn: &Connection) -> Result<()> {
    let stats = TrackerStats::load(conn)?;

    println!("📊 Pending debt: ${:.2}", stats.total_pending);

    println!("\n📅 Debt by period");
    for t in &stats.debts_by_period {
        println!("  {}  {:>12.2}", t.period, t.total);
    }

    println!("\n🏦 Pending by bank");
    for t in &stats.pending_by_bank {
        println!("  {:<20} {:>12.2}", t.bank_name, t.total);
    }

    println!("\n🧾 Paid by date");
    for t in &stats.paid_by_date {
        println!("  {}  {:>12.2}", t.paid_date, t.total);
    }

    println!("\n💰 Savings by type (total ${:.2})", stats.total_savings());
    for t in &stats.savings_by_type {
        println!("  {:<8} {:>12.2}", t.investment_type, t.total);
    }
    Ok(())
}

fn run_remind(conn: &Connection, config: &Config, on: NaiveDate) -> Result<()> {
    match run_reminder_check(conn, on, &LogNotifier, config.notifications_enabled()) {
        CheckOutcome::Success { fired } => println!("🔔 {} reminder(s) for {}", fired, on),
        CheckOutcome::Skipped => println!("🔕 Notifications are disabled"),
        CheckOutcome::Failure => bail!("reminder check failed (see log)"),
    }
    Ok(())
}

// ============================================================================
// DASHBOARD
// ============================================================================

#[cfg(feature = "tui")]
fn run_ui_mode(conn: &Connection, config: &Config) -> Result<()> {
    println!("🖥️  Loading Card Tracker dashboard...\n");

    let data = ui::DashboardData {
        today: today(),
        banks: BankRegistry::load(conn)?,
        payments: get_all_payments(conn)?,
        institutions: get_all_institutions(conn)?,
        savings: get_all_savings(conn)?,
    };

    println!(
        "✓ Loaded {} payments and {} savings positions\n",
        data.payments.len(),
        data.savings.len()
    );

    let mut app = ui::App::new(data, config.window);
    ui::run_ui(&mut app)?;

    println!("\n✅ Dashboard closed");

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_conn: &Connection, _config: &Config) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the API: cargo run --bin card-tracker-server --features server");
    std::process::exit(1);
}
