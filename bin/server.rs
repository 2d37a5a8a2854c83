// Card Tracker - Web Server
// REST API with Axum + daily due-date reminder task

use anyhow::Context;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use chrono::{Local, NaiveDate};
use clap::Parser;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower_http::cors::CorsLayer;

use card_tracker::entities::bank::{delete_bank, get_all_banks, insert_bank, update_bank, BankRegistry};
use card_tracker::entities::history::{export_history_csv, get_all_history, mark_paid_and_archive};
use card_tracker::entities::institution::{get_all_institutions, insert_institution, update_institution};
use card_tracker::entities::payment::{
    delete_payment, get_all_payments, get_payment_by_id, get_pending_payments, insert_payment,
    update_payment, CREDIT,
};
use card_tracker::entities::savings::{delete_savings, get_all_savings, insert_savings, update_savings};
use card_tracker::installments::{create_installment_plan, delete_installment_group, get_installment_group};
use card_tracker::reminders::{check_due_reminders, run_reminder_check, CheckOutcome, LogNotifier, Reminder};
use card_tracker::{
    init_logging, Bank, CardPayment, Config, DueDateFilter, InstallmentPlan, InstallmentRequest,
    Institution, InvestmentFilter, PaymentRecord, ReturnPeriod, ReturnsSummary, Savings,
    SavingsFilter, SavingsReturn, SavingsSort, TrackerError, TrackerStats,
};

const DEFAULT_BIND: &str = "0.0.0.0:3000";

/// First reminder check runs this long after startup
const REMINDER_INITIAL_DELAY: Duration = Duration::from_secs(60 * 60);
const REMINDER_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Parser)]
#[command(name = "card-tracker-server", version, about = "Card Tracker REST API")]
struct ServerCli {
    #[command(flatten)]
    config: Config,

    /// Address to listen on
    #[arg(long, env = "CARD_TRACKER_BIND", default_value = DEFAULT_BIND)]
    bind: String,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    notifications_enabled: bool,
    default_window: DueDateFilter,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        let status = match err.downcast_ref::<TrackerError>() {
            Some(TrackerError::BankNotFound(_))
            | Some(TrackerError::PaymentNotFound(_))
            | Some(TrackerError::InstitutionNotFound(_))
            | Some(TrackerError::SavingsNotFound(_))
            | Some(TrackerError::HistoryNotFound(_)) => StatusCode::NOT_FOUND,
            Some(_) => StatusCode::BAD_REQUEST,
            None => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            log::error!("request failed: {:#}", err);
        }

        ApiError {
            status,
            message: format!("{:#}", err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse {
            success: false,
            data: (),
            error: Some(self.message),
        };
        (self.status, Json(body)).into_response()
    }
}

impl AppState {
    /// Run a query against the shared connection
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> anyhow::Result<T>) -> Result<T, ApiError> {
        let conn = self
            .db
            .lock()
            .map_err(|_| anyhow::anyhow!("database lock poisoned"))?;
        Ok(f(&*conn)?)
    }
}

fn parse_param<T: FromStr<Err = String>>(value: Option<&str>, default: T) -> Result<T, ApiError> {
    match value {
        Some(v) => v.parse().map_err(ApiError::bad_request),
        None => Ok(default),
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/banks
async fn list_banks(State(state): State<AppState>) -> ApiResult<Vec<Bank>> {
    Ok(Json(ApiResponse::ok(state.with_conn(get_all_banks)?)))
}

/// POST /api/banks
async fn create_bank(State(state): State<AppState>, Json(mut bank): Json<Bank>) -> ApiResult<Bank> {
    bank.id = state.with_conn(|conn| insert_bank(conn, &bank))?;
    Ok(Json(ApiResponse::ok(bank)))
}

/// PUT /api/banks/:id
async fn edit_bank(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(mut bank): Json<Bank>,
) -> ApiResult<Bank> {
    bank.id = id;
    state.with_conn(|conn| update_bank(conn, &bank))?;
    Ok(Json(ApiResponse::ok(bank)))
}

/// DELETE /api/banks/:id
async fn remove_bank(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<i64> {
    state.with_conn(|conn| delete_bank(conn, id))?;
    Ok(Json(ApiResponse::ok(id)))
}

#[derive(Deserialize)]
struct PaymentQuery {
    window: Option<String>,
}

/// GET /api/payments?window=next-3-weeks|this-week|this-month|all
async fn list_payments(
    State(state): State<AppState>,
    Query(query): Query<PaymentQuery>,
) -> ApiResult<Vec<CardPayment>> {
    let window = parse_param(query.window.as_deref(), state.default_window)?;
    let payments = state.with_conn(get_all_payments)?;
    Ok(Json(ApiResponse::ok(window.apply(&payments, today()))))
}

/// GET /api/payments/pending
async fn list_pending(State(state): State<AppState>) -> ApiResult<Vec<CardPayment>> {
    Ok(Json(ApiResponse::ok(state.with_conn(get_pending_payments)?)))
}

#[derive(Deserialize)]
struct NewPayment {
    bank_id: i64,
    card_type: Option<String>,
    debt: f64,
    minimum_payment: Option<f64>,
    due_date: NaiveDate,
    note: Option<String>,
}

/// POST /api/payments
async fn create_payment(
    State(state): State<AppState>,
    Json(req): Json<NewPayment>,
) -> ApiResult<CardPayment> {
    let card_type = req.card_type.as_deref().unwrap_or(CREDIT);
    let mut payment = CardPayment::new(req.bank_id, card_type, req.debt, req.due_date)
        .with_minimum(req.minimum_payment)
        .with_note(req.note);

    payment.id = state.with_conn(|conn| insert_payment(conn, &payment))?;
    Ok(Json(ApiResponse::ok(payment)))
}

/// PUT /api/payments/:id - Paid state and MSI metadata are kept
async fn edit_payment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<NewPayment>,
) -> ApiResult<CardPayment> {
    let payment = state.with_conn(|conn| {
        let mut payment = get_payment_by_id(conn, id)?.ok_or(TrackerError::PaymentNotFound(id))?;
        payment.bank_id = req.bank_id;
        if let Some(card_type) = req.card_type {
            payment.card_type = card_type;
        }
        payment.debt = req.debt;
        payment.minimum_payment = req.minimum_payment;
        payment.set_due_date(req.due_date);
        payment = payment.with_note(req.note);

        update_payment(conn, &payment)?;
        Ok(payment)
    })?;
    Ok(Json(ApiResponse::ok(payment)))
}

/// DELETE /api/payments/:id
async fn remove_payment(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<i64> {
    state.with_conn(|conn| delete_payment(conn, id))?;
    Ok(Json(ApiResponse::ok(id)))
}

#[derive(Deserialize, Default)]
struct PayRequest {
    paid_on: Option<NaiveDate>,
}

/// POST /api/payments/:id/pay - Archive into history
async fn pay_payment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Option<Json<PayRequest>>,
) -> ApiResult<PaymentRecord> {
    let paid_on = body.and_then(|Json(req)| req.paid_on).unwrap_or_else(today);
    let record = state.with_conn(|conn| mark_paid_and_archive(conn, id, paid_on))?;
    Ok(Json(ApiResponse::ok(record)))
}

/// POST /api/msi - Create an installment plan
async fn create_msi(
    State(state): State<AppState>,
    Json(req): Json<InstallmentRequest>,
) -> ApiResult<InstallmentPlan> {
    let plan = state.with_conn(|conn| create_installment_plan(conn, &req))?;
    Ok(Json(ApiResponse::ok(plan)))
}

/// GET /api/msi/:group
async fn show_msi(State(state): State<AppState>, Path(group): Path<String>) -> ApiResult<Vec<CardPayment>> {
    let payments = state.with_conn(|conn| get_installment_group(conn, &group))?;
    Ok(Json(ApiResponse::ok(payments)))
}

/// DELETE /api/msi/:group
async fn remove_msi(State(state): State<AppState>, Path(group): Path<String>) -> ApiResult<usize> {
    let deleted = state.with_conn(|conn| delete_installment_group(conn, &group))?;
    Ok(Json(ApiResponse::ok(deleted)))
}

/// GET /api/history
async fn list_history(State(state): State<AppState>) -> ApiResult<Vec<PaymentRecord>> {
    Ok(Json(ApiResponse::ok(state.with_conn(get_all_history)?)))
}

/// GET /api/history/export - CSV download
async fn export_history(State(state): State<AppState>) -> Result<Response, ApiError> {
    let csv = state.with_conn(|conn| {
        let mut buf = Vec::new();
        export_history_csv(&get_all_history(conn)?, &mut buf)?;
        Ok(String::from_utf8(buf)?)
    })?;
    Ok(([(header::CONTENT_TYPE, "text/csv")], csv).into_response())
}

/// GET /api/institutions
async fn list_institutions(State(state): State<AppState>) -> ApiResult<Vec<Institution>> {
    Ok(Json(ApiResponse::ok(state.with_conn(get_all_institutions)?)))
}

/// POST /api/institutions
async fn create_institution(
    State(state): State<AppState>,
    Json(mut institution): Json<Institution>,
) -> ApiResult<Institution> {
    institution.id = state.with_conn(|conn| insert_institution(conn, &institution))?;
    Ok(Json(ApiResponse::ok(institution)))
}

/// PUT /api/institutions/:id - Type changes are refused while savings exist
async fn edit_institution(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(mut institution): Json<Institution>,
) -> ApiResult<Institution> {
    institution.id = id;
    state.with_conn(|conn| update_institution(conn, &institution))?;
    Ok(Json(ApiResponse::ok(institution)))
}

#[derive(Deserialize)]
struct SavingsQuery {
    #[serde(rename = "type")]
    investment_type: Option<String>,
    institution: Option<i64>,
    sort: Option<String>,
    search: Option<String>,
}

/// GET /api/savings?type=&institution=&sort=&search=
async fn list_savings(
    State(state): State<AppState>,
    Query(query): Query<SavingsQuery>,
) -> ApiResult<Vec<Savings>> {
    let filter = SavingsFilter {
        investment_type: parse_param(query.investment_type.as_deref(), InvestmentFilter::All)?,
        institution_id: query.institution,
        sort: parse_param(query.sort.as_deref(), SavingsSort::default())?,
        search: query.search.unwrap_or_default(),
    };

    let (savings, institutions) =
        state.with_conn(|conn| Ok((get_all_savings(conn)?, get_all_institutions(conn)?)))?;
    Ok(Json(ApiResponse::ok(filter.apply(&savings, &institutions))))
}

/// POST /api/savings
async fn create_savings(
    State(state): State<AppState>,
    Json(mut savings): Json<Savings>,
) -> ApiResult<Savings> {
    savings.id = state.with_conn(|conn| insert_savings(conn, &savings))?;
    Ok(Json(ApiResponse::ok(savings)))
}

/// PUT /api/savings/:id
async fn edit_savings(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(mut savings): Json<Savings>,
) -> ApiResult<Savings> {
    savings.id = id;
    state.with_conn(|conn| update_savings(conn, &savings))?;
    Ok(Json(ApiResponse::ok(savings)))
}

/// DELETE /api/savings/:id
async fn remove_savings(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<i64> {
    state.with_conn(|conn| delete_savings(conn, id))?;
    Ok(Json(ApiResponse::ok(id)))
}

#[derive(Deserialize)]
struct ReturnsQuery {
    period: Option<String>,
}

#[derive(Serialize)]
struct ReturnsResponse {
    summary: ReturnsSummary,
    positions: Vec<SavingsReturn>,
}

/// GET /api/returns?period=daily|weekly|monthly|annual
async fn get_returns(
    State(state): State<AppState>,
    Query(query): Query<ReturnsQuery>,
) -> ApiResult<ReturnsResponse> {
    let period = parse_param(query.period.as_deref(), ReturnPeriod::Monthly)?;
    let positions = state.with_conn(|conn| {
        Ok(card_tracker::savings_with_returns(
            &get_all_savings(conn)?,
            &get_all_institutions(conn)?,
        ))
    })?;

    Ok(Json(ApiResponse::ok(ReturnsResponse {
        summary: ReturnsSummary::from_returns(&positions, period),
        positions,
    })))
}

/// GET /api/stats
async fn get_stats(State(state): State<AppState>) -> ApiResult<TrackerStats> {
    Ok(Json(ApiResponse::ok(state.with_conn(TrackerStats::load)?)))
}

/// GET /api/reminders - Reminders that would fire today (no delivery)
async fn preview_reminders(State(state): State<AppState>) -> ApiResult<Vec<Reminder>> {
    let reminders = state.with_conn(|conn| {
        let payments = get_pending_payments(conn)?;
        let banks = BankRegistry::load(conn)?;
        Ok(check_due_reminders(&payments, &banks, today()))
    })?;
    Ok(Json(ApiResponse::ok(reminders)))
}

/// POST /api/remind - Run the reminder check now
async fn trigger_reminders(State(state): State<AppState>) -> ApiResult<CheckOutcome> {
    Ok(Json(ApiResponse::ok(check_now(&state.db, state.notifications_enabled))))
}

// ============================================================================
// Reminder Task
// ============================================================================

fn check_now(db: &Mutex<Connection>, enabled: bool) -> CheckOutcome {
    match db.lock() {
        Ok(conn) => run_reminder_check(&conn, today(), &LogNotifier, enabled),
        Err(_) => {
            log::error!("reminder check skipped: database lock poisoned");
            CheckOutcome::Failure
        }
    }
}

fn spawn_reminder_task(db: Arc<Mutex<Connection>>, enabled: bool) {
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + REMINDER_INITIAL_DELAY;
        let mut ticker = tokio::time::interval_at(start, REMINDER_PERIOD);

        loop {
            ticker.tick().await;
            check_now(&db, enabled);
        }
    });
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = ServerCli::parse();

    println!("🌐 Card Tracker - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let conn = cli.config.open_database()?;
    println!("✓ Database opened: {}", cli.config.db_path.display());

    // Create shared state
    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
        notifications_enabled: cli.config.notifications_enabled(),
        default_window: cli.config.window,
    };

    spawn_reminder_task(state.db.clone(), state.notifications_enabled);
    if state.notifications_enabled {
        println!("✓ Reminder check scheduled (first run in 1h, then every 24h)");
    } else {
        println!("🔕 Notifications disabled");
    }

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/banks", get(list_banks).post(create_bank))
        .route("/banks/:id", put(edit_bank).delete(remove_bank))
        .route("/payments", get(list_payments).post(create_payment))
        .route("/payments/pending", get(list_pending))
        .route("/payments/:id", put(edit_payment).delete(remove_payment))
        .route("/payments/:id/pay", post(pay_payment))
        .route("/msi", post(create_msi))
        .route("/msi/:group", get(show_msi).delete(remove_msi))
        .route("/history", get(list_history))
        .route("/history/export", get(export_history))
        .route("/institutions", get(list_institutions).post(create_institution))
        .route("/institutions/:id", put(edit_institution))
        .route("/savings", get(list_savings).post(create_savings))
        .route("/savings/:id", put(edit_savings).delete(remove_savings))
        .route("/returns", get(get_returns))
        .route("/stats", get(get_stats))
        .route("/reminders", get(preview_reminders))
        .route("/remind", post(trigger_reminders))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    // Start server
    let listener = tokio::net::TcpListener::bind(&cli.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", cli.bind))?;

    println!("\n🚀 Server running on http://{}", cli.bind);
    println!("   API: http://{}/api/payments", cli.bind);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
