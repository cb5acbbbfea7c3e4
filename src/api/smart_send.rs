use axum::extract::{ Path, Query, State };
use axum::Json;
use chrono::{ DateTime, Duration, Utc };
use serde::{ Deserialize, Serialize };
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::crypto::Credential;
use crate::db::{ recurring_rule, scheduled_transaction, NewRule, NewSchedule };
use crate::enums::{ Chain, Frequency, ScheduleStatus };
use crate::error::{ AppError, Result };
use crate::services::{ ComparisonService, FeeComparison, SavingsStats };

use super::AppState;

const DEFAULT_MAX_WAIT_HOURS: i64 = 24;
const THRESHOLD_HEADROOM: f64 = 1.1;

// ─── compare ────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CompareQuery {
    pub chain: String,
}

pub async fn compare(
    State(state): State<AppState>,
    Query(query): Query<CompareQuery>,
) -> Result<Json<FeeComparison>> {
    let chain: Chain = query.chain.parse()?;
    Ok(Json(state.comparison.compare(chain).await))
}

// ─── schedule ───────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ScheduleRequest {
    pub user_id: String,
    pub chain: String,
    pub from_address: String,
    pub to_address: String,
    pub amount: String,
    pub token_address: Option<String>,
    pub token_symbol: String,
    /// Seed phrase authorizing the transfer; sealed immediately, never
    /// stored in the clear.
    pub mnemonic: String,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub max_wait_hours: Option<i64>,
    #[serde(default)]
    pub use_optimal_timing: bool,
    #[serde(default)]
    pub priority: i32,
    pub memo: Option<String>,
}

#[derive(Serialize)]
pub struct ScheduleResponse {
    pub id: Uuid,
    pub status: ScheduleStatus,
    pub scheduled_for: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub estimated_fee_rate: f64,
    pub estimated_fee_usd: f64,
    pub optimal_gas_threshold: Option<f64>,
}

pub async fn create_schedule(
    State(state): State<AppState>,
    Json(request): Json<ScheduleRequest>,
) -> Result<Json<ScheduleResponse>> {
    let chain: Chain = request.chain.parse()?;
    validate_amount(&request.amount)?;
    if request.from_address.trim().is_empty() || request.to_address.trim().is_empty() {
        return Err(AppError::InvalidAddress);
    }

    let phrase = Zeroizing::new(request.mnemonic);
    bip39::Mnemonic::parse(phrase.as_str()).map_err(|_| AppError::InvalidMnemonic)?;
    let credential = Credential::new(phrase.to_string());

    let now = Utc::now();
    let quote = state.fees.quote(chain).await;
    let spot = state.prices.spot_usd(chain).await;
    let estimated_fee_usd = ComparisonService::transfer_fee_usd(chain, quote.standard, spot);

    let scheduled_for = match request.scheduled_for {
        Some(at) if at >= now => at,
        Some(_) => {
            return Err(AppError::InvalidInput("scheduled_for is in the past".to_string()));
        }
        None if request.use_optimal_timing => ComparisonService::next_cheap_window(now),
        None => now,
    };

    let max_wait = request.max_wait_hours.unwrap_or(DEFAULT_MAX_WAIT_HOURS);
    if !(1..=168).contains(&max_wait) {
        return Err(AppError::InvalidInput("max_wait_hours must be 1..=168".to_string()));
    }
    let expires_at = scheduled_for + Duration::hours(max_wait);

    let optimal_gas_threshold = request.use_optimal_timing.then(
        || quote.standard * THRESHOLD_HEADROOM
    );

    let id = Uuid::new_v4();
    let encrypted_auth = state.vault.seal(&credential, id)?;

    let row = state.schedules.create(NewSchedule {
        id,
        user_id: request.user_id,
        chain: chain.to_string(),
        from_address: request.from_address,
        to_address: request.to_address,
        amount: request.amount,
        token_address: request.token_address,
        token_symbol: request.token_symbol,
        priority: request.priority,
        memo: request.memo,
        scheduled_for,
        expires_at,
        optimal_gas_threshold,
        encrypted_auth: Some(encrypted_auth),
        estimated_fee_rate: quote.standard,
        estimated_fee_usd,
        recurring_rule_id: None,
    }).await?;

    Ok(
        Json(ScheduleResponse {
            id: row.id,
            status: ScheduleStatus::Pending,
            scheduled_for: row.scheduled_for,
            expires_at: row.expires_at,
            estimated_fee_rate: row.estimated_fee_rate,
            estimated_fee_usd: row.estimated_fee_usd,
            optimal_gas_threshold: row.optimal_gas_threshold,
        })
    )
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub user_id: String,
    pub status: Option<String>,
}

pub async fn list_schedules(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<scheduled_transaction::Model>>> {
    let status = query.status.as_deref().map(str::parse::<ScheduleStatus>).transpose()?;
    let rows = state.schedules.list_for_user(&query.user_id, status).await?;
    Ok(Json(rows))
}

#[derive(Deserialize)]
pub struct OwnerQuery {
    pub user_id: String,
}

pub async fn cancel_schedule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<scheduled_transaction::Model>> {
    let cancelled = state.schedules.cancel(id, &query.user_id).await?;
    if !cancelled {
        return Err(AppError::ScheduleNotFound);
    }
    let row = state.schedules.find_by_id(id).await?.ok_or(AppError::ScheduleNotFound)?;
    Ok(Json(row))
}

#[derive(Deserialize)]
pub struct AttachAuthRequest {
    pub user_id: String,
    pub mnemonic: String,
}

/// Attach a credential to a row materialized from a recurring rule,
/// making it auto-executable.
pub async fn attach_auth(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AttachAuthRequest>,
) -> Result<Json<scheduled_transaction::Model>> {
    let row = state.schedules.find_by_id(id).await?.ok_or(AppError::ScheduleNotFound)?;
    if row.user_id != request.user_id {
        return Err(AppError::ScheduleNotFound);
    }

    let phrase = Zeroizing::new(request.mnemonic);
    bip39::Mnemonic::parse(phrase.as_str()).map_err(|_| AppError::InvalidMnemonic)?;
    let credential = Credential::new(phrase.to_string());

    let encrypted_auth = state.vault.seal(&credential, id)?;
    state.schedules.attach_auth(id, encrypted_auth).await?;

    let row = state.schedules.find_by_id(id).await?.ok_or(AppError::ScheduleNotFound)?;
    Ok(Json(row))
}

// ─── recurring ──────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RecurringRequest {
    pub user_id: String,
    pub chain: String,
    pub from_address: String,
    pub to_address: String,
    pub amount: String,
    pub token_address: Option<String>,
    pub token_symbol: String,
    pub frequency: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub use_optimal_timing: bool,
    pub label: Option<String>,
}

pub async fn create_recurring(
    State(state): State<AppState>,
    Json(request): Json<RecurringRequest>,
) -> Result<Json<recurring_rule::Model>> {
    let chain: Chain = request.chain.parse()?;
    let frequency: Frequency = request.frequency.parse()?;
    validate_amount(&request.amount)?;

    let now = Utc::now();
    // First boundary defaults to the next overnight low-fee window.
    let start = request.start_date.unwrap_or_else(|| ComparisonService::next_cheap_window(now));
    if start < now {
        return Err(AppError::InvalidInput("start_date is in the past".to_string()));
    }
    if request.end_date.is_some_and(|end| end <= start) {
        return Err(AppError::InvalidInput("end_date must be after start_date".to_string()));
    }

    let rule = state.rules.create(NewRule {
        user_id: request.user_id,
        chain: chain.to_string(),
        from_address: request.from_address,
        to_address: request.to_address,
        amount: request.amount,
        token_address: request.token_address,
        token_symbol: request.token_symbol.clone(),
        frequency: frequency.to_string(),
        start_date: start,
        end_date: request.end_date,
        next_execution: start,
        use_optimal_timing: request.use_optimal_timing,
        label: request.label.unwrap_or_else(|| {
            format!("{} {}", frequency, request.token_symbol)
        }),
    }).await?;

    Ok(Json(rule))
}

pub async fn list_recurring(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<Vec<recurring_rule::Model>>> {
    let rules = state.rules.list_for_user(&query.user_id).await?;
    Ok(Json(rules))
}

pub async fn cancel_recurring(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<recurring_rule::Model>> {
    let cancelled = state.rules.cancel(id, &query.user_id).await?;
    if !cancelled {
        return Err(AppError::ScheduleNotFound);
    }
    let rules = state.rules.list_for_user(&query.user_id).await?;
    rules
        .into_iter()
        .find(|r| r.id == id)
        .map(Json)
        .ok_or(AppError::ScheduleNotFound)
}

// ─── savings ────────────────────────────────────────────────────────

pub async fn savings(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<SavingsStats>> {
    Ok(Json(state.savings.stats(&query.user_id).await?))
}

fn validate_amount(amount: &str) -> Result<()> {
    let parsed: f64 = amount
        .parse()
        .map_err(|_| AppError::InvalidInput("amount must be a decimal number".to_string()))?;
    if parsed <= 0.0 || !parsed.is_finite() {
        return Err(AppError::InvalidInput("amount must be positive".to_string()));
    }
    Ok(())
}
