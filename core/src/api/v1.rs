//! Version 1 of the HTTP API.
//!
//! Handlers validate input, run database work on the blocking pool through
//! [`ApiState::with_conn`] and return JSON payloads.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use super::auth::{hash_password, verify_password, AccessToken, AuthUser};
use super::error::{ApiError, ApiResult};
use super::ApiState;
use crate::agents::{ChainOutcome, ChatContext};
use crate::calendar::{self, CalendarStats, WeekSchedule, DEFAULT_STATS_DAYS};
use crate::db::table_names;
use crate::errors::StudyError;
use crate::logging::{log_event, EventLevel};
use crate::store::chat::{self, ChatMessageRecord};
use crate::store::plans::{self, NewStudyPlan, StudyPlanRecord};
use crate::store::sessions::{self, NewStudySession, StudySessionRecord};
use crate::store::users::{self, UserRecord};

const SERVICE_NAME: &str = "LoackIn API";
const DEFAULT_SESSION_LIMIT: usize = 100;
const DEFAULT_HISTORY_LIMIT: usize = 50;
const DEFAULT_UPCOMING_LIMIT: usize = 10;

/// Follow-up prompts offered with every chat reply.
pub const SUGGESTIONS: [&str; 4] = [
    "How can I apply this to my current studies?",
    "Can you give me more specific examples?",
    "What should I do next?",
    "How do I stay consistent with this approach?",
];

pub async fn root() -> Json<Value> {
    Json(json!({
        "message": format!("Welcome to {SERVICE_NAME}"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Liveness probe that also confirms the database answers.
pub async fn health(State(state): State<ApiState>) -> ApiResult<Json<Value>> {
    let tables = state
        .with_conn(|conn| Ok(table_names(conn)?))
        .await?;
    let providers: Vec<&str> = state.chain.providers().iter().map(|name| name.label()).collect();
    Ok(Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "tables": tables.len(),
        "providers": providers,
    })))
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: Option<String>,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn register(
    State(state): State<ApiState>,
    Json(input): Json<RegisterRequest>,
) -> ApiResult<Json<UserRecord>> {
    let email = users::normalise_email(&input.email);
    if !email.contains('@') {
        return Err(StudyError::InvalidInput("email address is not valid".into()).into());
    }
    if input.password.is_empty() {
        return Err(StudyError::InvalidInput("password must not be empty".into()).into());
    }
    let password_hash = hash_password(input.password, state.password_cost).await?;
    let user = state
        .with_conn(move |conn| {
            let user = users::create_user(conn, &email, input.username.as_deref(), &password_hash)?;
            log_event(
                conn,
                EventLevel::Info,
                Some("USR-0100"),
                "auth",
                "user registered",
                None,
                Some(json!({ "user_id": user.id })),
            )?;
            Ok(user)
        })
        .await?;
    Ok(Json(user))
}

pub async fn login(
    State(state): State<ApiState>,
    Json(input): Json<LoginRequest>,
) -> ApiResult<Json<AccessToken>> {
    let email = input.email.clone();
    let user = state
        .with_conn(move |conn| users::find_by_email(conn, &email))
        .await?
        .ok_or(ApiError(StudyError::InvalidCredentials))?;
    let Some(hash) = user.password_hash.clone() else {
        return Err(StudyError::InvalidCredentials.into());
    };
    if !verify_password(input.password, hash).await? {
        return Err(StudyError::InvalidCredentials.into());
    }
    if !user.is_active {
        return Err(StudyError::InactiveUser.into());
    }
    Ok(Json(state.tokens.issue(&user.email)?))
}

pub async fn me(AuthUser(user): AuthUser) -> Json<UserRecord> {
    Json(user)
}

pub async fn refresh(
    State(state): State<ApiState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<AccessToken>> {
    Ok(Json(state.tokens.issue(&user.email)?))
}

// ---------------------------------------------------------------------------
// Study plans and sessions
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

pub async fn generate_plan(
    State(state): State<ApiState>,
    AuthUser(user): AuthUser,
    Json(input): Json<NewStudyPlan>,
) -> ApiResult<Json<StudyPlanRecord>> {
    let plan = state
        .with_conn(move |conn| plans::create_plan(conn, &user.id, &input))
        .await?;
    Ok(Json(plan))
}

pub async fn current_plan(
    State(state): State<ApiState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<StudyPlanRecord>> {
    let plan = state
        .with_conn(move |conn| plans::current_plan(conn, &user.id))
        .await?;
    Ok(Json(plan))
}

pub async fn plan_history(
    State(state): State<ApiState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Vec<StudyPlanRecord>>> {
    let history = state
        .with_conn(move |conn| plans::plan_history(conn, &user.id))
        .await?;
    Ok(Json(history))
}

pub async fn create_session(
    State(state): State<ApiState>,
    AuthUser(user): AuthUser,
    Json(input): Json<NewStudySession>,
) -> ApiResult<Json<StudySessionRecord>> {
    let session = state
        .with_conn(move |conn| sessions::create_session(conn, &user.id, &input))
        .await?;
    Ok(Json(session))
}

pub async fn list_sessions(
    State(state): State<ApiState>,
    AuthUser(user): AuthUser,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<Vec<StudySessionRecord>>> {
    let limit = query.limit.unwrap_or(DEFAULT_SESSION_LIMIT);
    let list = state
        .with_conn(move |conn| sessions::list_sessions(conn, &user.id, limit))
        .await?;
    Ok(Json(list))
}

pub async fn complete_session(
    State(state): State<ApiState>,
    AuthUser(user): AuthUser,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Value>> {
    state
        .with_conn(move |conn| sessions::complete_session(conn, &user.id, &session_id))
        .await?;
    Ok(Json(json!({ "message": "Session marked as completed" })))
}

// ---------------------------------------------------------------------------
// AI chat
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub context: Option<ChatContext>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub suggestions: Vec<String>,
    /// Provider label, or `fallback` when the rule-based responder answered.
    pub provider: &'static str,
}

fn message_digest(message: &str) -> String {
    format!("{:x}", Sha256::digest(message.as_bytes()))
}

pub async fn chat(
    State(state): State<ApiState>,
    AuthUser(user): AuthUser,
    Json(input): Json<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    if input.message.trim().is_empty() {
        return Err(StudyError::InvalidInput("message must not be empty".into()).into());
    }

    let outcome = state
        .chain
        .generate_reply(&input.message, input.context.as_ref())
        .await;
    let provider = outcome.provider().map(|name| name.label()).unwrap_or("fallback");
    let (level, code, note) = match &outcome {
        ChainOutcome::Success(_) => (EventLevel::Info, "AI-0200", "provider answered"),
        ChainOutcome::Fallback(_) => (EventLevel::Warn, "AI-0300", "fallback rules answered"),
    };
    let reply = outcome.into_text();

    let message = input.message;
    let stored_reply = reply.clone();
    state
        .with_conn(move |conn| {
            chat::append_exchange(conn, &user.id, &message, &stored_reply)?;
            log_event(
                conn,
                level,
                Some(code),
                "ai_chat",
                note,
                None,
                Some(json!({
                    "user_id": user.id,
                    "provider": provider,
                    "message_sha256": message_digest(&message),
                })),
            )?;
            Ok(())
        })
        .await?;

    Ok(Json(ChatResponse {
        response: reply,
        suggestions: SUGGESTIONS.iter().map(|s| s.to_string()).collect(),
        provider,
    }))
}

pub async fn chat_history(
    State(state): State<ApiState>,
    AuthUser(user): AuthUser,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<Vec<ChatMessageRecord>>> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let history = state
        .with_conn(move |conn| chat::recent_messages(conn, &user.id, limit))
        .await?;
    Ok(Json(history))
}

pub async fn clear_chat_history(
    State(state): State<ApiState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Value>> {
    let deleted = state
        .with_conn(move |conn| chat::clear_messages(conn, &user.id))
        .await?;
    Ok(Json(json!({ "message": "Chat history cleared", "deleted": deleted })))
}

// ---------------------------------------------------------------------------
// Calendar
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct WeekQuery {
    pub start_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub days: Option<i64>,
}

pub async fn week(
    State(state): State<ApiState>,
    AuthUser(user): AuthUser,
    Query(query): Query<WeekQuery>,
) -> ApiResult<Json<WeekSchedule>> {
    let start = match query.start_date.as_deref() {
        Some(raw) => calendar::parse_start_date(raw)?,
        None => calendar::week_start(OffsetDateTime::now_utc()),
    };
    let schedule = state
        .with_conn(move |conn| calendar::week_schedule(conn, &user.id, start))
        .await?;
    Ok(Json(schedule))
}

pub async fn upcoming(
    State(state): State<ApiState>,
    AuthUser(user): AuthUser,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<Vec<StudySessionRecord>>> {
    let limit = query.limit.unwrap_or(DEFAULT_UPCOMING_LIMIT);
    let now = OffsetDateTime::now_utc();
    let list = state
        .with_conn(move |conn| sessions::upcoming_sessions(conn, &user.id, now, limit))
        .await?;
    Ok(Json(list))
}

pub async fn stats(
    State(state): State<ApiState>,
    AuthUser(user): AuthUser,
    Query(query): Query<StatsQuery>,
) -> ApiResult<Json<CalendarStats>> {
    let days = query.days.unwrap_or(DEFAULT_STATS_DAYS);
    let now = OffsetDateTime::now_utc();
    let summary = state
        .with_conn(move |conn| calendar::stats(conn, &user.id, now, days))
        .await?;
    Ok(Json(summary))
}

pub async fn delete_session(
    State(state): State<ApiState>,
    AuthUser(user): AuthUser,
    Path(session_id): Path<String>,
) -> ApiResult<Json<Value>> {
    state
        .with_conn(move |conn| sessions::delete_session(conn, &user.id, &session_id))
        .await?;
    Ok(Json(json!({ "message": "Study session deleted successfully" })))
}
