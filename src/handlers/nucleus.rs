// src/handlers/nucleus.rs

//! Nucleus: plans, subscriptions, the credits ledger and billed chat.

use std::sync::Arc;

use axum::{Extension, Json, extract::State, response::IntoResponse};
use chrono::{Duration, Utc};
use sqlx::{Executor, Sqlite, SqlitePool};
use tokio::sync::oneshot;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    ledger,
    llm::{ChatBackend, LlmRegistry, ModelRef},
    models::{
        chat::{BilledChatResponse, ChatRequest},
        credit::{ClaimResponse, CreditsResponse},
        subscription::{PERIOD_DAYS, Plan, PlanInfo, Subscription, SubscriptionRow, SubscriptionStatus},
    },
    utils::jwt::Claims,
};

const RECENT_ENTRIES: i64 = 20;

/// The user's subscription; users without a row are on the free plan.
pub async fn load_subscription<'e, E>(executor: E, user_id: i64) -> Result<Subscription, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, SubscriptionRow>(
        "SELECT user_id, plan, status, current_period_end FROM subscriptions WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(executor)
    .await?;

    match row {
        Some(row) => Subscription::try_from(row).map_err(AppError::InternalServerError),
        None => Ok(Subscription::default_for(user_id)),
    }
}

/// Inserts or replaces the user's subscription row.
pub async fn upsert_subscription<'e, E>(executor: E, subscription: &Subscription) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO subscriptions (user_id, plan, status, current_period_end, updated_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            plan = excluded.plan,
            status = excluded.status,
            current_period_end = excluded.current_period_end,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(subscription.user_id)
    .bind(subscription.plan.as_str())
    .bind(subscription.status.as_str())
    .bind(subscription.current_period_end)
    .bind(Utc::now())
    .execute(executor)
    .await?;

    Ok(())
}

/// Static plan catalog.
pub async fn list_plans() -> impl IntoResponse {
    let plans: Vec<PlanInfo> = Plan::ALL.into_iter().map(PlanInfo::from).collect();
    Json(plans)
}

pub async fn get_credits(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let balance = ledger::balance(&pool, user_id).await?;
    let entries = ledger::recent_entries(&pool, user_id, RECENT_ENTRIES).await?;

    Ok(Json(CreditsResponse { balance, entries }))
}

/// Grants the plan's monthly allowance once per period.
pub async fn claim_allowance(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let now = Utc::now();

    let mut tx = pool.begin().await?;

    let mut subscription = load_subscription(&mut *tx, user_id).await?;

    if subscription.status != SubscriptionStatus::Active {
        return Err(AppError::Conflict(format!(
            "Subscription is {}",
            subscription.status.as_str()
        )));
    }
    if let Some(end) = subscription.current_period_end {
        if end > now {
            return Err(AppError::Conflict(format!(
                "Allowance already claimed for the period ending {}",
                end.to_rfc3339()
            )));
        }
    }

    let period_end = now + Duration::days(PERIOD_DAYS);
    subscription.current_period_end = Some(period_end);
    upsert_subscription(&mut *tx, &subscription).await?;

    let granted = subscription.plan.monthly_credits();
    ledger::grant(
        &mut *tx,
        user_id,
        granted,
        &format!("{} allowance", subscription.plan),
    )
    .await?;

    let balance = ledger::balance(&mut *tx, user_id).await?;

    tx.commit().await?;

    tracing::info!(user_id, granted, "monthly allowance claimed");

    Ok(Json(ClaimResponse {
        granted,
        balance,
        current_period_end: period_end,
    }))
}

pub async fn get_subscription(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let subscription = load_subscription(&pool, claims.user_id()?).await?;
    Ok(Json(subscription))
}

/// One completion from any provider, paid for with credits.
///
/// The cost is taken before the call and given back if the backend fails or
/// the client disconnects before the reply is ready. The debit, the call and
/// the refund run in their own task so a dropped request cannot skip the refund.
pub async fn billed_chat(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    State(registry): State<Arc<LlmRegistry>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ChatRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let user_id = claims.user_id()?;

    let model: ModelRef = payload.model.parse()?;
    let backend = registry
        .resolve(&model)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    // Dropped together with this handler's future; the task treats that as a disconnect.
    let (_client, client_gone) = oneshot::channel::<()>();

    let task = tokio::spawn(settle_chat(
        pool,
        backend,
        model,
        payload,
        user_id,
        config.chat_credit_cost,
        client_gone,
    ));
    let response = task
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))??;

    Ok(Json(response))
}

async fn settle_chat(
    pool: SqlitePool,
    backend: Arc<dyn ChatBackend>,
    model: ModelRef,
    payload: ChatRequest,
    user_id: i64,
    cost: i64,
    client_gone: oneshot::Receiver<()>,
) -> Result<BilledChatResponse, AppError> {
    let reason = format!("chat {}", model);
    if !ledger::debit(&pool, user_id, cost, &reason).await? {
        return Err(AppError::PaymentRequired("Not enough credits".to_string()));
    }

    let options = payload.options();
    let reply = tokio::select! {
        reply = backend.chat(&model.model, &payload.messages, &options) => Some(reply),
        _ = client_gone => None,
    };

    match reply {
        Some(Ok(completion)) => {
            let balance = ledger::balance(&pool, user_id).await?;
            Ok(BilledChatResponse {
                completion,
                balance,
            })
        }
        Some(Err(e)) => {
            ledger::refund(&pool, user_id, cost, &reason).await?;
            Err(e.into())
        }
        None => {
            tracing::info!(user_id, model = %model, "client went away, chat refunded");
            ledger::refund(&pool, user_id, cost, &reason).await?;
            Err(AppError::BadGateway("Client disconnected".to_string()))
        }
    }
}
