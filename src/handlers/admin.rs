// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    handlers::nucleus::{load_subscription, upsert_subscription},
    ledger,
    models::{
        credit::GrantCreditsRequest,
        subscription::UpdateSubscriptionRequest,
        user::AdminUserRow,
    },
};

async fn ensure_user(pool: &SqlitePool, id: i64) -> Result<(), AppError> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .map(|_| ())
        .ok_or(AppError::NotFound("User not found".to_string()))
}

/// Lists all users with their balances and plans.
/// Admin only.
pub async fn list_users(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let users = sqlx::query_as::<_, AdminUserRow>(
        r#"
        SELECT
            u.id, u.username, u.role, u.created_at,
            COALESCE((SELECT SUM(delta) FROM credit_ledger WHERE user_id = u.id), 0) AS credits,
            COALESCE((SELECT plan FROM subscriptions WHERE user_id = u.id), 'free') AS plan
        FROM users u
        ORDER BY u.id DESC
        "#,
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list users: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(users))
}

/// Grants credits to a user.
/// Admin only.
pub async fn grant_credits(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<GrantCreditsRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    ensure_user(&pool, id).await?;

    let reason = payload
        .reason
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or("admin grant");
    ledger::grant(&pool, id, payload.amount, reason).await?;

    let balance = ledger::balance(&pool, id).await?;
    tracing::info!(user_id = id, amount = payload.amount, "credits granted");

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "balance": balance })),
    ))
}

/// Sets a user's plan and status. The current period is kept.
/// Admin only.
pub async fn update_subscription(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateSubscriptionRequest>,
) -> Result<impl IntoResponse, AppError> {
    ensure_user(&pool, id).await?;

    let mut subscription = load_subscription(&pool, id).await?;
    subscription.plan = payload.plan;
    subscription.status = payload.status;
    upsert_subscription(&pool, &subscription).await?;

    tracing::info!(user_id = id, plan = %subscription.plan, "subscription updated");

    Ok(Json(subscription))
}
