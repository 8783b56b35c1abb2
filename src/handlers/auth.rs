// src/handlers/auth.rs

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    config::Config,
    error::{AppError, is_unique_violation},
    handlers::nucleus::load_subscription,
    ledger,
    models::user::{CreateUserRequest, LoginRequest, MeResponse, User},
    utils::{
        jwt::{Claims, ROLE_USER, sign_jwt},
        password::{hash_password, verify_password},
    },
};

/// Registers a new user and grants the signup credits in the same transaction.
///
/// Returns 201 Created and the user object (excluding password).
pub async fn register(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let hashed_password = hash_password(&payload.password)?;

    let mut tx = pool.begin().await?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (username, password, role, created_at)
        VALUES (?, ?, ?, ?)
        RETURNING id, username, password, role, created_at
        "#,
    )
    .bind(&payload.username)
    .bind(&hashed_password)
    .bind(ROLE_USER)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict(format!("Username '{}' already exists", payload.username))
        } else {
            tracing::error!("Failed to register user: {:?}", e);
            AppError::from(e)
        }
    })?;

    if config.signup_credits > 0 {
        ledger::grant(&mut *tx, user.id, config.signup_credits, "signup").await?;
    }

    tx.commit().await?;

    tracing::info!(user_id = user.id, "registered {}", user.username);

    Ok((StatusCode::CREATED, Json(user)))
}

/// Authenticates a user and returns a JWT token.
pub async fn login(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, password, role, created_at FROM users WHERE username = ?",
    )
    .bind(&payload.username)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::AuthError("Invalid username or password".to_string()))?;

    if !verify_password(&payload.password, &user.password)? {
        return Err(AppError::AuthError("Invalid username or password".to_string()));
    }

    let token = sign_jwt(user.id, &user.role, &config.jwt_secret, config.jwt_expiration)?;

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "role": user.role,
    })))
}

/// Current user with credit balance and plan.
pub async fn me(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, password, role, created_at FROM users WHERE id = ?",
    )
    .bind(user_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("User not found".to_string()))?;

    let credits = ledger::balance(&pool, user_id).await?;
    let subscription = load_subscription(&pool, user_id).await?;

    Ok(Json(MeResponse {
        id: user.id,
        username: user.username,
        role: user.role,
        created_at: user.created_at,
        credits,
        plan: subscription.plan.to_string(),
    }))
}
