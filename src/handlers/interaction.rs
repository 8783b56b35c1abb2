// src/handlers/interaction.rs

//! Comments and votes on blog posts.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    handlers::blog::published_post_id,
    models::{
        comment::{CommentResponse, CreateCommentRequest},
        vote::{VoteRequest, VoteResponse},
    },
    utils::{jwt::Claims, text::strip_tags},
};

/// Create a comment or a reply.
pub async fn create_comment(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(slug): Path<String>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let user_id = claims.user_id()?;

    let body = strip_tags(&payload.body);
    if body.trim().is_empty() {
        return Err(AppError::BadRequest("Comment is empty".to_string()));
    }

    let mut tx = pool.begin().await?;

    let post_id = published_post_id(&mut *tx, &slug).await?;

    // A reply hangs under its parent's root, or under the parent itself
    // when the parent is a root.
    let mut root_id: Option<i64> = None;
    if let Some(pid) = payload.parent_id {
        let (parent_id, parent_root) = sqlx::query_as::<_, (i64, Option<i64>)>(
            "SELECT id, root_id FROM comments WHERE id = ? AND post_id = ? AND deleted_at IS NULL",
        )
        .bind(pid)
        .bind(post_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("Parent comment not found".to_string()))?;

        root_id = Some(parent_root.unwrap_or(parent_id));
    }

    let new_id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO comments (post_id, user_id, body, root_id, parent_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(post_id)
    .bind(user_id)
    .bind(&body)
    .bind(root_id)
    .bind(payload.parent_id)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE posts SET comments_count = comments_count + 1 WHERE id = ?")
        .bind(post_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": new_id })),
    ))
}

/// All visible comments of a post: roots first, each thread oldest first.
pub async fn list_comments(
    State(pool): State<SqlitePool>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let post_id = published_post_id(&pool, &slug).await?;

    let comments = sqlx::query_as::<_, CommentResponse>(
        r#"
        SELECT
            c.id, c.post_id, c.user_id, u.username, c.body,
            c.root_id, c.parent_id, c.created_at
        FROM comments c
        JOIN users u ON c.user_id = u.id
        WHERE c.post_id = ? AND c.deleted_at IS NULL
        ORDER BY c.root_id IS NOT NULL, c.root_id, c.id ASC
        "#,
    )
    .bind(post_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(comments))
}

/// Soft delete. Requires: author or admin.
pub async fn delete_comment(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let mut tx = pool.begin().await?;

    let (author_id, post_id) = sqlx::query_as::<_, (i64, i64)>(
        "SELECT user_id, post_id FROM comments WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::NotFound("Comment not found".to_string()))?;

    if author_id != user_id && !claims.is_admin() {
        return Err(AppError::Forbidden(
            "You are not allowed to delete this comment".to_string(),
        ));
    }

    sqlx::query("UPDATE comments SET deleted_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE posts SET comments_count = MAX(0, comments_count - 1) WHERE id = ?")
        .bind(post_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Set, change or clear (`0`) the caller's vote. The post's score moves by
/// the difference in the same transaction.
pub async fn vote(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(slug): Path<String>,
    Json(payload): Json<VoteRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let user_id = claims.user_id()?;

    let mut tx = pool.begin().await?;

    let post_id = published_post_id(&mut *tx, &slug).await?;

    let previous = sqlx::query_scalar::<_, i64>(
        "SELECT value FROM post_votes WHERE user_id = ? AND post_id = ?",
    )
    .bind(user_id)
    .bind(post_id)
    .fetch_optional(&mut *tx)
    .await?
    .unwrap_or(0);

    if payload.value == 0 {
        sqlx::query("DELETE FROM post_votes WHERE user_id = ? AND post_id = ?")
            .bind(user_id)
            .bind(post_id)
            .execute(&mut *tx)
            .await?;
    } else {
        sqlx::query(
            r#"
            INSERT INTO post_votes (user_id, post_id, value, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id, post_id) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(user_id)
        .bind(post_id)
        .bind(payload.value)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
    }

    let score = sqlx::query_scalar::<_, i64>(
        "UPDATE posts SET score = score + ? WHERE id = ? RETURNING score",
    )
    .bind(payload.value - previous)
    .bind(post_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Json(VoteResponse {
        score,
        vote: payload.value,
    }))
}
