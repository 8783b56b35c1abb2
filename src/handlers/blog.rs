// src/handlers/blog.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::{Executor, Sqlite, SqlitePool};
use validator::Validate;

use crate::{
    error::{AppError, is_unique_violation},
    models::post::{CreatePostRequest, Post, PostListParams, UpdatePostRequest},
    utils::{
        jwt::Claims,
        text::{sanitize_html, slugify},
    },
};

const POST_SELECT: &str = r#"
    SELECT
        p.id, p.slug, p.author_id, u.username AS author_username,
        p.title, p.body, p.published, p.score, p.comments_count,
        p.created_at, p.updated_at
    FROM posts p
    JOIN users u ON u.id = p.author_id
"#;

/// Id of the published post behind `slug`, or 404.
pub async fn published_post_id<'e, E>(executor: E, slug: &str) -> Result<i64, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar::<_, i64>("SELECT id FROM posts WHERE slug = ? AND published = 1")
        .bind(slug)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::NotFound("Post not found".to_string()))
}

async fn fetch_post(pool: &SqlitePool, slug: &str, published_only: bool) -> Result<Post, AppError> {
    let sql = format!(
        "{} WHERE p.slug = ? AND (? = 0 OR p.published = 1)",
        POST_SELECT
    );
    sqlx::query_as::<_, Post>(&sql)
        .bind(slug)
        .bind(published_only)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Post not found".to_string()))
}

/// List published posts, newest first.
/// Keyset pagination: pass the last id seen as `before`.
pub async fn list_posts(
    State(pool): State<SqlitePool>,
    Query(params): Query<PostListParams>,
) -> Result<impl IntoResponse, AppError> {
    let limit = params.limit.unwrap_or(20).clamp(1, 100);

    let sql = format!(
        "{} WHERE p.published = 1 AND (?1 IS NULL OR p.id < ?1) ORDER BY p.id DESC LIMIT ?2",
        POST_SELECT
    );
    let posts = sqlx::query_as::<_, Post>(&sql)
        .bind(params.before)
        .bind(limit)
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list posts: {:?}", e);
            AppError::from(e)
        })?;

    Ok(Json(posts))
}

/// Get a single published post by slug.
pub async fn get_post(
    State(pool): State<SqlitePool>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(fetch_post(&pool, &slug, true).await?))
}

/// Create a new post. Admin only.
pub async fn create_post(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let author_id = claims.user_id()?;

    let slug = slugify(payload.slug.as_deref().unwrap_or(&payload.title));
    let body = sanitize_html(&payload.body);
    let now = Utc::now();

    let post_id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO posts (slug, author_id, title, body, published, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(&slug)
    .bind(author_id)
    .bind(payload.title.trim())
    .bind(&body)
    .bind(payload.published)
    .bind(now)
    .bind(now)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict(format!("Slug '{}' is already taken", slug))
        } else {
            tracing::error!("Failed to create post: {:?}", e);
            AppError::from(e)
        }
    })?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": post_id, "slug": slug })),
    ))
}

/// Edit title, body or visibility. Admin only.
pub async fn update_post(
    State(pool): State<SqlitePool>,
    Path(slug): Path<String>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let current = fetch_post(&pool, &slug, false).await?;

    let title = payload
        .title
        .as_deref()
        .map(str::trim)
        .unwrap_or(&current.title)
        .to_string();
    let body = payload
        .body
        .as_deref()
        .map(sanitize_html)
        .unwrap_or(current.body);
    let published = payload.published.unwrap_or(current.published);

    sqlx::query("UPDATE posts SET title = ?, body = ?, published = ?, updated_at = ? WHERE id = ?")
        .bind(&title)
        .bind(&body)
        .bind(published)
        .bind(Utc::now())
        .bind(current.id)
        .execute(&pool)
        .await?;

    Ok(Json(fetch_post(&pool, &slug, false).await?))
}

/// Delete a post. Comments and votes go with it. Admin only.
pub async fn delete_post(
    State(pool): State<SqlitePool>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM posts WHERE slug = ?")
        .bind(&slug)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete post: {:?}", e);
            AppError::from(e)
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Post not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
