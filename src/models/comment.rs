// src/models/comment.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// DTO for creating a new comment.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    #[validate(length(
        min = 1,
        max = 2000,
        message = "Comment must be between 1 and 2000 characters"
    ))]
    pub body: String,

    /// Optional: the ID of the comment being replied to.
    pub parent_id: Option<i64>,
}

/// DTO for displaying a comment with author info.
#[derive(Debug, Serialize, FromRow)]
pub struct CommentResponse {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub username: String,
    pub body: String,
    pub root_id: Option<i64>,
    pub parent_id: Option<i64>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
