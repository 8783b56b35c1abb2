// src/models/post.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'posts' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub slug: String,
    pub author_id: i64,
    pub author_username: String,
    pub title: String,
    /// Sanitized HTML.
    pub body: String,
    pub published: bool,

    /// Sum of all votes.
    pub score: i64,
    pub comments_count: i64,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a new post.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[validate(length(
        min = 1,
        max = 200,
        message = "Title length must be between 1 and 200 chars"
    ))]
    pub title: String,

    #[validate(length(
        min = 1,
        max = 50000,
        message = "Body length must be between 1 and 50000 chars"
    ))]
    pub body: String,

    /// Derived from the title when absent.
    #[validate(length(min = 1, max = 80))]
    pub slug: Option<String>,

    #[serde(default)]
    pub published: bool,
}

/// DTO for editing a post. Absent fields stay unchanged.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePostRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,

    #[validate(length(min = 1, max = 50000))]
    pub body: Option<String>,

    pub published: Option<bool>,
}

/// Query parameters for listing posts.
#[derive(Debug, Deserialize)]
pub struct PostListParams {
    /// Keyset cursor: only posts with an id below this one.
    pub before: Option<i64>,

    /// Number of items to return (default: 20, max: 100).
    pub limit: Option<i64>,
}
