// src/models/vote.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

/// DTO for voting on a post. `0` clears the caller's vote.
#[derive(Debug, Deserialize, Validate)]
pub struct VoteRequest {
    #[validate(range(min = -1, max = 1, message = "Vote must be -1, 0 or 1"))]
    pub value: i64,
}

#[derive(Debug, Serialize)]
pub struct VoteResponse {
    pub score: i64,
    pub vote: i64,
}
