// src/models/roundrobin.rs

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use validator::Validate;

/// Serialize is needed by validator to report nested errors.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ParticipantRequest {
    /// `provider:model`.
    #[validate(length(min = 3, max = 200))]
    pub model: String,

    #[validate(length(min = 1, max = 40))]
    pub label: Option<String>,

    #[validate(range(min = 256, max = 1_000_000))]
    pub context_chars: Option<usize>,
}

/// DTO for starting a round-robin session.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSessionRequest {
    #[validate(length(min = 1, max = 8000, message = "Topic must be between 1 and 8000 characters"))]
    pub topic: String,

    #[validate(length(max = 4000))]
    pub system_prompt: Option<String>,

    #[validate(
        length(min = 2, max = 6, message = "Between 2 and 6 participants are allowed"),
        nested
    )]
    pub participants: Vec<ParticipantRequest>,

    #[validate(range(min = 1, max = 10, message = "Rounds must be between 1 and 10"))]
    pub rounds: u32,

    /// Move the opening speaker one seat forward every round.
    #[serde(default)]
    pub rotate_opening: bool,

    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: Option<f32>,

    #[validate(range(min = 1, max = 32768))]
    pub max_tokens: Option<u32>,
}

/// Query parameters for listing sessions.
#[derive(Debug, Deserialize)]
pub struct SessionListParams {
    /// Keyset cursor: only sessions with an id below this one.
    pub before: Option<i64>,

    /// Number of items to return (default: 20, max: 100).
    pub limit: Option<i64>,
}

/// Represents the 'roundrobin_sessions' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SessionRecord {
    pub id: i64,
    pub user_id: i64,
    pub topic: String,
    pub status: String,
    pub rounds: i64,
    /// Model references in seat order.
    pub participants: Json<Vec<String>>,
    pub credits_charged: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'roundrobin_turns' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TurnRecord {
    pub turn_index: i64,
    pub round: i64,
    pub seat: i64,
    pub model: String,
    pub label: String,
    pub status: String,
    pub content: Option<String>,
    pub error: Option<String>,
    pub attempts: i64,
    pub latency_ms: i64,
}

#[derive(Debug, Serialize)]
pub struct SessionDetail {
    #[serde(flatten)]
    pub session: SessionRecord,
    pub turns: Vec<TurnRecord>,
}
