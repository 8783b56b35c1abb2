// src/models/credit.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// One row of the 'credit_ledger' table. Positive deltas are grants and refunds.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub delta: i64,
    pub reason: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct CreditsResponse {
    pub balance: i64,
    pub entries: Vec<LedgerEntry>,
}

/// DTO for an admin granting credits.
#[derive(Debug, Deserialize, Validate)]
pub struct GrantCreditsRequest {
    #[validate(range(min = 1, max = 1_000_000, message = "Amount must be between 1 and 1000000"))]
    pub amount: i64,

    #[validate(length(max = 200))]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClaimResponse {
    pub granted: i64,
    pub balance: i64,
    pub current_period_end: chrono::DateTime<chrono::Utc>,
}
