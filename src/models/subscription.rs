// src/models/subscription.rs

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Days a claimed allowance covers.
pub const PERIOD_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Pro,
    Team,
}

impl Plan {
    pub const ALL: [Plan; 3] = [Plan::Free, Plan::Pro, Plan::Team];

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Pro => "pro",
            Plan::Team => "team",
        }
    }

    pub fn monthly_credits(&self) -> i64 {
        match self {
            Plan::Free => 100,
            Plan::Pro => 2_000,
            Plan::Team => 10_000,
        }
    }

    pub fn price_cents(&self) -> i64 {
        match self {
            Plan::Free => 0,
            Plan::Pro => 1_500,
            Plan::Team => 6_000,
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Plan::Free),
            "pro" => Ok(Plan::Pro),
            "team" => Ok(Plan::Team),
            other => Err(format!("unknown plan '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Canceled,
    PastDue,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::PastDue => "past_due",
        }
    }
}

impl FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SubscriptionStatus::Active),
            "canceled" => Ok(SubscriptionStatus::Canceled),
            "past_due" => Ok(SubscriptionStatus::PastDue),
            other => Err(format!("unknown subscription status '{}'", other)),
        }
    }
}

/// Represents the 'subscriptions' table.
#[derive(Debug, Clone, FromRow)]
pub struct SubscriptionRow {
    pub user_id: i64,
    pub plan: String,
    pub status: String,
    pub current_period_end: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
    pub user_id: i64,
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub current_period_end: Option<chrono::DateTime<chrono::Utc>>,
}

impl Subscription {
    /// What users without a row get.
    pub fn default_for(user_id: i64) -> Self {
        Self {
            user_id,
            plan: Plan::Free,
            status: SubscriptionStatus::Active,
            current_period_end: None,
        }
    }
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = String;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: row.user_id,
            plan: row.plan.parse()?,
            status: row.status.parse()?,
            current_period_end: row.current_period_end,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct PlanInfo {
    pub plan: Plan,
    pub monthly_credits: i64,
    pub price_cents: i64,
}

impl From<Plan> for PlanInfo {
    fn from(plan: Plan) -> Self {
        Self {
            plan,
            monthly_credits: plan.monthly_credits(),
            price_cents: plan.price_cents(),
        }
    }
}

/// DTO for an admin changing a user's subscription.
#[derive(Debug, Deserialize)]
pub struct UpdateSubscriptionRequest {
    pub plan: Plan,
    pub status: SubscriptionStatus,
}
