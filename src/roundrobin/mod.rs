// src/roundrobin/mod.rs

//! Round-robin chat: several models take turns answering one topic.
//!
//! The [`TurnScheduler`] decides who speaks next, [`prompt::build_prompt`]
//! renders the transcript from the speaker's point of view within its
//! character budget, and the [`Orchestrator`] drives the session with the
//! [`RetryPolicy`], benching seats that keep failing.

pub mod orchestrator;
pub mod policy;
pub mod prompt;
pub mod schedule;

use serde::{Deserialize, Serialize};

use crate::llm::{ChatOptions, ModelRef};

pub use orchestrator::Orchestrator;
pub use policy::RetryPolicy;
pub use schedule::{Slot, TurnScheduler};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub model: ModelRef,
    pub label: String,
    /// Character budget for everything sent to this model in one turn.
    pub context_chars: usize,
}

#[derive(Debug, Clone)]
pub struct SessionPlan {
    pub topic: String,
    pub system_prompt: Option<String>,
    pub participants: Vec<Participant>,
    pub rounds: u32,
    pub rotate_opening: bool,
    pub options: ChatOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnStatus {
    Completed,
    Failed,
}

impl TurnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnStatus::Completed => "completed",
            TurnStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub index: u32,
    pub round: u32,
    pub seat: usize,
    pub model: ModelRef,
    pub label: String,
    pub status: TurnStatus,
    pub content: Option<String>,
    pub error: Option<String>,
    pub attempts: u32,
    pub latency_ms: u64,
}

impl Turn {
    pub fn is_completed(&self) -> bool {
        self.status == TurnStatus::Completed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Every scheduled turn succeeded.
    Completed,
    /// The schedule ran out but some turns failed.
    Partial,
    /// Every seat was benched before the schedule ran out.
    Aborted,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Completed => "completed",
            SessionStatus::Partial => "partial",
            SessionStatus::Aborted => "aborted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionOutcome {
    pub status: SessionStatus,
    pub turns: Vec<Turn>,
    pub benched: Vec<ModelRef>,
}

impl SessionOutcome {
    pub fn completed_turns(&self) -> usize {
        self.turns.iter().filter(|t| t.is_completed()).count()
    }
}
