// src/handlers/roundrobin.rs

use std::{collections::HashSet, sync::Arc, time::Duration};

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::{SqlitePool, types::Json as SqlJson};
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    ledger,
    llm::{ChatOptions, LlmRegistry, ModelRef},
    models::roundrobin::{
        CreateSessionRequest, SessionDetail, SessionListParams, SessionRecord, TurnRecord,
    },
    roundrobin::{Orchestrator, Participant, RetryPolicy, SessionOutcome, SessionPlan},
    utils::jwt::Claims,
};

const SESSION_COLUMNS: &str =
    "id, user_id, topic, status, rounds, participants, credits_charged, created_at";

fn build_plan(payload: CreateSessionRequest, default_context_chars: usize) -> Result<SessionPlan, AppError> {
    let mut labels = HashSet::new();
    let mut participants = Vec::with_capacity(payload.participants.len());

    for requested in payload.participants {
        let model: ModelRef = requested.model.parse()?;
        let label = requested
            .label
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| model.to_string());

        if !labels.insert(label.clone()) {
            return Err(AppError::BadRequest(format!(
                "Participant label '{}' is used twice",
                label
            )));
        }

        participants.push(Participant {
            model,
            label,
            context_chars: requested.context_chars.unwrap_or(default_context_chars),
        });
    }

    Ok(SessionPlan {
        topic: payload.topic,
        system_prompt: payload.system_prompt.filter(|s| !s.trim().is_empty()),
        participants,
        rounds: payload.rounds,
        rotate_opening: payload.rotate_opening,
        options: ChatOptions {
            temperature: payload.temperature,
            max_tokens: payload.max_tokens,
        },
    })
}

/// Runs the session, settles the credit hold and stores the transcript.
/// Returns the new session id.
async fn run_and_record(
    pool: SqlitePool,
    registry: Arc<LlmRegistry>,
    policy: RetryPolicy,
    plan: SessionPlan,
    user_id: i64,
    hold: i64,
    turn_cost: i64,
) -> Result<i64, AppError> {
    let outcome: SessionOutcome = match Orchestrator::new(&registry, policy).run(&plan).await {
        Ok(outcome) => outcome,
        Err(e) => {
            ledger::refund(&pool, user_id, hold, "roundrobin not started").await?;
            return Err(AppError::BadRequest(e.to_string()));
        }
    };

    let charged = outcome.completed_turns() as i64 * turn_cost;

    match store_session(&pool, &plan, &outcome, user_id, hold, charged).await {
        Ok(session_id) => Ok(session_id),
        Err(e) => {
            // The failed transaction took its partial refund with it.
            tracing::error!(user_id, "storing round-robin session failed, refunding hold: {:?}", e);
            ledger::refund(&pool, user_id, hold, "roundrobin not stored").await?;
            Err(e)
        }
    }
}

/// Refunds the unused part of the hold and writes the session with its
/// turns, all in one transaction.
async fn store_session(
    pool: &SqlitePool,
    plan: &SessionPlan,
    outcome: &SessionOutcome,
    user_id: i64,
    hold: i64,
    charged: i64,
) -> Result<i64, AppError> {
    let models: Vec<String> = plan.participants.iter().map(|p| p.model.to_string()).collect();

    let mut tx = pool.begin().await?;

    ledger::refund(&mut *tx, user_id, hold - charged, "roundrobin unused turns").await?;

    let session_id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO roundrobin_sessions (user_id, topic, status, rounds, participants, credits_charged, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(&plan.topic)
    .bind(outcome.status.as_str())
    .bind(plan.rounds as i64)
    .bind(SqlJson(&models))
    .bind(charged)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?;

    for turn in &outcome.turns {
        sqlx::query(
            r#"
            INSERT INTO roundrobin_turns
                (session_id, turn_index, round, seat, model, label, status, content, error, attempts, latency_ms)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(session_id)
        .bind(turn.index as i64)
        .bind(turn.round as i64)
        .bind(turn.seat as i64)
        .bind(turn.model.to_string())
        .bind(&turn.label)
        .bind(turn.status.as_str())
        .bind(&turn.content)
        .bind(&turn.error)
        .bind(turn.attempts as i64)
        .bind(turn.latency_ms as i64)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        session_id,
        user_id,
        status = outcome.status.as_str(),
        charged,
        "round-robin session stored"
    );

    Ok(session_id)
}

async fn load_session(pool: &SqlitePool, user_id: i64, session_id: i64) -> Result<SessionDetail, AppError> {
    let session = sqlx::query_as::<_, SessionRecord>(&format!(
        "SELECT {} FROM roundrobin_sessions WHERE id = ? AND user_id = ?",
        SESSION_COLUMNS
    ))
    .bind(session_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Session not found".to_string()))?;

    let turns = sqlx::query_as::<_, TurnRecord>(
        r#"
        SELECT turn_index, round, seat, model, label, status, content, error, attempts, latency_ms
        FROM roundrobin_turns
        WHERE session_id = ?
        ORDER BY turn_index ASC
        "#,
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    Ok(SessionDetail { session, turns })
}

/// Run a round-robin session to the end and return its transcript.
///
/// The worst-case cost is held up front; unused turns are refunded. The run
/// continues in its own task if the client goes away, so the hold is always
/// settled.
pub async fn create_session(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    State(registry): State<Arc<LlmRegistry>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let user_id = claims.user_id()?;

    let plan = build_plan(payload, config.roundrobin_context_chars)?;
    for participant in &plan.participants {
        registry
            .resolve(&participant.model)
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
    }

    let turn_cost = config.roundrobin_turn_cost;
    let hold = plan.rounds as i64 * plan.participants.len() as i64 * turn_cost;
    if !ledger::debit(&pool, user_id, hold, "roundrobin hold").await? {
        return Err(AppError::PaymentRequired(format!(
            "This session needs up to {} credits",
            hold
        )));
    }

    let policy = RetryPolicy::default()
        .with_attempt_timeout(Duration::from_secs(config.roundrobin_attempt_timeout_secs));

    let task = tokio::spawn(run_and_record(
        pool.clone(),
        registry.clone(),
        policy,
        plan,
        user_id,
        hold,
        turn_cost,
    ));
    let session_id = task
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))??;

    let detail = load_session(&pool, user_id, session_id).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// The caller's sessions, newest first, without turns.
/// Keyset pagination: pass the last id seen as `before`.
pub async fn list_sessions(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<SessionListParams>,
) -> Result<impl IntoResponse, AppError> {
    let limit = params.limit.unwrap_or(20).clamp(1, 100);

    let sessions = sqlx::query_as::<_, SessionRecord>(&format!(
        "SELECT {} FROM roundrobin_sessions WHERE user_id = ?1 AND (?2 IS NULL OR id < ?2) ORDER BY id DESC LIMIT ?3",
        SESSION_COLUMNS
    ))
    .bind(claims.user_id()?)
    .bind(params.before)
    .bind(limit)
    .fetch_all(&pool)
    .await?;

    Ok(Json(sessions))
}

pub async fn get_session(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(load_session(&pool, claims.user_id()?, id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::roundrobin::ParticipantRequest;

    fn request(models: &[(&str, Option<&str>)]) -> CreateSessionRequest {
        CreateSessionRequest {
            topic: "Tabs or spaces?".to_string(),
            system_prompt: Some("   ".to_string()),
            participants: models
                .iter()
                .map(|(m, l)| ParticipantRequest {
                    model: m.to_string(),
                    label: l.map(str::to_string),
                    context_chars: None,
                })
                .collect(),
            rounds: 2,
            rotate_opening: true,
            temperature: Some(0.5),
            max_tokens: None,
        }
    }

    #[test]
    fn labels_default_to_model_refs() {
        let plan = build_plan(
            request(&[("ollama:llama3:8b", None), ("openai:gpt-4o", Some("GPT"))]),
            4_000,
        )
        .unwrap();

        assert_eq!(plan.participants[0].label, "ollama:llama3:8b");
        assert_eq!(plan.participants[1].label, "GPT");
        assert_eq!(plan.participants[1].context_chars, 4_000);
        assert_eq!(plan.system_prompt, None);
        assert!(plan.rotate_opening);
    }

    #[test]
    fn duplicate_labels_are_rejected() {
        let err = build_plan(
            request(&[("openai:gpt-4o", None), ("openai:gpt-4o", None)]),
            4_000,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn malformed_model_is_a_bad_request() {
        let err = build_plan(request(&[("gpt-4o", None), ("openai:gpt-4o", None)]), 4_000).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
