// src/roundrobin/orchestrator.rs

use std::{sync::Arc, time::Instant};

use super::{
    Participant, RetryPolicy, SessionOutcome, SessionPlan, SessionStatus, Turn, TurnScheduler,
    TurnStatus, prompt::build_prompt,
};
use crate::llm::{ChatBackend, ChatMessage, ChatOptions, LlmError, LlmRegistry};

/// Runs a round-robin session to completion.
pub struct Orchestrator<'a> {
    registry: &'a LlmRegistry,
    policy: RetryPolicy,
}

/// Result of calling one backend under the retry policy.
struct Attempted {
    result: Result<String, LlmError>,
    attempts: u32,
}

impl<'a> Orchestrator<'a> {
    pub fn new(registry: &'a LlmRegistry, policy: RetryPolicy) -> Self {
        Self { registry, policy }
    }

    /// Fails before any turn runs if a participant's provider is unknown.
    pub async fn run(&self, plan: &SessionPlan) -> Result<SessionOutcome, LlmError> {
        let backends = plan
            .participants
            .iter()
            .map(|p| self.registry.resolve(&p.model))
            .collect::<Result<Vec<_>, _>>()?;

        let mut scheduler = TurnScheduler::new(plan.participants.len(), plan.rounds, plan.rotate_opening);
        let mut consecutive_failures = vec![0u32; plan.participants.len()];
        let mut turns: Vec<Turn> = Vec::new();

        while let Some(slot) = scheduler.next_slot() {
            let participant = &plan.participants[slot.seat];
            let messages = build_prompt(
                plan.system_prompt.as_deref(),
                &plan.topic,
                &plan.participants,
                slot.seat,
                &turns,
            );

            let started = Instant::now();
            let attempted = self
                .call(&backends[slot.seat], participant, &messages, &plan.options)
                .await;
            let latency_ms = started.elapsed().as_millis() as u64;

            let (status, content, error) = match attempted.result {
                Ok(text) => {
                    consecutive_failures[slot.seat] = 0;
                    (TurnStatus::Completed, Some(text), None)
                }
                Err(err) => {
                    consecutive_failures[slot.seat] += 1;
                    tracing::warn!(
                        model = %participant.model,
                        turn = slot.index,
                        attempts = attempted.attempts,
                        "round-robin turn failed: {}",
                        err
                    );
                    if self.policy.should_bench(consecutive_failures[slot.seat]) {
                        tracing::warn!(model = %participant.model, "benching participant");
                        scheduler.bench(slot.seat);
                    }
                    (TurnStatus::Failed, None, Some(err.to_string()))
                }
            };

            turns.push(Turn {
                index: slot.index,
                round: slot.round,
                seat: slot.seat,
                model: participant.model.clone(),
                label: participant.label.clone(),
                status,
                content,
                error,
                attempts: attempted.attempts,
                latency_ms,
            });
        }

        let status = if scheduler.exhausted() {
            SessionStatus::Aborted
        } else if turns.iter().any(|t| !t.is_completed()) {
            SessionStatus::Partial
        } else {
            SessionStatus::Completed
        };

        let benched = plan
            .participants
            .iter()
            .enumerate()
            .filter(|(seat, _)| scheduler.is_benched(*seat))
            .map(|(_, p)| p.model.clone())
            .collect();

        tracing::info!(
            status = status.as_str(),
            turns = turns.len(),
            "round-robin session finished"
        );

        Ok(SessionOutcome {
            status,
            turns,
            benched,
        })
    }

    async fn call(
        &self,
        backend: &Arc<dyn ChatBackend>,
        participant: &Participant,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Attempted {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = match tokio::time::timeout(
                self.policy.attempt_timeout,
                backend.chat(&participant.model.model, messages, options),
            )
            .await
            {
                Ok(Ok(completion)) if completion.content.trim().is_empty() => {
                    Err(LlmError::Decode("empty reply".to_string()))
                }
                Ok(Ok(completion)) => Ok(completion.content),
                Ok(Err(err)) => Err(err),
                Err(_) => Err(LlmError::Timeout),
            };

            match result {
                Ok(text) => {
                    return Attempted {
                        result: Ok(text),
                        attempts: attempt,
                    };
                }
                Err(err) if self.policy.should_retry(attempt, &err) => {
                    let delay = self.policy.backoff(attempt);
                    tracing::debug!(model = %participant.model, attempt, ?delay, "retrying: {}", err);
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    return Attempted {
                        result: Err(err),
                        attempts: attempt,
                    };
                }
            }
        }
    }
}
