// src/roundrobin/prompt.rs

//! Renders the transcript as chat messages for one speaker, cut to fit its
//! character budget. Budgets count characters of message content.

use super::{Participant, Turn};
use crate::llm::{ChatMessage, Role};

/// Budgets below this are raised to it.
pub const MIN_CONTEXT_CHARS: usize = 256;

/// Smallest head worth sending when the newest turn has to be cut.
const MIN_PARTIAL_CHARS: usize = 32;

const ELLIPSIS: char = '…';

pub const NUDGE: &str = "Continue the discussion.";

fn len(s: &str) -> usize {
    s.chars().count()
}

/// Keeps the head of `s`, ending in `…` when anything was cut.
/// The result is at most `max` characters.
pub fn cut(s: &str, max: usize) -> String {
    if len(s) <= max {
        return s.to_string();
    }
    if max == 0 {
        return String::new();
    }
    let mut out: String = s.chars().take(max - 1).collect();
    out.push(ELLIPSIS);
    out
}

fn omitted_note(count: usize) -> String {
    if count == 1 {
        "[1 earlier turn omitted]".to_string()
    } else {
        format!("[{} earlier turns omitted]", count)
    }
}

pub fn default_system_prompt(participants: &[Participant], seat: usize) -> String {
    let me = &participants[seat].label;
    let others: Vec<&str> = participants
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != seat)
        .map(|(_, p)| p.label.as_str())
        .collect();

    format!(
        "You are {me}, taking part in a round-robin discussion with {}. \
         Messages from other participants start with their name in brackets. \
         Reply with your own contribution only, without a name prefix.",
        others.join(", ")
    )
}

/// Completed turns as seen by `seat`: its own turns are assistant messages,
/// everyone else's are user messages tagged with the speaker's label.
fn history(turns: &[Turn], seat: usize) -> Vec<ChatMessage> {
    turns
        .iter()
        .filter(|t| t.is_completed())
        .filter_map(|t| {
            let content = t.content.as_deref()?;
            Some(if t.seat == seat {
                ChatMessage::assistant(content)
            } else {
                ChatMessage::user(format!("[{}] {}", t.label, content))
            })
        })
        .collect()
}

pub fn build_prompt(
    system_prompt: Option<&str>,
    topic: &str,
    participants: &[Participant],
    seat: usize,
    turns: &[Turn],
) -> Vec<ChatMessage> {
    let budget = participants[seat].context_chars.max(MIN_CONTEXT_CHARS);

    let system = system_prompt
        .map(str::to_string)
        .unwrap_or_else(|| default_system_prompt(participants, seat));

    // Pinned messages alone overflow: shrink them and send no history.
    if len(&system) + len(topic) > budget {
        let system = cut(&system, budget / 2);
        let topic = cut(topic, budget - len(&system));
        return vec![ChatMessage::system(system), ChatMessage::user(topic)];
    }

    let mut messages = vec![ChatMessage::system(system), ChatMessage::user(topic)];
    let remaining = budget - messages.iter().map(|m| len(&m.content)).sum::<usize>();

    let history = history(turns, seat);
    if history.is_empty() {
        return messages;
    }

    let needs_nudge = history.last().map(|m| m.role) == Some(Role::Assistant);
    let nudge_len = if needs_nudge { len(NUDGE) } else { 0 };

    let total: usize = history.iter().map(|m| len(&m.content)).sum::<usize>() + nudge_len;
    if total <= remaining {
        messages.extend(history);
        if needs_nudge {
            messages.push(ChatMessage::user(NUDGE));
        }
        return messages;
    }

    // Something gets dropped, so the note is needed. Its longest form uses
    // the full history length.
    let note_reserve = len(&omitted_note(history.len()));
    if note_reserve > remaining {
        return messages;
    }

    let available = (remaining - note_reserve).saturating_sub(nudge_len);
    let mut used = 0;
    let mut kept: Vec<ChatMessage> = Vec::new();
    for message in history.iter().rev() {
        let size = len(&message.content);
        if used + size > available {
            break;
        }
        used += size;
        kept.push(message.clone());
    }

    if kept.is_empty() && available >= MIN_PARTIAL_CHARS {
        if let Some(newest) = history.last() {
            kept.push(ChatMessage {
                role: newest.role,
                content: cut(&newest.content, available),
            });
        }
    }
    kept.reverse();

    let omitted = history.len() - kept.len();
    if omitted > 0 {
        messages.push(ChatMessage::user(omitted_note(omitted)));
    }

    let ends_with_own_turn = !kept.is_empty() && needs_nudge;
    messages.extend(kept);
    if ends_with_own_turn {
        messages.push(ChatMessage::user(NUDGE));
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{llm::ModelRef, roundrobin::TurnStatus};

    fn seat(label: &str, budget: usize) -> Participant {
        Participant {
            model: ModelRef::new("fake", label),
            label: label.to_string(),
            context_chars: budget,
        }
    }

    fn turn(index: u32, seat: usize, label: &str, content: &str) -> Turn {
        Turn {
            index,
            round: 0,
            seat,
            model: ModelRef::new("fake", label),
            label: label.to_string(),
            status: TurnStatus::Completed,
            content: Some(content.to_string()),
            error: None,
            attempts: 1,
            latency_ms: 0,
        }
    }

    fn total_chars(messages: &[ChatMessage]) -> usize {
        messages.iter().map(|m| m.content.chars().count()).sum()
    }

    #[test]
    fn cut_keeps_head_and_marks_it() {
        assert_eq!(cut("abcdef", 10), "abcdef");
        assert_eq!(cut("abcdef", 4), "abc…");
        assert_eq!(cut("abcdef", 0), "");
        assert_eq!(cut("日本語テキスト", 3).chars().count(), 3);
    }

    #[test]
    fn own_turns_are_assistant_and_others_are_tagged() {
        let table = vec![seat("alpha", 10_000), seat("beta", 10_000)];
        let turns = vec![turn(0, 0, "alpha", "hello"), turn(1, 1, "beta", "hi there")];

        let prompt = build_prompt(None, "Topic?", &table, 0, &turns);

        assert_eq!(prompt[0].role, Role::System);
        assert!(prompt[0].content.contains("You are alpha"));
        assert!(prompt[0].content.contains("beta"));
        assert_eq!(prompt[1], ChatMessage::user("Topic?"));
        assert_eq!(prompt[2], ChatMessage::assistant("hello"));
        assert_eq!(prompt[3], ChatMessage::user("[beta] hi there"));
        assert_eq!(prompt.len(), 4);
    }

    #[test]
    fn failed_turns_are_hidden() {
        let table = vec![seat("alpha", 10_000), seat("beta", 10_000)];
        let mut failed = turn(0, 0, "alpha", "");
        failed.status = TurnStatus::Failed;
        failed.content = None;

        let prompt = build_prompt(Some("sys"), "Topic?", &table, 1, &[failed]);
        assert_eq!(prompt.len(), 2);
    }

    #[test]
    fn nudge_follows_own_last_turn() {
        let table = vec![seat("alpha", 10_000), seat("beta", 10_000)];
        let turns = vec![turn(0, 1, "beta", "first"), turn(1, 0, "alpha", "mine")];

        let prompt = build_prompt(Some("sys"), "Topic?", &table, 0, &turns);
        assert_eq!(prompt.last().unwrap(), &ChatMessage::user(NUDGE));
    }

    #[test]
    fn oldest_turns_are_dropped_first() {
        let table = vec![seat("alpha", 300), seat("beta", 300)];
        let long = "x".repeat(100);
        let turns: Vec<Turn> = (0..6)
            .map(|i| {
                let s = (i % 2) as usize;
                turn(i, s, if s == 0 { "alpha" } else { "beta" }, &long)
            })
            .collect();

        let prompt = build_prompt(Some("sys"), "Topic?", &table, 0, &turns);

        assert!(total_chars(&prompt) <= 300);
        assert_eq!(prompt[2], ChatMessage::user("[4 earlier turns omitted]"));
        assert_eq!(prompt[3], ChatMessage::assistant(long.clone()));
        // The newest turn (beta's, index 5) survives.
        assert_eq!(prompt.last().unwrap().content, format!("[beta] {}", long));
        assert_eq!(prompt.len(), 5);
    }

    #[test]
    fn newest_turn_is_cut_when_nothing_fits_whole() {
        let table = vec![seat("alpha", 400), seat("beta", 400)];
        let turns = vec![turn(0, 0, "alpha", &"y".repeat(2_000))];

        let prompt = build_prompt(Some("sys"), "Topic?", &table, 1, &turns);

        assert!(total_chars(&prompt) <= 400);
        assert_eq!(prompt.len(), 3);
        assert!(prompt[2].content.starts_with("[alpha] yyy"));
        assert!(prompt[2].content.ends_with('…'));
    }

    #[test]
    fn oversized_topic_is_cut_and_history_dropped() {
        let table = vec![seat("alpha", 256), seat("beta", 256)];
        let turns = vec![turn(0, 0, "alpha", "hello")];
        let topic = "t".repeat(1_000);

        let prompt = build_prompt(Some("sys"), &topic, &table, 1, &turns);

        assert_eq!(prompt.len(), 2);
        assert!(total_chars(&prompt) <= 256);
        assert!(prompt[1].content.ends_with('…'));
    }

    #[test]
    fn tiny_budgets_are_raised() {
        let table = vec![seat("alpha", 1), seat("beta", 1)];
        let prompt = build_prompt(Some("sys"), "Topic?", &table, 0, &[]);
        assert_eq!(prompt.len(), 2);
        assert_eq!(prompt[1].content, "Topic?");
    }
}
