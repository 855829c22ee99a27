//! Stale-question detection.
//!
//! Pure decision logic; scheduling and sending live in [`ProjectSync`](super::ProjectSync).

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::models::{Message, Sender};

/// Why no follow-up is needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Quiet {
    NoMessages,
    LastFromUser,
    NotAQuestion,
    /// The question is still inside the window; `remaining` until it goes stale.
    Fresh { remaining: Duration },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowUpDecision {
    Quiet(Quiet),
    /// The assistant's question `question_id` has gone unanswered too long.
    Due { question_id: i64 },
}

impl FollowUpDecision {
    pub fn is_due(&self) -> bool {
        matches!(self, Self::Due { .. })
    }
}

#[derive(Debug, Clone)]
pub struct FollowUpPolicy {
    stale_after: Duration,
}

impl FollowUpPolicy {
    pub fn new(stale_after: Duration) -> Self {
        Self { stale_after }
    }

    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    /// Decide whether the thread needs a follow-up at `now`.
    ///
    /// Only the most recent message matters. It must come from the assistant,
    /// end with `?` and be strictly older than the window.
    pub fn evaluate(&self, messages: &[Message], now: DateTime<Utc>) -> FollowUpDecision {
        let Some(last) = messages.iter().max_by_key(|m| (m.created_at, m.id)) else {
            return FollowUpDecision::Quiet(Quiet::NoMessages);
        };

        if last.sender == Sender::User {
            return FollowUpDecision::Quiet(Quiet::LastFromUser);
        }
        if !last.is_assistant_question() {
            return FollowUpDecision::Quiet(Quiet::NotAQuestion);
        }

        // A timestamp in the future counts as zero age.
        let age = (now - last.created_at).to_std().unwrap_or(Duration::ZERO);
        if age > self.stale_after {
            FollowUpDecision::Due {
                question_id: last.id,
            }
        } else {
            FollowUpDecision::Quiet(Quiet::Fresh {
                remaining: self.stale_after - age,
            })
        }
    }
}

impl Default for FollowUpPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(2 * 60 * 60))
    }
}
