//! "Ask this table" panel state.
//!
//! One round moves idle → pending → (answered | failed) → idle. Each
//! submission gets a fresh request id; a response only lands if its id is
//! the one still pending, so a late answer to an older question can never
//! overwrite the conversation.

use crate::api::{ApiError, AskResponse};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ChatPhase {
    #[default]
    Idle,
    Pending { request_id: u64, question: String },
}

/// What the caller needs to send for one submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskTicket {
    pub request_id: u64,
    pub question: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    Answered,
    Failed(String),
    Discarded,
}

#[derive(Debug, Default)]
pub struct ChatState {
    question: String,
    history: Vec<Turn>,
    phase: ChatPhase,
    last_request_id: u64,
}

impl ChatState {
    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn phase(&self) -> &ChatPhase {
        &self.phase
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.phase, ChatPhase::Pending { .. })
    }

    /// Whether the submit control is enabled
    pub fn can_submit(&self) -> bool {
        !self.is_pending() && !self.question.trim().is_empty()
    }

    // Input is read-only while a question is pending

    pub fn push_char(&mut self, ch: char) {
        if !self.is_pending() && !ch.is_control() {
            self.question.push(ch);
        }
    }

    pub fn push_newline(&mut self) {
        if !self.is_pending() {
            self.question.push('\n');
        }
    }

    pub fn backspace(&mut self) {
        if !self.is_pending() {
            self.question.pop();
        }
    }

    pub fn clear_input(&mut self) {
        if !self.is_pending() {
            self.question.clear();
        }
    }

    /// Start a round; `None` while one is pending or the question is blank
    pub fn submit(&mut self) -> Option<AskTicket> {
        if !self.can_submit() {
            return None;
        }

        self.last_request_id += 1;
        let ticket = AskTicket {
            request_id: self.last_request_id,
            question: self.question.clone(),
        };
        self.phase = ChatPhase::Pending {
            request_id: ticket.request_id,
            question: ticket.question.clone(),
        };

        tracing::debug!(request_id = ticket.request_id, "question submitted");
        Some(ticket)
    }

    /// Settle the round identified by `request_id`
    pub fn resolve(&mut self, request_id: u64, result: Result<AskResponse, ApiError>) -> ChatOutcome {
        let question = match &self.phase {
            ChatPhase::Pending { request_id: pending, question } if *pending == request_id => {
                question.clone()
            }
            _ => {
                tracing::debug!(request_id, "discarding response for a superseded question");
                return ChatOutcome::Discarded;
            }
        };

        self.phase = ChatPhase::Idle;

        match result {
            Ok(response) => {
                self.history.push(Turn {
                    question,
                    answer: response.data,
                });
                self.question.clear();
                ChatOutcome::Answered
            }
            Err(e) => {
                tracing::warn!(request_id, "ask failed: {}", e);
                ChatOutcome::Failed(describe_failure(&e))
            }
        }
    }
}

/// Short user-facing reason; the full error goes to the log
fn describe_failure(error: &ApiError) -> String {
    match error {
        ApiError::Status { status, .. } => format!("server returned {}", status.as_u16()),
        ApiError::Http(e) if e.is_timeout() => "request timed out".to_string(),
        ApiError::Http(_) => "could not reach the server".to_string(),
        ApiError::Decode(_) | ApiError::Invalid(_) => "unexpected response".to_string(),
        ApiError::Address(_) => "invalid API address".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(text: &str) -> ChatState {
        let mut chat = ChatState::default();
        text.chars().for_each(|c| chat.push_char(c));
        chat
    }

    fn answer(data: &str) -> Result<AskResponse, ApiError> {
        Ok(AskResponse {
            message: "ok".to_string(),
            data: data.to_string(),
        })
    }

    fn failure() -> Result<AskResponse, ApiError> {
        Err(ApiError::status(reqwest::StatusCode::INTERNAL_SERVER_ERROR, "boom"))
    }

    #[test]
    fn test_successful_round_appends_turn() {
        let mut chat = typed("Most purchased coffee?");
        let ticket = chat.submit().expect("should submit");
        assert!(chat.is_pending());
        assert_eq!(ticket.question, "Most purchased coffee?");

        let outcome = chat.resolve(ticket.request_id, answer("**Latte**"));
        assert_eq!(outcome, ChatOutcome::Answered);
        assert_eq!(
            chat.history(),
            &[Turn {
                question: "Most purchased coffee?".to_string(),
                answer: "**Latte**".to_string(),
            }]
        );
        assert_eq!(chat.question(), "", "input clears after an answer");
        assert_eq!(chat.phase(), &ChatPhase::Idle);
    }

    #[test]
    fn test_failed_round_keeps_input_and_history() {
        let mut chat = typed("first");
        let t = chat.submit().unwrap();
        chat.resolve(t.request_id, answer("one"));

        chat.push_char('?');
        let before = chat.history().len();
        let t = chat.submit().unwrap();
        let outcome = chat.resolve(t.request_id, failure());

        assert_eq!(outcome, ChatOutcome::Failed("server returned 500".to_string()));
        assert_eq!(chat.history().len(), before);
        assert_eq!(chat.question(), "?");
        assert!(!chat.is_pending());

        // The same question can be retried
        assert!(chat.submit().is_some());
    }

    #[test]
    fn test_cannot_submit_while_pending() {
        let mut chat = typed("slow question");
        let first = chat.submit().unwrap();
        assert!(!chat.can_submit());
        assert_eq!(chat.submit(), None);

        // Input is read-only too
        chat.push_char('x');
        chat.backspace();
        chat.clear_input();
        assert_eq!(chat.question(), "slow question");

        assert_eq!(chat.resolve(first.request_id, answer("done")), ChatOutcome::Answered);
    }

    #[test]
    fn test_blank_question_is_not_submitted() {
        let mut chat = typed("   ");
        assert_eq!(chat.submit(), None);
        assert!(!chat.is_pending());
    }

    #[test]
    fn test_stale_response_is_discarded() {
        let mut chat = typed("one");
        let first = chat.submit().unwrap();
        chat.resolve(first.request_id, failure());

        let second = chat.submit().unwrap();
        assert!(second.request_id > first.request_id);

        // A duplicate delivery for the first id must not land
        assert_eq!(chat.resolve(first.request_id, answer("late")), ChatOutcome::Discarded);
        assert!(chat.is_pending());
        assert!(chat.history().is_empty());

        assert_eq!(chat.resolve(second.request_id, answer("fresh")), ChatOutcome::Answered);
        assert_eq!(chat.history()[0].answer, "fresh");

        // Nothing pending any more, so even the latest id is ignored now
        assert_eq!(chat.resolve(second.request_id, answer("again")), ChatOutcome::Discarded);
        assert_eq!(chat.history().len(), 1);
    }

    #[test]
    fn test_history_keeps_insertion_order() {
        let mut chat = ChatState::default();
        for q in ["a", "b", "c"] {
            q.chars().for_each(|c| chat.push_char(c));
            let t = chat.submit().unwrap();
            chat.resolve(t.request_id, answer(&q.to_uppercase()));
        }
        let answers: Vec<_> = chat.history().iter().map(|t| t.answer.as_str()).collect();
        assert_eq!(answers, ["A", "B", "C"]);
    }
}
