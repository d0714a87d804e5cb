use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::coach::InterviewFeedback;

/// Where a session currently sits in the question/follow-up cycle.
///
/// The pending follow-up text lives inside its variant, so "waiting for a
/// follow-up with no recorded question" cannot be represented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionPhase {
    /// The next submission answers `questions[question_index]`.
    AwaitingAnswer,
    /// The next submission answers the pending follow-up question.
    AwaitingFollowUp { question: String },
    /// Terminal. Once reached, the session never leaves it.
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
}

/// The record of one catalog question: the main answer plus the optional
/// follow-up exchange. Exactly one turn is appended per main answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionTurn {
    pub question: String,
    pub answer: String,
    pub follow_up_question: Option<String>,
    pub follow_up_answer: Option<String>,
    pub main_response_delay_sec: f64,
    pub follow_up_response_delay_sec: Option<f64>,
}

/// The session aggregate. Mutated in place by the engine and written back
/// to the store as a whole record after every transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewSession {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub allow_follow_ups: bool,
    pub questions: Vec<String>,
    pub question_index: usize,
    pub phase: SessionPhase,
    pub turns: Vec<SessionTurn>,
    pub result: Option<InterviewFeedback>,
}

impl InterviewSession {
    pub fn new(questions: Vec<String>, allow_follow_ups: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            allow_follow_ups,
            questions,
            question_index: 0,
            phase: SessionPhase::AwaitingAnswer,
            turns: Vec::new(),
            result: None,
        }
    }

    pub fn status(&self) -> SessionStatus {
        match self.phase {
            SessionPhase::Completed => SessionStatus::Completed,
            _ => SessionStatus::InProgress,
        }
    }

    /// The catalog question under the cursor, if any remain.
    pub fn current_question(&self) -> Option<&str> {
        self.questions.get(self.question_index).map(String::as_str)
    }
}
