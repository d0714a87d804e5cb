use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::catalog;
use crate::coach::{Coach, FollowUpExchange, InterviewFeedback, TranscriptEntry, sanitize_feedback};
use crate::session::{InterviewSession, SessionPhase, SessionStatus, SessionTurn};
use crate::store::SessionStore;
use crate::timing;
use crate::transcribe::Transcriber;

/// Typed failures surfaced to the transport layer. Oracle and store
/// failures pass through `Upstream` untranslated; they abort the in-flight
/// transition before anything is persisted, so resubmission is safe.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("session {0} not found")]
    NotFound(Uuid),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error(transparent)]
    Upstream(#[from] anyhow::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptType {
    Question,
    FollowUp,
    Completed,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct CreateSessionInput {
    pub question_count: Option<usize>,
    pub allow_follow_ups: Option<bool>,
}

/// What the candidate should be shown right now.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptView {
    pub status: SessionStatus,
    pub prompt: Option<String>,
    pub prompt_type: PromptType,
    pub question_number: usize,
    pub total_questions: usize,
}

/// One submitted answer: either text, or a base64 audio payload to be
/// transcribed. Text wins when both are present.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnswerInput {
    pub answer_text: Option<String>,
    pub audio_b64: Option<String>,
    pub mime_type: Option<String>,
    pub response_delay_sec: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub interviewer_message: String,
    pub prompt_type: PromptType,
    pub next_prompt: Option<String>,
    pub question_number: usize,
    pub total_questions: usize,
    pub result: Option<InterviewFeedback>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResultView {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub result: Option<InterviewFeedback>,
}

const DEFAULT_AUDIO_MIME: &str = "audio/webm";

/// The interview use-cases: session creation, prompt resolution, answer
/// submission, and result retrieval. Owns its collaborators behind traits
/// so any of them can be swapped or mocked.
pub struct InterviewEngine<S, C, T> {
    store: S,
    coach: C,
    transcriber: T,
    catalog: Vec<String>,
    // Serializes read-decide-write per session. Reads do not take it.
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl<S, C, T> InterviewEngine<S, C, T>
where
    S: SessionStore,
    C: Coach,
    T: Transcriber,
{
    pub fn new(store: S, coach: C, transcriber: T) -> Self {
        Self::with_catalog(store, coach, transcriber, catalog::default_questions())
    }

    pub fn with_catalog(store: S, coach: C, transcriber: T, catalog: Vec<String>) -> Self {
        Self {
            store,
            coach,
            transcriber,
            catalog,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a session over a prefix of the question catalog and persists
    /// it. Out-of-range question counts are clamped, not rejected.
    pub async fn create_session(&self, input: CreateSessionInput) -> CoreResult<InterviewSession> {
        let questions = catalog::select(&self.catalog, input.question_count);
        let session = InterviewSession::new(questions, input.allow_follow_ups.unwrap_or(true));
        self.store.create(&session).await?;
        tracing::info!(
            session_id = %session.id,
            questions = session.questions.len(),
            allow_follow_ups = session.allow_follow_ups,
            "created interview session"
        );
        Ok(session)
    }

    /// Pure read: what to show the candidate right now.
    pub async fn current_prompt(&self, session_id: Uuid) -> CoreResult<PromptView> {
        let session = self.load(session_id).await?;
        Ok(prompt_view(&session))
    }

    /// Consumes one answer and advances the session: records the turn,
    /// decides between follow-up / next question / completion, and persists
    /// the whole session once the transition is complete.
    pub async fn submit_answer(
        &self,
        session_id: Uuid,
        input: AnswerInput,
    ) -> CoreResult<SubmitOutcome> {
        let lock = self.session_lock(session_id).await;
        let _guard = lock.lock().await;

        let session = self.load(session_id).await?;
        if session.phase == SessionPhase::Completed {
            return Err(CoreError::InvalidState(
                "session is completed, no further answers are accepted".to_string(),
            ));
        }

        let answer = self.resolve_transcript(&input).await?;
        let delay = normalize_delay(input.response_delay_sec)?;

        match session.phase.clone() {
            SessionPhase::AwaitingAnswer => self.answer_main(session, answer, delay).await,
            SessionPhase::AwaitingFollowUp { question } => {
                self.answer_follow_up(session, question, answer, delay).await
            }
            SessionPhase::Completed => Err(CoreError::InvalidState(
                "session is completed, no further answers are accepted".to_string(),
            )),
        }
    }

    /// Pure read: the finalized feedback, if the session has one.
    pub async fn session_result(&self, session_id: Uuid) -> CoreResult<ResultView> {
        let session = self.load(session_id).await?;
        Ok(ResultView {
            session_id: session.id,
            status: session.status(),
            result: session.result,
        })
    }

    async fn answer_main(
        &self,
        mut session: InterviewSession,
        answer: String,
        delay: f64,
    ) -> CoreResult<SubmitOutcome> {
        let question = session
            .current_question()
            .map(str::to_string)
            .ok_or_else(|| {
                CoreError::InvalidState("no question remains at the current cursor".to_string())
            })?;

        let reply = self.coach.interviewer_reply(&question, &answer).await?;
        // A proposed follow-up is only honored when the session allows them.
        let follow_up = if session.allow_follow_ups {
            reply
                .follow_up_question
                .filter(|q| !q.trim().is_empty())
        } else {
            None
        };

        session.turns.push(SessionTurn {
            question,
            answer,
            follow_up_question: follow_up.clone(),
            follow_up_answer: None,
            main_response_delay_sec: delay,
            follow_up_response_delay_sec: None,
        });

        if let Some(follow_up) = follow_up {
            session.phase = SessionPhase::AwaitingFollowUp {
                question: follow_up,
            };
            self.store.save(&session).await?;
            tracing::debug!(session_id = %session.id, "follow-up pending");
            return Ok(outcome(&session, reply.reply_text, None));
        }

        session.question_index += 1;
        let result = self.try_complete(&mut session).await?;
        self.store.save(&session).await?;
        Ok(outcome(&session, reply.reply_text, result))
    }

    async fn answer_follow_up(
        &self,
        mut session: InterviewSession,
        follow_up_question: String,
        answer: String,
        delay: f64,
    ) -> CoreResult<SubmitOutcome> {
        let exchange = {
            let turn = session.turns.last_mut().ok_or_else(|| {
                CoreError::InvalidState("awaiting a follow-up with no recorded turn".to_string())
            })?;
            if turn.follow_up_question.is_none() {
                return Err(CoreError::InvalidState(
                    "awaiting a follow-up that was never recorded".to_string(),
                ));
            }
            turn.follow_up_answer = Some(answer.clone());
            turn.follow_up_response_delay_sec = Some(delay);
            FollowUpExchange {
                question: turn.question.clone(),
                answer: turn.answer.clone(),
                follow_up_question,
                follow_up_answer: answer,
            }
        };

        // Never produces another follow-up: one per question is the ceiling.
        let closing = self.coach.follow_up_close(&exchange).await?;

        session.phase = SessionPhase::AwaitingAnswer;
        session.question_index += 1;
        let result = self.try_complete(&mut session).await?;
        self.store.save(&session).await?;
        Ok(outcome(&session, closing, result))
    }

    /// Finalizes the session once the cursor has exhausted the questions.
    /// Runs at most once per session; a coach failure here propagates and
    /// nothing is persisted, so the submission can be retried.
    async fn try_complete(
        &self,
        session: &mut InterviewSession,
    ) -> CoreResult<Option<InterviewFeedback>> {
        if session.question_index < session.questions.len() {
            return Ok(None);
        }

        let summary = timing::summarize(&session.turns);
        let transcript: Vec<TranscriptEntry> = session
            .turns
            .iter()
            .enumerate()
            .map(|(i, turn)| TranscriptEntry {
                question_number: i + 1,
                question: turn.question.clone(),
                answer: turn.answer.clone(),
                follow_up_question: turn.follow_up_question.clone(),
                follow_up_answer: turn.follow_up_answer.clone(),
            })
            .collect();

        let raw = self.coach.feedback(&summary, &transcript).await?;
        let feedback = sanitize_feedback(&raw, summary, &transcript);

        session.result = Some(feedback.clone());
        session.phase = SessionPhase::Completed;
        tracing::info!(
            session_id = %session.id,
            turns = session.turns.len(),
            "interview session completed"
        );
        Ok(Some(feedback))
    }

    /// Trimmed answer text if present, otherwise the transcript of the
    /// decoded audio payload.
    async fn resolve_transcript(&self, input: &AnswerInput) -> CoreResult<String> {
        if let Some(text) = input.answer_text.as_deref() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                return Ok(trimmed.to_string());
            }
        }

        let Some(audio_b64) = input.audio_b64.as_deref() else {
            return Err(CoreError::InvalidInput(
                "either answer_text or audio_b64 must be provided".to_string(),
            ));
        };
        let audio = BASE64.decode(audio_b64.trim()).map_err(|e| {
            CoreError::InvalidInput(format!("audio_b64 is not valid base64: {e}"))
        })?;
        if audio.is_empty() {
            return Err(CoreError::InvalidInput(
                "decoded audio payload is empty".to_string(),
            ));
        }

        let mime_type = input.mime_type.as_deref().unwrap_or(DEFAULT_AUDIO_MIME);
        let text = self.transcriber.transcribe(&audio, mime_type).await?;
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidInput(
                "transcription produced no text".to_string(),
            ));
        }
        Ok(trimmed.to_string())
    }

    async fn load(&self, id: Uuid) -> CoreResult<InterviewSession> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(CoreError::NotFound(id))
    }

    async fn session_lock(&self, id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Derives the prompt to show from the session state. Shared by the prompt
/// resolver and by outcome building after a transition.
fn prompt_view(session: &InterviewSession) -> PromptView {
    let total_questions = session.questions.len();
    match &session.phase {
        SessionPhase::Completed => PromptView {
            status: SessionStatus::Completed,
            prompt: None,
            prompt_type: PromptType::Completed,
            question_number: total_questions,
            total_questions,
        },
        SessionPhase::AwaitingFollowUp { question } => PromptView {
            status: SessionStatus::InProgress,
            prompt: Some(question.clone()),
            prompt_type: PromptType::FollowUp,
            question_number: session.question_index + 1,
            total_questions,
        },
        SessionPhase::AwaitingAnswer => PromptView {
            status: SessionStatus::InProgress,
            prompt: session.current_question().map(str::to_string),
            prompt_type: PromptType::Question,
            question_number: session.question_index + 1,
            total_questions,
        },
    }
}

fn outcome(
    session: &InterviewSession,
    interviewer_message: String,
    result: Option<InterviewFeedback>,
) -> SubmitOutcome {
    let view = prompt_view(session);
    SubmitOutcome {
        session_id: session.id,
        status: view.status,
        interviewer_message,
        prompt_type: view.prompt_type,
        next_prompt: view.prompt,
        question_number: view.question_number,
        total_questions: view.total_questions,
        result,
    }
}

/// Defaults a missing delay to 0, rejects negative or non-finite values,
/// and rounds to the stored precision.
fn normalize_delay(delay: Option<f64>) -> CoreResult<f64> {
    let delay = delay.unwrap_or(0.0);
    if !delay.is_finite() {
        return Err(CoreError::InvalidInput(
            "response_delay_sec must be a finite number".to_string(),
        ));
    }
    if delay < 0.0 {
        return Err(CoreError::InvalidInput(
            "response_delay_sec must not be negative".to_string(),
        ));
    }
    Ok(timing::round2(delay))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coach::{InterviewerReply, MockCoach};
    use crate::store::InMemorySessionStore;
    use crate::transcribe::MockTranscriber;
    use anyhow::anyhow;
    use base64::Engine as _;

    type TestEngine = InterviewEngine<Arc<InMemorySessionStore>, MockCoach, MockTranscriber>;

    fn engine_with(coach: MockCoach, transcriber: MockTranscriber) -> (TestEngine, Arc<InMemorySessionStore>) {
        let store = Arc::new(InMemorySessionStore::new());
        let engine = InterviewEngine::new(store.clone(), coach, transcriber);
        (engine, store)
    }

    fn text_answer(text: &str, delay: f64) -> AnswerInput {
        AnswerInput {
            answer_text: Some(text.to_string()),
            response_delay_sec: Some(delay),
            ..AnswerInput::default()
        }
    }

    fn reply(text: &str, follow_up: Option<&str>) -> InterviewerReply {
        InterviewerReply {
            reply_text: text.to_string(),
            follow_up_question: follow_up.map(str::to_string),
        }
    }

    fn feedback_json() -> serde_json::Value {
        serde_json::json!({
            "corrections": [
                { "original": "stuff", "corrected": "specific systems", "reason": "precision" }
            ],
            "improved_best_answer": { "question": "Q", "answer": "A better answer." },
            "interview_tips": ["Quantify your impact."]
        })
    }

    #[tokio::test]
    async fn single_question_session_completes_on_the_main_answer() {
        let mut coach = MockCoach::new();
        // The coach offers a follow-up, but the session forbids them.
        coach
            .expect_interviewer_reply()
            .returning(|_, _| Box::pin(async { Ok(reply("Nice.", Some("Why though?"))) }))
            .once();
        coach
            .expect_feedback()
            .returning(|_, _| Box::pin(async { Ok(feedback_json()) }))
            .once();
        let (engine, store) = engine_with(coach, MockTranscriber::new());

        let session = engine
            .create_session(CreateSessionInput {
                question_count: Some(1),
                allow_follow_ups: Some(false),
            })
            .await
            .unwrap();

        let out = engine
            .submit_answer(session.id, text_answer("I led the rewrite.", 2.0))
            .await
            .unwrap();

        assert_eq!(out.prompt_type, PromptType::Completed);
        assert_eq!(out.status, SessionStatus::Completed);
        assert!(out.next_prompt.is_none());
        let result = out.result.expect("completed session must carry a result");
        // Timing comes from the local aggregator, never the model's echo.
        assert_eq!(result.timing_summary.total_turns, 1);
        assert_eq!(result.timing_summary.avg_response_delay_sec, 2.0);

        // The stored session matches what was returned.
        let stored = store.find_by_id(session.id).await.unwrap().unwrap();
        assert_eq!(stored.phase, SessionPhase::Completed);
        assert_eq!(stored.question_index, 1);
        assert_eq!(stored.turns.len(), 1);
        assert!(stored.turns[0].follow_up_question.is_none(), "follow-up must be suppressed");

        let view = engine.session_result(session.id).await.unwrap();
        assert_eq!(view.status, SessionStatus::Completed);
        assert_eq!(view.result, Some(result));
    }

    #[tokio::test]
    async fn a_follow_up_answer_advances_to_the_next_question() {
        let mut coach = MockCoach::new();
        coach
            .expect_interviewer_reply()
            .returning(|_, _| {
                Box::pin(async { Ok(reply("Interesting.", Some("What was the hardest part?"))) })
            })
            .once();
        coach
            .expect_follow_up_close()
            .returning(|_| Box::pin(async { Ok("Got it, thanks.".to_string()) }))
            .once();
        let (engine, store) = engine_with(coach, MockTranscriber::new());

        let session = engine
            .create_session(CreateSessionInput {
                question_count: Some(2),
                allow_follow_ups: Some(true),
            })
            .await
            .unwrap();

        let first = engine
            .submit_answer(session.id, text_answer("We migrated the database.", 1.0))
            .await
            .unwrap();
        assert_eq!(first.prompt_type, PromptType::FollowUp);
        assert_eq!(first.next_prompt.as_deref(), Some("What was the hardest part?"));
        assert_eq!(first.interviewer_message, "Interesting.");
        assert!(first.result.is_none());

        // The prompt resolver sees the pending follow-up too.
        let prompt = engine.current_prompt(session.id).await.unwrap();
        assert_eq!(prompt.prompt_type, PromptType::FollowUp);
        assert_eq!(prompt.question_number, 1);

        let second = engine
            .submit_answer(session.id, text_answer("Cutover without downtime.", 5.5))
            .await
            .unwrap();
        assert_eq!(second.prompt_type, PromptType::Question);
        assert_eq!(second.status, SessionStatus::InProgress);
        assert_eq!(second.interviewer_message, "Got it, thanks.");
        assert_eq!(second.question_number, 2);
        assert!(second.result.is_none());

        let stored = store.find_by_id(session.id).await.unwrap().unwrap();
        assert_eq!(stored.question_index, 1);
        assert_eq!(stored.phase, SessionPhase::AwaitingAnswer);
        assert_eq!(stored.turns.len(), 1);
        assert_eq!(
            stored.turns[0].follow_up_answer.as_deref(),
            Some("Cutover without downtime.")
        );
        assert_eq!(stored.turns[0].follow_up_response_delay_sec, Some(5.5));
    }

    #[tokio::test]
    async fn disabled_follow_ups_never_enter_the_follow_up_phase() {
        let mut coach = MockCoach::new();
        coach
            .expect_interviewer_reply()
            .returning(|_, _| Box::pin(async { Ok(reply("Good.", Some("Tell me more?"))) }))
            .once();
        let (engine, store) = engine_with(coach, MockTranscriber::new());

        let session = engine
            .create_session(CreateSessionInput {
                question_count: Some(2),
                allow_follow_ups: Some(false),
            })
            .await
            .unwrap();

        let out = engine
            .submit_answer(session.id, text_answer("An answer.", 0.5))
            .await
            .unwrap();

        assert_eq!(out.prompt_type, PromptType::Question);
        assert_eq!(out.question_number, 2);

        let stored = store.find_by_id(session.id).await.unwrap().unwrap();
        assert_eq!(stored.phase, SessionPhase::AwaitingAnswer);
        assert!(stored.turns[0].follow_up_question.is_none());
    }

    #[tokio::test]
    async fn submitting_to_a_completed_session_is_an_invalid_state() {
        let mut coach = MockCoach::new();
        coach
            .expect_interviewer_reply()
            .returning(|_, _| Box::pin(async { Ok(reply("Ok.", None)) }))
            .once();
        coach
            .expect_feedback()
            .returning(|_, _| Box::pin(async { Ok(feedback_json()) }))
            .once();
        let (engine, _store) = engine_with(coach, MockTranscriber::new());

        let session = engine
            .create_session(CreateSessionInput {
                question_count: Some(1),
                allow_follow_ups: Some(false),
            })
            .await
            .unwrap();
        engine
            .submit_answer(session.id, text_answer("Done.", 0.0))
            .await
            .unwrap();

        let err = engine
            .submit_answer(session.id, text_answer("One more?", 0.0))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn missing_answer_content_is_invalid_input() {
        let (engine, _store) = engine_with(MockCoach::new(), MockTranscriber::new());
        let session = engine.create_session(CreateSessionInput::default()).await.unwrap();

        let err = engine
            .submit_answer(session.id, AnswerInput::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)), "got {err:?}");

        // Blank text without audio is just as missing.
        let err = engine
            .submit_answer(session.id, text_answer("   ", 0.0))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn bad_delays_are_invalid_input() {
        let (engine, _store) = engine_with(MockCoach::new(), MockTranscriber::new());
        let session = engine.create_session(CreateSessionInput::default()).await.unwrap();

        for bad in [-1.0, f64::NAN, f64::INFINITY] {
            let err = engine
                .submit_answer(session.id, text_answer("fine answer", bad))
                .await
                .unwrap_err();
            assert!(matches!(err, CoreError::InvalidInput(_)), "delay {bad} got {err:?}");
        }
    }

    #[tokio::test]
    async fn audio_answers_are_transcribed() {
        let mut coach = MockCoach::new();
        coach
            .expect_interviewer_reply()
            .returning(|_, _| Box::pin(async { Ok(reply("Heard you.", None)) }))
            .once();
        let mut transcriber = MockTranscriber::new();
        transcriber
            .expect_transcribe()
            .returning(|_, _| Box::pin(async { Ok("my spoken answer".to_string()) }))
            .once();
        let (engine, store) = engine_with(coach, transcriber);

        let session = engine
            .create_session(CreateSessionInput {
                question_count: Some(2),
                allow_follow_ups: Some(false),
            })
            .await
            .unwrap();

        let input = AnswerInput {
            audio_b64: Some(BASE64.encode(b"not-really-audio")),
            mime_type: Some("audio/wav".to_string()),
            response_delay_sec: Some(1.23456),
            ..AnswerInput::default()
        };
        engine.submit_answer(session.id, input).await.unwrap();

        let stored = store.find_by_id(session.id).await.unwrap().unwrap();
        assert_eq!(stored.turns[0].answer, "my spoken answer");
        // Delays are stored at two decimals.
        assert_eq!(stored.turns[0].main_response_delay_sec, 1.23);
    }

    #[tokio::test]
    async fn blank_transcription_is_invalid_input() {
        let mut transcriber = MockTranscriber::new();
        transcriber
            .expect_transcribe()
            .returning(|_, _| Box::pin(async { Ok("   ".to_string()) }))
            .once();
        let (engine, _store) = engine_with(MockCoach::new(), transcriber);
        let session = engine.create_session(CreateSessionInput::default()).await.unwrap();

        let input = AnswerInput {
            audio_b64: Some(BASE64.encode(b"bytes")),
            ..AnswerInput::default()
        };
        let err = engine.submit_answer(session.id, input).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn malformed_base64_is_invalid_input() {
        let (engine, _store) = engine_with(MockCoach::new(), MockTranscriber::new());
        let session = engine.create_session(CreateSessionInput::default()).await.unwrap();

        let input = AnswerInput {
            audio_b64: Some("!!! definitely not base64 !!!".to_string()),
            ..AnswerInput::default()
        };
        let err = engine.submit_answer(session.id, input).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn question_count_is_clamped_against_the_catalog() {
        let (engine, _store) = engine_with(MockCoach::new(), MockTranscriber::new());

        let oversized = engine
            .create_session(CreateSessionInput {
                question_count: Some(50),
                allow_follow_ups: None,
            })
            .await
            .unwrap();
        assert_eq!(oversized.questions.len(), catalog::DEFAULT_QUESTIONS.len());

        let undersized = engine
            .create_session(CreateSessionInput {
                question_count: Some(0),
                allow_follow_ups: None,
            })
            .await
            .unwrap();
        assert_eq!(undersized.questions.len(), 1);
    }

    #[tokio::test]
    async fn unknown_sessions_are_not_found() {
        let (engine, _store) = engine_with(MockCoach::new(), MockTranscriber::new());
        let missing = Uuid::new_v4();

        assert!(matches!(
            engine.current_prompt(missing).await.unwrap_err(),
            CoreError::NotFound(_)
        ));
        assert!(matches!(
            engine.session_result(missing).await.unwrap_err(),
            CoreError::NotFound(_)
        ));
        assert!(matches!(
            engine
                .submit_answer(missing, text_answer("hello", 0.0))
                .await
                .unwrap_err(),
            CoreError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn a_feedback_failure_leaves_the_session_in_progress_and_retryable() {
        let mut coach = MockCoach::new();
        coach
            .expect_interviewer_reply()
            .returning(|_, _| Box::pin(async { Ok(reply("Ok.", None)) }))
            .times(2);
        // First completion attempt fails; the retry succeeds.
        coach
            .expect_feedback()
            .returning(|_, _| Box::pin(async { Err(anyhow!("model unavailable")) }))
            .once();
        coach
            .expect_feedback()
            .returning(|_, _| Box::pin(async { Ok(feedback_json()) }))
            .once();
        let (engine, store) = engine_with(coach, MockTranscriber::new());

        let session = engine
            .create_session(CreateSessionInput {
                question_count: Some(1),
                allow_follow_ups: Some(false),
            })
            .await
            .unwrap();

        let err = engine
            .submit_answer(session.id, text_answer("My answer.", 0.0))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Upstream(_)), "got {err:?}");

        // Nothing was persisted: the session still awaits the same answer.
        let stored = store.find_by_id(session.id).await.unwrap().unwrap();
        assert_eq!(stored.phase, SessionPhase::AwaitingAnswer);
        assert_eq!(stored.question_index, 0);
        assert!(stored.turns.is_empty());
        assert!(stored.result.is_none());

        let out = engine
            .submit_answer(session.id, text_answer("My answer.", 0.0))
            .await
            .unwrap();
        assert_eq!(out.status, SessionStatus::Completed);
        assert!(out.result.is_some());
    }

    #[tokio::test]
    async fn current_prompt_reports_completion() {
        let mut coach = MockCoach::new();
        coach
            .expect_interviewer_reply()
            .returning(|_, _| Box::pin(async { Ok(reply("Ok.", None)) }))
            .once();
        coach
            .expect_feedback()
            .returning(|_, _| Box::pin(async { Ok(feedback_json()) }))
            .once();
        let (engine, _store) = engine_with(coach, MockTranscriber::new());

        let session = engine
            .create_session(CreateSessionInput {
                question_count: Some(1),
                allow_follow_ups: Some(false),
            })
            .await
            .unwrap();

        let before = engine.current_prompt(session.id).await.unwrap();
        assert_eq!(before.prompt_type, PromptType::Question);
        assert_eq!(before.prompt.as_deref(), Some(catalog::DEFAULT_QUESTIONS[0]));
        assert_eq!(before.question_number, 1);
        assert_eq!(before.total_questions, 1);

        engine
            .submit_answer(session.id, text_answer("Answer.", 0.0))
            .await
            .unwrap();

        let after = engine.current_prompt(session.id).await.unwrap();
        assert_eq!(after.prompt_type, PromptType::Completed);
        assert!(after.prompt.is_none());
        assert_eq!(after.question_number, 1);
    }
}
