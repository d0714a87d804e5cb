use anyhow::{Result, anyhow};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::timing::TimingSummary;

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

/// At most this many corrections survive sanitization.
pub const MAX_CORRECTIONS: usize = 8;
/// At most this many interview tips survive sanitization.
pub const MAX_TIPS: usize = 3;

/// Fallback closing line when the model returns nothing usable.
const DEFAULT_CLOSING: &str = "Thanks, that adds helpful context. Let's keep going.";

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: Message,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub content: String,
}

/// What the interviewer says back after a main answer. The follow-up is
/// whatever the model proposed; whether it is honored is the engine's call.
#[derive(Debug, Clone, PartialEq)]
pub struct InterviewerReply {
    pub reply_text: String,
    pub follow_up_question: Option<String>,
}

/// A completed main + follow-up exchange, handed back for the closing line.
#[derive(Debug, Clone, PartialEq)]
pub struct FollowUpExchange {
    pub question: String,
    pub answer: String,
    pub follow_up_question: String,
    pub follow_up_answer: String,
}

/// One question's worth of exchange, as handed to feedback generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptEntry {
    pub question_number: usize,
    pub question: String,
    pub answer: String,
    pub follow_up_question: Option<String>,
    pub follow_up_answer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerCorrection {
    pub original: String,
    pub corrected: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovedAnswer {
    pub question: String,
    pub answer: String,
}

/// The final feedback report stored on a completed session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewFeedback {
    pub timing_summary: TimingSummary,
    pub corrections: Vec<AnswerCorrection>,
    pub improved_best_answer: ImprovedAnswer,
    pub interview_tips: Vec<String>,
}

// The `Coach` trait is the contract for the language-generation oracle the
// engine leans on: interviewer replies (with an optional follow-up), the
// short closing after a follow-up answer, and the end-of-session feedback.
// The engine depends on this abstraction so tests can drive it with
// `mockall`'s generated mock instead of a live API.
//
// `feedback` returns the model's raw JSON on purpose: free-form model
// output is normalized at a single boundary (`sanitize_feedback`) rather
// than trusted shape-by-shape at every call site.
#[async_trait]
#[cfg_attr(test, automock)]
pub trait Coach: Send + Sync {
    async fn interviewer_reply(&self, question: &str, answer: &str) -> Result<InterviewerReply>;

    async fn follow_up_close(&self, exchange: &FollowUpExchange) -> Result<String>;

    async fn feedback(
        &self,
        timing_summary: &TimingSummary,
        transcript: &[TranscriptEntry],
    ) -> Result<Value>;
}

pub struct OpenAiCoach {
    client: Client,
    api_key: String,
    model: String,
}

impl OpenAiCoach {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
        }
    }

    async fn complete(&self, body: Value) -> Result<String> {
        let resp = self
            .client
            .post(CHAT_COMPLETIONS_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .json::<LlmResponse>()
            .await?;

        let content = resp
            .choices
            .first()
            .ok_or_else(|| anyhow!("No response from LLM"))?
            .message
            .content
            .clone();
        Ok(content)
    }
}

#[async_trait]
impl Coach for OpenAiCoach {
    async fn interviewer_reply(&self, question: &str, answer: &str) -> Result<InterviewerReply> {
        let prompt = format!(
            r#"You are conducting a mock job interview. The candidate was asked:
"{question}"

They answered:
"{answer}"

Reply as the interviewer in one or two natural, encouraging sentences. If a single short follow-up question would usefully probe the answer deeper, include it; otherwise use null.

Respond STRICTLY as a JSON object:
{{"reply": "<interviewer reply>", "follow_up_question": <string or null>}}

Do NOT add any explanation, just the JSON."#
        );

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "user", "content": prompt }
            ],
            "response_format": { "type": "json_object" },
            "temperature": 0.7
        });

        let content = self.complete(body).await?;
        let parsed: Value = serde_json::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse interviewer reply: {e}"))?;

        let reply_text = parsed
            .get("reply")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|reply| !reply.is_empty())
            .ok_or_else(|| anyhow!("Interviewer reply is missing 'reply': {content}"))?
            .to_string();

        let follow_up_question = parsed
            .get("follow_up_question")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_string);

        Ok(InterviewerReply {
            reply_text,
            follow_up_question,
        })
    }

    async fn follow_up_close(&self, exchange: &FollowUpExchange) -> Result<String> {
        let prompt = format!(
            r#"You are conducting a mock job interview. This exchange just finished:

Question: "{question}"
Answer: "{answer}"
Follow-up question: "{follow_up_question}"
Follow-up answer: "{follow_up_answer}"

Acknowledge the follow-up answer in one short, natural sentence so the interview can move on. Do NOT ask another question.

Respond with the sentence only, no quotes."#,
            question = exchange.question,
            answer = exchange.answer,
            follow_up_question = exchange.follow_up_question,
            follow_up_answer = exchange.follow_up_answer,
        );

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "user", "content": prompt }
            ],
            "response_format": { "type": "text" },
            "temperature": 0.7
        });

        let content = self.complete(body).await?;
        let closing = content.trim();
        if closing.is_empty() {
            return Ok(DEFAULT_CLOSING.to_string());
        }
        Ok(closing.to_string())
    }

    async fn feedback(
        &self,
        timing_summary: &TimingSummary,
        transcript: &[TranscriptEntry],
    ) -> Result<Value> {
        let timing_json = serde_json::to_string(timing_summary)?;
        let transcript_json = serde_json::to_string_pretty(transcript)?;

        let prompt = format!(
            r#"You are an interview coach writing final feedback for a completed mock interview.

Response timing statistics:
{timing_json}

Full interview transcript:
{transcript_json}

Produce:
- "corrections": up to {MAX_CORRECTIONS} entries where the candidate's phrasing could be stronger, each as {{"original": "<what they said>", "corrected": "<stronger phrasing>", "reason": "<why>"}}.
- "improved_best_answer": the candidate's strongest answer rewritten as a model answer, as {{"question": "<question>", "answer": "<improved answer>"}}.
- "interview_tips": up to {MAX_TIPS} short, actionable tips.

Respond STRICTLY as a JSON object with exactly those three keys. Do NOT add any explanation, just the JSON."#
        );

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "user", "content": prompt }
            ],
            "response_format": { "type": "json_object" },
            "temperature": 0.3
        });

        let content = self.complete(body).await?;
        let parsed: Value = serde_json::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse feedback JSON: {e}"))?;
        Ok(parsed)
    }
}

/// Normalizes raw model feedback into the shape the session stores.
///
/// This is the single boundary where oracle contract drift is absorbed:
/// list lengths are clamped, entries with blank required fields dropped,
/// and a missing improved answer falls back to the candidate's own first
/// exchange. The timing summary is always the locally computed one, never
/// the model's echo.
pub fn sanitize_feedback(
    raw: &Value,
    timing_summary: TimingSummary,
    transcript: &[TranscriptEntry],
) -> InterviewFeedback {
    let corrections = raw
        .get("corrections")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| {
                    let original = text_field(entry, "original")?;
                    let corrected = text_field(entry, "corrected")?;
                    let reason = text_field(entry, "reason").unwrap_or_default();
                    Some(AnswerCorrection {
                        original,
                        corrected,
                        reason,
                    })
                })
                .take(MAX_CORRECTIONS)
                .collect()
        })
        .unwrap_or_default();

    let improved_best_answer = raw
        .get("improved_best_answer")
        .and_then(|entry| {
            Some(ImprovedAnswer {
                question: text_field(entry, "question")?,
                answer: text_field(entry, "answer")?,
            })
        })
        .unwrap_or_else(|| {
            // The candidate's own first exchange is the safe stand-in.
            let first = transcript.first();
            ImprovedAnswer {
                question: first.map(|t| t.question.clone()).unwrap_or_default(),
                answer: first.map(|t| t.answer.clone()).unwrap_or_default(),
            }
        });

    let interview_tips = raw
        .get("interview_tips")
        .and_then(Value::as_array)
        .map(|tips| {
            tips.iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|tip| !tip.is_empty())
                .map(str::to_string)
                .take(MAX_TIPS)
                .collect()
        })
        .unwrap_or_default();

    InterviewFeedback {
        timing_summary,
        corrections,
        improved_best_answer,
        interview_tips,
    }
}

/// Non-blank trimmed string field of a JSON object, or `None`.
fn text_field(entry: &Value, key: &str) -> Option<String> {
    entry
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}
