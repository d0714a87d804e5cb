use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use greenroom_core::{
    coach::OpenAiCoach,
    engine::{AnswerInput, CoreError, CreateSessionInput, InterviewEngine},
    session::{InterviewSession, SessionStatus},
    store::InMemorySessionStore,
    transcribe::OpenAiTranscriber,
};

pub type Engine = InterviewEngine<InMemorySessionStore, OpenAiCoach, OpenAiTranscriber>;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/sessions", post(create_session))
        .route("/sessions/{id}/prompt", get(current_prompt))
        .route("/sessions/{id}/answers", post(submit_answer))
        .route("/sessions/{id}/result", get(session_result))
        .with_state(state)
}

/// Wraps core failures so axum can turn them into HTTP responses. The
/// mapping is the only transport-specific concern in the repository.
struct ApiError(CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            CoreError::NotFound(_) => (StatusCode::NOT_FOUND, self.0.to_string()),
            CoreError::InvalidInput(_) => (StatusCode::BAD_REQUEST, self.0.to_string()),
            CoreError::InvalidState(_) => (StatusCode::CONFLICT, self.0.to_string()),
            CoreError::Upstream(err) => {
                tracing::error!("upstream failure: {err:#}");
                (
                    StatusCode::BAD_GATEWAY,
                    "upstream service failure".to_string(),
                )
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[derive(Serialize)]
struct SessionCreated {
    session_id: Uuid,
    created_at: DateTime<Utc>,
    status: SessionStatus,
    total_questions: usize,
    allow_follow_ups: bool,
    first_question: String,
}

impl From<&InterviewSession> for SessionCreated {
    fn from(session: &InterviewSession) -> Self {
        Self {
            session_id: session.id,
            created_at: session.created_at,
            status: session.status(),
            total_questions: session.questions.len(),
            allow_follow_ups: session.allow_follow_ups,
            first_question: session.questions.first().cloned().unwrap_or_default(),
        }
    }
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn create_session(
    State(state): State<AppState>,
    Json(input): Json<CreateSessionInput>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.engine.create_session(input).await?;
    Ok((StatusCode::CREATED, Json(SessionCreated::from(&session))))
}

async fn current_prompt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.engine.current_prompt(id).await?;
    Ok(Json(view))
}

async fn submit_answer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<AnswerInput>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.engine.submit_answer(id, input).await?;
    Ok(Json(outcome))
}

async fn session_result(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.engine.session_result(id).await?;
    Ok(Json(view))
}
