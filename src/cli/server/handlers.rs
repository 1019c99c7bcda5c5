//! HTTP request handlers.
//!
//! Each handler is a thin translation layer over the service facade: parse,
//! call, map the error kind to a status code.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{ErrorEnvelope, SkillfabError};
use crate::hitl::keywords::KEYWORDS_CACHE_TTL_SECS;
use crate::jobs::model::HitlResponse;
use crate::service::SkillService;

use super::types::*;

/// Application state shared across all handlers.
pub struct AppState {
    pub service: Arc<SkillService>,
    /// Shutdown token for graceful server shutdown
    pub shutdown_token: CancellationToken,
}

impl AppState {
    pub fn new(service: Arc<SkillService>) -> (Arc<Self>, CancellationToken) {
        let shutdown_token = CancellationToken::new();
        let state = Arc::new(Self {
            service,
            shutdown_token: shutdown_token.clone(),
        });
        (state, shutdown_token)
    }
}

type ApiError = (StatusCode, Json<ErrorEnvelope>);

fn map_error(error: SkillfabError) -> ApiError {
    let status =
        StatusCode::from_u16(status_for(&error)).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(error.to_envelope()))
}

fn parse_job_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw)
        .map_err(|_| map_error(SkillfabError::InvalidInput(format!("bad job id {:?}", raw))))
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// Create a skill job. Returns `202 Accepted` with the job id.
pub async fn create_skill(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSkillRequest>,
) -> Result<(StatusCode, Json<CreateSkillResponse>), ApiError> {
    let inputs = req.into_inputs().map_err(map_error)?;
    let job_id = state.service.create_skill(inputs).await.map_err(map_error)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(CreateSkillResponse {
            job_id: job_id.to_string(),
        }),
    ))
}

/// Job status polling endpoint.
pub async fn job_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobStatusResponse>, ApiError> {
    let id = parse_job_id(&id)?;
    let job = state.service.job_status(id).await.map_err(map_error)?;
    Ok(Json(JobStatusResponse::from_job(&job)))
}

/// Peek the outstanding HITL prompt.
pub async fn peek_prompt(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PromptResponse>, ApiError> {
    let id = parse_job_id(&id)?;
    let prompt = state.service.peek_prompt(id).await.map_err(map_error)?;
    Ok(Json(match prompt {
        None => PromptResponse::default(),
        Some(prompt) => PromptResponse {
            prompt_type: Some(format!("{:?}", prompt.prompt_type()).to_lowercase()),
            prompt_key: Some(prompt.key.clone()),
            payload: Some(prompt.payload),
        },
    }))
}

/// Submit a HITL response. Stale prompt keys return `409`.
pub async fn submit_response(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<RespondRequest>,
) -> Result<Json<RespondResponse>, ApiError> {
    let id = parse_job_id(&id)?;
    // The server accepts the action tag directly; unknown words proceed.
    let action = state.service.keywords().action_for(&req.action);
    state
        .service
        .submit_response(
            id,
            &req.prompt_key,
            HitlResponse {
                action,
                feedback: req.feedback,
            },
        )
        .await
        .map_err(map_error)?;
    Ok(Json(RespondResponse { ok: true }))
}

/// Cancel a job.
pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RespondResponse>, ApiError> {
    let id = parse_job_id(&id)?;
    state.service.cancel_job(id).await.map_err(map_error)?;
    Ok(Json(RespondResponse { ok: true }))
}

/// The action keyword map, cacheable client-side for an hour.
pub async fn keyword_config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(
            header::CACHE_CONTROL,
            format!("max-age={}", KEYWORDS_CACHE_TTL_SECS),
        )],
        Json(state.service.keywords().clone()),
    )
}

/// The taxonomy discovery XML.
pub async fn export_taxonomy(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let xml = state.service.export_taxonomy().await.map_err(map_error)?;
    Ok(([(header::CONTENT_TYPE, "application/xml")], xml))
}
