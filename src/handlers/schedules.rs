use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, Result};
use crate::models::{AddParticipants, Day, PutSchedule};
use crate::repositories::{MemberRepository, ScheduleRepository};

#[derive(Clone)]
pub struct SchedulesState {
    pub schedule_repo: ScheduleRepository,
    pub member_repo: MemberRepository,
}

pub async fn get_schedule(
    State(state): State<SchedulesState>,
    Path(trainer): Path<String>,
) -> Result<Response> {
    let schedule = state
        .schedule_repo
        .get_schedule(&trainer)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("trainer not found: {trainer}")))?;
    Ok(Json(schedule).into_response())
}

pub async fn put_schedule(
    State(state): State<SchedulesState>,
    Path(trainer): Path<String>,
    Json(payload): Json<PutSchedule>,
) -> Result<Response> {
    let schedule = state
        .schedule_repo
        .put_schedule(&trainer, payload.sessions)
        .await?;
    Ok((StatusCode::CREATED, Json(schedule)).into_response())
}

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub day: String,
    pub time: String,
}

/// Structured-key lookup: exact match on (trainer, day, time).
pub async fn find_session(
    State(state): State<SchedulesState>,
    Path(trainer): Path<String>,
    Query(query): Query<SessionQuery>,
) -> Result<Response> {
    let day = Day::parse(&query.day)
        .ok_or_else(|| AppError::BadRequest(format!("unknown day: {}", query.day)))?;
    let session = state
        .schedule_repo
        .find_session(&trainer, day, &query.time)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "no session for {trainer} on {} at {}",
                query.day, query.time
            ))
        })?;
    Ok(Json(session).into_response())
}

pub async fn get_session_by_id(
    State(state): State<SchedulesState>,
    Path(id): Path<String>,
) -> Result<Response> {
    let session = state
        .schedule_repo
        .find_session_by_id(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no session found for id: {id}")))?;
    Ok(Json(session).into_response())
}

pub async fn add_participant(
    State(state): State<SchedulesState>,
    Path(trainer): Path<String>,
    Json(payload): Json<AddParticipants>,
) -> Result<Response> {
    if state
        .member_repo
        .is_banned(&payload.booker_email, Utc::now())
        .await?
    {
        return Err(AppError::Conflict(format!(
            "member is banned: {}",
            payload.booker_email
        )));
    }

    let added = state.schedule_repo.add_participant(&trainer, payload).await?;
    Ok((StatusCode::CREATED, Json(added)).into_response())
}

pub async fn remove_participant(
    State(state): State<SchedulesState>,
    Path((trainer, email)): Path<(String, String)>,
) -> Result<Response> {
    let removed = state
        .schedule_repo
        .remove_participant(&trainer, &email)
        .await?;
    Ok(Json(json!({ "removed": removed })).into_response())
}

pub async fn reset_participants(
    State(state): State<SchedulesState>,
    Path(trainer): Path<String>,
) -> Result<Response> {
    let removed = state.schedule_repo.reset_participants(&trainer).await?;
    Ok(Json(json!({ "removed": removed })).into_response())
}
