use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::error::{AppError, Result};
use crate::models::{BanMember, CreateMember, MemberTier, SetTier};
use crate::repositories::MemberRepository;

#[derive(Clone)]
pub struct MembersState {
    pub member_repo: MemberRepository,
}

pub async fn create(
    State(state): State<MembersState>,
    Json(payload): Json<CreateMember>,
) -> Result<Response> {
    if payload.name.trim().is_empty() || payload.email.trim().is_empty() {
        return Err(AppError::BadRequest(
            "name and email are required".to_string(),
        ));
    }
    let tier = match payload.tier.as_deref() {
        Some(raw) => MemberTier::parse(raw)
            .ok_or_else(|| AppError::BadRequest(format!("unknown tier: {raw}")))?,
        None => MemberTier::default(),
    };
    let member = state
        .member_repo
        .create(&payload.name, &payload.email, tier)
        .await?;
    Ok((StatusCode::CREATED, Json(member)).into_response())
}

pub async fn list(State(state): State<MembersState>) -> Result<Response> {
    Ok(Json(state.member_repo.find_all().await?).into_response())
}

pub async fn get(
    State(state): State<MembersState>,
    Path(email): Path<String>,
) -> Result<Response> {
    let member = state
        .member_repo
        .find_by_email(&email)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("member not found: {email}")))?;
    Ok(Json(member).into_response())
}

pub async fn delete(
    State(state): State<MembersState>,
    Path(email): Path<String>,
) -> Result<Response> {
    if !state.member_repo.delete_by_email(&email).await? {
        return Err(AppError::NotFound(format!("member not found: {email}")));
    }
    Ok(Json(json!({ "deleted": email })).into_response())
}

pub async fn ban(
    State(state): State<MembersState>,
    Path(email): Path<String>,
    Json(payload): Json<BanMember>,
) -> Result<Response> {
    if !state.member_repo.ban(&email, &payload.until).await? {
        return Err(AppError::NotFound(format!("member not found: {email}")));
    }
    Ok(Json(json!({ "banned_until": payload.until })).into_response())
}

pub async fn set_tier(
    State(state): State<MembersState>,
    Path(email): Path<String>,
    Json(payload): Json<SetTier>,
) -> Result<Response> {
    let tier = MemberTier::parse(&payload.tier)
        .ok_or_else(|| AppError::BadRequest(format!("unknown tier: {}", payload.tier)))?;
    if !state
        .member_repo
        .set_tier(&email, tier, payload.expires_at.as_deref())
        .await?
    {
        return Err(AppError::NotFound(format!("member not found: {email}")));
    }
    Ok(Json(json!({ "tier": tier, "expires_at": payload.expires_at })).into_response())
}
