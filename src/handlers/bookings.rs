use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::dates::{self, DateFormat};
use crate::error::{AppError, Result};
use crate::models::{
    AcceptBooking, CreateBookingRequest, CreateClassBooking, RejectBooking, ValidateBooking,
};
use crate::repositories::{BookingRepository, ScheduleRepository, SkippedSession};

#[derive(Clone)]
pub struct BookingsState {
    pub booking_repo: BookingRepository,
    pub schedule_repo: ScheduleRepository,
}

/// Read-only preflight: classifies the requested session ids without
/// reserving anything.
pub async fn validate(
    State(state): State<BookingsState>,
    Json(payload): Json<ValidateBooking>,
) -> Result<Response> {
    let verdict = state
        .schedule_repo
        .validate(&payload.trainer, payload.sessions)
        .await?;
    Ok(Json(verdict).into_response())
}

pub async fn create_request(
    State(state): State<BookingsState>,
    Json(payload): Json<CreateBookingRequest>,
) -> Result<Response> {
    let verdict = state
        .schedule_repo
        .validate(&payload.trainer, payload.session_ids.clone())
        .await?;
    if !verdict.valid {
        return Err(AppError::Conflict(
            verdict.reason.unwrap_or_else(|| "booking rejected".to_string()),
        ));
    }

    let request = state
        .booking_repo
        .create_request(&payload.trainer, payload.session_ids, &payload.booker_email)
        .await?;
    Ok((StatusCode::CREATED, Json(request)).into_response())
}

pub async fn list_requests(State(state): State<BookingsState>) -> Result<Response> {
    Ok(Json(state.booking_repo.list_requests().await?).into_response())
}

pub async fn list_accepted(State(state): State<BookingsState>) -> Result<Response> {
    Ok(Json(state.booking_repo.list_accepted().await?).into_response())
}

pub async fn list_rejected(State(state): State<BookingsState>) -> Result<Response> {
    Ok(Json(state.booking_repo.list_rejected().await?).into_response())
}

pub async fn list_history(State(state): State<BookingsState>) -> Result<Response> {
    Ok(Json(state.booking_repo.list_history().await?).into_response())
}

#[derive(Serialize)]
pub struct AcceptanceResponse {
    pub updated: Vec<String>,
    pub skipped: Vec<SkippedSession>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_booking_id: Option<String>,
}

/// Booking acceptance workflow: stamp the booker's participant entries as
/// paid, then mirror the booking into the accepted table.
pub async fn accept(
    State(state): State<BookingsState>,
    Json(payload): Json<AcceptBooking>,
) -> Result<Response> {
    if dates::parse_utc(DateFormat::Rfc3339, &payload.accepted_at).is_err() {
        return Err(AppError::BadRequest(format!(
            "invalid acceptance timestamp: {} (expected RFC 3339)",
            payload.accepted_at
        )));
    }
    if payload.payment_ref.trim().is_empty() {
        return Err(AppError::BadRequest("payment reference is required".to_string()));
    }

    let booker_email = payload.booker_email.clone();
    let payment_ref = payload.payment_ref.clone();
    let accepted_at = payload.accepted_at.clone();
    let outcome = state.schedule_repo.accept_booking(payload).await?;

    let mut accepted_booking_id = None;
    if let (Some(trainer), Some(start_at), Some(duration_weeks)) = (
        outcome.trainer.as_deref(),
        outcome.start_date.as_deref(),
        outcome.duration_weeks,
    ) {
        let accepted = state
            .booking_repo
            .promote_request(
                trainer,
                &booker_email,
                outcome.updated.clone(),
                &payment_ref,
                &accepted_at,
                start_at,
                duration_weeks,
            )
            .await?;
        accepted_booking_id = Some(accepted.id);
    }

    Ok(Json(AcceptanceResponse {
        updated: outcome.updated,
        skipped: outcome.skipped,
        accepted_booking_id,
    })
    .into_response())
}

pub async fn reject_request(
    State(state): State<BookingsState>,
    Path(id): Path<String>,
    Json(payload): Json<RejectBooking>,
) -> Result<Response> {
    let reason = payload.reason.unwrap_or_else(|| "rejected".to_string());
    let rejected = state.booking_repo.reject_request(&id, &reason).await?;
    Ok(Json(rejected).into_response())
}

pub async fn refund_accepted(
    State(state): State<BookingsState>,
    Path(id): Path<String>,
) -> Result<Response> {
    let entry = state.booking_repo.refund_accepted(&id).await?;
    Ok(Json(entry).into_response())
}

pub async fn create_class_booking(
    State(state): State<BookingsState>,
    Json(payload): Json<CreateClassBooking>,
) -> Result<Response> {
    if dates::parse_utc(DateFormat::DayMonthYear, &payload.class_date).is_err() {
        return Err(AppError::BadRequest(format!(
            "invalid class date: {} (expected dd-mm-yyyy)",
            payload.class_date
        )));
    }
    let booking = state
        .booking_repo
        .create_class_booking(&payload.class_name, &payload.booker_email, &payload.class_date)
        .await?;
    Ok((StatusCode::CREATED, Json(booking)).into_response())
}

pub async fn list_class_bookings(State(state): State<BookingsState>) -> Result<Response> {
    Ok(Json(state.booking_repo.list_class_bookings().await?).into_response())
}
