use axum::body::Body;
use axum::Router;
use http::{Request, Response};
use http_body_util::BodyExt;
use serde_json::{json, Value};

use gymhub::db::{create_memory_pool, DbPool};
use gymhub::handlers::{bookings, members, schedules, sweep};
use gymhub::migrations::run_migrations_for_tests;
use gymhub::repositories::{BookingRepository, MemberRepository, ScheduleRepository};

pub fn setup_test_db() -> DbPool {
    let pool = create_memory_pool().expect("Failed to create test database");
    run_migrations_for_tests(&pool).expect("Failed to run migrations");
    pool
}

pub fn create_test_app(pool: DbPool) -> Router {
    let schedule_repo = ScheduleRepository::new(pool.clone());
    let booking_repo = BookingRepository::new(pool.clone());
    let member_repo = MemberRepository::new(pool.clone());

    let schedules_state = schedules::SchedulesState {
        schedule_repo: schedule_repo.clone(),
        member_repo: member_repo.clone(),
    };
    let bookings_state = bookings::BookingsState {
        booking_repo,
        schedule_repo,
    };
    let members_state = members::MembersState { member_repo };
    let sweep_state = sweep::SweepState { pool };

    gymhub::routes::create_router(schedules_state, bookings_state, members_state, sweep_state)
}

#[allow(dead_code)]
pub fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[allow(dead_code)]
pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Trainer "Alice" with a single Yoga slot on Monday 08:00.
#[allow(dead_code)]
pub async fn create_alice_schedule(pool: &DbPool, participant_limit: i64) {
    let repo = ScheduleRepository::new(pool.clone());
    repo.put_schedule(
        "Alice",
        vec![gymhub::models::NewSession {
            id: "Yoga-Monday-08:00".to_string(),
            day: "Monday".to_string(),
            start_time: "08:00".to_string(),
            class_type: "Yoga".to_string(),
            participant_limit,
        }],
    )
    .await
    .unwrap();
}

#[allow(dead_code)]
pub async fn add_test_participant(pool: &DbPool, session_id: &str, email: &str) {
    let repo = ScheduleRepository::new(pool.clone());
    repo.add_participant(
        "Alice",
        gymhub::models::AddParticipants {
            session_ids: vec![session_id.to_string()],
            booker_email: email.to_string(),
            start_date: "01-06-2026".to_string(),
            duration_weeks: 4,
        },
    )
    .await
    .unwrap();
}

#[allow(dead_code)]
pub fn participant_payload(session_ids: &[&str], email: &str) -> Value {
    json!({
        "session_ids": session_ids,
        "booker_email": email,
        "start_date": "01-06-2026",
        "duration_weeks": 4,
    })
}
