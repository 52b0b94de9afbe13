use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::handlers::{bookings, health, members, schedules, sweep};

pub fn create_router(
    schedules_state: schedules::SchedulesState,
    bookings_state: bookings::BookingsState,
    members_state: members::MembersState,
    sweep_state: sweep::SweepState,
) -> Router {
    Router::new()
        // Health
        .route("/health", get(health::health_check))
        // Schedule routes
        .route(
            "/schedules/{trainer}",
            get(schedules::get_schedule).put(schedules::put_schedule),
        )
        .route("/schedules/{trainer}/sessions", get(schedules::find_session))
        .route(
            "/schedules/{trainer}/participants",
            post(schedules::add_participant),
        )
        .route(
            "/schedules/{trainer}/participants/{email}",
            delete(schedules::remove_participant),
        )
        .route("/schedules/{trainer}/reset", post(schedules::reset_participants))
        .route("/sessions/{id}", get(schedules::get_session_by_id))
        .with_state(schedules_state)
        // Booking routes
        .route("/bookings/validate", post(bookings::validate))
        .route("/bookings", post(bookings::create_request))
        .route("/bookings/requests", get(bookings::list_requests))
        .route("/bookings/accepted", get(bookings::list_accepted))
        .route("/bookings/rejected", get(bookings::list_rejected))
        .route("/bookings/history", get(bookings::list_history))
        .route("/bookings/accept", post(bookings::accept))
        .route(
            "/bookings/requests/{id}/reject",
            post(bookings::reject_request),
        )
        .route(
            "/bookings/accepted/{id}/refund",
            post(bookings::refund_accepted),
        )
        .route(
            "/bookings/classes",
            get(bookings::list_class_bookings).post(bookings::create_class_booking),
        )
        .with_state(bookings_state)
        // Member routes
        .route("/members", get(members::list).post(members::create))
        .route(
            "/members/{email}",
            get(members::get).delete(members::delete),
        )
        .route("/members/{email}/ban", post(members::ban))
        .route("/members/{email}/tier", post(members::set_tier))
        .with_state(members_state)
        // Manual sweep trigger
        .route("/sweep", post(sweep::run))
        .with_state(sweep_state)
}
