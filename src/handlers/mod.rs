pub mod bookings;
pub mod health;
pub mod members;
pub mod schedules;
pub mod sweep;
