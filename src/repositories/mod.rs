pub mod booking_repo;
pub mod member_repo;
pub mod schedule_repo;

pub use booking_repo::BookingRepository;
pub use member_repo::MemberRepository;
pub use schedule_repo::{AcceptanceOutcome, ScheduleRepository, SkippedSession};
