pub mod booking;
pub mod day;
pub mod from_row;
pub mod member;
pub mod participant;
pub mod session;

pub use booking::{
    AcceptBooking, AcceptedBooking, BookingHistoryEntry, BookingRequest, BookingStatus,
    ClassBooking, CreateBookingRequest, CreateClassBooking, RejectBooking, RejectedBooking,
    ValidateBooking, Validation,
};
pub use day::Day;
pub use from_row::FromSqliteRow;
pub use member::{BanMember, CreateMember, Member, MemberTier, SetTier};
pub use participant::{AddParticipants, Participant};
pub use session::{
    NewSession, PutSchedule, ScheduleSlot, Session, SessionDetail, TrainerSchedule,
};
