//! Database access layer for the meeting service.

pub mod directory;
pub mod meetings;

pub use meetings::MeetingsRepository;
