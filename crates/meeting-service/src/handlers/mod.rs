//! HTTP request handlers for the meeting service.

pub mod health;
pub mod meetings;
pub mod metrics;

pub use health::{health_check, readiness_check};
pub use meetings::{
    add_attendees, create_meeting, delete_meeting, get_meeting, join_meeting, list_meetings_admin,
    meeting_stats, my_meetings, remove_attendee, update_meeting, upcoming_meetings,
};
pub use metrics::metrics_handler;
