//! Meeting service models.
//!
//! Contains the meeting status state machine, database row types, request
//! and response models, and the pure roster helpers shared by handlers.
//!
//! Wire names are camelCase to preserve the platform's public REST
//! contract; internal names stay snake_case.

use chrono::{DateTime, Duration, Utc};
use common::types::RefSummary;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

// ============================================================================
// Bounds
// ============================================================================

/// Minimum meeting duration in minutes.
pub const MIN_DURATION_MINUTES: i32 = 15;

/// Maximum meeting duration in minutes.
pub const MAX_DURATION_MINUTES: i32 = 480;

/// Minimum attendee capacity.
pub const MIN_MAX_ATTENDEES: i32 = 1;

/// Maximum attendee capacity.
pub const MAX_MAX_ATTENDEES: i32 = 500;

/// Default attendee capacity if not specified in request.
pub const DEFAULT_MAX_ATTENDEES: i32 = 100;

/// Maximum title length in bytes (after trimming).
pub const MAX_TITLE_LENGTH: usize = 255;

/// Bounded result count for the upcoming-meetings view.
pub const UPCOMING_RESULT_LIMIT: i64 = 10;

// ============================================================================
// Meeting Status
// ============================================================================

/// Meeting status enumeration.
///
/// `Scheduled`, `Live`, and `Completed` are derived from wall-clock time
/// relative to the scheduled window; `Cancelled` is an explicit terminal
/// override that time derivation never produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeetingStatus {
    /// Meeting is scheduled but not yet started.
    Scheduled,

    /// Meeting is currently in its scheduled window.
    Live,

    /// Meeting window has passed. Terminal.
    Completed,

    /// Meeting was cancelled by an administrator. Terminal.
    Cancelled,
}

impl MeetingStatus {
    /// Returns the string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            MeetingStatus::Scheduled => "scheduled",
            MeetingStatus::Live => "live",
            MeetingStatus::Completed => "completed",
            MeetingStatus::Cancelled => "cancelled",
        }
    }

    /// Parse a stored status string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(MeetingStatus::Scheduled),
            "live" => Some(MeetingStatus::Live),
            "completed" => Some(MeetingStatus::Completed),
            "cancelled" => Some(MeetingStatus::Cancelled),
            _ => None,
        }
    }
}

/// Derive a meeting's status from wall-clock time.
///
/// Pure function evaluated lazily at the start of every read and before
/// every persist; there is no background scheduler driving transitions.
///
/// Transitions are monotone: `scheduled → live → completed`, with
/// `cancelled` and `completed` terminal. Re-deriving a terminal status is
/// a no-op. The live window is inclusive on both ends, so a meeting
/// observed exactly at `start + duration` is still live.
pub fn derive_status(
    now: DateTime<Utc>,
    scheduled_start: DateTime<Utc>,
    duration_minutes: i32,
    stored: MeetingStatus,
) -> MeetingStatus {
    let end = scheduled_start + Duration::minutes(i64::from(duration_minutes));

    match stored {
        MeetingStatus::Completed | MeetingStatus::Cancelled => stored,
        MeetingStatus::Live => {
            if now > end {
                MeetingStatus::Completed
            } else {
                MeetingStatus::Live
            }
        }
        MeetingStatus::Scheduled => {
            if now > end {
                MeetingStatus::Completed
            } else if now >= scheduled_start {
                MeetingStatus::Live
            } else {
                MeetingStatus::Scheduled
            }
        }
    }
}

/// Validate an external join link.
///
/// The link must be an absolute http(s) URL with a dotted host and no
/// whitespace. Hosting is external; this service only stores the link.
pub fn is_valid_join_link(link: &str) -> bool {
    if link.chars().any(char::is_whitespace) {
        return false;
    }

    let rest = link
        .strip_prefix("https://")
        .or_else(|| link.strip_prefix("http://"));

    match rest {
        Some(rest) => rest
            .split('/')
            .next()
            .is_some_and(|host| !host.is_empty() && host.contains('.')),
        None => false,
    }
}

// ============================================================================
// Database Rows
// ============================================================================

/// Meeting row joined with directory names and roster counts.
///
/// Produced by every meeting query via the shared SELECT fragment in the
/// repository, so single fetches and list pages map identically.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MeetingDetailRow {
    pub meeting_id: Uuid,
    pub title: String,
    pub description: String,
    pub join_link: String,
    pub scheduled_start: DateTime<Utc>,
    pub duration_minutes: i32,
    pub instructor_id: Uuid,
    pub stage_id: Uuid,
    pub subject_id: Uuid,
    pub max_attendees: i32,
    pub is_recorded: bool,
    pub recording_link: Option<String>,
    pub tags: Vec<String>,
    pub status: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub instructor_name: String,
    pub stage_name: String,
    pub subject_name: String,
    pub attendee_count: i64,
    pub joined_count: i64,
}

impl MeetingDetailRow {
    /// Stored status parsed to the enum.
    ///
    /// Unknown stored values are treated as `Scheduled`; the guarded
    /// status UPDATE never writes anything outside the enum, so this path
    /// only fires on hand-edited rows.
    pub fn stored_status(&self) -> MeetingStatus {
        MeetingStatus::parse(&self.status).unwrap_or(MeetingStatus::Scheduled)
    }

    /// Derive the current status for this row.
    pub fn derived_status(&self, now: DateTime<Utc>) -> MeetingStatus {
        derive_status(
            now,
            self.scheduled_start,
            self.duration_minutes,
            self.stored_status(),
        )
    }
}

/// Attendee roster row joined with the account display name.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AttendeeRow {
    pub account_id: Uuid,
    pub display_name: String,
    pub has_joined: bool,
    pub joined_at: Option<DateTime<Utc>>,
}

/// Fields for inserting a new meeting.
#[derive(Debug, Clone)]
pub struct NewMeeting {
    pub title: String,
    pub description: String,
    pub join_link: String,
    pub scheduled_start: DateTime<Utc>,
    pub duration_minutes: i32,
    pub instructor_id: Uuid,
    pub stage_id: Uuid,
    pub subject_id: Uuid,
    pub max_attendees: i32,
    pub is_recorded: bool,
    pub tags: Vec<String>,
    pub attendees: Vec<Uuid>,
    pub created_by: Uuid,
}

// ============================================================================
// Roster Helpers
// ============================================================================

/// Result of partitioning a submitted attendee id list.
///
/// The original platform silently dropped bad ids; here the partition is
/// explicit and the dropped sets are surfaced in responses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttendeePartition {
    /// Resolvable, net-new account ids in submission order, deduplicated.
    pub valid: Vec<Uuid>,

    /// Count of null or empty entries.
    pub invalid_count: usize,

    /// Entries that did not resolve to a directory account.
    pub unknown: Vec<String>,

    /// Accounts already on the roster.
    pub already_present: Vec<Uuid>,
}

/// Partition submitted attendee candidates against the directory and the
/// current roster.
///
/// Duplicates within the submission are collapsed; the first occurrence
/// decides the classification.
pub fn partition_attendees(
    candidates: &[Option<String>],
    known: &HashSet<Uuid>,
    on_roster: &HashSet<Uuid>,
) -> AttendeePartition {
    let mut partition = AttendeePartition::default();
    let mut seen: HashSet<Uuid> = HashSet::new();

    for candidate in candidates {
        let Some(raw) = candidate
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        else {
            partition.invalid_count += 1;
            continue;
        };

        let Ok(id) = Uuid::parse_str(raw) else {
            partition.unknown.push(raw.to_string());
            continue;
        };

        if !seen.insert(id) {
            continue;
        }

        if !known.contains(&id) {
            partition.unknown.push(raw.to_string());
        } else if on_roster.contains(&id) {
            partition.already_present.push(id);
        } else {
            partition.valid.push(id);
        }
    }

    partition
}

/// A roster entry produced by merging an update patch with join state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RosterEntry {
    pub account_id: Uuid,
    pub has_joined: bool,
    pub joined_at: Option<DateTime<Utc>>,
}

/// Merge a target roster id list against the existing roster.
///
/// Accounts already on the roster keep their `has_joined`/`joined_at`
/// state; new accounts default to not joined. Ids absent from the target
/// list are dropped. Duplicates in the target are collapsed.
pub fn merge_roster(target_ids: &[Uuid], existing: &[AttendeeRow]) -> Vec<RosterEntry> {
    let state: HashMap<Uuid, (bool, Option<DateTime<Utc>>)> = existing
        .iter()
        .map(|a| (a.account_id, (a.has_joined, a.joined_at)))
        .collect();

    let mut seen: HashSet<Uuid> = HashSet::new();
    let mut merged = Vec::with_capacity(target_ids.len());

    for id in target_ids {
        if !seen.insert(*id) {
            continue;
        }
        let (has_joined, joined_at) = state.get(id).copied().unwrap_or((false, None));
        merged.push(RosterEntry {
            account_id: *id,
            has_joined,
            joined_at,
        });
    }

    merged
}

// ============================================================================
// Request Models
// ============================================================================

/// Request to create a new meeting.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateMeetingRequest {
    /// Meeting title (required, 1-255 bytes after trimming).
    pub title: String,

    /// Meeting description (required).
    pub description: String,

    /// External join link (http/https URL).
    pub join_link: String,

    /// Scheduled start time. Must be strictly in the future.
    pub scheduled_date: DateTime<Utc>,

    /// Duration in minutes (15-480).
    pub duration: i32,

    /// Owning instructor account id.
    pub instructor: Uuid,

    /// Stage id.
    pub stage: Uuid,

    /// Subject id.
    pub subject: Uuid,

    /// Initial attendee account ids. Unresolvable ids are dropped and
    /// reported, not rejected.
    pub attendees: Option<Vec<Option<String>>>,

    /// Attendee capacity (optional, default 100, 1-500).
    pub max_attendees: Option<i32>,

    /// Whether the meeting will be recorded (default: false).
    pub is_recorded: Option<bool>,

    /// Free-form tags.
    pub tags: Option<Vec<String>>,
}

impl CreateMeetingRequest {
    /// Validate the request fields.
    ///
    /// # Errors
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), &'static str> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err("Title is required");
        }
        if title.len() > MAX_TITLE_LENGTH {
            return Err("Title must be at most 255 characters");
        }

        if self.description.trim().is_empty() {
            return Err("Description is required");
        }

        if !is_valid_join_link(&self.join_link) {
            return Err("Join link must be a valid http(s) URL");
        }

        if self.scheduled_date <= now {
            return Err("Scheduled date must be in the future");
        }

        if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&self.duration) {
            return Err("Duration must be between 15 and 480 minutes");
        }

        if let Some(max_attendees) = self.max_attendees {
            if !(MIN_MAX_ATTENDEES..=MAX_MAX_ATTENDEES).contains(&max_attendees) {
                return Err("Maximum attendees must be between 1 and 500");
            }
        }

        Ok(())
    }
}

/// Request to update a meeting. All fields are optional; only provided
/// fields are applied.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateMeetingRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub join_link: Option<String>,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub duration: Option<i32>,
    pub instructor: Option<Uuid>,
    pub stage: Option<Uuid>,
    pub subject: Option<Uuid>,

    /// Full target roster as bare account ids. Existing entries keep
    /// their join state; ids absent from the list are removed.
    pub attendees: Option<Vec<Option<String>>>,

    pub max_attendees: Option<i32>,
    pub is_recorded: Option<bool>,
    pub recording_link: Option<String>,
    pub tags: Option<Vec<String>>,

    /// Status override. The only accepted value is "cancelled"; the
    /// remaining statuses are time-derived and cannot be written.
    pub status: Option<String>,
}

impl UpdateMeetingRequest {
    /// Check if the request has any changes.
    pub fn has_changes(&self) -> bool {
        self.title.is_some()
            || self.description.is_some()
            || self.join_link.is_some()
            || self.scheduled_date.is_some()
            || self.duration.is_some()
            || self.instructor.is_some()
            || self.stage.is_some()
            || self.subject.is_some()
            || self.attendees.is_some()
            || self.max_attendees.is_some()
            || self.is_recorded.is_some()
            || self.recording_link.is_some()
            || self.tags.is_some()
            || self.status.is_some()
    }

    /// Validate the provided fields.
    ///
    /// # Errors
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), &'static str> {
        if let Some(title) = &self.title {
            let title = title.trim();
            if title.is_empty() {
                return Err("Title cannot be empty");
            }
            if title.len() > MAX_TITLE_LENGTH {
                return Err("Title must be at most 255 characters");
            }
        }

        if let Some(description) = &self.description {
            if description.trim().is_empty() {
                return Err("Description cannot be empty");
            }
        }

        if let Some(join_link) = &self.join_link {
            if !is_valid_join_link(join_link) {
                return Err("Join link must be a valid http(s) URL");
            }
        }

        if let Some(scheduled_date) = self.scheduled_date {
            if scheduled_date <= now {
                return Err("Scheduled date must be in the future");
            }
        }

        if let Some(duration) = self.duration {
            if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&duration) {
                return Err("Duration must be between 15 and 480 minutes");
            }
        }

        if let Some(max_attendees) = self.max_attendees {
            if !(MIN_MAX_ATTENDEES..=MAX_MAX_ATTENDEES).contains(&max_attendees) {
                return Err("Maximum attendees must be between 1 and 500");
            }
        }

        if let Some(status) = &self.status {
            if status != "cancelled" {
                return Err("Status can only be set to cancelled");
            }
        }

        Ok(())
    }
}

/// Request to add attendees to an existing meeting.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AddAttendeesRequest {
    /// Candidate account ids. Null, empty, unknown, and duplicate entries
    /// are skipped and reported.
    pub attendees: Vec<Option<String>>,
}

/// Query parameters for the admin meeting listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub status: Option<String>,
    pub stage: Option<Uuid>,
    pub subject: Option<Uuid>,
    pub instructor: Option<Uuid>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// Query parameters for the my-meetings listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MyMeetingsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,

    /// Status filter; defaults to "scheduled".
    pub status: Option<String>,
}

// ============================================================================
// Response Models
// ============================================================================

/// Meeting summary used by list views.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingSummary {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub join_link: String,
    pub scheduled_date: DateTime<Utc>,
    pub duration: i32,
    pub instructor: RefSummary,
    pub stage: RefSummary,
    pub subject: RefSummary,
    pub max_attendees: i32,
    pub is_recorded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording_link: Option<String>,
    pub tags: Vec<String>,
    pub status: MeetingStatus,
    pub attendee_count: i64,
    pub joined_count: i64,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MeetingSummary {
    /// Build a summary from a row with an already-derived status.
    pub fn from_row(row: MeetingDetailRow, status: MeetingStatus) -> Self {
        Self {
            id: row.meeting_id,
            title: row.title,
            description: row.description,
            join_link: row.join_link,
            scheduled_date: row.scheduled_start,
            duration: row.duration_minutes,
            instructor: RefSummary {
                id: row.instructor_id,
                name: row.instructor_name,
            },
            stage: RefSummary {
                id: row.stage_id,
                name: row.stage_name,
            },
            subject: RefSummary {
                id: row.subject_id,
                name: row.subject_name,
            },
            max_attendees: row.max_attendees,
            is_recorded: row.is_recorded,
            recording_link: row.recording_link,
            tags: row.tags,
            status,
            attendee_count: row.attendee_count,
            joined_count: row.joined_count,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Roster entry in a meeting detail response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendeeEntry {
    pub account_id: Uuid,
    pub name: String,
    pub has_joined: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<DateTime<Utc>>,
}

impl From<AttendeeRow> for AttendeeEntry {
    fn from(row: AttendeeRow) -> Self {
        Self {
            account_id: row.account_id,
            name: row.display_name,
            has_joined: row.has_joined,
            joined_at: row.joined_at,
        }
    }
}

/// Meeting detail response with the full roster.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingDetailResponse {
    #[serde(flatten)]
    pub meeting: MeetingSummary,
    pub attendees: Vec<AttendeeEntry>,
}

impl MeetingDetailResponse {
    /// Build a detail response from a row, derived status, and roster.
    pub fn from_parts(
        row: MeetingDetailRow,
        status: MeetingStatus,
        attendees: Vec<AttendeeRow>,
    ) -> Self {
        Self {
            meeting: MeetingSummary::from_row(row, status),
            attendees: attendees.into_iter().map(AttendeeEntry::from).collect(),
        }
    }
}

/// Response for meeting create/update, surfacing dropped attendee ids.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingMutationResponse {
    #[serde(flatten)]
    pub meeting: MeetingDetailResponse,

    /// Submitted attendee ids that were dropped (unresolvable or empty).
    pub skipped_attendees: Vec<String>,
}

/// Response for a paginated meeting listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingListResponse {
    pub meetings: Vec<MeetingSummary>,
    pub pagination: common::types::PageMeta,
}

/// Response for the bounded upcoming-meetings view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingMeetingsResponse {
    pub meetings: Vec<MeetingSummary>,
}

/// Response for a successful join.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinMeetingResponse {
    pub join_link: String,
}

/// Response for adding attendees, reporting partial success explicitly.
///
/// Candidates that did not fit within the meeting capacity are listed in
/// `rejected_over_capacity` with a human-readable conflict detail; the
/// request still succeeds for the candidates that fit.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddAttendeesResponse {
    pub added_count: usize,
    pub invalid_count: usize,
    pub unknown_ids: Vec<String>,
    pub already_present_ids: Vec<Uuid>,
    pub rejected_over_capacity: Vec<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity_conflict: Option<String>,
}

/// Aggregate meeting statistics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingStatsResponse {
    pub total: i64,
    pub scheduled: i64,
    pub live: i64,
    pub completed: i64,
    pub cancelled: i64,
    pub total_attendees: i64,
    pub joined_attendees: i64,
    pub attendance_rate: f64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn at(minutes_from_base: i64) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2030-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
            + Duration::minutes(minutes_from_base)
    }

    // ========================================================================
    // Status Derivation Tests
    // ========================================================================

    #[test]
    fn test_derive_status_before_window() {
        let status = derive_status(at(0), at(60), 60, MeetingStatus::Scheduled);
        assert_eq!(status, MeetingStatus::Scheduled);
    }

    #[test]
    fn test_derive_status_inside_window() {
        // Scheduled for +60 with a 60-minute duration: observed just after
        // the start, before the end, the meeting is live.
        let status = derive_status(at(61), at(60), 60, MeetingStatus::Scheduled);
        assert_eq!(status, MeetingStatus::Live);
    }

    #[test]
    fn test_derive_status_at_exact_start() {
        let status = derive_status(at(60), at(60), 60, MeetingStatus::Scheduled);
        assert_eq!(status, MeetingStatus::Live);
    }

    #[test]
    fn test_derive_status_at_exact_end() {
        let status = derive_status(at(120), at(60), 60, MeetingStatus::Scheduled);
        assert_eq!(status, MeetingStatus::Live);
    }

    #[test]
    fn test_derive_status_after_window() {
        // One second past the end the meeting is completed.
        let status = derive_status(
            at(120) + Duration::seconds(1),
            at(60),
            60,
            MeetingStatus::Scheduled,
        );
        assert_eq!(status, MeetingStatus::Completed);
    }

    #[test]
    fn test_derive_status_skips_live_when_observed_late() {
        // Lazy derivation: a meeting never observed during its window goes
        // straight from stored scheduled to completed.
        let status = derive_status(at(500), at(60), 60, MeetingStatus::Scheduled);
        assert_eq!(status, MeetingStatus::Completed);
    }

    #[test]
    fn test_derive_status_live_never_regresses() {
        // A live meeting stays live even if the clock reads before the
        // start (reschedule or skew); transitions are monotone.
        let status = derive_status(at(0), at(60), 60, MeetingStatus::Live);
        assert_eq!(status, MeetingStatus::Live);
    }

    #[test]
    fn test_derive_status_terminal_states_are_no_ops() {
        let status = derive_status(at(61), at(60), 60, MeetingStatus::Completed);
        assert_eq!(status, MeetingStatus::Completed);

        let status = derive_status(at(61), at(60), 60, MeetingStatus::Cancelled);
        assert_eq!(status, MeetingStatus::Cancelled);
    }

    #[test]
    fn test_derive_status_live_to_completed() {
        let status = derive_status(at(121), at(60), 60, MeetingStatus::Live);
        assert_eq!(status, MeetingStatus::Completed);
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            MeetingStatus::Scheduled,
            MeetingStatus::Live,
            MeetingStatus::Completed,
            MeetingStatus::Cancelled,
        ] {
            assert_eq!(MeetingStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(MeetingStatus::parse("ended"), None);
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&MeetingStatus::Live).unwrap();
        assert_eq!(json, "\"live\"");
    }

    // ========================================================================
    // Join Link Tests
    // ========================================================================

    #[test]
    fn test_join_link_accepts_https() {
        assert!(is_valid_join_link("https://meet.example.com/room/abc123"));
        assert!(is_valid_join_link("http://meet.example.com/x"));
        assert!(is_valid_join_link("https://zoom.us/j/99999"));
    }

    #[test]
    fn test_join_link_rejects_bad_input() {
        assert!(!is_valid_join_link(""));
        assert!(!is_valid_join_link("meet.example.com/room"));
        assert!(!is_valid_join_link("ftp://meet.example.com"));
        assert!(!is_valid_join_link("https://"));
        assert!(!is_valid_join_link("https://nodots/room"));
        assert!(!is_valid_join_link("https://meet.example.com/a room"));
    }

    // ========================================================================
    // Partition Tests
    // ========================================================================

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn test_partition_classifies_candidates() {
        let known = ids(2);
        let on_roster = ids(1);
        let unknown_id = Uuid::new_v4();

        let known_set: HashSet<Uuid> = known
            .iter()
            .chain(on_roster.iter())
            .copied()
            .collect();
        let roster_set: HashSet<Uuid> = on_roster.iter().copied().collect();

        let candidates = vec![
            Some(known[0].to_string()),
            Some(known[1].to_string()),
            Some(on_roster[0].to_string()),
            Some(unknown_id.to_string()),
            Some("not-a-uuid".to_string()),
            Some("".to_string()),
            None,
        ];

        let partition = partition_attendees(&candidates, &known_set, &roster_set);

        assert_eq!(partition.valid, vec![known[0], known[1]]);
        assert_eq!(partition.already_present, vec![on_roster[0]]);
        assert_eq!(
            partition.unknown,
            vec![unknown_id.to_string(), "not-a-uuid".to_string()]
        );
        assert_eq!(partition.invalid_count, 2);
    }

    #[test]
    fn test_partition_collapses_duplicates() {
        let id = Uuid::new_v4();
        let known_set: HashSet<Uuid> = [id].into_iter().collect();

        let candidates = vec![Some(id.to_string()), Some(id.to_string())];
        let partition = partition_attendees(&candidates, &known_set, &HashSet::new());

        // Submitting an id twice yields one roster entry and consumes one
        // capacity slot.
        assert_eq!(partition.valid, vec![id]);
        assert!(partition.already_present.is_empty());
    }

    #[test]
    fn test_partition_empty_input() {
        let partition = partition_attendees(&[], &HashSet::new(), &HashSet::new());
        assert_eq!(partition, AttendeePartition::default());
    }

    // ========================================================================
    // Roster Merge Tests
    // ========================================================================

    fn attendee(id: Uuid, has_joined: bool, joined_at: Option<DateTime<Utc>>) -> AttendeeRow {
        AttendeeRow {
            account_id: id,
            display_name: "Test Account".to_string(),
            has_joined,
            joined_at,
        }
    }

    #[test]
    fn test_merge_roster_preserves_join_state() {
        let kept = Uuid::new_v4();
        let added = Uuid::new_v4();
        let removed = Uuid::new_v4();
        let joined_at = at(10);

        let existing = vec![
            attendee(kept, true, Some(joined_at)),
            attendee(removed, false, None),
        ];

        let merged = merge_roster(&[kept, added], &existing);

        assert_eq!(merged.len(), 2);
        assert_eq!(
            merged.first().copied().unwrap(),
            RosterEntry {
                account_id: kept,
                has_joined: true,
                joined_at: Some(joined_at),
            }
        );
        assert_eq!(
            merged.get(1).copied().unwrap(),
            RosterEntry {
                account_id: added,
                has_joined: false,
                joined_at: None,
            }
        );
        assert!(!merged.iter().any(|e| e.account_id == removed));
    }

    #[test]
    fn test_merge_roster_collapses_duplicates() {
        let id = Uuid::new_v4();
        let merged = merge_roster(&[id, id], &[]);
        assert_eq!(merged.len(), 1);
    }

    // ========================================================================
    // Request Validation Tests
    // ========================================================================

    fn valid_create_request(now: DateTime<Utc>) -> CreateMeetingRequest {
        CreateMeetingRequest {
            title: "Algebra Review".to_string(),
            description: "Weekly live session".to_string(),
            join_link: "https://meet.example.com/room/1".to_string(),
            scheduled_date: now + Duration::hours(1),
            duration: 60,
            instructor: Uuid::new_v4(),
            stage: Uuid::new_v4(),
            subject: Uuid::new_v4(),
            attendees: None,
            max_attendees: None,
            is_recorded: None,
            tags: None,
        }
    }

    #[test]
    fn test_create_request_validation_success() {
        let now = at(0);
        assert!(valid_create_request(now).validate(now).is_ok());
    }

    #[test]
    fn test_create_request_rejects_past_date() {
        let now = at(0);
        let mut request = valid_create_request(now);
        request.scheduled_date = now - Duration::minutes(1);
        assert_eq!(
            request.validate(now).unwrap_err(),
            "Scheduled date must be in the future"
        );

        // The boundary is strict: exactly-now is rejected too.
        request.scheduled_date = now;
        assert!(request.validate(now).is_err());
    }

    #[test]
    fn test_create_request_duration_bounds() {
        let now = at(0);
        let mut request = valid_create_request(now);

        request.duration = 14;
        assert!(request.validate(now).is_err());

        request.duration = 15;
        assert!(request.validate(now).is_ok());

        request.duration = 480;
        assert!(request.validate(now).is_ok());

        request.duration = 481;
        assert!(request.validate(now).is_err());
    }

    #[test]
    fn test_create_request_capacity_bounds() {
        let now = at(0);
        let mut request = valid_create_request(now);

        request.max_attendees = Some(0);
        assert!(request.validate(now).is_err());

        request.max_attendees = Some(1);
        assert!(request.validate(now).is_ok());

        request.max_attendees = Some(500);
        assert!(request.validate(now).is_ok());

        request.max_attendees = Some(501);
        assert!(request.validate(now).is_err());
    }

    #[test]
    fn test_create_request_rejects_blank_title() {
        let now = at(0);
        let mut request = valid_create_request(now);
        request.title = "   ".to_string();
        assert_eq!(request.validate(now).unwrap_err(), "Title is required");
    }

    #[test]
    fn test_create_request_rejects_bad_join_link() {
        let now = at(0);
        let mut request = valid_create_request(now);
        request.join_link = "meet.example.com".to_string();
        assert!(request.validate(now).is_err());
    }

    #[test]
    fn test_create_request_deserialization_camel_case() {
        let json = r#"{
            "title": "Physics Lab",
            "description": "Forces",
            "joinLink": "https://meet.example.com/r/2",
            "scheduledDate": "2030-06-01T13:00:00Z",
            "duration": 45,
            "instructor": "11111111-1111-1111-1111-111111111111",
            "stage": "22222222-2222-2222-2222-222222222222",
            "subject": "33333333-3333-3333-3333-333333333333",
            "maxAttendees": 30
        }"#;

        let request: CreateMeetingRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.title, "Physics Lab");
        assert_eq!(request.max_attendees, Some(30));
        assert_eq!(request.duration, 45);
    }

    #[test]
    fn test_create_request_rejects_unknown_fields() {
        let json = r#"{"title":"T","extra":"field"}"#;
        let result: Result<CreateMeetingRequest, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_update_request_has_changes() {
        let request = UpdateMeetingRequest::default();
        assert!(!request.has_changes());

        let request = UpdateMeetingRequest {
            title: Some("New Title".to_string()),
            ..Default::default()
        };
        assert!(request.has_changes());
    }

    #[test]
    fn test_update_request_status_only_cancelled() {
        let now = at(0);
        let mut request = UpdateMeetingRequest {
            status: Some("cancelled".to_string()),
            ..Default::default()
        };
        assert!(request.validate(now).is_ok());

        request.status = Some("live".to_string());
        assert_eq!(
            request.validate(now).unwrap_err(),
            "Status can only be set to cancelled"
        );

        request.status = Some("completed".to_string());
        assert!(request.validate(now).is_err());
    }

    #[test]
    fn test_update_request_validates_patch_fields() {
        let now = at(0);
        let request = UpdateMeetingRequest {
            scheduled_date: Some(now - Duration::hours(1)),
            ..Default::default()
        };
        assert!(request.validate(now).is_err());

        let request = UpdateMeetingRequest {
            duration: Some(481),
            ..Default::default()
        };
        assert!(request.validate(now).is_err());
    }

    // ========================================================================
    // Response Serialization Tests
    // ========================================================================

    fn sample_row() -> MeetingDetailRow {
        MeetingDetailRow {
            meeting_id: Uuid::new_v4(),
            title: "Chemistry Review".to_string(),
            description: "Organic chemistry".to_string(),
            join_link: "https://meet.example.com/r/9".to_string(),
            scheduled_start: at(60),
            duration_minutes: 90,
            instructor_id: Uuid::new_v4(),
            stage_id: Uuid::new_v4(),
            subject_id: Uuid::new_v4(),
            max_attendees: 100,
            is_recorded: false,
            recording_link: None,
            tags: vec!["chemistry".to_string()],
            status: "scheduled".to_string(),
            created_by: Uuid::new_v4(),
            created_at: at(0),
            updated_at: at(0),
            instructor_name: "Dr. Reed".to_string(),
            stage_name: "Grade 11".to_string(),
            subject_name: "Chemistry".to_string(),
            attendee_count: 12,
            joined_count: 3,
        }
    }

    #[test]
    fn test_summary_serializes_camel_case() {
        let summary = MeetingSummary::from_row(sample_row(), MeetingStatus::Scheduled);
        let json = serde_json::to_string(&summary).unwrap();

        assert!(json.contains("\"joinLink\""));
        assert!(json.contains("\"scheduledDate\""));
        assert!(json.contains("\"maxAttendees\":100"));
        assert!(json.contains("\"attendeeCount\":12"));
        assert!(json.contains("\"status\":\"scheduled\""));
        assert!(json.contains("\"name\":\"Dr. Reed\""));
        // recording_link omitted when None
        assert!(!json.contains("recordingLink"));
    }

    #[test]
    fn test_detail_response_flattens_summary() {
        let row = sample_row();
        let attendee_id = Uuid::new_v4();
        let detail = MeetingDetailResponse::from_parts(
            row,
            MeetingStatus::Live,
            vec![attendee(attendee_id, true, Some(at(61)))],
        );

        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["status"], "live");
        assert_eq!(json["attendees"][0]["accountId"], attendee_id.to_string());
        assert_eq!(json["attendees"][0]["hasJoined"], true);
    }

    #[test]
    fn test_stored_status_defaults_unknown_to_scheduled() {
        let mut row = sample_row();
        row.status = "unexpected".to_string();
        assert_eq!(row.stored_status(), MeetingStatus::Scheduled);
    }
}
