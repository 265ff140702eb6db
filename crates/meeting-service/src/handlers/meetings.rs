//! Meeting handlers.
//!
//! Implements the live-meeting endpoints:
//!
//! - `POST /live-meetings` - Create meeting (admin)
//! - `GET /live-meetings/admin/all` - Admin listing with filters
//! - `GET /live-meetings/admin/stats` - Aggregate statistics (admin)
//! - `GET /live-meetings/my-meetings` - Meetings the caller is rostered on
//! - `GET /live-meetings/upcoming` - Bounded stage-filtered upcoming view
//! - `GET /live-meetings/{id}` - Fetch one (roster/instructor/admin only)
//! - `PUT /live-meetings/{id}` - Update (admin, rejected when completed)
//! - `DELETE /live-meetings/{id}` - Hard delete (admin)
//! - `POST /live-meetings/{id}/join` - Mark joined, returns the join link
//! - `POST /live-meetings/{id}/attendees` - Add attendees (admin)
//! - `DELETE /live-meetings/{id}/attendees/{attendeeId}` - Remove (admin)
//!
//! Status is derived from wall-clock time at the start of every operation
//! and persisted through a guarded UPDATE, so terminal states stay
//! terminal without a background scheduler.

use crate::errors::LmError;
use crate::models::{
    derive_status, merge_roster, partition_attendees, AddAttendeesRequest, AddAttendeesResponse,
    AdminListQuery, AttendeePartition, CreateMeetingRequest, JoinMeetingResponse,
    MeetingDetailResponse, MeetingDetailRow, MeetingListResponse, MeetingMutationResponse,
    MeetingStatsResponse, MeetingStatus, MeetingSummary, MyMeetingsQuery, NewMeeting,
    UpcomingMeetingsResponse, UpdateMeetingRequest, DEFAULT_MAX_ATTENDEES, UPCOMING_RESULT_LIMIT,
};
use crate::observability::metrics;
use crate::repositories::meetings::AdminListFilter;
use crate::repositories::{directory, MeetingsRepository};
use crate::routes::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use common::jwt::UserClaims;
use common::types::{PageMeta, PageParams};
use sqlx::PgPool;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

// ============================================================================
// Handler: POST /live-meetings
// ============================================================================

/// Handler for POST /live-meetings
///
/// Create a new meeting. The submitted attendee list is partitioned
/// against the account directory; unresolvable ids are dropped and
/// surfaced in the response rather than failing the request.
///
/// # Response
///
/// - 201 Created: Meeting created successfully
/// - 400 Bad Request: Invalid request body or field validation failure
/// - 403 Forbidden: Caller is not an admin
/// - 404 Not Found: Unknown instructor, stage, or subject reference
/// - 409 Conflict: Attendee list exceeds the meeting capacity
#[instrument(
    skip_all,
    name = "lms.meeting.create",
    fields(method = "POST", endpoint = "/live-meetings")
)]
pub async fn create_meeting(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<UserClaims>,
    body: axum::body::Bytes,
) -> Result<(StatusCode, Json<MeetingMutationResponse>), LmError> {
    ensure_admin(&claims)?;

    // Deserialize request body manually to return 400 (not Axum's default 422)
    let request: CreateMeetingRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::debug!(target: "lms.handlers.meetings", error = %e, "Invalid request body");
        metrics::record_meeting_operation("create", "bad_request");
        LmError::Validation("Invalid request body".to_string())
    })?;

    let now = Utc::now();
    request.validate(now).map_err(|e| {
        metrics::record_meeting_operation("create", "bad_request");
        LmError::Validation(e.to_string())
    })?;

    // Validate directory references; failures name the offending field.
    validate_references(
        &state.pool,
        Some(request.instructor),
        Some(request.stage),
        Some(request.subject),
    )
    .await?;

    let candidates = request.attendees.clone().unwrap_or_default();
    let partition = partition_candidates(&state.pool, &candidates, &HashSet::new()).await?;

    let max_attendees = request.max_attendees.unwrap_or(DEFAULT_MAX_ATTENDEES);
    if partition.valid.len() > max_attendees as usize {
        metrics::record_meeting_operation("create", "conflict");
        return Err(LmError::Conflict(
            "Attendee list exceeds the meeting capacity".to_string(),
        ));
    }

    let new = NewMeeting {
        title: request.title.trim().to_string(),
        description: request.description.trim().to_string(),
        join_link: request.join_link.clone(),
        scheduled_start: request.scheduled_date,
        duration_minutes: request.duration,
        instructor_id: request.instructor,
        stage_id: request.stage,
        subject_id: request.subject,
        max_attendees,
        is_recorded: request.is_recorded.unwrap_or(false),
        tags: request.tags.clone().unwrap_or_default(),
        attendees: partition.valid.clone(),
        created_by: account_id(&claims)?,
    };

    let meeting_id = MeetingsRepository::create_meeting(&state.pool, &new).await?;

    metrics::record_meeting_operation("create", "success");
    info!(
        target: "lms.handlers.meetings",
        meeting_id = %meeting_id,
        instructor_id = %request.instructor,
        attendees = partition.valid.len(),
        skipped = partition.unknown.len(),
        "Meeting created"
    );

    let detail = build_detail(&state.pool, meeting_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(MeetingMutationResponse {
            meeting: detail,
            skipped_attendees: partition.unknown,
        }),
    ))
}

// ============================================================================
// Handler: GET /live-meetings/admin/all
// ============================================================================

/// Handler for GET /live-meetings/admin/all
///
/// Paginated admin listing, newest first, filterable by derived status,
/// stage, subject, instructor, and a scheduled-date range.
#[instrument(
    skip_all,
    name = "lms.meeting.list_admin",
    fields(method = "GET", endpoint = "/live-meetings/admin/all")
)]
pub async fn list_meetings_admin(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<UserClaims>,
    Query(query): Query<AdminListQuery>,
) -> Result<Json<MeetingListResponse>, LmError> {
    ensure_admin(&claims)?;

    let filter = AdminListFilter {
        status: parse_status_filter(query.status.as_deref())?,
        stage: query.stage,
        subject: query.subject,
        instructor: query.instructor,
        start_date: query.start_date,
        end_date: query.end_date,
    };

    let params = PageParams {
        page: query.page,
        limit: query.limit,
    };
    let (page, limit) = params.resolve();

    let (rows, total) =
        MeetingsRepository::list_admin(&state.pool, &filter, limit, params.offset()).await?;

    Ok(Json(MeetingListResponse {
        meetings: summarize(rows),
        pagination: PageMeta::new(page, limit, total),
    }))
}

// ============================================================================
// Handler: GET /live-meetings/my-meetings
// ============================================================================

/// Handler for GET /live-meetings/my-meetings
///
/// Meetings the caller is rostered on or instructs, soonest first.
/// Status filter defaults to "scheduled".
#[instrument(
    skip_all,
    name = "lms.meeting.my_meetings",
    fields(method = "GET", endpoint = "/live-meetings/my-meetings")
)]
pub async fn my_meetings(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<UserClaims>,
    Query(query): Query<MyMeetingsQuery>,
) -> Result<Json<MeetingListResponse>, LmError> {
    let account = account_id(&claims)?;

    let status = query.status.as_deref().unwrap_or("scheduled");
    let status = parse_status_filter(Some(status))?;

    let params = PageParams {
        page: query.page,
        limit: query.limit,
    };
    let (page, limit) = params.resolve();

    let (rows, total) =
        MeetingsRepository::list_for_account(&state.pool, account, status, limit, params.offset())
            .await?;

    Ok(Json(MeetingListResponse {
        meetings: summarize(rows),
        pagination: PageMeta::new(page, limit, total),
    }))
}

// ============================================================================
// Handler: GET /live-meetings/upcoming
// ============================================================================

/// Handler for GET /live-meetings/upcoming
///
/// Bounded upcoming view. Restricted to the caller's stage when the
/// account has one; an account without a stage sees upcoming meetings
/// system-wide (documented fallback, not a bug).
#[instrument(
    skip_all,
    name = "lms.meeting.upcoming",
    fields(method = "GET", endpoint = "/live-meetings/upcoming")
)]
pub async fn upcoming_meetings(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<UserClaims>,
) -> Result<Json<UpcomingMeetingsResponse>, LmError> {
    let account = account_id(&claims)?;

    let stage = directory::account_stage(&state.pool, account)
        .await?
        .ok_or_else(|| LmError::NotFound("Account not found".to_string()))?;

    let rows = MeetingsRepository::list_upcoming(&state.pool, stage, UPCOMING_RESULT_LIMIT).await?;

    Ok(Json(UpcomingMeetingsResponse {
        meetings: summarize(rows),
    }))
}

// ============================================================================
// Handler: GET /live-meetings/{id}
// ============================================================================

/// Handler for GET /live-meetings/{id}
///
/// Fetch one meeting with its roster.
///
/// # Authorization
///
/// Admin roles bypass the roster check; all other accounts must be the
/// meeting's instructor or present in the attendee roster.
#[instrument(
    skip_all,
    name = "lms.meeting.get",
    fields(method = "GET", endpoint = "/live-meetings/{id}")
)]
pub async fn get_meeting(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<UserClaims>,
    Path(meeting_id): Path<Uuid>,
) -> Result<Json<MeetingDetailResponse>, LmError> {
    let account = account_id(&claims)?;

    let (row, status) = load_meeting(&state.pool, meeting_id).await?;
    let attendees = MeetingsRepository::fetch_attendees(&state.pool, meeting_id).await?;

    let is_instructor = row.instructor_id == account;
    let on_roster = attendees.iter().any(|a| a.account_id == account);

    if !claims.is_admin() && !is_instructor && !on_roster {
        warn!(
            target: "lms.handlers.meetings",
            meeting_id = %meeting_id,
            "Account denied access to meeting"
        );
        return Err(LmError::Forbidden(
            "You are not authorized to view this meeting".to_string(),
        ));
    }

    Ok(Json(MeetingDetailResponse::from_parts(
        row, status, attendees,
    )))
}

// ============================================================================
// Handler: PUT /live-meetings/{id}
// ============================================================================

/// Handler for PUT /live-meetings/{id}
///
/// Partial update. Rejected once the meeting is completed. A provided
/// `attendees` list becomes the target roster: existing entries keep
/// their join state, new ids join as not-joined, absent ids are removed.
/// `status` accepts only "cancelled" (the explicit terminal override).
///
/// # Response
///
/// - 200 OK: Updated meeting returned
/// - 400 Bad Request: Invalid patch
/// - 403 Forbidden: Caller is not an admin
/// - 404 Not Found: Unknown meeting or directory reference
/// - 409 Conflict: Meeting completed, or capacity below roster size
#[instrument(
    skip_all,
    name = "lms.meeting.update",
    fields(method = "PUT", endpoint = "/live-meetings/{id}")
)]
pub async fn update_meeting(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<UserClaims>,
    Path(meeting_id): Path<Uuid>,
    Json(request): Json<UpdateMeetingRequest>,
) -> Result<Json<MeetingMutationResponse>, LmError> {
    ensure_admin(&claims)?;

    if !request.has_changes() {
        return Err(LmError::Validation("No changes provided".to_string()));
    }

    let now = Utc::now();
    request
        .validate(now)
        .map_err(|e| LmError::Validation(e.to_string()))?;

    let (row, status) = load_meeting(&state.pool, meeting_id).await?;
    if status == MeetingStatus::Completed {
        metrics::record_meeting_operation("update", "conflict");
        return Err(LmError::Conflict(
            "Cannot edit a completed meeting".to_string(),
        ));
    }

    validate_references(&state.pool, request.instructor, request.stage, request.subject).await?;

    let max_attendees = request.max_attendees.unwrap_or(row.max_attendees);

    // Merge the target roster, preserving join state for retained entries.
    let mut skipped = Vec::new();
    let roster_ids = match &request.attendees {
        Some(candidates) => {
            let existing = MeetingsRepository::fetch_attendees(&state.pool, meeting_id).await?;
            let partition = partition_candidates(&state.pool, candidates, &HashSet::new()).await?;
            skipped = partition.unknown;

            let merged = merge_roster(&partition.valid, &existing);
            if merged.len() > max_attendees as usize {
                metrics::record_meeting_operation("update", "conflict");
                return Err(LmError::Conflict(
                    "Attendee list exceeds the meeting capacity".to_string(),
                ));
            }

            Some(merged.iter().map(|e| e.account_id).collect::<Vec<_>>())
        }
        None => {
            // Shrinking capacity below the current roster would silently
            // violate the roster-size invariant.
            if i64::from(max_attendees) < row.attendee_count {
                metrics::record_meeting_operation("update", "conflict");
                return Err(LmError::Conflict(
                    "Maximum attendees cannot be lower than the current roster size".to_string(),
                ));
            }
            None
        }
    };

    let updated =
        MeetingsRepository::update_meeting(&state.pool, meeting_id, &request, roster_ids.as_deref())
            .await?;
    if !updated {
        return Err(LmError::NotFound("Meeting not found".to_string()));
    }

    metrics::record_meeting_operation("update", "success");
    info!(
        target: "lms.handlers.meetings",
        meeting_id = %meeting_id,
        cancelled = request.status.is_some(),
        "Meeting updated"
    );

    let detail = build_detail(&state.pool, meeting_id).await?;
    Ok(Json(MeetingMutationResponse {
        meeting: detail,
        skipped_attendees: skipped,
    }))
}

// ============================================================================
// Handler: DELETE /live-meetings/{id}
// ============================================================================

/// Handler for DELETE /live-meetings/{id}
///
/// Hard delete; there is no soft-delete or archival.
#[instrument(
    skip_all,
    name = "lms.meeting.delete",
    fields(method = "DELETE", endpoint = "/live-meetings/{id}")
)]
pub async fn delete_meeting(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<UserClaims>,
    Path(meeting_id): Path<Uuid>,
) -> Result<StatusCode, LmError> {
    ensure_admin(&claims)?;

    if !MeetingsRepository::delete_meeting(&state.pool, meeting_id).await? {
        return Err(LmError::NotFound("Meeting not found".to_string()));
    }

    metrics::record_meeting_operation("delete", "success");
    info!(
        target: "lms.handlers.meetings",
        meeting_id = %meeting_id,
        "Meeting deleted"
    );

    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Handler: POST /live-meetings/{id}/join
// ============================================================================

/// Handler for POST /live-meetings/{id}/join
///
/// Mark the caller's roster entry as joined and return the external join
/// link. Join never adds attendees: accounts not already on the roster
/// are rejected regardless of meeting status.
///
/// # Response
///
/// - 200 OK: Join link returned
/// - 403 Forbidden: Caller is not on the roster
/// - 404 Not Found: Unknown meeting
/// - 409 Conflict: Meeting is not live
#[instrument(
    skip_all,
    name = "lms.meeting.join",
    fields(method = "POST", endpoint = "/live-meetings/{id}/join")
)]
pub async fn join_meeting(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<UserClaims>,
    Path(meeting_id): Path<Uuid>,
) -> Result<Json<JoinMeetingResponse>, LmError> {
    let account = account_id(&claims)?;

    let (row, status) = load_meeting(&state.pool, meeting_id).await?;

    if status != MeetingStatus::Live {
        metrics::record_meeting_operation("join", "conflict");
        return Err(LmError::Conflict("Meeting is not live".to_string()));
    }

    if !MeetingsRepository::mark_joined(&state.pool, meeting_id, account).await? {
        metrics::record_meeting_operation("join", "forbidden");
        warn!(
            target: "lms.handlers.meetings",
            meeting_id = %meeting_id,
            "Join rejected: account not on the roster"
        );
        return Err(LmError::Forbidden(
            "You are not on the attendee list for this meeting".to_string(),
        ));
    }

    metrics::record_meeting_operation("join", "success");
    info!(
        target: "lms.handlers.meetings",
        meeting_id = %meeting_id,
        "Attendee joined meeting"
    );

    Ok(Json(JoinMeetingResponse {
        join_link: row.join_link,
    }))
}

// ============================================================================
// Handler: POST /live-meetings/{id}/attendees
// ============================================================================

/// Handler for POST /live-meetings/{id}/attendees
///
/// Add attendees. Null, empty, unknown, and duplicate candidates are
/// skipped and reported. Candidates beyond the remaining capacity are
/// rejected and reported while the rest are added; when nothing fits the
/// whole request fails with 409 and the roster is unchanged.
#[instrument(
    skip_all,
    name = "lms.meeting.add_attendees",
    fields(method = "POST", endpoint = "/live-meetings/{id}/attendees")
)]
pub async fn add_attendees(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<UserClaims>,
    Path(meeting_id): Path<Uuid>,
    Json(request): Json<AddAttendeesRequest>,
) -> Result<Json<AddAttendeesResponse>, LmError> {
    ensure_admin(&claims)?;

    if request.attendees.is_empty() {
        return Err(LmError::Validation("Attendee list is required".to_string()));
    }

    let (row, status) = load_meeting(&state.pool, meeting_id).await?;
    if status == MeetingStatus::Completed {
        metrics::record_meeting_operation("add_attendees", "conflict");
        return Err(LmError::Conflict(
            "Cannot edit a completed meeting".to_string(),
        ));
    }

    let existing = MeetingsRepository::fetch_attendees(&state.pool, meeting_id).await?;
    let on_roster: HashSet<Uuid> = existing.iter().map(|a| a.account_id).collect();
    let partition = partition_candidates(&state.pool, &request.attendees, &on_roster).await?;

    let remaining = i64::from(row.max_attendees) - row.attendee_count;
    if !partition.valid.is_empty() && remaining <= 0 {
        metrics::record_meeting_operation("add_attendees", "conflict");
        return Err(LmError::Conflict(format!(
            "Meeting is at capacity ({}/{})",
            row.attendee_count, row.max_attendees
        )));
    }

    // Fill to capacity; candidates beyond it are reported, not hidden.
    let fit = partition.valid.len().min(remaining.max(0) as usize);
    let to_add = partition.valid.get(..fit).unwrap_or_default();
    let rejected_over_capacity: Vec<Uuid> =
        partition.valid.get(fit..).unwrap_or_default().to_vec();

    let mut added = 0;
    if !to_add.is_empty() {
        added = MeetingsRepository::add_attendees_gated(&state.pool, meeting_id, to_add).await?;
        if added == 0 {
            // The atomic gate rejected the batch: a concurrent add filled
            // the roster between our read and the insert.
            metrics::record_meeting_operation("add_attendees", "conflict");
            return Err(LmError::Conflict(format!(
                "Meeting is at capacity ({}/{})",
                row.max_attendees, row.max_attendees
            )));
        }
    }

    let capacity_conflict = (!rejected_over_capacity.is_empty()).then(|| {
        format!(
            "Meeting capacity reached ({}): {} attendee(s) not added",
            row.max_attendees,
            rejected_over_capacity.len()
        )
    });

    metrics::record_meeting_operation("add_attendees", "success");
    info!(
        target: "lms.handlers.meetings",
        meeting_id = %meeting_id,
        added,
        rejected = rejected_over_capacity.len(),
        unknown = partition.unknown.len(),
        "Attendees added"
    );

    Ok(Json(AddAttendeesResponse {
        added_count: added as usize,
        invalid_count: partition.invalid_count,
        unknown_ids: partition.unknown,
        already_present_ids: partition.already_present,
        rejected_over_capacity,
        capacity_conflict,
    }))
}

// ============================================================================
// Handler: DELETE /live-meetings/{id}/attendees/{attendeeId}
// ============================================================================

/// Handler for DELETE /live-meetings/{id}/attendees/{attendeeId}
///
/// Remove a roster entry. 404 if no matching entry existed.
#[instrument(
    skip_all,
    name = "lms.meeting.remove_attendee",
    fields(method = "DELETE", endpoint = "/live-meetings/{id}/attendees/{attendeeId}")
)]
pub async fn remove_attendee(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<UserClaims>,
    Path((meeting_id, attendee_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, LmError> {
    ensure_admin(&claims)?;

    // Surface unknown meetings distinctly from unknown roster entries.
    load_meeting(&state.pool, meeting_id).await?;

    if !MeetingsRepository::remove_attendee(&state.pool, meeting_id, attendee_id).await? {
        return Err(LmError::NotFound(
            "Attendee not found on this meeting".to_string(),
        ));
    }

    metrics::record_meeting_operation("remove_attendee", "success");
    info!(
        target: "lms.handlers.meetings",
        meeting_id = %meeting_id,
        attendee_id = %attendee_id,
        "Attendee removed"
    );

    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Handler: GET /live-meetings/admin/stats
// ============================================================================

/// Handler for GET /live-meetings/admin/stats
///
/// Aggregate counts by derived status plus attendance totals. The
/// attendance rate guards against division by zero.
#[instrument(
    skip_all,
    name = "lms.meeting.stats",
    fields(method = "GET", endpoint = "/live-meetings/admin/stats")
)]
pub async fn meeting_stats(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<UserClaims>,
) -> Result<Json<MeetingStatsResponse>, LmError> {
    ensure_admin(&claims)?;

    let counts = MeetingsRepository::stats(&state.pool).await?;
    let (total_attendees, joined_attendees) =
        MeetingsRepository::attendance_totals(&state.pool).await?;

    let attendance_rate = if total_attendees == 0 {
        0.0
    } else {
        joined_attendees as f64 / total_attendees as f64
    };

    Ok(Json(MeetingStatsResponse {
        total: counts.total,
        scheduled: counts.scheduled,
        live: counts.live,
        completed: counts.completed,
        cancelled: counts.cancelled,
        total_attendees,
        joined_attendees,
        attendance_rate,
    }))
}

// ============================================================================
// Helpers
// ============================================================================

/// Require an admin role on the authenticated claims.
fn ensure_admin(claims: &UserClaims) -> Result<(), LmError> {
    if claims.is_admin() {
        return Ok(());
    }

    warn!(
        target: "lms.handlers.meetings",
        role = %claims.role,
        "Non-admin attempted an admin meeting operation"
    );
    Err(LmError::Forbidden(
        "Insufficient permissions for this operation".to_string(),
    ))
}

/// Parse the account id out of the authenticated claims.
fn account_id(claims: &UserClaims) -> Result<Uuid, LmError> {
    claims
        .account_id()
        .map_err(|e| LmError::InvalidToken(e.to_string()))
}

/// Parse an optional status filter string.
fn parse_status_filter(status: Option<&str>) -> Result<Option<MeetingStatus>, LmError> {
    match status {
        None => Ok(None),
        Some(s) => MeetingStatus::parse(s).map(Some).ok_or_else(|| {
            LmError::Validation(format!(
                "Unknown status '{}': expected scheduled, live, completed, or cancelled",
                s
            ))
        }),
    }
}

/// Load a meeting, derive its current status, and persist the transition.
///
/// The persist is guarded in SQL, so concurrent derivations and terminal
/// states are safe to re-apply.
async fn load_meeting(
    pool: &PgPool,
    meeting_id: Uuid,
) -> Result<(MeetingDetailRow, MeetingStatus), LmError> {
    let row = MeetingsRepository::fetch_detail(pool, meeting_id)
        .await?
        .ok_or_else(|| LmError::NotFound("Meeting not found".to_string()))?;

    let stored = row.stored_status();
    let derived = row.derived_status(Utc::now());

    if derived != stored {
        MeetingsRepository::persist_status(pool, meeting_id, derived).await?;
    }

    Ok((row, derived))
}

/// Partition submitted attendee candidates against the directory.
async fn partition_candidates(
    pool: &PgPool,
    candidates: &[Option<String>],
    on_roster: &HashSet<Uuid>,
) -> Result<AttendeePartition, LmError> {
    let parseable: Vec<Uuid> = candidates
        .iter()
        .filter_map(|c| c.as_deref())
        .filter_map(|c| Uuid::parse_str(c.trim()).ok())
        .collect();

    let known: HashSet<Uuid> = directory::filter_existing_accounts(pool, &parseable)
        .await?
        .into_iter()
        .collect();

    Ok(partition_attendees(candidates, &known, on_roster))
}

/// Validate optionally-patched directory references.
///
/// Each failure is a NotFound naming the offending field, never a silent
/// coercion.
async fn validate_references(
    pool: &PgPool,
    instructor: Option<Uuid>,
    stage: Option<Uuid>,
    subject: Option<Uuid>,
) -> Result<(), LmError> {
    if let Some(instructor) = instructor {
        if !directory::instructor_exists(pool, instructor).await? {
            return Err(LmError::NotFound("Instructor not found".to_string()));
        }
    }

    if let Some(stage) = stage {
        if !directory::stage_exists(pool, stage).await? {
            return Err(LmError::NotFound("Stage not found".to_string()));
        }
    }

    if let Some(subject) = subject {
        if !directory::subject_exists(pool, subject).await? {
            return Err(LmError::NotFound("Subject not found".to_string()));
        }
    }

    Ok(())
}

/// Map rows to summaries with freshly derived statuses.
fn summarize(rows: Vec<MeetingDetailRow>) -> Vec<MeetingSummary> {
    let now = Utc::now();
    rows.into_iter()
        .map(|row| {
            let status = derive_status(
                now,
                row.scheduled_start,
                row.duration_minutes,
                row.stored_status(),
            );
            MeetingSummary::from_row(row, status)
        })
        .collect()
}

/// Fetch a meeting's detail response after a mutation.
async fn build_detail(pool: &PgPool, meeting_id: Uuid) -> Result<MeetingDetailResponse, LmError> {
    let (row, status) = load_meeting(pool, meeting_id).await?;
    let attendees = MeetingsRepository::fetch_attendees(pool, meeting_id).await?;
    Ok(MeetingDetailResponse::from_parts(row, status, attendees))
}
