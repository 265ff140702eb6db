//! Meetings repository for database operations.
//!
//! All meeting queries go through a shared SELECT fragment that joins
//! directory names and roster counts, so single fetches and list pages
//! map identically. Roster capacity is enforced by a single atomic CTE
//! insert to avoid TOCTOU races between the count and the write.

use crate::errors::LmError;
use crate::models::{AttendeeRow, MeetingDetailRow, MeetingStatus, NewMeeting, UpdateMeetingRequest};
use crate::observability::metrics;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::time::Instant;
use tracing::instrument;
use uuid::Uuid;

/// Shared SELECT fragment for meeting rows.
///
/// Joined directory names and roster counts are part of every meeting
/// read; queries append WHERE/ORDER BY/LIMIT clauses to this fragment.
const MEETING_DETAIL_SELECT: &str = r#"
    SELECT
        m.meeting_id,
        m.title,
        m.description,
        m.join_link,
        m.scheduled_start,
        m.duration_minutes,
        m.instructor_id,
        m.stage_id,
        m.subject_id,
        m.max_attendees,
        m.is_recorded,
        m.recording_link,
        m.tags,
        m.status,
        m.created_by,
        m.created_at,
        m.updated_at,
        a.display_name AS instructor_name,
        st.name AS stage_name,
        su.name AS subject_name,
        (SELECT COUNT(*) FROM meeting_attendees ma
          WHERE ma.meeting_id = m.meeting_id) AS attendee_count,
        (SELECT COUNT(*) FROM meeting_attendees ma
          WHERE ma.meeting_id = m.meeting_id AND ma.has_joined) AS joined_count
    FROM meetings m
    JOIN accounts a ON a.account_id = m.instructor_id
    JOIN stages st ON st.stage_id = m.stage_id
    JOIN subjects su ON su.subject_id = m.subject_id
"#;

/// SQL expression for the time-derived status of `meetings m`.
///
/// Mirrors `models::derive_status` so status filters in list queries see
/// derived state, not the possibly-stale stored column. Rust derivation
/// remains the source of truth for responses and persisted transitions.
const DERIVED_STATUS_SQL: &str = r#"(CASE
    WHEN m.status IN ('cancelled', 'completed') THEN m.status
    WHEN NOW() > m.scheduled_start + make_interval(mins => m.duration_minutes) THEN 'completed'
    WHEN NOW() >= m.scheduled_start THEN 'live'
    ELSE 'scheduled'
END)"#;

/// Filters for the admin meeting listing.
#[derive(Debug, Clone, Default)]
pub struct AdminListFilter {
    pub status: Option<MeetingStatus>,
    pub stage: Option<Uuid>,
    pub subject: Option<Uuid>,
    pub instructor: Option<Uuid>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// Meetings repository for database operations.
pub struct MeetingsRepository;

impl MeetingsRepository {
    /// Create a meeting and its initial roster in one transaction.
    ///
    /// The attendee list must already be partitioned down to resolvable,
    /// deduplicated account ids within capacity.
    #[instrument(skip_all, name = "lms.repo.create_meeting")]
    pub async fn create_meeting(pool: &PgPool, new: &NewMeeting) -> Result<Uuid, LmError> {
        let start = Instant::now();

        let result: Result<Uuid, LmError> = async {
            let mut tx = pool.begin().await?;

            let (meeting_id,): (Uuid,) = sqlx::query_as(
                r#"
                INSERT INTO meetings (
                    title, description, join_link, scheduled_start,
                    duration_minutes, instructor_id, stage_id, subject_id,
                    max_attendees, is_recorded, tags, status, created_by
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'scheduled', $12)
                RETURNING meeting_id
                "#,
            )
            .bind(&new.title)
            .bind(&new.description)
            .bind(&new.join_link)
            .bind(new.scheduled_start)
            .bind(new.duration_minutes)
            .bind(new.instructor_id)
            .bind(new.stage_id)
            .bind(new.subject_id)
            .bind(new.max_attendees)
            .bind(new.is_recorded)
            .bind(&new.tags)
            .bind(new.created_by)
            .fetch_one(&mut *tx)
            .await?;

            if !new.attendees.is_empty() {
                sqlx::query(
                    r#"
                    INSERT INTO meeting_attendees (meeting_id, account_id, has_joined, added_at)
                    SELECT $1, candidate, FALSE, NOW()
                    FROM UNNEST($2::uuid[]) AS candidate
                    ON CONFLICT (meeting_id, account_id) DO NOTHING
                    "#,
                )
                .bind(meeting_id)
                .bind(&new.attendees)
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await?;
            Ok(meeting_id)
        }
        .await;

        let status = if result.is_ok() { "success" } else { "error" };
        metrics::record_db_query("create_meeting", status, start.elapsed());
        result
    }

    /// Fetch a meeting with directory names and roster counts.
    pub async fn fetch_detail(
        pool: &PgPool,
        meeting_id: Uuid,
    ) -> Result<Option<MeetingDetailRow>, LmError> {
        let query = format!("{} WHERE m.meeting_id = $1", MEETING_DETAIL_SELECT);

        let row = sqlx::query_as::<_, MeetingDetailRow>(&query)
            .bind(meeting_id)
            .fetch_optional(pool)
            .await?;

        Ok(row)
    }

    /// Fetch the full roster for a meeting in insertion order.
    pub async fn fetch_attendees(
        pool: &PgPool,
        meeting_id: Uuid,
    ) -> Result<Vec<AttendeeRow>, LmError> {
        let rows = sqlx::query_as::<_, AttendeeRow>(
            r#"
            SELECT r.account_id, a.display_name, r.has_joined, r.joined_at
            FROM meeting_attendees r
            JOIN accounts a ON a.account_id = r.account_id
            WHERE r.meeting_id = $1
            ORDER BY r.added_at ASC
            "#,
        )
        .bind(meeting_id)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    /// Persist a time-derived status transition.
    ///
    /// Guarded so terminal statuses are never overwritten; re-persisting
    /// an already-completed or cancelled meeting is a no-op.
    pub async fn persist_status(
        pool: &PgPool,
        meeting_id: Uuid,
        status: MeetingStatus,
    ) -> Result<(), LmError> {
        sqlx::query(
            r#"
            UPDATE meetings
            SET status = $2, updated_at = NOW()
            WHERE meeting_id = $1 AND status IN ('scheduled', 'live')
            "#,
        )
        .bind(meeting_id)
        .bind(status.as_str())
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Admin listing with derived-status filtering, newest first.
    ///
    /// Returns the page of rows plus the total matching count.
    #[instrument(skip_all, name = "lms.repo.list_admin")]
    pub async fn list_admin(
        pool: &PgPool,
        filter: &AdminListFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<MeetingDetailRow>, i64), LmError> {
        let where_clause = format!(
            r#"
            WHERE ($1::text IS NULL OR {DERIVED_STATUS_SQL} = $1)
              AND ($2::uuid IS NULL OR m.stage_id = $2)
              AND ($3::uuid IS NULL OR m.subject_id = $3)
              AND ($4::uuid IS NULL OR m.instructor_id = $4)
              AND ($5::timestamptz IS NULL OR m.scheduled_start >= $5)
              AND ($6::timestamptz IS NULL OR m.scheduled_start <= $6)
            "#
        );

        let status = filter.status.map(|s| s.as_str());

        let list_query = format!(
            "{MEETING_DETAIL_SELECT} {where_clause} ORDER BY m.created_at DESC LIMIT $7 OFFSET $8"
        );
        let rows = sqlx::query_as::<_, MeetingDetailRow>(&list_query)
            .bind(status)
            .bind(filter.stage)
            .bind(filter.subject)
            .bind(filter.instructor)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?;

        let count_query = format!("SELECT COUNT(*) FROM meetings m {where_clause}");
        let total: i64 = sqlx::query_scalar(&count_query)
            .bind(status)
            .bind(filter.stage)
            .bind(filter.subject)
            .bind(filter.instructor)
            .bind(filter.start_date)
            .bind(filter.end_date)
            .fetch_one(pool)
            .await?;

        Ok((rows, total))
    }

    /// Meetings an account is rostered on (or instructs), soonest first.
    #[instrument(skip_all, name = "lms.repo.list_for_account")]
    pub async fn list_for_account(
        pool: &PgPool,
        account_id: Uuid,
        status: Option<MeetingStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<MeetingDetailRow>, i64), LmError> {
        let where_clause = format!(
            r#"
            WHERE (m.instructor_id = $1 OR EXISTS (
                    SELECT 1 FROM meeting_attendees r
                    WHERE r.meeting_id = m.meeting_id AND r.account_id = $1))
              AND ($2::text IS NULL OR {DERIVED_STATUS_SQL} = $2)
            "#
        );

        let status = status.map(|s| s.as_str());

        let list_query = format!(
            "{MEETING_DETAIL_SELECT} {where_clause} ORDER BY m.scheduled_start ASC LIMIT $3 OFFSET $4"
        );
        let rows = sqlx::query_as::<_, MeetingDetailRow>(&list_query)
            .bind(account_id)
            .bind(status)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?;

        let count_query = format!("SELECT COUNT(*) FROM meetings m {where_clause}");
        let total: i64 = sqlx::query_scalar(&count_query)
            .bind(account_id)
            .bind(status)
            .fetch_one(pool)
            .await?;

        Ok((rows, total))
    }

    /// Upcoming scheduled meetings, optionally restricted to a stage.
    ///
    /// An account without a stage sees upcoming meetings system-wide;
    /// the caller passes `None` in that case.
    pub async fn list_upcoming(
        pool: &PgPool,
        stage: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<MeetingDetailRow>, LmError> {
        let query = format!(
            r#"
            {MEETING_DETAIL_SELECT}
            WHERE m.status = 'scheduled'
              AND m.scheduled_start >= NOW()
              AND ($1::uuid IS NULL OR m.stage_id = $1)
            ORDER BY m.scheduled_start ASC
            LIMIT $2
            "#
        );

        let rows = sqlx::query_as::<_, MeetingDetailRow>(&query)
            .bind(stage)
            .bind(limit)
            .fetch_all(pool)
            .await?;

        Ok(rows)
    }

    /// Apply a partial update, optionally replacing the roster id set.
    ///
    /// Field updates use COALESCE so absent patch fields keep their
    /// values. Roster replacement removes entries absent from the target
    /// list and inserts new ids as not-joined; rows that survive keep
    /// their join state untouched.
    ///
    /// Returns `false` if the meeting does not exist.
    #[instrument(skip_all, name = "lms.repo.update_meeting")]
    pub async fn update_meeting(
        pool: &PgPool,
        meeting_id: Uuid,
        patch: &UpdateMeetingRequest,
        roster_ids: Option<&[Uuid]>,
    ) -> Result<bool, LmError> {
        let start = Instant::now();

        let result: Result<bool, LmError> = async {
            let mut tx = pool.begin().await?;

            let updated = sqlx::query(
                r#"
                UPDATE meetings
                SET
                    title = COALESCE($2, title),
                    description = COALESCE($3, description),
                    join_link = COALESCE($4, join_link),
                    scheduled_start = COALESCE($5, scheduled_start),
                    duration_minutes = COALESCE($6, duration_minutes),
                    instructor_id = COALESCE($7, instructor_id),
                    stage_id = COALESCE($8, stage_id),
                    subject_id = COALESCE($9, subject_id),
                    max_attendees = COALESCE($10, max_attendees),
                    is_recorded = COALESCE($11, is_recorded),
                    recording_link = COALESCE($12, recording_link),
                    tags = COALESCE($13::text[], tags),
                    status = COALESCE($14, status),
                    updated_at = NOW()
                WHERE meeting_id = $1
                "#,
            )
            .bind(meeting_id)
            .bind(patch.title.as_deref().map(str::trim))
            .bind(patch.description.as_deref())
            .bind(patch.join_link.as_deref())
            .bind(patch.scheduled_date)
            .bind(patch.duration)
            .bind(patch.instructor)
            .bind(patch.stage)
            .bind(patch.subject)
            .bind(patch.max_attendees)
            .bind(patch.is_recorded)
            .bind(patch.recording_link.as_deref())
            .bind(patch.tags.as_deref())
            .bind(patch.status.as_deref())
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if updated == 0 {
                tx.rollback().await?;
                return Ok(false);
            }

            if let Some(ids) = roster_ids {
                sqlx::query(
                    r#"
                    DELETE FROM meeting_attendees
                    WHERE meeting_id = $1 AND account_id != ALL($2::uuid[])
                    "#,
                )
                .bind(meeting_id)
                .bind(ids)
                .execute(&mut *tx)
                .await?;

                if !ids.is_empty() {
                    sqlx::query(
                        r#"
                        INSERT INTO meeting_attendees (meeting_id, account_id, has_joined, added_at)
                        SELECT $1, candidate, FALSE, NOW()
                        FROM UNNEST($2::uuid[]) AS candidate
                        ON CONFLICT (meeting_id, account_id) DO NOTHING
                        "#,
                    )
                    .bind(meeting_id)
                    .bind(ids)
                    .execute(&mut *tx)
                    .await?;
                }
            }

            tx.commit().await?;
            Ok(true)
        }
        .await;

        let status = if result.is_ok() { "success" } else { "error" };
        metrics::record_db_query("update_meeting", status, start.elapsed());
        result
    }

    /// Append attendees with an atomic capacity gate.
    ///
    /// A single CTE counts the roster and inserts only if
    /// `count + new <= max_attendees`, so concurrent adds cannot overshoot
    /// the cap. Returns the number of rows actually inserted; zero with a
    /// non-empty candidate list means the gate rejected the batch.
    #[instrument(skip_all, name = "lms.repo.add_attendees")]
    pub async fn add_attendees_gated(
        pool: &PgPool,
        meeting_id: Uuid,
        account_ids: &[Uuid],
    ) -> Result<u64, LmError> {
        let start = Instant::now();

        let result = sqlx::query(
            r#"
            WITH roster AS (
                SELECT COUNT(*) AS cnt
                FROM meeting_attendees
                WHERE meeting_id = $1
            ),
            cap AS (
                SELECT max_attendees FROM meetings WHERE meeting_id = $1
            )
            INSERT INTO meeting_attendees (meeting_id, account_id, has_joined, added_at)
            SELECT $1, candidate, FALSE, NOW()
            FROM UNNEST($2::uuid[]) AS candidate, roster, cap
            WHERE roster.cnt + cardinality($2::uuid[]) <= cap.max_attendees
            ON CONFLICT (meeting_id, account_id) DO NOTHING
            "#,
        )
        .bind(meeting_id)
        .bind(account_ids)
        .execute(pool)
        .await;

        let status = if result.is_ok() { "success" } else { "error" };
        metrics::record_db_query("add_attendees", status, start.elapsed());

        Ok(result?.rows_affected())
    }

    /// Mark an existing roster entry as joined.
    ///
    /// Returns `false` if the account is not on the roster; join never
    /// adds new attendees.
    pub async fn mark_joined(
        pool: &PgPool,
        meeting_id: Uuid,
        account_id: Uuid,
    ) -> Result<bool, LmError> {
        let affected = sqlx::query(
            r#"
            UPDATE meeting_attendees
            SET has_joined = TRUE, joined_at = NOW()
            WHERE meeting_id = $1 AND account_id = $2
            "#,
        )
        .bind(meeting_id)
        .bind(account_id)
        .execute(pool)
        .await?
        .rows_affected();

        Ok(affected > 0)
    }

    /// Remove a roster entry. Returns `false` if no entry matched.
    pub async fn remove_attendee(
        pool: &PgPool,
        meeting_id: Uuid,
        account_id: Uuid,
    ) -> Result<bool, LmError> {
        let affected = sqlx::query(
            r#"
            DELETE FROM meeting_attendees
            WHERE meeting_id = $1 AND account_id = $2
            "#,
        )
        .bind(meeting_id)
        .bind(account_id)
        .execute(pool)
        .await?
        .rows_affected();

        Ok(affected > 0)
    }

    /// Hard-delete a meeting and its roster. Returns `false` if absent.
    #[instrument(skip_all, name = "lms.repo.delete_meeting")]
    pub async fn delete_meeting(pool: &PgPool, meeting_id: Uuid) -> Result<bool, LmError> {
        let start = Instant::now();

        let result: Result<bool, LmError> = async {
            let mut tx = pool.begin().await?;

            sqlx::query("DELETE FROM meeting_attendees WHERE meeting_id = $1")
                .bind(meeting_id)
                .execute(&mut *tx)
                .await?;

            let affected = sqlx::query("DELETE FROM meetings WHERE meeting_id = $1")
                .bind(meeting_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();

            tx.commit().await?;
            Ok(affected > 0)
        }
        .await;

        let status = if result.is_ok() { "success" } else { "error" };
        metrics::record_db_query("delete_meeting", status, start.elapsed());
        result
    }

    /// Aggregate counts by derived status plus roster totals.
    #[instrument(skip_all, name = "lms.repo.stats")]
    pub async fn stats(pool: &PgPool) -> Result<MeetingStatsRow, LmError> {
        let status_query = format!(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE {DERIVED_STATUS_SQL} = 'scheduled') AS scheduled,
                COUNT(*) FILTER (WHERE {DERIVED_STATUS_SQL} = 'live') AS live,
                COUNT(*) FILTER (WHERE {DERIVED_STATUS_SQL} = 'completed') AS completed,
                COUNT(*) FILTER (WHERE {DERIVED_STATUS_SQL} = 'cancelled') AS cancelled
            FROM meetings m
            "#
        );

        let counts = sqlx::query_as::<_, MeetingStatsRow>(&status_query)
            .fetch_one(pool)
            .await?;

        Ok(counts)
    }

    /// Total and joined attendee counts across all meetings.
    pub async fn attendance_totals(pool: &PgPool) -> Result<(i64, i64), LmError> {
        let totals: (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE has_joined)
            FROM meeting_attendees
            "#,
        )
        .fetch_one(pool)
        .await?;

        Ok(totals)
    }
}

/// Aggregate status counts row.
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct MeetingStatsRow {
    pub total: i64,
    pub scheduled: i64,
    pub live: i64,
    pub completed: i64,
    pub cancelled: i64,
}
