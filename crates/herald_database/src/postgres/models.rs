//! Diesel row types and conversions to domain types.

use super::schema::{
    content_items, cycle_records, dependency_states, engagement_snapshots, post_attempts,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use herald_core::{
    AttemptOutcome, ContentItem, ContentItemBuilder, ContentStatus, CycleOutcome, CycleRecord,
    Dependency, EngagementSnapshot, ImageRef, PostAttempt, PostEngagement,
};
use herald_error::{DatabaseError, DatabaseErrorKind, DatabaseResult};
use herald_rate_limit::{CircuitBreaker, CircuitPhase, DependencyState, RateBudget};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

fn parse<T: FromStr>(column: &str, value: &str) -> DatabaseResult<T> {
    value.parse().map_err(|_| {
        DatabaseError::new(DatabaseErrorKind::Serialization(format!(
            "unexpected {column} value '{value}'"
        )))
    })
}

fn to_i32(column: &str, value: u32) -> DatabaseResult<i32> {
    i32::try_from(value).map_err(|_| {
        DatabaseError::new(DatabaseErrorKind::Serialization(format!(
            "{column} {value} out of range"
        )))
    })
}

fn to_u32(column: &str, value: i32) -> DatabaseResult<u32> {
    u32::try_from(value).map_err(|_| {
        DatabaseError::new(DatabaseErrorKind::Serialization(format!(
            "{column} {value} is negative"
        )))
    })
}

fn to_i64(column: &str, value: u128) -> DatabaseResult<i64> {
    i64::try_from(value).map_err(|_| {
        DatabaseError::new(DatabaseErrorKind::Serialization(format!(
            "{column} {value} out of range"
        )))
    })
}

fn to_u64(column: &str, value: i64) -> DatabaseResult<u64> {
    u64::try_from(value).map_err(|_| {
        DatabaseError::new(DatabaseErrorKind::Serialization(format!(
            "{column} {value} is negative"
        )))
    })
}

/// Row of the `content_items` table.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = content_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub(super) struct ContentItemRow {
    pub id: Uuid,
    pub text: String,
    pub image_url: Option<String>,
    pub image_alt_text: Option<String>,
    pub source_trend: Option<String>,
    pub status: String,
    pub platform_post_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub thread_id: Option<Uuid>,
    pub thread_position: i32,
}

impl TryFrom<&ContentItem> for ContentItemRow {
    type Error = DatabaseError;

    fn try_from(item: &ContentItem) -> DatabaseResult<Self> {
        Ok(Self {
            id: *item.id(),
            text: item.text().clone(),
            image_url: item.image().as_ref().map(|image| image.url().clone()),
            image_alt_text: item.image().as_ref().and_then(|image| image.alt_text().clone()),
            source_trend: item.source_trend().clone(),
            status: item.status().to_string(),
            platform_post_id: item.platform_post_id().clone(),
            created_at: *item.created_at(),
            updated_at: *item.updated_at(),
            thread_id: *item.thread_id(),
            thread_position: to_i32("thread_position", *item.thread_position())?,
        })
    }
}

impl TryFrom<ContentItemRow> for ContentItem {
    type Error = DatabaseError;

    fn try_from(row: ContentItemRow) -> DatabaseResult<Self> {
        let status: ContentStatus = parse("status", &row.status)?;
        let image = row
            .image_url
            .map(|url| ImageRef::new(url, row.image_alt_text));
        ContentItemBuilder::default()
            .id(row.id)
            .text(row.text)
            .image(image)
            .source_trend(row.source_trend)
            .status(status)
            .platform_post_id(row.platform_post_id)
            .created_at(row.created_at)
            .updated_at(row.updated_at)
            .thread_id(row.thread_id)
            .thread_position(to_u32("thread_position", row.thread_position)?)
            .build()
            .map_err(|e| DatabaseError::new(DatabaseErrorKind::Serialization(e.to_string())))
    }
}

/// Row of the `post_attempts` table.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = post_attempts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(super) struct PostAttemptRow {
    pub id: Uuid,
    pub content_item_id: Uuid,
    pub attempt_number: i32,
    pub attempted_at: DateTime<Utc>,
    pub outcome: String,
    pub platform_response_id: Option<String>,
    pub error: Option<String>,
}

impl TryFrom<&PostAttempt> for PostAttemptRow {
    type Error = DatabaseError;

    fn try_from(attempt: &PostAttempt) -> DatabaseResult<Self> {
        Ok(Self {
            id: *attempt.id(),
            content_item_id: *attempt.content_item_id(),
            attempt_number: to_i32("attempt_number", *attempt.attempt_number())?,
            attempted_at: *attempt.timestamp(),
            outcome: attempt.outcome().to_string(),
            platform_response_id: attempt.platform_response_id().clone(),
            error: attempt.error().clone(),
        })
    }
}

impl TryFrom<PostAttemptRow> for PostAttempt {
    type Error = DatabaseError;

    fn try_from(row: PostAttemptRow) -> DatabaseResult<Self> {
        let outcome: AttemptOutcome = parse("outcome", &row.outcome)?;
        Ok(PostAttempt::from_parts(
            row.id,
            row.content_item_id,
            to_u32("attempt_number", row.attempt_number)?,
            row.attempted_at,
            outcome,
            row.platform_response_id,
            row.error,
        ))
    }
}

/// Row of the `cycle_records` table.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = cycle_records)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(super) struct CycleRecordRow {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: String,
    pub content_item_id: Option<Uuid>,
    pub dependency: Option<String>,
    pub error: Option<String>,
}

impl From<&CycleRecord> for CycleRecordRow {
    fn from(record: &CycleRecord) -> Self {
        Self {
            id: *record.id(),
            started_at: *record.started_at(),
            finished_at: *record.finished_at(),
            outcome: record.outcome().to_string(),
            content_item_id: *record.content_item_id(),
            dependency: record.dependency().map(|d| d.to_string()),
            error: record.error().clone(),
        }
    }
}

impl TryFrom<CycleRecordRow> for CycleRecord {
    type Error = DatabaseError;

    fn try_from(row: CycleRecordRow) -> DatabaseResult<Self> {
        let outcome: CycleOutcome = parse("outcome", &row.outcome)?;
        let dependency = row
            .dependency
            .as_deref()
            .map(|value| parse::<Dependency>("dependency", value))
            .transpose()?;
        Ok(CycleRecord::from_parts(
            row.id,
            row.started_at,
            row.finished_at,
            outcome,
            row.content_item_id,
            dependency,
            row.error,
        ))
    }
}

/// Row of the `dependency_states` table.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset, Identifiable)]
#[diesel(table_name = dependency_states)]
#[diesel(primary_key(dependency))]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(treat_none_as_null = true)]
pub(super) struct DependencyStateRow {
    pub dependency: String,
    pub window_start: DateTime<Utc>,
    pub window_ms: i64,
    pub max_calls: i32,
    pub calls_used: i32,
    pub circuit_phase: String,
    pub consecutive_failures: i32,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub current_cooldown_ms: i64,
    pub version: i64,
}

impl DependencyStateRow {
    /// Row for `state` stored under `version`.
    pub fn from_state(state: &DependencyState, version: u64) -> DatabaseResult<Self> {
        let budget = state.budget();
        let circuit = state.circuit();
        Ok(Self {
            dependency: state.dependency().to_string(),
            window_start: *budget.window_start(),
            window_ms: to_i64("window_ms", budget.window_duration().as_millis())?,
            max_calls: to_i32("max_calls", *budget.max_calls())?,
            calls_used: to_i32("calls_used", *budget.calls_used())?,
            circuit_phase: circuit.phase().to_string(),
            consecutive_failures: to_i32("consecutive_failures", *circuit.consecutive_failures())?,
            cooldown_until: *circuit.cooldown_until(),
            current_cooldown_ms: to_i64(
                "current_cooldown_ms",
                circuit.current_cooldown().as_millis(),
            )?,
            version: to_i64("version", u128::from(version))?,
        })
    }
}

impl TryFrom<DependencyStateRow> for DependencyState {
    type Error = DatabaseError;

    fn try_from(row: DependencyStateRow) -> DatabaseResult<Self> {
        let dependency: Dependency = parse("dependency", &row.dependency)?;
        let phase: CircuitPhase = parse("circuit_phase", &row.circuit_phase)?;
        let budget = RateBudget::from_parts(
            row.window_start,
            Duration::from_millis(to_u64("window_ms", row.window_ms)?),
            to_u32("max_calls", row.max_calls)?,
            to_u32("calls_used", row.calls_used)?,
        );
        let circuit = CircuitBreaker::from_parts(
            phase,
            to_u32("consecutive_failures", row.consecutive_failures)?,
            row.cooldown_until,
            Duration::from_millis(to_u64("current_cooldown_ms", row.current_cooldown_ms)?),
        );
        Ok(DependencyState::from_parts(
            dependency,
            budget,
            circuit,
            to_u64("version", row.version)?,
        ))
    }
}

/// Row of the `engagement_snapshots` table.
#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = engagement_snapshots)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(super) struct EngagementSnapshotRow {
    pub content_item_id: Uuid,
    pub post_id: String,
    pub impressions: i64,
    pub likes: i64,
    pub reposts: i64,
    pub replies: i64,
    pub fetched_at: DateTime<Utc>,
}

impl TryFrom<&EngagementSnapshot> for EngagementSnapshotRow {
    type Error = DatabaseError;

    fn try_from(snapshot: &EngagementSnapshot) -> DatabaseResult<Self> {
        let engagement = snapshot.engagement();
        Ok(Self {
            content_item_id: *snapshot.content_item_id(),
            post_id: engagement.post_id().clone(),
            impressions: to_i64("impressions", u128::from(*engagement.impressions()))?,
            likes: to_i64("likes", u128::from(*engagement.likes()))?,
            reposts: to_i64("reposts", u128::from(*engagement.reposts()))?,
            replies: to_i64("replies", u128::from(*engagement.replies()))?,
            fetched_at: *snapshot.fetched_at(),
        })
    }
}

impl TryFrom<EngagementSnapshotRow> for EngagementSnapshot {
    type Error = DatabaseError;

    fn try_from(row: EngagementSnapshotRow) -> DatabaseResult<Self> {
        let engagement = PostEngagement::new(
            row.post_id,
            to_u64("impressions", row.impressions)?,
            to_u64("likes", row.likes)?,
            to_u64("reposts", row.reposts)?,
            to_u64("replies", row.replies)?,
        );
        Ok(EngagementSnapshot::new(row.content_item_id, engagement, row.fetched_at))
    }
}
