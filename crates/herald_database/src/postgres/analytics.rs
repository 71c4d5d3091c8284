//! PostgreSQL analytics store.

use super::connection::{PgPool, with_conn};
use super::models::{ContentItemRow, CycleRecordRow, EngagementSnapshotRow, PostAttemptRow};
use super::schema::{content_items, cycle_records, engagement_snapshots, post_attempts};
use crate::check_overwrite;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use herald_core::{ContentItem, ContentStatus, CycleRecord, EngagementSnapshot, PostAttempt};
use herald_error::{DatabaseError, DatabaseResult};
use herald_interface::AnalyticsStore;
use tracing::{debug, instrument};
use uuid::Uuid;

fn clamp_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Analytics store backed by PostgreSQL.
///
/// Stores content items in `content_items` (status-mutable), attempts in
/// `post_attempts` and cycles in `cycle_records` (both append-only), and
/// the latest engagement per item in `engagement_snapshots`.
///
/// Claims live in the `claimed_by` and `claimed_until` columns of
/// `content_items`, outside [`ContentItemRow`], so saving an item never
/// touches its claim. Claiming the next item locks it with
/// `FOR UPDATE SKIP LOCKED`, so concurrent workers pick different rows.
#[derive(Debug, Clone)]
pub struct PostgresAnalyticsStore {
    pool: PgPool,
}

impl PostgresAnalyticsStore {
    /// Wrap a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AnalyticsStore for PostgresAnalyticsStore {
    #[instrument(skip(self, item), fields(item_id = %item.id(), status = %item.status()))]
    async fn save_item(&self, item: &ContentItem) -> DatabaseResult<()> {
        let incoming = item.clone();
        with_conn(&self.pool, move |conn| {
            conn.transaction::<_, DatabaseError, _>(|conn| {
                let existing = content_items::table
                    .find(*incoming.id())
                    .select(ContentItemRow::as_select())
                    .for_update()
                    .first(conn)
                    .optional()?;
                if let Some(existing) = existing {
                    let existing = ContentItem::try_from(existing)?;
                    if !check_overwrite(&existing, &incoming)? {
                        debug!("Terminal item unchanged, skipping write");
                        return Ok(());
                    }
                }
                let row = ContentItemRow::try_from(&incoming)?;
                diesel::insert_into(content_items::table)
                    .values(&row)
                    .on_conflict(content_items::id)
                    .do_update()
                    .set(&row)
                    .execute(conn)?;
                Ok(())
            })
        })
        .await
    }

    async fn get_item(&self, id: Uuid) -> DatabaseResult<Option<ContentItem>> {
        with_conn(&self.pool, move |conn| {
            content_items::table
                .find(id)
                .select(ContentItemRow::as_select())
                .first(conn)
                .optional()?
                .map(ContentItem::try_from)
                .transpose()
        })
        .await
    }

    #[instrument(skip(self))]
    async fn claim_next_queued(
        &self,
        worker: Uuid,
        lease_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DatabaseResult<Option<ContentItem>> {
        with_conn(&self.pool, move |conn| {
            conn.transaction::<_, DatabaseError, _>(|conn| {
                let row = content_items::table
                    .filter(content_items::status.eq(ContentStatus::Queued.as_ref()))
                    .filter(
                        content_items::claimed_by
                            .is_null()
                            .or(content_items::claimed_by.eq(worker))
                            .or(content_items::claimed_until.le(now)),
                    )
                    .order((
                        content_items::created_at.asc(),
                        content_items::thread_position.asc(),
                    ))
                    .select(ContentItemRow::as_select())
                    .for_update()
                    .skip_locked()
                    .first(conn)
                    .optional()?;
                let Some(row) = row else {
                    return Ok(None);
                };
                diesel::update(content_items::table.find(row.id))
                    .set((
                        content_items::claimed_by.eq(Some(worker)),
                        content_items::claimed_until.eq(Some(lease_until)),
                    ))
                    .execute(conn)?;
                debug!(item_id = %row.id, "Claimed queued item");
                ContentItem::try_from(row).map(Some)
            })
        })
        .await
    }

    async fn claim_item(
        &self,
        item_id: Uuid,
        worker: Uuid,
        lease_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DatabaseResult<bool> {
        with_conn(&self.pool, move |conn| {
            let updated = diesel::update(content_items::table.find(item_id))
                .filter(
                    content_items::claimed_by
                        .is_null()
                        .or(content_items::claimed_by.eq(worker))
                        .or(content_items::claimed_until.le(now)),
                )
                .set((
                    content_items::claimed_by.eq(Some(worker)),
                    content_items::claimed_until.eq(Some(lease_until)),
                ))
                .execute(conn)?;
            Ok(updated == 1)
        })
        .await
    }

    async fn release_claim(&self, item_id: Uuid, worker: Uuid) -> DatabaseResult<()> {
        with_conn(&self.pool, move |conn| {
            diesel::update(
                content_items::table
                    .find(item_id)
                    .filter(content_items::claimed_by.eq(worker)),
            )
            .set((
                content_items::claimed_by.eq(None::<Uuid>),
                content_items::claimed_until.eq(None::<DateTime<Utc>>),
            ))
            .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn thread_items(&self, thread_id: Uuid) -> DatabaseResult<Vec<ContentItem>> {
        with_conn(&self.pool, move |conn| {
            content_items::table
                .filter(content_items::thread_id.eq(thread_id))
                .order(content_items::thread_position.asc())
                .select(ContentItemRow::as_select())
                .load(conn)?
                .into_iter()
                .map(ContentItem::try_from)
                .collect()
        })
        .await
    }

    async fn posted_since(&self, since: DateTime<Utc>) -> DatabaseResult<Vec<ContentItem>> {
        with_conn(&self.pool, move |conn| {
            content_items::table
                .filter(content_items::status.eq(ContentStatus::Posted.as_ref()))
                .filter(content_items::updated_at.ge(since))
                .order(content_items::updated_at.desc())
                .select(ContentItemRow::as_select())
                .load(conn)?
                .into_iter()
                .map(ContentItem::try_from)
                .collect()
        })
        .await
    }

    async fn recent_items(&self, limit: usize) -> DatabaseResult<Vec<ContentItem>> {
        with_conn(&self.pool, move |conn| {
            content_items::table
                .order(content_items::created_at.desc())
                .limit(clamp_limit(limit))
                .select(ContentItemRow::as_select())
                .load(conn)?
                .into_iter()
                .map(ContentItem::try_from)
                .collect()
        })
        .await
    }

    #[instrument(skip(self, attempt), fields(item_id = %attempt.content_item_id(), attempt = attempt.attempt_number()))]
    async fn append_attempt(&self, attempt: &PostAttempt) -> DatabaseResult<()> {
        let row = PostAttemptRow::try_from(attempt)?;
        with_conn(&self.pool, move |conn| {
            diesel::insert_into(post_attempts::table)
                .values(&row)
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn attempts_for(&self, item_id: Uuid) -> DatabaseResult<Vec<PostAttempt>> {
        with_conn(&self.pool, move |conn| {
            post_attempts::table
                .filter(post_attempts::content_item_id.eq(item_id))
                .order(post_attempts::attempt_number.asc())
                .select(PostAttemptRow::as_select())
                .load(conn)?
                .into_iter()
                .map(PostAttempt::try_from)
                .collect()
        })
        .await
    }

    async fn record_cycle(&self, record: &CycleRecord) -> DatabaseResult<()> {
        let row = CycleRecordRow::from(record);
        with_conn(&self.pool, move |conn| {
            diesel::insert_into(cycle_records::table)
                .values(&row)
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn recent_cycles(&self, limit: usize) -> DatabaseResult<Vec<CycleRecord>> {
        with_conn(&self.pool, move |conn| {
            cycle_records::table
                .order(cycle_records::started_at.desc())
                .limit(clamp_limit(limit))
                .select(CycleRecordRow::as_select())
                .load(conn)?
                .into_iter()
                .map(CycleRecord::try_from)
                .collect()
        })
        .await
    }

    #[instrument(skip(self, snapshot), fields(item_id = %snapshot.content_item_id()))]
    async fn record_engagement(&self, snapshot: &EngagementSnapshot) -> DatabaseResult<()> {
        let row = EngagementSnapshotRow::try_from(snapshot)?;
        with_conn(&self.pool, move |conn| {
            diesel::insert_into(engagement_snapshots::table)
                .values(&row)
                .on_conflict(engagement_snapshots::content_item_id)
                .do_update()
                .set(&row)
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn engagement_for(&self, item_id: Uuid) -> DatabaseResult<Option<EngagementSnapshot>> {
        with_conn(&self.pool, move |conn| {
            engagement_snapshots::table
                .find(item_id)
                .select(EngagementSnapshotRow::as_select())
                .first(conn)
                .optional()?
                .map(EngagementSnapshot::try_from)
                .transpose()
        })
        .await
    }
}
