use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use crate::db::models::fan::{Fid, FanRecord, FanRow, LeaderboardEntry};
use crate::db::models::marker::CastMarker;
use crate::db::StoreResult;

/// Persistent per-fan state, keyed by fid.
///
/// Point mutation goes through [`FanStore::increment_points`], a single
/// atomic upsert — concurrent sync runs must not lose increments, so there
/// is deliberately no way to write an absolute points value.
#[async_trait]
pub trait FanStore: Send + Sync {
    async fn find_by_fid(&self, fid: &Fid) -> StoreResult<Option<FanRecord>>;

    /// Insert-or-increment. Creates the record with `amount` points when the
    /// fid is new, otherwise adds `amount` and overwrites the username
    /// (last write wins). Returns the new total.
    async fn increment_points(&self, fid: &Fid, username: &str, amount: i64) -> StoreResult<i64>;

    /// Insert-or-replace the marker for (fid, marker.cast_hash). Never
    /// produces a second marker for the same pair.
    async fn upsert_marker(&self, fid: &Fid, marker: &CastMarker) -> StoreResult<()>;

    async fn set_reference_likes(&self, fid: &Fid, likes: i64) -> StoreResult<()>;

    async fn leaderboard(&self, limit: i64, offset: i64) -> StoreResult<Vec<LeaderboardEntry>>;

    /// Base rows for a known set of fids, for hydrating cached rankings.
    async fn profiles(&self, fids: &[Fid]) -> StoreResult<Vec<FanRow>>;

    async fn count(&self) -> StoreResult<i64>;
}

#[derive(Debug, Clone)]
pub struct PgFanStore {
    pool: &'static PgPool,
}

impl PgFanStore {
    pub fn new(pool: &'static PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FanStore for PgFanStore {
    #[instrument(skip(self))]
    async fn find_by_fid(&self, fid: &Fid) -> StoreResult<Option<FanRecord>> {
        let row = sqlx::query_as::<_, FanRow>(
            r#"
            SELECT fid, username, points, likes_count, created_at, updated_at
            FROM fan
            WHERE fid = $1
            "#,
        )
        .bind(fid)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let markers = sqlx::query_as::<_, CastMarker>(
            r#"
            SELECT cast_hash, likes_count, recasts_count, username, scored_at
            FROM processed_cast
            WHERE fid = $1
            ORDER BY scored_at ASC
            "#,
        )
        .bind(fid)
        .fetch_all(self.pool)
        .await?;

        Ok(Some(FanRecord::from_row(row, markers)))
    }

    #[instrument(skip(self, username))]
    async fn increment_points(&self, fid: &Fid, username: &str, amount: i64) -> StoreResult<i64> {
        let total = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO fan (fid, username, points, likes_count, created_at, updated_at)
            VALUES ($1, $2, $3, 0, NOW(), NOW())
            ON CONFLICT (fid)
            DO UPDATE SET
                points = fan.points + $3,
                username = EXCLUDED.username,
                updated_at = NOW()
            RETURNING points
            "#,
        )
        .bind(fid)
        .bind(username)
        .bind(amount)
        .fetch_one(self.pool)
        .await?;

        Ok(total)
    }

    #[instrument(skip(self, marker), fields(cast_hash = %marker.cast_hash))]
    async fn upsert_marker(&self, fid: &Fid, marker: &CastMarker) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO processed_cast (fid, cast_hash, likes_count, recasts_count, username, scored_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (fid, cast_hash)
            DO UPDATE SET
                likes_count = EXCLUDED.likes_count,
                recasts_count = EXCLUDED.recasts_count,
                username = EXCLUDED.username,
                scored_at = EXCLUDED.scored_at
            "#,
        )
        .bind(fid)
        .bind(&marker.cast_hash)
        .bind(marker.likes_count)
        .bind(marker.recasts_count)
        .bind(&marker.username)
        .bind(marker.scored_at)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn set_reference_likes(&self, fid: &Fid, likes: i64) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE fan
            SET likes_count = $2, updated_at = NOW()
            WHERE fid = $1
            "#,
        )
        .bind(fid)
        .bind(likes)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn leaderboard(&self, limit: i64, offset: i64) -> StoreResult<Vec<LeaderboardEntry>> {
        let entries = sqlx::query_as::<_, LeaderboardEntry>(
            r#"
            SELECT fid, username, points,
                   RANK() OVER (ORDER BY points DESC) AS ranking
            FROM fan
            ORDER BY points DESC, created_at ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok(entries)
    }

    #[instrument(skip(self, fids), fields(fid_count = fids.len()))]
    async fn profiles(&self, fids: &[Fid]) -> StoreResult<Vec<FanRow>> {
        let raw: Vec<i64> = fids.iter().map(|fid| fid.0).collect();

        let rows = sqlx::query_as::<_, FanRow>(
            r#"
            SELECT fid, username, points, likes_count, created_at, updated_at
            FROM fan
            WHERE fid = ANY($1)
            "#,
        )
        .bind(&raw)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn count(&self) -> StoreResult<i64> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM fan")
            .fetch_one(self.pool)
            .await?;

        Ok(total)
    }
}
