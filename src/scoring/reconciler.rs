use tracing::instrument;

use crate::db::StoreResult;
use crate::db::models::fan::Fid;
use crate::db::redis::redis_pool::LeaderboardCache;
use crate::db::repositories::fan::FanStore;
use crate::scoring::scorer::{CastScore, ScoreOutcome};

/// Applies a scored cast to the store. Every write is an independent
/// per-identity upsert; overlapping runs interleave safely because the
/// increments are atomic at the store and the marker gate keeps a cast from
/// paying out twice inside the window.
pub struct Reconciler<S> {
    store: S,
    cache: Option<LeaderboardCache>,
}

impl<S: FanStore> Reconciler<S> {
    pub fn new(store: S) -> Self {
        Self { store, cache: None }
    }

    pub fn with_cache(mut self, cache: LeaderboardCache) -> Self {
        self.cache = Some(cache);
        self
    }

    #[instrument(skip(self, score), fields(cast_hash = %score.cast_hash, outcome = ?score.outcome))]
    pub async fn apply(&self, score: &CastScore) -> StoreResult<()> {
        if score.outcome == ScoreOutcome::Deduped {
            tracing::trace!("inside the rescore window, nothing to apply");
            return Ok(());
        }

        // author first: creates the record when this is a brand new fan, so
        // the marker's foreign key has something to land on
        self.store
            .increment_points(&score.author_fid, &score.author_username, score.author_delta)
            .await?;

        if let Some(marker) = &score.marker {
            self.store.upsert_marker(&score.author_fid, marker).await?;
        }

        if let Some(likes) = score.reference_likes {
            self.store
                .set_reference_likes(&score.author_fid, likes)
                .await?;
        }

        self.bump_cache(&score.author_fid, score.author_delta).await;

        for (fid, delta) in &score.reactor_deltas {
            self.store
                .increment_points(fid, &delta.username, delta.points)
                .await?;
            self.bump_cache(fid, delta.points).await;
        }

        Ok(())
    }

    /// Mirror an increment into the ranking cache. Failures are logged and
    /// swallowed: postgres already has the points.
    async fn bump_cache(&self, fid: &Fid, delta: i64) {
        if delta == 0 {
            return;
        }

        let Some(cache) = &self.cache else {
            return;
        };

        if let Err(e) = cache.bump(fid, delta).await {
            tracing::warn!(error = ?e, %fid, "leaderboard cache bump failed");
        }
    }
}
