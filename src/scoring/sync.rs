//! Full-feed sync: walk every page, score every cast, reconcile the deltas.
//!
//! Pages are strictly sequential (each fetch needs the previous page's
//! cursor); casts inside a page are independent and run through a bounded
//! worker pool. A bad cast or a failed write skips that cast only; a failed
//! page fetch aborts the run and keeps the cursor for the report.

use std::pin::pin;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::stream::{self, TryStreamExt};
use tinyrand::{Rand, RandRange, Seeded, StdRand};
use tinyrand_std::ClockSeed;
use tracing::instrument;
use uuid::Uuid;

use crate::db::models::fan::Fid;
use crate::db::redis::redis_pool::LeaderboardCache;
use crate::db::repositories::fan::FanStore;
use crate::feed::types::Cast;
use crate::feed::FeedSource;
use crate::feed::walker::page_stream;
use crate::scoring::policy::PointPolicy;
use crate::scoring::reconciler::Reconciler;
use crate::scoring::scorer;

const CAST_WORKERS: usize = 8;
const JITTER_BOUND_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    /// The traversal itself failed; `cursor` is where it broke, for a
    /// caller that wants to resume rather than restart.
    Aborted { cursor: Option<String> },
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub casts_seen: u64,
    pub casts_scored: u64,
    pub casts_skipped: u64,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

pub struct LeaderboardSync<F, S> {
    feed: F,
    store: S,
    reconciler: Reconciler<S>,
    policy: PointPolicy,
    workers: usize,
}

impl<F, S> LeaderboardSync<F, S>
where
    F: FeedSource,
    S: FanStore + Clone,
{
    pub fn new(feed: F, store: S, policy: PointPolicy) -> Self {
        let reconciler = Reconciler::new(store.clone());
        Self {
            feed,
            store,
            reconciler,
            policy,
            workers: CAST_WORKERS,
        }
    }

    pub fn with_cache(mut self, cache: LeaderboardCache) -> Self {
        self.reconciler = Reconciler::new(self.store.clone()).with_cache(cache);
        self
    }

    #[instrument(skip(self))]
    pub async fn run(&self) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        tracing::info!(run_id = %run_id, "starting sync run");

        let mut casts_seen = 0u64;
        let mut casts_scored = 0u64;
        let mut casts_skipped = 0u64;
        let status;

        let mut pages = pin!(page_stream(&self.feed));
        loop {
            match pages.try_next().await {
                Ok(Some(page)) => {
                    casts_seen += page.casts.len() as u64;

                    let results: Vec<bool> = stream::iter(page.casts)
                        .map(|cast| self.process_cast(cast))
                        .buffer_unordered(self.workers)
                        .collect()
                        .await;

                    casts_scored += results.iter().filter(|ok| **ok).count() as u64;
                    casts_skipped += results.iter().filter(|ok| !**ok).count() as u64;
                }

                Ok(None) => {
                    status = RunStatus::Completed;
                    break;
                }

                Err(e) => {
                    tracing::error!(error = %e, "feed traversal failed");
                    status = RunStatus::Aborted {
                        cursor: e.cursor().map(str::to_owned),
                    };
                    break;
                }
            }
        }

        let report = RunReport {
            run_id,
            casts_seen,
            casts_scored,
            casts_skipped,
            status,
            started_at,
            finished_at: Utc::now(),
        };

        tracing::info!(
            run_id = %report.run_id,
            casts_seen = report.casts_seen,
            casts_scored = report.casts_scored,
            casts_skipped = report.casts_skipped,
            status = ?report.status,
            duration_ms = (report.finished_at - report.started_at).num_milliseconds(),
            "sync run finished"
        );

        report
    }

    /// Score and reconcile one cast. Returns whether the cast made it all
    /// the way through; failures log and skip, they never abort the run.
    async fn process_cast(&self, cast: Cast) -> bool {
        let author_fid = cast.author.as_ref().map(|author| Fid(author.fid));

        let state = match author_fid {
            Some(fid) => match self.store.find_by_fid(&fid).await {
                Ok(state) => state,
                Err(e) => {
                    tracing::warn!(error = %e, cast_hash = %cast.hash, "author lookup failed, skipping cast");
                    return false;
                }
            },
            None => None,
        };

        let score = match scorer::score(&cast, state.as_ref(), Utc::now(), &self.policy) {
            Ok(score) => score,
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed cast");
                return false;
            }
        };

        match self.reconciler.apply(&score).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, cast_hash = %score.cast_hash, "reconciliation failed, skipping cast");
                false
            }
        }
    }
}

/// Run forever on a fixed cadence, jittered so restarted replicas don't
/// tick in lockstep.
pub async fn run_scheduler<F, S>(sync: LeaderboardSync<F, S>, interval: Duration)
where
    F: FeedSource,
    S: FanStore + Clone,
{
    loop {
        let report = sync.run().await;

        if let RunStatus::Aborted { cursor } = &report.status {
            tracing::warn!(resume_cursor = ?cursor, "run aborted, next tick restarts from the top");
        }

        let pause = interval + Duration::from_secs(jitter(JITTER_BOUND_SECS));
        tracing::debug!(secs = pause.as_secs(), "sleeping until next sync");
        tokio::time::sleep(pause).await;
    }
}

fn jitter(bound: u64) -> u64 {
    let mut rand = StdRand::seed(ClockSeed::default().next_u64());
    rand.next_range(0..bound)
}
