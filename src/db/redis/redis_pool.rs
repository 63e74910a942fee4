use std::sync::LazyLock;

use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::instrument;

use crate::db::models::fan::Fid;
use crate::util::env::{EnvErr, Var};
use crate::var;

static REDIS_POOL: LazyLock<OnceCell<RedisPool>> = LazyLock::new(OnceCell::new);
pub async fn redis_pool() -> RedisResult<&'static RedisPool> {
    REDIS_POOL
        .get_or_try_init(|| async { RedisPool::new().await })
        .await
}

pub struct RedisPool {
    pub manager: ConnectionManager,
}

impl RedisPool {
    #[instrument]
    pub async fn new() -> RedisResult<Self> {
        let redis_url = var!(Var::RedisUrl).await?;
        tracing::debug!(redis_url, "connecting to redis server");

        let client = redis::Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;

        Ok(Self { manager })
    }
}

pub fn leaderboard_key(channel: &str) -> String {
    format!("channel:{channel}:leaderboard")
}

/// Sorted-set mirror of fan point totals, one set per channel. Postgres is
/// the source of truth; this exists so ranked reads don't hit it.
#[derive(Clone)]
pub struct LeaderboardCache {
    manager: ConnectionManager,
    key: String,
}

impl LeaderboardCache {
    pub fn new(manager: ConnectionManager, channel: &str) -> Self {
        Self {
            manager,
            key: leaderboard_key(channel),
        }
    }

    pub async fn from_env() -> RedisResult<Self> {
        let channel = var!(Var::ChannelId).await?;
        let manager = redis_pool().await?.manager.clone();

        Ok(Self::new(manager, channel))
    }

    #[instrument(skip(self))]
    pub async fn bump(&self, fid: &Fid, delta: i64) -> RedisResult<i64> {
        let mut conn = self.manager.clone();
        let total: i64 = conn.zincr(&self.key, fid.0, delta).await?;

        Ok(total)
    }

    /// Ranked (fid, points) slice, best first.
    #[instrument(skip(self))]
    pub async fn top(&self, limit: i64, offset: i64) -> RedisResult<Vec<(Fid, i64)>> {
        let mut conn = self.manager.clone();
        let stop = offset + limit - 1;
        let ranked: Vec<(i64, i64)> = conn
            .zrevrange_withscores(&self.key, offset as isize, stop as isize)
            .await?;

        Ok(ranked
            .into_iter()
            .map(|(fid, points)| (Fid(fid), points))
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn size(&self) -> RedisResult<i64> {
        let mut conn = self.manager.clone();
        let count: i64 = conn.zcard(&self.key).await?;

        Ok(count)
    }
}

pub type RedisResult<T> = core::result::Result<T, RedisErr>;

#[derive(Debug, Error)]
pub enum RedisErr {
    #[error(transparent)]
    EnvErr(#[from] EnvErr),

    #[error(transparent)]
    RedisClientError(#[from] redis::RedisError),
}
