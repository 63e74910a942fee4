use std::time::Duration;

use futures::future::join_all;
use thiserror::Error;

use crate::api::server::RouteError;
use crate::db::prelude::*;
use crate::db::redis::redis_pool::RedisErr;
use crate::feed::FeedErr;
use crate::feed::client::ChannelFeed;
use crate::scoring::policy::PointPolicy;
use crate::scoring::sync::{self, LeaderboardSync};
use crate::util::env::{self, EnvErr, Var};
use crate::util::telemetry;

mod api;
mod db;
mod feed;
mod scoring;
mod util;

#[derive(Debug, Error)]
enum RunnerErr {
    #[error(transparent)]
    Std(#[from] Box<dyn std::error::Error>),

    #[error(transparent)]
    Env(#[from] EnvErr),

    #[error(transparent)]
    Feed(#[from] FeedErr),

    #[error(transparent)]
    Store(#[from] StoreErr),

    #[error(transparent)]
    Cache(#[from] RedisErr),

    #[error(transparent)]
    Route(#[from] RouteError),
}

type Result<T> = core::result::Result<T, RunnerErr>;

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry_registry = telemetry::Telemetry::new().await?.register();

    tracing::info!("starting main application");

    let policy = PointPolicy::from_env().await?;
    let feed = ChannelFeed::from_env().await?;
    let store = PgFanStore::new(db_pool().await?);
    let cache = LeaderboardCache::from_env().await?;

    let interval = Duration::from_secs(
        env::get_parsed::<u64>(Var::SyncIntervalSecs).await?,
    );

    let leaderboard_sync = LeaderboardSync::new(feed, store, policy).with_cache(cache);

    let mut handles = Vec::new();

    handles.push(tokio::spawn(async move {
        sync::run_scheduler(leaderboard_sync, interval).await;
    }));
    handles.push(api::server::start_server().await?);

    _ = join_all(handles).await;

    telemetry_registry.shutdown();
    Ok(())
}
