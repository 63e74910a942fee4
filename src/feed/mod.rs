use async_trait::async_trait;
use http::header::InvalidHeaderValue;
use serde_json::Value;
use thiserror::Error;

use crate::util::env::EnvErr;

pub mod client;
pub mod types;
pub mod walker;

/// Capability to fetch one page of the channel feed. The production
/// implementation is [`client::ChannelFeed`]; tests script their own.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_page(&self, cursor: Option<&str>) -> FeedResult<types::FeedPage>;
}

pub type FeedResult<T> = core::result::Result<T, FeedErr>;

#[derive(Debug, Error)]
pub enum FeedErr {
    #[error("feed request at cursor {cursor:?} failed: {source}")]
    Transport {
        cursor: Option<String>,
        #[source]
        source: reqwest::Error,
    },

    #[error("feed fetch at cursor {cursor:?} returned {status}: {body:#?}")]
    Fetch {
        cursor: Option<String>,
        status: String,
        body: Value,
    },

    #[error(transparent)]
    Env(#[from] EnvErr),

    #[error(transparent)]
    Header(#[from] InvalidHeaderValue),
}

impl FeedErr {
    /// The cursor whose page fetch failed, for resuming a broken traversal.
    pub fn cursor(&self) -> Option<&str> {
        match self {
            FeedErr::Transport { cursor, .. } | FeedErr::Fetch { cursor, .. } => cursor.as_deref(),
            _ => None,
        }
    }
}
