use std::time::Duration;

use async_trait::async_trait;
use http::{HeaderMap, HeaderValue};
use leaky_bucket::RateLimiter;
use serde_json::Value;
use tracing::instrument;

use crate::feed::types::FeedPage;
use crate::feed::{FeedErr, FeedResult, FeedSource};
use crate::util::env::{self, Var};
use crate::var;

pub const FEED_URI_BASE: &str = "https://api.neynar.com";
pub const FEED_URN_CHANNELS: &str = "v2/farcaster/feed/channels";
pub const FEED_API_KEY_HEADER: &str = "api_key";

// the feed API meters requests per-app; five pages a second stays well
// inside the starter plan's bucket
const FETCH_BURST: usize = 5;
const FETCH_REFILL_INTERVAL: Duration = Duration::from_secs(1);

/// Channel feed over the paginated HTTP API.
pub struct ChannelFeed {
    client: reqwest::Client,
    limiter: RateLimiter,
    headers: HeaderMap,
    base: String,
    channel: String,
    page_limit: u32,
}

impl ChannelFeed {
    pub fn new(
        base: impl Into<String>,
        channel: impl Into<String>,
        page_limit: u32,
        api_key: &str,
    ) -> FeedResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(FEED_API_KEY_HEADER, HeaderValue::from_str(api_key)?);

        let limiter = RateLimiter::builder()
            .max(FETCH_BURST)
            .initial(FETCH_BURST)
            .refill(FETCH_BURST)
            .interval(FETCH_REFILL_INTERVAL)
            .build();

        Ok(Self {
            client: reqwest::Client::new(),
            limiter,
            headers,
            base: base.into(),
            channel: channel.into(),
            page_limit,
        })
    }

    pub async fn from_env() -> FeedResult<Self> {
        let channel = var!(Var::ChannelId).await?;
        let api_key = var!(Var::NeynarApiKey).await?;
        let page_limit = env::get_parsed::<u32>(Var::FeedPageLimit).await?;

        Self::new(FEED_URI_BASE, channel, page_limit, api_key)
    }

    fn feed_url(&self, cursor: Option<&str>) -> String {
        let mut url = format!(
            "{}/{}?channel_ids={}&with_recasts=true&with_replies=true&limit={}",
            self.base, FEED_URN_CHANNELS, self.channel, self.page_limit
        );

        if let Some(cursor) = cursor {
            url.push_str(&format!("&cursor={cursor}"));
        }

        url
    }
}

#[async_trait]
impl FeedSource for ChannelFeed {
    #[instrument(skip(self))]
    async fn fetch_page(&self, cursor: Option<&str>) -> FeedResult<FeedPage> {
        self.limiter.acquire_one().await;

        let uri = self.feed_url(cursor);
        let owned_cursor = cursor.map(str::to_owned);

        let res = self
            .client
            .get(uri)
            .headers(self.headers.clone())
            .send()
            .await
            .map_err(|e| FeedErr::Transport {
                cursor: owned_cursor.clone(),
                source: e,
            })?;

        // on a non-200 the API usually explains itself in the body; keep
        // whatever detail it gives us in the error
        if res.status() != 200 {
            let status = res.status();
            tracing::error!(code = %status, "non-200/OK response from feed");

            let body = res.json::<Value>().await.unwrap_or(Value::Null);
            if body != Value::Null {
                tracing::error!(body = ?body, "error message in response");
            }

            return Err(FeedErr::Fetch {
                cursor: owned_cursor,
                status: status.to_string(),
                body,
            });
        }

        res.json::<FeedPage>().await.map_err(|e| FeedErr::Transport {
            cursor: owned_cursor,
            source: e,
        })
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn feed_for(server: &MockServer) -> ChannelFeed {
        ChannelFeed::new(server.uri(), "lolly", 100, "test-key").unwrap()
    }

    #[tokio::test]
    async fn fetches_first_page_without_cursor() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/farcaster/feed/channels"))
            .and(query_param("channel_ids", "lolly"))
            .and(query_param("limit", "100"))
            .and(header(FEED_API_KEY_HEADER, "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "casts": [
                    {
                        "hash": "0xabc",
                        "author": { "fid": 7, "username": "lollyfan" },
                        "reactions": {
                            "likes": [{ "fid": 8, "fname": "liker" }],
                            "recasts": []
                        }
                    }
                ],
                "next": { "cursor": "page-two" }
            })))
            .mount(&server)
            .await;

        let page = feed_for(&server).fetch_page(None).await.unwrap();

        assert_eq!(page.casts.len(), 1);
        assert_eq!(page.casts[0].hash, "0xabc");
        assert_eq!(page.casts[0].like_count(), 1);
        assert_eq!(page.next.cursor.as_deref(), Some("page-two"));
    }

    #[tokio::test]
    async fn propagates_cursor_into_the_query() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/farcaster/feed/channels"))
            .and(query_param("cursor", "page-two"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "casts": [],
                "next": { "cursor": null }
            })))
            .mount(&server)
            .await;

        let page = feed_for(&server).fetch_page(Some("page-two")).await.unwrap();

        assert!(page.casts.is_empty());
        assert!(page.next.cursor.is_none());
    }

    #[tokio::test]
    async fn non_200_keeps_cursor_and_body_detail() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v2/farcaster/feed/channels"))
            .respond_with(
                ResponseTemplate::new(402).set_body_json(json!({ "message": "quota exceeded" })),
            )
            .mount(&server)
            .await;

        let err = feed_for(&server)
            .fetch_page(Some("page-nine"))
            .await
            .unwrap_err();

        assert_eq!(err.cursor(), Some("page-nine"));
        match err {
            FeedErr::Fetch { status, body, .. } => {
                assert!(status.starts_with("402"));
                assert_eq!(body["message"], "quota exceeded");
            }
            other => panic!("expected fetch error, got {other:?}"),
        }
    }
}
