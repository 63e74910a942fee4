//! Forward-only traversal of the cursor-paginated channel feed.
//!
//! Each call starts a fresh walk: fetch with no cursor, then keep following
//! the cursor embedded in the previous response until a page comes back
//! without one. An empty page with a cursor still advances — live feeds do
//! return those.

use futures::stream::{self, Stream, TryStreamExt};

use crate::feed::types::{Cast, FeedPage};
use crate::feed::{FeedResult, FeedSource};

enum Walk {
    Start,
    Next(String),
    Exhausted,
}

pub fn page_stream<S>(source: &S) -> impl Stream<Item = FeedResult<FeedPage>> + '_
where
    S: FeedSource + ?Sized,
{
    stream::try_unfold(Walk::Start, move |state| async move {
        let cursor = match &state {
            Walk::Start => None,
            Walk::Next(cursor) => Some(cursor.as_str()),
            Walk::Exhausted => return Ok(None),
        };

        let page = source.fetch_page(cursor).await?;
        let next = match &page.next.cursor {
            Some(cursor) => Walk::Next(cursor.clone()),
            None => Walk::Exhausted,
        };

        Ok(Some((page, next)))
    })
}

pub fn cast_stream<S>(source: &S) -> impl Stream<Item = FeedResult<Cast>> + '_
where
    S: FeedSource + ?Sized,
{
    page_stream(source)
        .map_ok(|page| stream::iter(page.casts.into_iter().map(Ok)))
        .try_flatten()
}
