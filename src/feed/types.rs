use chrono::{DateTime, Utc};
use serde::Deserialize;

/// One page of the channel feed as the API returns it. `casts` can be empty
/// while `next.cursor` is still present; the walker must keep going.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedPage {
    #[serde(default)]
    pub casts: Vec<Cast>,
    #[serde(default)]
    pub next: NextCursor,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NextCursor {
    pub cursor: Option<String>,
}

/// A single cast in the channel feed. The author block is deserialized
/// leniently so one malformed entry skips as a bad cast instead of failing
/// the whole page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Cast {
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub author: Option<CastAuthor>,
    #[serde(default)]
    pub reactions: Reactions,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CastAuthor {
    #[serde(default)]
    pub fid: i64,
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Reactions {
    #[serde(default)]
    pub likes: Vec<Reaction>,
    #[serde(default)]
    pub recasts: Vec<Reaction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Reaction {
    #[serde(default)]
    pub fid: i64,
    #[serde(default)]
    pub fname: String,
}

impl Cast {
    pub fn like_count(&self) -> i64 {
        self.reactions.likes.len() as i64
    }

    pub fn recast_count(&self) -> i64 {
        self.reactions.recasts.len() as i64
    }
}
