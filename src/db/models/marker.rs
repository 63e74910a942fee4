use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Record of the last scoring pass over one cast for one author. Keyed by
/// (fid, cast_hash) in the store, so a cast can never accumulate duplicate
/// markers — re-scoring replaces in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CastMarker {
    pub cast_hash: String,
    pub likes_count: i64,
    pub recasts_count: i64,
    pub username: String,
    pub scored_at: NaiveDateTime,
}
