use core::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::db::models::marker::CastMarker;

/// Farcaster user id. Stable across username changes, which is why it is the
/// primary key everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct Fid(pub i64);

/// Base fan table model. `likes_count` is the cached aggregate of marker
/// like-counts as of the last scoring pass, the reference the recompute
/// delta is taken against.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct FanRow {
    pub fid: Fid,
    pub username: String,
    pub points: i64,
    pub likes_count: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// A fan with their scored-cast markers attached.
#[derive(Debug, Clone, Serialize)]
pub struct FanRecord {
    pub fid: Fid,
    pub username: String,
    pub points: i64,
    pub likes_count: i64,
    pub markers: Vec<CastMarker>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl FanRecord {
    pub fn from_row(row: FanRow, markers: Vec<CastMarker>) -> Self {
        Self {
            fid: row.fid,
            username: row.username,
            points: row.points,
            likes_count: row.likes_count,
            markers,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }

    pub fn marker_for(&self, cast_hash: &str) -> Option<&CastMarker> {
        self.markers.iter().find(|m| m.cast_hash == cast_hash)
    }

    /// Sum of marker like-counts with `cast_hash`'s entry replaced by
    /// `fresh_likes`. This is the post-pass aggregate the reference cache
    /// is refreshed to.
    pub fn aggregate_likes_with(&self, cast_hash: &str, fresh_likes: i64) -> i64 {
        let others: i64 = self
            .markers
            .iter()
            .filter(|m| m.cast_hash != cast_hash)
            .map(|m| m.likes_count)
            .sum();

        others + fresh_likes
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LeaderboardEntry {
    pub fid: Fid,
    pub username: String,
    pub points: i64,
    pub ranking: i64,
}

impl From<i64> for Fid {
    fn from(value: i64) -> Self {
        Fid(value)
    }
}

impl fmt::Display for Fid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
