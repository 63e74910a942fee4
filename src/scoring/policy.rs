use serde::{Deserialize, Serialize};

use crate::util::env::{self, EnvResult, Var};

pub const DEFAULT_CAST_POINTS: i64 = 169;
pub const DEFAULT_LIKE_POINTS: i64 = 10;
pub const DEFAULT_RECAST_POINTS: i64 = 40;

/// The scoreable things a fan can do to a cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    AuthoredCast,
    ReceivedLike,
    ReceivedRecast,
}

/// Action weights. Configuration, not code: the values live in the
/// environment and only default to the launch-era numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointPolicy {
    pub cast: i64,
    pub like: i64,
    pub recast: i64,
}

impl Default for PointPolicy {
    fn default() -> Self {
        Self {
            cast: DEFAULT_CAST_POINTS,
            like: DEFAULT_LIKE_POINTS,
            recast: DEFAULT_RECAST_POINTS,
        }
    }
}

impl PointPolicy {
    pub const fn award(&self, action: ActionKind) -> i64 {
        match action {
            ActionKind::AuthoredCast => self.cast,
            ActionKind::ReceivedLike => self.like,
            ActionKind::ReceivedRecast => self.recast,
        }
    }

    pub async fn from_env() -> EnvResult<Self> {
        Ok(Self {
            cast: env::get_parsed::<i64>(Var::PointsCast).await?,
            like: env::get_parsed::<i64>(Var::PointsLike).await?,
            recast: env::get_parsed::<i64>(Var::PointsRecast).await?,
        })
    }
}
