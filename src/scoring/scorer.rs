//! Pure scoring of one cast against the author's persisted state.
//!
//! The marker for (author, cast hash) gates everything: no marker means a
//! first sighting and the full award; a marker younger than the rescore
//! window means a no-op; an older marker means a recompute that only pays
//! out reaction growth since the last pass.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::db::models::fan::{Fid, FanRecord};
use crate::db::models::marker::CastMarker;
use crate::feed::types::{Cast, Reaction};
use crate::scoring::policy::{ActionKind, PointPolicy};

pub const RESCORE_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreOutcome {
    /// Never scored before: full author award plus reactor fan-out.
    FirstSeen,
    /// Scored inside the rescore window: nothing to do.
    Deduped,
    /// Scored before the window opened: pay out reaction growth only.
    Recomputed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReactorDelta {
    pub username: String,
    pub points: i64,
}

/// Everything the reconciler needs to persist for one scored cast. Zeroed
/// out (and without a marker) when the outcome is [`ScoreOutcome::Deduped`].
#[derive(Debug, Clone)]
pub struct CastScore {
    pub cast_hash: String,
    pub author_fid: Fid,
    pub author_username: String,
    pub outcome: ScoreOutcome,
    pub author_delta: i64,
    pub marker: Option<CastMarker>,
    pub reference_likes: Option<i64>,
    pub reactor_deltas: HashMap<Fid, ReactorDelta>,
}

pub type ScoreResult<T> = core::result::Result<T, ScoreErr>;

#[derive(Debug, Error)]
pub enum ScoreErr {
    #[error("cast '{hash}' has no usable author identity")]
    MalformedCast { hash: String },
}

/// Scores `cast` given the author's current persisted state. Pure with
/// respect to the store; persistence is the reconciler's job.
pub fn score(
    cast: &Cast,
    author_state: Option<&FanRecord>,
    now: DateTime<Utc>,
    policy: &PointPolicy,
) -> ScoreResult<CastScore> {
    let author = cast
        .author
        .as_ref()
        .filter(|a| a.fid > 0)
        .ok_or_else(|| ScoreErr::MalformedCast {
            hash: cast.hash.clone(),
        })?;

    if cast.hash.is_empty() {
        return Err(ScoreErr::MalformedCast {
            hash: cast.hash.clone(),
        });
    }

    let author_fid = Fid(author.fid);
    let likes = cast.like_count();
    let recasts = cast.recast_count();

    let existing = author_state.and_then(|state| {
        state
            .marker_for(&cast.hash)
            .map(|marker| (state, marker))
    });

    match existing {
        None => {
            let author_delta = policy.award(ActionKind::AuthoredCast)
                + likes * policy.award(ActionKind::ReceivedLike)
                + recasts * policy.award(ActionKind::ReceivedRecast);

            let mut reactor_deltas = HashMap::new();
            collect_reactors(
                &mut reactor_deltas,
                &cast.reactions.likes,
                policy.award(ActionKind::ReceivedLike),
                author_fid,
            );
            collect_reactors(
                &mut reactor_deltas,
                &cast.reactions.recasts,
                policy.award(ActionKind::ReceivedRecast),
                author_fid,
            );

            let aggregate = author_state
                .map(|state| state.aggregate_likes_with(&cast.hash, likes))
                .unwrap_or(likes);

            Ok(CastScore {
                cast_hash: cast.hash.clone(),
                author_fid,
                author_username: author.username.clone(),
                outcome: ScoreOutcome::FirstSeen,
                author_delta,
                marker: Some(marker_for(cast, author.username.clone(), now)),
                reference_likes: Some(aggregate),
                reactor_deltas,
            })
        }

        Some((_, marker)) if within_window(marker, now) => Ok(CastScore {
            cast_hash: cast.hash.clone(),
            author_fid,
            author_username: author.username.clone(),
            outcome: ScoreOutcome::Deduped,
            author_delta: 0,
            marker: None,
            reference_likes: None,
            reactor_deltas: HashMap::new(),
        }),

        Some((state, _)) => {
            let aggregate = state.aggregate_likes_with(&cast.hash, likes);

            // clamped so a shrinking like count (feed inconsistency) never
            // claws points back
            let like_growth = (aggregate - state.likes_count).max(0);

            // recasts are re-awarded in full on every recompute; likes are
            // delta-gated. inherited behavior, kept intentionally
            let author_delta = like_growth * policy.award(ActionKind::ReceivedLike)
                + recasts * policy.award(ActionKind::ReceivedRecast);

            Ok(CastScore {
                cast_hash: cast.hash.clone(),
                author_fid,
                author_username: author.username.clone(),
                outcome: ScoreOutcome::Recomputed,
                author_delta,
                marker: Some(marker_for(cast, author.username.clone(), now)),
                reference_likes: Some(aggregate),
                reactor_deltas: HashMap::new(),
            })
        }
    }
}

fn within_window(marker: &CastMarker, now: DateTime<Utc>) -> bool {
    now.naive_utc() - marker.scored_at < Duration::hours(RESCORE_WINDOW_HOURS)
}

fn marker_for(cast: &Cast, username: String, now: DateTime<Utc>) -> CastMarker {
    CastMarker {
        cast_hash: cast.hash.clone(),
        likes_count: cast.like_count(),
        recasts_count: cast.recast_count(),
        username,
        scored_at: now.naive_utc(),
    }
}

/// One award per (cast, fid, kind); a fid appearing twice in the same
/// reaction list counts once. The author never earns as their own reactor.
fn collect_reactors(
    deltas: &mut HashMap<Fid, ReactorDelta>,
    reactions: &[Reaction],
    award: i64,
    author_fid: Fid,
) {
    let mut seen = HashSet::new();

    for reaction in reactions {
        let fid = Fid(reaction.fid);
        if reaction.fid <= 0 || fid == author_fid || !seen.insert(fid) {
            continue;
        }

        deltas
            .entry(fid)
            .and_modify(|delta| {
                delta.points += award;
                delta.username = reaction.fname.clone();
            })
            .or_insert_with(|| ReactorDelta {
                username: reaction.fname.clone(),
                points: award,
            });
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::feed::types::{CastAuthor, Reactions};

    const POLICY: PointPolicy = PointPolicy {
        cast: 100,
        like: 10,
        recast: 20,
    };

    fn reaction(fid: i64, fname: &str) -> Reaction {
        Reaction {
            fid,
            fname: fname.to_string(),
        }
    }

    fn cast(hash: &str, author_fid: i64, likes: Vec<Reaction>, recasts: Vec<Reaction>) -> Cast {
        Cast {
            hash: hash.to_string(),
            author: Some(CastAuthor {
                fid: author_fid,
                username: format!("user{author_fid}"),
            }),
            reactions: Reactions { likes, recasts },
            timestamp: None,
        }
    }

    fn state_with_marker(fid: i64, marker: CastMarker, reference_likes: i64) -> FanRecord {
        let now = Utc::now().naive_utc();
        FanRecord {
            fid: Fid(fid),
            username: format!("user{fid}"),
            points: 0,
            likes_count: reference_likes,
            markers: vec![marker],
            created_at: now,
            updated_at: now,
        }
    }

    fn marker(hash: &str, likes: i64, recasts: i64, age_hours: i64) -> CastMarker {
        CastMarker {
            cast_hash: hash.to_string(),
            likes_count: likes,
            recasts_count: recasts,
            username: String::new(),
            scored_at: (Utc::now() - Duration::hours(age_hours)).naive_utc(),
        }
    }

    #[test]
    fn first_sighting_awards_author_and_every_reactor() {
        let cast = cast(
            "0xabc",
            1,
            vec![reaction(2, "u2"), reaction(3, "u3")],
            vec![reaction(4, "u4")],
        );

        let score = score(&cast, None, Utc::now(), &POLICY).unwrap();

        assert_eq!(score.outcome, ScoreOutcome::FirstSeen);
        assert_eq!(score.author_delta, 100 + 20 + 20);
        assert_eq!(score.reactor_deltas.len(), 3);
        assert_eq!(score.reactor_deltas[&Fid(2)].points, 10);
        assert_eq!(score.reactor_deltas[&Fid(3)].points, 10);
        assert_eq!(score.reactor_deltas[&Fid(4)].points, 20);

        let marker = score.marker.expect("first sighting writes a marker");
        assert_eq!(marker.cast_hash, "0xabc");
        assert_eq!(marker.likes_count, 2);
        assert_eq!(marker.recasts_count, 1);
        assert_eq!(score.reference_likes, Some(2));
    }

    #[test]
    fn repeat_inside_the_window_is_a_no_op() {
        let cast = cast("0xabc", 1, vec![reaction(2, "u2")], vec![]);
        let state = state_with_marker(1, marker("0xabc", 1, 0, 2), 1);

        let score = score(&cast, Some(&state), Utc::now(), &POLICY).unwrap();

        assert_eq!(score.outcome, ScoreOutcome::Deduped);
        assert_eq!(score.author_delta, 0);
        assert!(score.reactor_deltas.is_empty());
        assert!(score.marker.is_none());
        assert!(score.reference_likes.is_none());
    }

    #[test]
    fn recompute_awards_exactly_the_like_growth() {
        // likes went 5 -> 12 across the window: +7 likes, nothing more
        let likes: Vec<Reaction> = (10..22).map(|fid| reaction(fid, "liker")).collect();
        let cast = cast("0xabc", 1, likes, vec![]);
        let state = state_with_marker(1, marker("0xabc", 5, 0, 25), 5);

        let score = score(&cast, Some(&state), Utc::now(), &POLICY).unwrap();

        assert_eq!(score.outcome, ScoreOutcome::Recomputed);
        assert_eq!(score.author_delta, 7 * 10);
        assert!(score.reactor_deltas.is_empty());
        assert_eq!(score.reference_likes, Some(12));
        assert_eq!(score.marker.unwrap().likes_count, 12);
    }

    #[test]
    fn recompute_re_awards_recasts_in_full() {
        let cast = cast(
            "0xabc",
            1,
            vec![],
            vec![reaction(4, "u4"), reaction(5, "u5")],
        );
        let state = state_with_marker(1, marker("0xabc", 0, 2, 25), 0);

        let score = score(&cast, Some(&state), Utc::now(), &POLICY).unwrap();

        assert_eq!(score.outcome, ScoreOutcome::Recomputed);
        assert_eq!(score.author_delta, 2 * 20);
    }

    #[test]
    fn shrinking_like_count_clamps_to_zero() {
        let cast = cast("0xabc", 1, vec![reaction(2, "u2")], vec![]);
        let state = state_with_marker(1, marker("0xabc", 5, 0, 25), 5);

        let score = score(&cast, Some(&state), Utc::now(), &POLICY).unwrap();

        assert_eq!(score.author_delta, 0);
        assert_eq!(score.reference_likes, Some(1));
    }

    #[test]
    fn fan_out_yields_one_entry_per_distinct_reactor() {
        let cast = cast(
            "0xabc",
            1,
            vec![reaction(2, "u2"), reaction(3, "u3"), reaction(4, "u4")],
            vec![reaction(5, "u5"), reaction(6, "u6")],
        );

        let score = score(&cast, None, Utc::now(), &POLICY).unwrap();

        assert_eq!(score.reactor_deltas.len(), 5);
        for fid in [2, 3, 4] {
            assert_eq!(score.reactor_deltas[&Fid(fid)].points, 10);
        }
        for fid in [5, 6] {
            assert_eq!(score.reactor_deltas[&Fid(fid)].points, 20);
        }
    }

    #[test]
    fn duplicate_reactor_in_one_list_counts_once() {
        let cast = cast(
            "0xabc",
            1,
            vec![reaction(2, "u2"), reaction(2, "u2")],
            vec![],
        );

        let score = score(&cast, None, Utc::now(), &POLICY).unwrap();

        assert_eq!(score.reactor_deltas[&Fid(2)].points, 10);
        // the author award still counts the raw list length
        assert_eq!(score.author_delta, 100 + 2 * 10);
    }

    #[test]
    fn liking_and_recasting_sums_into_one_entry() {
        let cast = cast(
            "0xabc",
            1,
            vec![reaction(2, "u2")],
            vec![reaction(2, "u2")],
        );

        let score = score(&cast, None, Utc::now(), &POLICY).unwrap();

        assert_eq!(score.reactor_deltas.len(), 1);
        assert_eq!(score.reactor_deltas[&Fid(2)].points, 10 + 20);
    }

    #[test]
    fn author_reacting_to_their_own_cast_earns_once() {
        let cast = cast("0xabc", 1, vec![reaction(1, "user1")], vec![]);

        let score = score(&cast, None, Utc::now(), &POLICY).unwrap();

        // the self-like is inside the author's like count, not the fan-out
        assert_eq!(score.author_delta, 100 + 10);
        assert!(score.reactor_deltas.is_empty());
    }

    #[test]
    fn missing_author_is_malformed() {
        let mut bad = cast("0xabc", 1, vec![], vec![]);
        bad.author = None;

        assert!(matches!(
            score(&bad, None, Utc::now(), &POLICY),
            Err(ScoreErr::MalformedCast { .. })
        ));
    }

    #[test]
    fn zero_fid_author_is_malformed() {
        let bad = cast("0xabc", 0, vec![], vec![]);

        assert!(matches!(
            score(&bad, None, Utc::now(), &POLICY),
            Err(ScoreErr::MalformedCast { .. })
        ));
    }

    #[test]
    fn empty_hash_is_malformed() {
        let bad = cast("", 1, vec![], vec![]);

        assert!(matches!(
            score(&bad, None, Utc::now(), &POLICY),
            Err(ScoreErr::MalformedCast { .. })
        ));
    }

    #[test]
    fn recompute_tracks_growth_across_the_authors_other_casts() {
        // two processed casts; only this one grew, so the aggregate moves
        // by exactly this cast's growth
        let now = Utc::now().naive_utc();
        let state = FanRecord {
            fid: Fid(1),
            username: "user1".to_string(),
            points: 0,
            likes_count: 8,
            markers: vec![marker("0xabc", 5, 0, 25), marker("0xdef", 3, 0, 25)],
            created_at: now,
            updated_at: now,
        };

        let likes: Vec<Reaction> = (10..16).map(|fid| reaction(fid, "liker")).collect();
        let cast = cast("0xabc", 1, likes, vec![]);

        let score = score(&cast, Some(&state), Utc::now(), &POLICY).unwrap();

        // aggregate 3 + 6 = 9 against a reference of 8
        assert_eq!(score.author_delta, 10);
        assert_eq!(score.reference_likes, Some(9));
    }
}
