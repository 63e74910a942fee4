pub mod policy;
pub mod reconciler;
pub mod scorer;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory doubles for the store and feed seams.

    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{Duration, Utc};

    use crate::db::models::fan::{Fid, FanRecord, FanRow, LeaderboardEntry};
    use crate::db::models::marker::CastMarker;
    use crate::db::repositories::fan::FanStore;
    use crate::db::{StoreErr, StoreResult};
    use crate::feed::types::{Cast, CastAuthor, FeedPage, NextCursor, Reaction, Reactions};
    use crate::feed::{FeedResult, FeedSource};

    #[derive(Debug, Default)]
    pub struct MemFan {
        pub username: String,
        pub points: i64,
        pub likes_count: i64,
        pub markers: HashMap<String, CastMarker>,
    }

    /// Hash-map store with the same upsert semantics as the postgres
    /// implementation. `fail_writes_for` poisons a fid so store-failure
    /// paths can be exercised.
    #[derive(Clone, Default)]
    pub struct MemoryStore {
        inner: Arc<Mutex<HashMap<i64, MemFan>>>,
        failing: Arc<Mutex<Vec<i64>>>,
    }

    impl MemoryStore {
        pub fn fail_writes_for(&self, fid: i64) {
            self.failing.lock().unwrap().push(fid);
        }

        pub fn points_of(&self, fid: i64) -> Option<i64> {
            self.inner.lock().unwrap().get(&fid).map(|fan| fan.points)
        }

        pub fn marker_count(&self, fid: i64) -> usize {
            self.inner
                .lock()
                .unwrap()
                .get(&fid)
                .map(|fan| fan.markers.len())
                .unwrap_or(0)
        }

        /// Backdate every marker of a fid by `hours`, to step over the
        /// rescore window in tests.
        pub fn age_markers(&self, fid: i64, hours: i64) {
            if let Some(fan) = self.inner.lock().unwrap().get_mut(&fid) {
                for marker in fan.markers.values_mut() {
                    marker.scored_at -= Duration::hours(hours);
                }
            }
        }

        fn check_writable(&self, fid: i64) -> StoreResult<()> {
            if self.failing.lock().unwrap().contains(&fid) {
                return Err(StoreErr::Sqlx(sqlx::Error::PoolClosed));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl FanStore for MemoryStore {
        async fn find_by_fid(&self, fid: &Fid) -> StoreResult<Option<FanRecord>> {
            let now = Utc::now().naive_utc();
            Ok(self.inner.lock().unwrap().get(&fid.0).map(|fan| FanRecord {
                fid: *fid,
                username: fan.username.clone(),
                points: fan.points,
                likes_count: fan.likes_count,
                markers: fan.markers.values().cloned().collect(),
                created_at: now,
                updated_at: now,
            }))
        }

        async fn increment_points(
            &self,
            fid: &Fid,
            username: &str,
            amount: i64,
        ) -> StoreResult<i64> {
            self.check_writable(fid.0)?;
            let mut inner = self.inner.lock().unwrap();
            let fan = inner.entry(fid.0).or_default();
            fan.points += amount;
            fan.username = username.to_string();
            Ok(fan.points)
        }

        async fn upsert_marker(&self, fid: &Fid, marker: &CastMarker) -> StoreResult<()> {
            self.check_writable(fid.0)?;
            let mut inner = self.inner.lock().unwrap();
            let fan = inner.entry(fid.0).or_default();
            fan.markers
                .insert(marker.cast_hash.clone(), marker.clone());
            Ok(())
        }

        async fn set_reference_likes(&self, fid: &Fid, likes: i64) -> StoreResult<()> {
            self.check_writable(fid.0)?;
            let mut inner = self.inner.lock().unwrap();
            let fan = inner.entry(fid.0).or_default();
            fan.likes_count = likes;
            Ok(())
        }

        async fn leaderboard(
            &self,
            limit: i64,
            offset: i64,
        ) -> StoreResult<Vec<LeaderboardEntry>> {
            let inner = self.inner.lock().unwrap();
            let mut ranked: Vec<(i64, &MemFan)> =
                inner.iter().map(|(fid, fan)| (*fid, fan)).collect();
            ranked.sort_by(|a, b| b.1.points.cmp(&a.1.points));

            Ok(ranked
                .into_iter()
                .enumerate()
                .skip(offset as usize)
                .take(limit as usize)
                .map(|(idx, (fid, fan))| LeaderboardEntry {
                    fid: Fid(fid),
                    username: fan.username.clone(),
                    points: fan.points,
                    ranking: idx as i64 + 1,
                })
                .collect())
        }

        async fn profiles(&self, fids: &[Fid]) -> StoreResult<Vec<FanRow>> {
            let now = Utc::now().naive_utc();
            let inner = self.inner.lock().unwrap();
            Ok(fids
                .iter()
                .filter_map(|fid| {
                    inner.get(&fid.0).map(|fan| FanRow {
                        fid: *fid,
                        username: fan.username.clone(),
                        points: fan.points,
                        likes_count: fan.likes_count,
                        created_at: now,
                        updated_at: now,
                    })
                })
                .collect())
        }

        async fn count(&self) -> StoreResult<i64> {
            Ok(self.inner.lock().unwrap().len() as i64)
        }
    }

    /// Feed that serves a scripted sequence of pages across traversals.
    pub struct PageFeed {
        pages: Mutex<VecDeque<FeedResult<FeedPage>>>,
    }

    impl PageFeed {
        pub fn new(pages: Vec<FeedResult<FeedPage>>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
            }
        }
    }

    #[async_trait]
    impl FeedSource for PageFeed {
        async fn fetch_page(&self, _cursor: Option<&str>) -> FeedResult<FeedPage> {
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .expect("sync fetched past the scripted feed")
        }
    }

    pub fn reaction(fid: i64, fname: &str) -> Reaction {
        Reaction {
            fid,
            fname: fname.to_string(),
        }
    }

    pub fn cast(hash: &str, author_fid: i64, likes: Vec<Reaction>, recasts: Vec<Reaction>) -> Cast {
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

    pub fn page(casts: Vec<Cast>, next: Option<&str>) -> FeedPage {
        FeedPage {
            casts,
            next: NextCursor {
                cursor: next.map(str::to_owned),
            },
        }
    }
}
