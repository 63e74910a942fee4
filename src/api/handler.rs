use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::{Json, debug_handler};
use tracing::instrument;

use crate::api::server::{AppState, JsonResult, RouteError};
use crate::db::models::fan::{Fid, FanRecord, LeaderboardEntry};
use crate::db::models::{PaginatedResponse, Pagination};
use crate::db::repositories::fan::FanStore;

#[instrument(skip(state))]
pub async fn leaderboard(
    Query(param): Query<Pagination>,
    State(state): State<Arc<AppState>>,
) -> JsonResult<PaginatedResponse<LeaderboardEntry>> {
    let limit = param.limit.max(1);
    let offset = param.page * limit;

    let total_items = state.store.count().await?;

    let items = match state.cache.top(limit, offset).await {
        Ok(ranked) if !ranked.is_empty() => hydrate_rankings(&state, ranked, offset).await?,

        // cold cache: postgres carries the ranking
        Ok(_) => state.store.leaderboard(limit, offset).await?,

        Err(e) => {
            tracing::warn!(error = ?e, "leaderboard cache unavailable, serving from postgres");
            state.store.leaderboard(limit, offset).await?
        }
    };

    Ok(Json(PaginatedResponse::new(
        items,
        total_items,
        limit,
        param.page + 1,
    )))
}

/// Joins the cached ranking against the fan table for display names.
async fn hydrate_rankings(
    state: &AppState,
    ranked: Vec<(Fid, i64)>,
    offset: i64,
) -> Result<Vec<LeaderboardEntry>, RouteError> {
    let fids: Vec<Fid> = ranked.iter().map(|(fid, _)| *fid).collect();
    let usernames: HashMap<Fid, String> = state
        .store
        .profiles(&fids)
        .await?
        .into_iter()
        .map(|row| (row.fid, row.username))
        .collect();

    Ok(ranked
        .into_iter()
        .enumerate()
        .map(|(idx, (fid, points))| LeaderboardEntry {
            fid,
            username: usernames.get(&fid).cloned().unwrap_or_default(),
            points,
            ranking: offset + idx as i64 + 1,
        })
        .collect())
}

#[instrument(skip(state))]
#[debug_handler]
pub async fn fan_by_fid(
    State(state): State<Arc<AppState>>,
    Path(fid): Path<i64>,
) -> JsonResult<FanRecord> {
    match state.store.find_by_fid(&Fid(fid)).await? {
        Some(record) => Ok(Json(record)),
        None => Err(RouteError::UnknownFan(fid)),
    }
}
