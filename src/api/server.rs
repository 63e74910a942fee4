use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{MatchedPath, Request};
use axum::middleware::{Next, from_fn};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use http::StatusCode;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::instrument;

use crate::api::handler::*;
use crate::db::prelude::*;
use crate::db::redis::redis_pool::RedisErr;
use crate::util::env::{self, EnvErr, Var};

pub type JsonResult<T> = core::result::Result<Json<T>, RouteError>;
pub type RouteResult<T> = core::result::Result<T, RouteError>;

#[derive(Clone)]
pub struct AppState {
    pub store: PgFanStore,
    pub cache: LeaderboardCache,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { Response::new(Body::empty()) }))
        //
        // leaderboard + per-fan lookups
        .route("/leaderboard", get(leaderboard))
        .route("/fan/by-fid/{fid}", get(fan_by_fid))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                let method = req.method();
                let uri = req.uri();

                let matched_path = req
                    .extensions()
                    .get::<MatchedPath>()
                    .map(|matched| matched.as_str());

                tracing::debug_span!("api_request", ?method, ?uri, ?matched_path)
            }),
        )
        .layer(from_fn(log_route_errors))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Surfaces handler errors in the trace stream; the response itself only
/// carries the message.
#[instrument(skip(request, next), fields(uri = request.uri().to_string()))]
async fn log_route_errors(request: Request, next: Next) -> Response {
    let res = next.run(request).await;
    if let Some(err) = res.extensions().get::<Arc<RouteError>>() {
        tracing::error!(error = ?err, "error occurred inside route handler");
    }

    res
}

#[instrument]
pub async fn start_server() -> RouteResult<JoinHandle<()>> {
    let state = Arc::new(AppState {
        store: PgFanStore::new(db_pool().await?),
        cache: LeaderboardCache::from_env().await?,
    });

    let app = router(state);

    let port = env::get_parsed::<u16>(Var::ServerApiPort).await?;
    let socket_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), port);
    let listener = tokio::net::TcpListener::bind(socket_addr).await?;

    tracing::info!(
        server_url = %format!("http://127.0.0.1:{port}"),
        "server ready"
    );

    Ok(tokio::task::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = ?e, "api server exited");
        }
    }))
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error(transparent)]
    Store(#[from] StoreErr),

    #[error(transparent)]
    Cache(#[from] RedisErr),

    #[error(transparent)]
    Env(#[from] EnvErr),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("no fan with fid '{0}'")]
    UnknownFan(i64),
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            message: String,
        }

        let (status, message) = match &self {
            RouteError::UnknownFan(fid) => {
                (StatusCode::NOT_FOUND, format!("no fan with fid '{fid}'"))
            }

            RouteError::Store(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),

            RouteError::Cache(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),

            RouteError::Env(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),

            RouteError::Io(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        };

        let mut res = (status, Json(ErrorResponse { message })).into_response();
        res.extensions_mut().insert(Arc::new(self));

        res
    }
}
