use std::sync::LazyLock;

use thiserror::Error;
use tokio::sync::OnceCell;

static ENV_VARS: LazyLock<OnceCell<Env>> = LazyLock::new(OnceCell::new);
pub async fn get_var(var: Var) -> EnvResult<&'static str> {
    let vars = ENV_VARS.get_or_try_init(|| async { Env::new() }).await?;
    Ok(match var {
        Var::NeynarApiKey => &vars.neynar_api_key,
        Var::ChannelId => &vars.channel_id,
        Var::DatabaseUrl => &vars.database_url,
        Var::RedisUrl => &vars.redis_url,
        Var::ServerApiPort => &vars.server_api_port,
        Var::PointsCast => &vars.points_cast,
        Var::PointsLike => &vars.points_like,
        Var::PointsRecast => &vars.points_recast,
        Var::SyncIntervalSecs => &vars.sync_interval_secs,
        Var::FeedPageLimit => &vars.feed_page_limit,
        Var::OtelExporterEndpoint => &vars.otel_exporter_otlp_endpoint,
        Var::ApiServiceName => &vars.api_service_name,
        Var::ApiTracerName => &vars.api_tracer_name,
    })
}

/// Process environment, loaded once through `dotenvy` so a local `.env` file
/// and the real environment are treated the same way.
#[derive(Debug, Clone)]
pub struct Env {
    pub neynar_api_key: String,
    pub channel_id: String,
    pub database_url: String,
    pub redis_url: String,
    pub server_api_port: String,
    pub points_cast: String,
    pub points_like: String,
    pub points_recast: String,
    pub sync_interval_secs: String,
    pub feed_page_limit: String,
    pub otel_exporter_otlp_endpoint: String,
    pub api_service_name: String,
    pub api_tracer_name: String,
}

impl Env {
    pub fn new() -> EnvResult<Self> {
        Ok(Self {
            neynar_api_key: required("NEYNAR_API_KEY")?,
            channel_id: required("CHANNEL_ID")?,
            database_url: required("DATABASE_URL")?,
            redis_url: required("REDIS_URL")?,
            server_api_port: required("SERVER_API_PORT")?,
            points_cast: optional("POINTS_CAST", "169")?,
            points_like: optional("POINTS_LIKE", "10")?,
            points_recast: optional("POINTS_RECAST", "40")?,
            sync_interval_secs: optional("SYNC_INTERVAL_SECS", "900")?,
            feed_page_limit: optional("FEED_PAGE_LIMIT", "100")?,
            otel_exporter_otlp_endpoint: required("OTEL_EXPORTER_OTLP_ENDPOINT")?,
            api_service_name: required("API_SERVICE_NAME")?,
            api_tracer_name: required("API_TRACER_NAME")?,
        })
    }
}

fn required(key: &'static str) -> EnvResult<String> {
    match dotenvy::var(key) {
        Ok(val) => Ok(val),
        Err(dotenvy::Error::EnvVar(std::env::VarError::NotPresent)) => {
            Err(EnvErr::MissingValue(key))
        }
        Err(e) => Err(e.into()),
    }
}

fn optional(key: &'static str, default: &str) -> EnvResult<String> {
    match required(key) {
        Ok(val) => Ok(val),
        Err(EnvErr::MissingValue(_)) => Ok(default.to_string()),
        Err(e) => Err(e),
    }
}

/// Parses a var that carries a numeric value, keeping the offending key and
/// value in the error when the parse fails.
pub async fn get_parsed<T>(var: Var) -> EnvResult<T>
where
    T: std::str::FromStr,
{
    let key = var.key();
    let raw = get_var(var).await?;
    raw.parse::<T>().map_err(|_| EnvErr::InvalidValue {
        key,
        value: raw.to_string(),
    })
}

#[derive(Debug, Clone, Copy)]
pub enum Var {
    NeynarApiKey,
    ChannelId,
    DatabaseUrl,
    RedisUrl,
    ServerApiPort,
    PointsCast,
    PointsLike,
    PointsRecast,
    SyncIntervalSecs,
    FeedPageLimit,
    OtelExporterEndpoint,
    ApiServiceName,
    ApiTracerName,
}

impl Var {
    pub const fn key(&self) -> &'static str {
        match self {
            Var::NeynarApiKey => "NEYNAR_API_KEY",
            Var::ChannelId => "CHANNEL_ID",
            Var::DatabaseUrl => "DATABASE_URL",
            Var::RedisUrl => "REDIS_URL",
            Var::ServerApiPort => "SERVER_API_PORT",
            Var::PointsCast => "POINTS_CAST",
            Var::PointsLike => "POINTS_LIKE",
            Var::PointsRecast => "POINTS_RECAST",
            Var::SyncIntervalSecs => "SYNC_INTERVAL_SECS",
            Var::FeedPageLimit => "FEED_PAGE_LIMIT",
            Var::OtelExporterEndpoint => "OTEL_EXPORTER_OTLP_ENDPOINT",
            Var::ApiServiceName => "API_SERVICE_NAME",
            Var::ApiTracerName => "API_TRACER_NAME",
        }
    }
}

#[macro_export]
macro_rules! var {
    ($ev:expr) => {
        $crate::util::env::get_var($ev)
    };
}

pub type EnvResult<T> = core::result::Result<T, EnvErr>;

#[derive(Debug, Error)]
pub enum EnvErr {
    #[error(transparent)]
    Dotenvy(#[from] dotenvy::Error),

    #[error("missing required environment variable '{0}'")]
    MissingValue(&'static str),

    #[error("invalid value '{value}' for environment variable '{key}'")]
    InvalidValue { key: &'static str, value: String },
}
