//! Grantor expiry sweeper runtime.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use grantor_application::{
    Clock, DecisionCache, GrantService, RevocationService, SystemClock,
};
use grantor_core::{AppError, AppResult};
use grantor_infrastructure::{
    InMemoryDecisionCache, PostgresGrantStore, RedisDecisionCache, TracingEventSink,
};

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct SweeperConfig {
    database_url: String,
    redis_url: Option<String>,
    cache_key_prefix: String,
    batch_limit: usize,
    poll_interval_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = SweeperConfig::load()?;
    let pool = connect_pool(config.database_url.as_str()).await?;
    let revocation = build_revocation_service(pool, &config)?;

    info!(
        batch_limit = config.batch_limit,
        poll_interval_ms = config.poll_interval_ms,
        redis_cache = config.redis_url.is_some(),
        "grantor-sweeper started"
    );

    loop {
        match revocation.sweep_expired(config.batch_limit).await {
            Ok(outcome) => {
                if outcome.expired > 0 || outcome.cascaded > 0 {
                    info!(
                        expired = outcome.expired,
                        cascaded = outcome.cascaded,
                        "expiry sweep completed"
                    );
                }
            }
            Err(error) => {
                warn!(error = %error, "expiry sweep failed");
            }
        }

        tokio::time::sleep(Duration::from_millis(config.poll_interval_ms)).await;
    }
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    Ok(pool)
}

fn build_revocation_service(pool: PgPool, config: &SweeperConfig) -> AppResult<RevocationService> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(PostgresGrantStore::new(pool));
    let cache = build_decision_cache(config, clock.clone())?;
    let events = Arc::new(TracingEventSink::new());
    let grants = GrantService::new(store, clock.clone());

    Ok(RevocationService::new(grants, cache, events, clock))
}

fn build_decision_cache(
    config: &SweeperConfig,
    clock: Arc<dyn Clock>,
) -> AppResult<Arc<dyn DecisionCache>> {
    match config.redis_url.as_deref() {
        Some(redis_url) => {
            let client = redis::Client::open(redis_url).map_err(|error| {
                AppError::Validation(format!("invalid REDIS_URL value: {error}"))
            })?;
            Ok(Arc::new(RedisDecisionCache::new(
                client,
                config.cache_key_prefix.clone(),
                clock,
            )))
        }
        None => {
            // Without a shared cache the invalidations stay process-local;
            // entries elsewhere still lapse at their deny/allow TTL.
            warn!("REDIS_URL is not set, sweeping without shared cache invalidation");
            Ok(Arc::new(InMemoryDecisionCache::new(clock)))
        }
    }
}

impl SweeperConfig {
    fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let redis_url = env::var("REDIS_URL")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());
        let cache_key_prefix =
            env::var("CACHE_KEY_PREFIX").unwrap_or_else(|_| "grantor".to_owned());
        let batch_limit = parse_env_usize("SWEEPER_BATCH_LIMIT", 100)?;
        let poll_interval_ms = parse_env_u64("SWEEPER_POLL_INTERVAL_MS", 30_000)?;

        if batch_limit == 0 {
            return Err(AppError::Validation(
                "SWEEPER_BATCH_LIMIT must be greater than zero".to_owned(),
            ));
        }

        if poll_interval_ms == 0 {
            return Err(AppError::Validation(
                "SWEEPER_POLL_INTERVAL_MS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            redis_url,
            cache_key_prefix,
            batch_limit,
            poll_interval_ms,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn parse_env_usize(name: &str, default: usize) -> AppResult<usize> {
    match env::var(name) {
        Ok(value) => value.parse::<usize>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(value) => value.parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}
