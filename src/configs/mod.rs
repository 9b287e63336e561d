use deadpool_redis::Runtime;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

use crate::{api::error, ENV};

pub async fn connect_database() -> Result<PgPool, error::SystemError> {
    let database_url = &ENV.database_url;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .min_connections(1)
        .acquire_slow_threshold(Duration::from_secs(3))
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    log::info!("Database migrations applied");

    Ok(pool)
}

pub fn connect_redis() -> Result<deadpool_redis::Pool, error::SystemError> {
    let mut cfg = deadpool_redis::Config::from_url(&ENV.redis_url);
    cfg.pool = Some(deadpool_redis::PoolConfig { max_size: 16, ..Default::default() });
    let pool = cfg.create_pool(Some(Runtime::Tokio1))?;
    Ok(pool)
}

/// HTTP client dùng chung cho profile / notification service
pub fn http_client() -> Result<reqwest::Client, error::SystemError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(ENV.service_timeout_secs))
        .build()?;
    Ok(client)
}
