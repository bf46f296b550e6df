use config::Config;
use log::{info, warn};
use redis::aio::MultiplexedConnection;
use redis::RedisError;
use tokio::time::{sleep, Duration};

pub mod config;
pub mod logging;

/// Upper bound for the delay between two connection attempts.
const MAX_CONNECT_DELAY: Duration = Duration::from_secs(30);

/// Connect to the Redis instance backing the session store.
///
/// Makes up to `redis_connect_attempts` attempts (at least one), sleeping 1s, 2s,
/// 4s, ... between them, and returns the last error when every attempt fails.
pub async fn init_session_store(config: &Config) -> Result<MultiplexedConnection, RedisError> {
    let attempts = config.redis_connect_attempts.max(1);
    let client = redis::Client::open(config.redis_url())?;

    let mut attempt = 0;
    loop {
        info!(
            "Connecting to Redis at {}:{} (attempt {}/{})",
            config.redis_host,
            config.redis_port,
            attempt + 1,
            attempts
        );

        match connect(&client).await {
            Ok(connection) => return Ok(connection),
            Err(e) if attempt + 1 < attempts => {
                let delay = connect_delay(attempt);
                warn!("Redis connection failed: {e}; retrying in {delay:?}");
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

async fn connect(client: &redis::Client) -> Result<MultiplexedConnection, RedisError> {
    let mut connection = client.get_multiplexed_async_connection().await?;
    redis::cmd("PING")
        .query_async::<String>(&mut connection)
        .await?;
    Ok(connection)
}

/// Exponential backoff delay before attempt `n_attempts + 1`.
fn connect_delay(n_attempts: u32) -> Duration {
    let delay = Duration::from_secs(1).as_secs_f64() * 2_f64.powi(n_attempts as i32);
    Duration::from_secs_f64(delay.min(MAX_CONNECT_DELAY.as_secs_f64()))
}
