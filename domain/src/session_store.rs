//! Redis-backed session storage.
//!
//! Each session is one Redis hash. Writes replace the hash and its TTL in a single
//! `MULTI`/`EXEC` transaction, so readers see either the old record or the new one.

use std::time::Duration;

use async_trait::async_trait;
use federation_auth::error::{storage_error, Error, StorageErrorKind};
use federation_auth::session::{flatten_fields, Record, SessionStore};
use log::*;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde_json::{Map, Value};

/// Session store on a shared multiplexed Redis connection.
#[derive(Clone)]
pub struct RedisSessionStore {
    connection: MultiplexedConnection,
}

impl RedisSessionStore {
    pub fn new(connection: MultiplexedConnection) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn put(
        &self,
        key: &str,
        fields: &Map<String, Value>,
        ttl: Duration,
    ) -> Result<(), Error> {
        let items = flatten_fields(fields)?;
        let mut connection = self.connection.clone();

        let mut pipe = redis::pipe();
        pipe.atomic().del(key).ignore();
        if !items.is_empty() {
            pipe.hset_multiple(key, items.as_slice())
                .ignore()
                .expire(key, ttl_seconds(ttl))
                .ignore();
        }

        pipe.query_async::<()>(&mut connection)
            .await
            .map_err(redis_error)?;
        debug!("Stored {} session fields with ttl {:?}", items.len(), ttl);
        Ok(())
    }

    async fn get_all(&self, key: &str) -> Result<Record, Error> {
        let mut connection = self.connection.clone();
        connection.hgetall(key).await.map_err(redis_error)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, Error> {
        let mut connection = self.connection.clone();
        let seconds: i64 = connection.ttl(key).await.map_err(redis_error)?;
        Ok(remaining_ttl(seconds))
    }
}

/// Whole seconds for `EXPIRE`; sub-second TTLs round up to one second.
fn ttl_seconds(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX).max(1)
}

/// Convert a `TTL` reply; negative replies mean no such key (-2) or no expiry (-1).
fn remaining_ttl(seconds: i64) -> Option<Duration> {
    u64::try_from(seconds).ok().map(Duration::from_secs)
}

fn redis_error(err: redis::RedisError) -> Error {
    warn!("Session store error: {err}");
    storage_error(StorageErrorKind::Connection, &err.to_string())
}
