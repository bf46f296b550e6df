//! In-process session store with per-record expiry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use super::{flatten_fields, Record, SessionStore};
use crate::error::{storage_error, Error, StorageErrorKind};

#[derive(Debug, Clone)]
struct Entry {
    fields: Record,
    expires_at: DateTime<Utc>,
}

/// Session store backed by a mutex-guarded map.
///
/// Expired records are invisible to readers immediately and are physically dropped
/// by [`MemoryStore::cleanup_expired`]. Suitable for tests and single-process
/// development; records do not survive a restart.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired records.
    ///
    /// Should be called periodically to prevent memory leaks.
    pub fn cleanup_expired(&self) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        let now = Utc::now();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    /// Number of records held, expired or not.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn put(
        &self,
        key: &str,
        fields: &Map<String, Value>,
        ttl: Duration,
    ) -> Result<(), Error> {
        let flattened: Record = flatten_fields(fields)?.into_iter().collect();
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .ok_or_else(|| {
                storage_error(
                    StorageErrorKind::Serialization,
                    &format!("ttl {ttl:?} is out of range"),
                )
            })?;

        let mut entries = self.lock();
        if flattened.is_empty() {
            entries.remove(key);
            return Ok(());
        }
        entries.insert(
            key.to_string(),
            Entry {
                fields: flattened,
                expires_at,
            },
        );
        Ok(())
    }

    async fn get_all(&self, key: &str) -> Result<Record, Error> {
        let entries = self.lock();
        Ok(entries
            .get(key)
            .filter(|entry| entry.expires_at > Utc::now())
            .map(|entry| entry.fields.clone())
            .unwrap_or_default())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, Error> {
        let entries = self.lock();
        Ok(entries
            .get(key)
            .and_then(|entry| (entry.expires_at - Utc::now()).to_std().ok()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_put_then_get_all() {
        let store = MemoryStore::new();
        store
            .put(
                "abc",
                &fields(&[("csrf_token", json!("tok")), ("n", json!(3))]),
                Duration::from_secs(900),
            )
            .await
            .unwrap();

        let record = store.get_all("abc").await.unwrap();
        assert_eq!(record["csrf_token"], "tok");
        assert_eq!(record["n"], "3");
    }

    #[tokio::test]
    async fn test_missing_key_is_empty() {
        let store = MemoryStore::new();
        assert!(store.get_all("nope").await.unwrap().is_empty());
        assert_eq!(store.ttl("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_record_is_indistinguishable_from_missing() {
        let store = MemoryStore::new();
        store
            .put("abc", &fields(&[("a", json!("b"))]), Duration::ZERO)
            .await
            .unwrap();

        assert!(store.get_all("abc").await.unwrap().is_empty());
        assert_eq!(store.ttl("abc").await.unwrap(), None);
        assert_eq!(store.cleanup_expired(), 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_out_of_range_ttl_is_an_error() {
        let store = MemoryStore::new();
        let result = store
            .put("abc", &fields(&[("a", json!("b"))]), Duration::MAX)
            .await;

        assert!(matches!(
            result,
            Err(Error {
                error_kind: crate::error::ErrorKind::Storage(StorageErrorKind::Serialization),
                ..
            })
        ));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_put_replaces_record_and_resets_ttl() {
        let store = MemoryStore::new();
        store
            .put("abc", &fields(&[("csrf_token", json!("tok"))]), Duration::from_secs(900))
            .await
            .unwrap();
        store
            .put("abc", &fields(&[("sub", json!("fayda-123"))]), Duration::from_secs(86400))
            .await
            .unwrap();

        let record = store.get_all("abc").await.unwrap();
        assert_eq!(record.len(), 1);
        assert_eq!(record["sub"], "fayda-123");

        let ttl = store.ttl("abc").await.unwrap().unwrap();
        assert!(ttl > Duration::from_secs(86000));
        assert!(ttl <= Duration::from_secs(86400));
    }
}
