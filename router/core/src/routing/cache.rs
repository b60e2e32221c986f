//! Policy Cache
//!
//! Memoizes the last policy that parsed successfully. Every `get()` performs a
//! fresh point read against the source; freshness is whatever the sidecar
//! serves. The cached entry only matters when a read fails:
//!
//! ```text
//! read ok + parse ok   -> replace entry, return it
//! read/parse failure   -> entry exists?  yes: serve it (stale)
//!                                        no:  fail the request
//! ```
//!
//! A failed parse never touches the entry.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, warn};

use super::policy::SelectionPolicy;
use crate::error::RouterError;
use crate::source::PolicySource;

/// The last successfully parsed policy and when it was read
#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub policy: Arc<SelectionPolicy>,
    pub fetched_at: DateTime<Utc>,
}

/// Read-through cache in front of a [`PolicySource`]
pub struct ConfigCache<S> {
    source: S,
    entry: RwLock<Option<CacheEntry>>,
}

impl<S: PolicySource> ConfigCache<S> {
    /// Create an empty cache over `source`
    pub fn new(source: S) -> Self {
        Self {
            source,
            entry: RwLock::new(None),
        }
    }

    /// Get the current policy
    ///
    /// # Errors
    ///
    /// Returns `ConfigUnavailable` or `ConfigMalformed` only when the read
    /// fails and no policy has ever been loaded.
    pub async fn get(&self) -> Result<Arc<SelectionPolicy>, RouterError> {
        let fetched = self
            .source
            .fetch()
            .await
            .and_then(|bytes| SelectionPolicy::from_json(&bytes));

        match fetched {
            Ok(policy) => {
                let policy = Arc::new(policy);
                let entry = CacheEntry {
                    policy: Arc::clone(&policy),
                    fetched_at: Utc::now(),
                };
                *self.entry.write() = Some(entry);
                debug!(primary = %policy.primary_model, "Policy refreshed");
                Ok(policy)
            }
            Err(err) => match self.snapshot() {
                Some(entry) => {
                    warn!(
                        error = %err,
                        source = %self.source.describe(),
                        fetched_at = %entry.fetched_at,
                        "Policy read failed, serving last known policy"
                    );
                    Ok(entry.policy)
                }
                None => Err(err),
            },
        }
    }

    /// The cached entry, if any policy has been loaded
    #[must_use]
    pub fn snapshot(&self) -> Option<CacheEntry> {
        self.entry.read().clone()
    }

    /// Whether a policy has been loaded at least once
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.entry.read().is_some()
    }

    /// The underlying source
    pub fn source(&self) -> &S {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Source that replays scripted responses in order
    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<&'static str, RouterError>>>,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<&'static str, RouterError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
            }
        }
    }

    #[async_trait]
    impl PolicySource for ScriptedSource {
        fn describe(&self) -> String {
            "scripted".to_string()
        }

        async fn fetch(&self) -> Result<Bytes, RouterError> {
            self.responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(RouterError::ConfigUnavailable("script exhausted".into())))
                .map(|doc| Bytes::from_static(doc.as_bytes()))
        }
    }

    #[tokio::test]
    async fn test_first_fetch_unavailable_fails() {
        let cache = ConfigCache::new(ScriptedSource::new(vec![Err(
            RouterError::ConfigUnavailable("connection refused".into()),
        )]));

        let err = cache.get().await.unwrap_err();
        assert_eq!(err.kind(), "config_unavailable");
        assert!(!cache.is_loaded());
    }

    #[tokio::test]
    async fn test_first_fetch_malformed_fails() {
        let cache = ConfigCache::new(ScriptedSource::new(vec![Ok("{not json")]));

        let err = cache.get().await.unwrap_err();
        assert_eq!(err.kind(), "config_malformed");
        assert!(cache.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_every_get_rereads_source() {
        let cache = ConfigCache::new(ScriptedSource::new(vec![
            Ok(r#"{"primary_model": "m-1"}"#),
            Ok(r#"{"primary_model": "m-2"}"#),
        ]));

        assert_eq!(cache.get().await.unwrap().primary_model, "m-1");
        assert_eq!(cache.get().await.unwrap().primary_model, "m-2");
        assert_eq!(cache.snapshot().unwrap().policy.primary_model, "m-2");
    }

    #[tokio::test]
    async fn test_malformed_refresh_keeps_last_good_policy() {
        let cache = ConfigCache::new(ScriptedSource::new(vec![
            Ok(r#"{"primary_model": "m-good"}"#),
            Ok(r#"{"primary_model": ""}"#),
        ]));

        cache.get().await.unwrap();
        let before = cache.snapshot().unwrap().fetched_at;

        let policy = cache.get().await.unwrap();
        assert_eq!(policy.primary_model, "m-good");
        assert_eq!(cache.snapshot().unwrap().fetched_at, before);
    }

    #[tokio::test]
    async fn test_unavailable_refresh_serves_cached_policy() {
        let cache = ConfigCache::new(ScriptedSource::new(vec![
            Ok(r#"{"primary_model": "m-good", "use_case_models": {"a": "m-a"}}"#),
            Err(RouterError::ConfigUnavailable("timeout".into())),
        ]));

        cache.get().await.unwrap();
        let policy = cache.get().await.unwrap();
        assert_eq!(policy.use_case_models.get("a").map(String::as_str), Some("m-a"));
    }
}
