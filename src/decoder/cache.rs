//! Bounded token cache with live hit/miss accounting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::future::Cache;
use moka::Expiry;
use thiserror::Error;

use crate::decoder::{unix_now, DecodedToken};

/// Errors raised while sizing the cache.
#[derive(Debug, Error)]
pub enum CacheConfigError {
    #[error("max keys need to be a positive number, was {max_keys}")]
    InvalidCapacity { max_keys: i64 },

    #[error("key cost needs to be a positive number below {}, was {key_cost}", u32::MAX)]
    InvalidKeyCost { key_cost: i64 },

    #[error("cache budget of {max_keys} keys at cost {key_cost} overflows")]
    BudgetOverflow { max_keys: i64, key_cost: i64 },
}

/// Total admission budget: `max_keys × key_cost`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheBudget {
    key_cost: u32,
    max_cost: u64,
}

impl CacheBudget {
    pub fn new(max_keys: i64, key_cost: i64) -> Result<Self, CacheConfigError> {
        if max_keys < 1 {
            return Err(CacheConfigError::InvalidCapacity { max_keys });
        }
        let cost = u32::try_from(key_cost)
            .ok()
            .filter(|cost| *cost > 0)
            .ok_or(CacheConfigError::InvalidKeyCost { key_cost })?;
        let max_cost = max_keys
            .checked_mul(key_cost)
            .ok_or(CacheConfigError::BudgetOverflow { max_keys, key_cost })?;

        Ok(Self {
            key_cost: cost,
            max_cost: max_cost as u64,
        })
    }

    pub fn key_cost(&self) -> u32 {
        self.key_cost
    }

    pub fn max_cost(&self) -> u64 {
        self.max_cost
    }
}

/// Live lookup counters, shared with the metrics registry.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStats {
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Hits over total lookups; 0 before the first lookup.
    pub fn ratio(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            return 0.0;
        }
        hits as f64 / total as f64
    }

    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }
}

/// Evicts entries when their token expires.
struct TokenExpiry;

impl Expiry<String, Arc<DecodedToken>> for TokenExpiry {
    fn expire_after_create(
        &self,
        _token: &String,
        decoded: &Arc<DecodedToken>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(Duration::from_secs(decoded.expires_at.saturating_sub(unix_now())))
    }
}

/// Cost-bounded cache of decoded tokens keyed by the raw token.
#[derive(Clone)]
pub struct TokenCache {
    inner: Cache<String, Arc<DecodedToken>>,
    stats: Arc<CacheStats>,
}

impl TokenCache {
    pub fn new(budget: CacheBudget) -> Self {
        let key_cost = budget.key_cost();
        let inner = Cache::builder()
            .max_capacity(budget.max_cost())
            .weigher(move |_token: &String, _decoded: &Arc<DecodedToken>| key_cost)
            .expire_after(TokenExpiry)
            .build();

        Self {
            inner,
            stats: Arc::new(CacheStats::default()),
        }
    }

    /// Look up a token. Expired entries are dropped and count as misses.
    pub async fn get(&self, token: &str) -> Option<Arc<DecodedToken>> {
        match self.inner.get(token).await {
            Some(decoded) if !decoded.is_expired() => {
                self.stats.record_hit();
                Some(decoded)
            }
            Some(_) => {
                self.inner.invalidate(token).await;
                self.stats.record_miss();
                None
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    pub async fn insert(&self, token: String, decoded: Arc<DecodedToken>) {
        self.inner.insert(token, decoded).await;
    }

    /// Shared view of the lookup counters.
    pub fn stats(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn token(expires_at: u64) -> Arc<DecodedToken> {
        Arc::new(DecodedToken {
            headers: BTreeMap::from([("X-User".to_string(), "alice".to_string())]),
            expires_at,
            username: Some("alice".to_string()),
        })
    }

    #[test]
    fn test_budget_rejects_non_positive_keys() {
        for max_keys in [0, -5, i64::MIN] {
            assert!(matches!(
                CacheBudget::new(max_keys, 100),
                Err(CacheConfigError::InvalidCapacity { .. })
            ));
        }
    }

    #[test]
    fn test_budget_total_cost() {
        let budget = CacheBudget::new(10_000, 100).unwrap();
        assert_eq!(budget.max_cost(), 1_000_000);
        assert_eq!(budget.key_cost(), 100);

        assert!(matches!(
            CacheBudget::new(i64::MAX, 100),
            Err(CacheConfigError::BudgetOverflow { .. })
        ));
        assert!(matches!(
            CacheBudget::new(10, 0),
            Err(CacheConfigError::InvalidKeyCost { .. })
        ));
    }

    #[test]
    fn test_ratio_without_lookups() {
        assert_eq!(CacheStats::default().ratio(), 0.0);
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let cache = TokenCache::new(CacheBudget::new(10, 100).unwrap());
        let stats = cache.stats();

        assert!(cache.get("abc").await.is_none());
        let decoded = token(unix_now() + 3600);
        cache.insert("abc".to_string(), Arc::clone(&decoded)).await;
        assert_eq!(cache.get("abc").await, Some(decoded));

        assert_eq!(stats.misses(), 1);
        assert_eq!(stats.hits(), 1);
        assert_eq!(stats.ratio(), 0.5);
    }

    #[tokio::test]
    async fn test_expired_entry_is_a_miss() {
        let cache = TokenCache::new(CacheBudget::new(10, 100).unwrap());
        cache.insert("old".to_string(), token(1)).await;

        assert!(cache.get("old").await.is_none());
        assert_eq!(cache.stats().misses(), 1);
        assert_eq!(cache.stats().hits(), 0);
    }
}
