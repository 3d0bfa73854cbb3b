//! Per-analyzer signal cache.
//!
//! Entries are keyed by analyzer and normalized scope (canonical URL, host or
//! registrable domain) and expire after a per-entry TTL. Expired entries are
//! evicted lazily on lookup; [`SignalCache::spawn_sweeper`] optionally purges
//! them in the background as well.

use athlethia_core::{AnalyzerKind, CacheScope, NormalizedTarget, SignalResult, MAX_TTL_SECS};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Longest lifetime an entry can be given, whatever TTL is requested.
pub const MAX_TTL: Duration = Duration::from_secs(MAX_TTL_SECS);

/// Cache key: analyzer plus the normalized scope it was computed for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    analyzer: AnalyzerKind,
    scope: String,
}

impl CacheKey {
    /// Derive the key every writer and reader uses for a target.
    ///
    /// The scope must be the same input the analyzer computes its answer
    /// from, otherwise one host's result is served for another.
    #[must_use]
    pub fn for_target(analyzer: AnalyzerKind, target: &NormalizedTarget) -> Self {
        let scope = match analyzer.cache_scope() {
            CacheScope::Url => target.as_str(),
            CacheScope::Host => target.host(),
            CacheScope::RegistrableDomain => target.registrable_domain(),
        };
        Self {
            analyzer,
            scope: scope.to_string(),
        }
    }

    /// Key for a host- or domain-level analyzer without a full target.
    #[must_use]
    pub fn for_domain(analyzer: AnalyzerKind, domain: &str) -> Self {
        Self {
            analyzer,
            scope: domain.to_lowercase(),
        }
    }

    /// Analyzer this key belongs to.
    #[must_use]
    pub fn analyzer(&self) -> AnalyzerKind {
        self.analyzer
    }

    /// Canonical URL, host or registrable domain.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Whether the scope is `domain` itself or one of its subdomains.
    fn within(&self, domain: &str) -> bool {
        self.scope == domain
            || self
                .scope
                .strip_suffix(domain)
                .is_some_and(|prefix| prefix.ends_with('.'))
    }
}

/// A cached signal and its expiry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Key the entry is stored under
    pub key: CacheKey,
    /// The cached signal
    pub result: SignalResult,
    /// When the entry stops being served
    pub expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Counters for cache effectiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that found nothing usable
    pub misses: u64,
    /// Entries removed because they expired
    pub evictions: u64,
}

/// Concurrent signal cache shared by every scan.
#[derive(Debug, Default)]
pub struct SignalCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl SignalCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a live entry. An expired entry is removed and reported as a miss.
    pub async fn get(&self, key: &CacheKey) -> Option<SignalResult> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if !entry.is_expired(now) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.result.clone());
                }
                Some(_) => {}
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            }
        }

        // Expired: re-check under the write lock, another writer may have refreshed it.
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(key) {
            if !entry.is_expired(Instant::now()) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.result.clone());
            }
            entries.remove(key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                analyzer = %key.analyzer,
                scope = %key.scope,
                "Evicted expired cache entry"
            );
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store a result, atomically replacing any previous entry for the key.
    ///
    /// A TTL too large to represent as a deadline is capped at
    /// [`MAX_TTL`] instead of overflowing.
    pub async fn put(&self, key: CacheKey, result: SignalResult, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        let now = Instant::now();
        let Some(expires_at) = now.checked_add(ttl.min(MAX_TTL)) else {
            tracing::warn!(
                analyzer = %key.analyzer,
                "Cache TTL of {:?} is not representable, entry not stored",
                ttl
            );
            return;
        };
        let entry = CacheEntry {
            key: key.clone(),
            result,
            expires_at,
        };
        self.entries.write().await.insert(key, entry);
    }

    /// Drop an entry regardless of its expiry.
    pub async fn invalidate(&self, key: &CacheKey) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    /// Drop every entry of `analyzer` scoped to `domain` or one of its
    /// subdomains, returning how many were removed.
    pub async fn invalidate_within(&self, analyzer: AnalyzerKind, domain: &str) -> usize {
        let domain = domain.to_lowercase();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| key.analyzer != analyzer || !key.within(&domain));
        before - entries.len()
    }

    /// Remove every expired entry and return how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - entries.len();
        self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Snapshot of the hit/miss/eviction counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Periodically purge expired entries until the returned handle is aborted.
    #[must_use]
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = cache.purge_expired().await;
                if removed > 0 {
                    tracing::debug!("Cache sweep removed {} expired entries", removed);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(raw: &str) -> NormalizedTarget {
        NormalizedTarget::parse(raw).expect("valid target")
    }

    fn signal(score: f64) -> SignalResult {
        SignalResult::completed(AnalyzerKind::UrlPattern, score, vec![])
    }

    #[test]
    fn test_key_derivation_converges() {
        let a = target("https://Example.com/login#top");
        let b = target("https://example.com/login?utm_source=x");
        assert_eq!(
            CacheKey::for_target(AnalyzerKind::Content, &a),
            CacheKey::for_target(AnalyzerKind::Content, &b)
        );

        let deep = target("https://a.b.example.com/other");
        assert_eq!(
            CacheKey::for_target(AnalyzerKind::DomainReputation, &a),
            CacheKey::for_target(AnalyzerKind::DomainReputation, &deep)
        );
        assert_ne!(
            CacheKey::for_target(AnalyzerKind::Content, &a),
            CacheKey::for_target(AnalyzerKind::Content, &deep)
        );
        assert_eq!(
            CacheKey::for_domain(AnalyzerKind::KnownScamLookup, "Example.com"),
            CacheKey::for_target(AnalyzerKind::KnownScamLookup, &a)
        );
    }

    #[test]
    fn test_known_scam_keys_are_per_host() {
        let evil = target("https://evil.example.com/login");
        let www = target("https://www.example.com/");
        let other_path = target("https://evil.example.com/other");

        assert_ne!(
            CacheKey::for_target(AnalyzerKind::KnownScamLookup, &evil),
            CacheKey::for_target(AnalyzerKind::KnownScamLookup, &www)
        );
        assert_eq!(
            CacheKey::for_target(AnalyzerKind::KnownScamLookup, &evil),
            CacheKey::for_target(AnalyzerKind::KnownScamLookup, &other_path)
        );
        assert_eq!(
            CacheKey::for_target(AnalyzerKind::KnownScamLookup, &evil).scope(),
            "evil.example.com"
        );
    }

    #[tokio::test]
    async fn test_invalidate_within_domain_family() {
        let cache = SignalCache::new();
        for host in ["example.com", "evil.example.com", "notexample.com", "example.com.evil"] {
            cache
                .put(
                    CacheKey::for_domain(AnalyzerKind::KnownScamLookup, host),
                    signal(0.0),
                    Duration::from_secs(60),
                )
                .await;
        }
        cache
            .put(
                CacheKey::for_domain(AnalyzerKind::DomainReputation, "example.com"),
                signal(0.0),
                Duration::from_secs(60),
            )
            .await;

        let removed = cache
            .invalidate_within(AnalyzerKind::KnownScamLookup, "Example.com")
            .await;

        assert_eq!(removed, 2);
        assert_eq!(cache.len().await, 3);
        let kept = CacheKey::for_domain(AnalyzerKind::KnownScamLookup, "notexample.com");
        assert!(cache.get(&kept).await.is_some());
    }

    #[tokio::test]
    async fn test_huge_ttl_is_capped() {
        let cache = SignalCache::new();
        let key = CacheKey::for_target(AnalyzerKind::UrlPattern, &target("example.com"));
        cache.put(key.clone(), signal(0.3), Duration::MAX).await;

        assert!(cache.get(&key).await.is_some());
        let entries = cache.entries.read().await;
        let entry = entries.get(&key).expect("stored entry");
        assert!(entry.expires_at <= Instant::now() + MAX_TTL);
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let cache = SignalCache::new();
        let key = CacheKey::for_target(AnalyzerKind::UrlPattern, &target("example.com"));

        assert!(cache.get(&key).await.is_none());
        cache.put(key.clone(), signal(0.4), Duration::from_secs(60)).await;

        let cached = cache.get(&key).await.expect("cached signal");
        assert!((cached.score - 0.4).abs() < f64::EPSILON);
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1, evictions: 0 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_lazily() {
        let cache = SignalCache::new();
        let key = CacheKey::for_target(AnalyzerKind::UrlPattern, &target("example.com"));
        cache.put(key.clone(), signal(0.2), Duration::from_secs(10)).await;

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(cache.get(&key).await.is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.len().await, 1);
        assert!(cache.get(&key).await.is_none());
        assert!(cache.is_empty().await);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test]
    async fn test_put_replaces_entry() {
        let cache = SignalCache::new();
        let key = CacheKey::for_target(AnalyzerKind::UrlPattern, &target("example.com"));
        cache.put(key.clone(), signal(0.1), Duration::from_secs(60)).await;
        cache.put(key.clone(), signal(0.9), Duration::from_secs(60)).await;

        assert_eq!(cache.len().await, 1);
        let cached = cache.get(&key).await.expect("cached signal");
        assert!((cached.score - 0.9).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_zero_ttl_is_not_stored() {
        let cache = SignalCache::new();
        let key = CacheKey::for_target(AnalyzerKind::UrlPattern, &target("example.com"));
        cache.put(key.clone(), signal(0.1), Duration::ZERO).await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache = SignalCache::new();
        let key = CacheKey::for_domain(AnalyzerKind::KnownScamLookup, "example.com");
        cache.put(key.clone(), signal(0.1), Duration::from_secs(60)).await;
        assert!(cache.invalidate(&key).await);
        assert!(!cache.invalidate(&key).await);
        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_and_sweeper() {
        let cache = Arc::new(SignalCache::new());
        let short = CacheKey::for_domain(AnalyzerKind::KnownScamLookup, "short.example");
        let long = CacheKey::for_domain(AnalyzerKind::KnownScamLookup, "long.example");
        cache.put(short, signal(0.1), Duration::from_secs(5)).await;
        cache.put(long.clone(), signal(0.1), Duration::from_secs(500)).await;

        let sweeper = cache.spawn_sweeper(Duration::from_secs(30));
        tokio::time::sleep(Duration::from_secs(31)).await;

        assert_eq!(cache.len().await, 1);
        assert!(cache.get(&long).await.is_some());
        sweeper.abort();
    }

    #[tokio::test]
    async fn test_concurrent_writers_converge() {
        let cache = Arc::new(SignalCache::new());
        let key = CacheKey::for_target(AnalyzerKind::Content, &target("https://example.com/"));

        let mut handles = Vec::new();
        for i in 0..16 {
            let cache = Arc::clone(&cache);
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .put(key.clone(), signal(f64::from(i) / 16.0), Duration::from_secs(60))
                    .await;
                cache.get(&key).await
            }));
        }
        for handle in handles {
            assert!(handle.await.expect("task joined").is_some());
        }
        assert_eq!(cache.len().await, 1);
    }
}
