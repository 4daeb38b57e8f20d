//! Time-to-live cache of resolved shares.
//!
//! Entries are keyed by the normalized share link and expire a fixed duration
//! after insertion. Expired entries are evicted lazily on lookup and in bulk by
//! [`ResultCache::purge_expired`]. Time comes from an injectable [`Clock`] so
//! expiry is testable without sleeping.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, trace};

use crate::resolver::ResolvedShare;

/// Default lifetime of a cached resolution.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(600);

/// Source of monotonic time for cache expiry.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current instant.
    fn now(&self) -> Instant;
}

/// [`Clock`] backed by [`Instant::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// [`Clock`] that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset_millis: AtomicU64,
}

impl ManualClock {
    /// Creates a clock frozen at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset_millis: AtomicU64::new(0),
        }
    }

    /// Moves the clock forward by `by` (millisecond resolution).
    pub fn advance(&self, by: Duration) {
        let millis = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        self.offset_millis.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + Duration::from_millis(self.offset_millis.load(Ordering::SeqCst))
    }
}

/// One cached resolution.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Normalized share link.
    pub key: String,
    /// Cached result.
    pub value: ResolvedShare,
    /// Instant after which the entry is stale.
    pub expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now > self.expires_at
    }
}

/// Concurrent TTL cache of [`ResolvedShare`] values.
pub struct ResultCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl ResultCache {
    /// Creates a cache using the system clock.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Creates a cache reading time from `clock`.
    #[must_use]
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            clock,
        }
    }

    /// Lifetime applied by [`put`](Self::put).
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the live entry for `key`; an expired entry is evicted and reported absent.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<ResolvedShare> {
        let now = self.clock.now();
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                trace!(key, "cache hit");
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
            debug!(key, "evicted expired cache entry");
        }
        None
    }

    /// Stores `value` under `key` for the default lifetime, replacing any previous entry.
    pub fn put(&self, key: impl Into<String>, value: ResolvedShare) {
        self.put_with_ttl(key, value, self.ttl);
    }

    /// Stores `value` under `key` for `ttl`.
    pub fn put_with_ttl(&self, key: impl Into<String>, value: ResolvedShare, ttl: Duration) {
        let key = key.into();
        let expires_at = self.clock.now() + ttl;
        self.entries.insert(
            key.clone(),
            CacheEntry {
                key,
                value,
                expires_at,
            },
        );
    }

    /// Removes every expired entry; returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            debug!(purged, remaining = self.entries.len(), "purged expired cache entries");
        }
        purged
    }

    /// Number of stored entries, expired ones included until purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCache")
            .field("entries", &self.entries.len())
            .field("ttl", &self.ttl)
            .field("clock", &self.clock)
            .finish()
    }
}
