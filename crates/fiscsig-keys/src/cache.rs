#![forbid(unsafe_code)]

//! Time-bounded cache of loaded certificate data.
//!
//! Entries are keyed by a SHA-256 digest of the source path and password so
//! the password never sits in memory as a map key. Expired entries are
//! dropped lazily, on the read that finds them stale.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fiscsig_core::{Clock, SystemClock};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use crate::data::CertificateData;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub data: CertificateData,
    pub loaded_at: DateTime<Utc>,
}

pub struct CertificateCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl CertificateCache {
    /// One hour.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(3_600);

    pub fn new() -> Self {
        Self::with_clock(Self::DEFAULT_TTL, Arc::new(SystemClock))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Lowercase hex SHA-256 of `"{path}:{password}"`.
    pub fn cache_key(path: &str, password: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(path.as_bytes());
        hasher.update(b":");
        hasher.update(password.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Return the entry for `key` if it is younger than the TTL. A stale
    /// entry is removed.
    pub fn get(&self, key: &str) -> Option<CertificateData> {
        let now = self.clock.now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                None => return None,
                Some(entry) if self.is_fresh(entry, now) => return Some(entry.data.clone()),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write();
        // Another caller may have refreshed it between the two locks.
        if let Some(entry) = entries.get(key) {
            if self.is_fresh(entry, now) {
                return Some(entry.data.clone());
            }
            entries.remove(key);
            tracing::debug!("evicted expired certificate cache entry");
        }
        None
    }

    pub fn insert(&self, key: String, data: CertificateData) {
        let entry = CacheEntry {
            data,
            loaded_at: self.clock.now(),
        };
        self.entries.write().insert(key, entry);
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write();
        let dropped = entries.len();
        entries.clear();
        tracing::info!(dropped, "certificate cache cleared");
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn is_fresh(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        // A clock that moved backwards leaves the entry fresh.
        match (now - entry.loaded_at).to_std() {
            Ok(age) => age < self.ttl,
            Err(_) => true,
        }
    }
}

impl Default for CertificateCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CertificateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateCache")
            .field("entries", &self.len())
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
