//! Process-wide signing key cache
//!
//! Keys are sourced lazily on first use, in priority order:
//!
//! 1. a statically configured key set, if it holds any keys
//! 2. the provider directory's `/jwks` endpoint, if a directory is configured
//!
//! If neither yields keys the empty set is cached. Every verification then
//! fails closed with `NoKeysConfigured` until [`KeySetCache::force_refresh`]
//! is called.
//!
//! # Concurrency
//!
//! The current set lives behind an [`ArcSwapOption`]: readers take a snapshot
//! without locking and a refresh replaces the whole set in one store, so a
//! reader sees either the old set or the new one. Population is single-flight;
//! concurrent cold callers wait on one load instead of each hitting the
//! directory.
//!
//! There is no time-based expiry. Key rotation is picked up by
//! [`force_refresh`](KeySetCache::force_refresh), which
//! [`TokenVerifier::verify_with_refresh`](super::TokenVerifier::verify_with_refresh)
//! calls when a token names an unknown key.
//!
//! # Refresh limits
//!
//! Refreshes are throttled to one per [`DEFAULT_MIN_REFRESH_INTERVAL`]
//! (configurable), since any caller presenting an unknown `kid` can trigger
//! one. A refresh that yields no keys never replaces a non-empty set; only a
//! cold load with nothing to fall back on caches the empty set.

use crate::directory::RemoteDirectory;
use crate::metrics::{KeySource, record_key_set_load};
use arc_swap::ArcSwapOption;
use clerk_sync_types::KeySet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Minimum time between two key set refreshes
pub const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

/// Lazily populated, atomically replaced cache of the provider's signing keys
pub struct KeySetCache {
    current: ArcSwapOption<KeySet>,
    static_keys: Arc<KeySet>,
    directory: Option<Arc<dyn RemoteDirectory>>,
    /// Serializes loads; holds the time of the last load attempt
    last_load: Mutex<Option<Instant>>,
    min_refresh_interval: Duration,
    /// Set once the empty-set condition has been reported
    empty_reported: AtomicBool,
}

impl std::fmt::Debug for KeySetCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySetCache")
            .field("static_keys", &self.static_keys.key_ids())
            .field("directory", &self.directory)
            .field("min_refresh_interval", &self.min_refresh_interval)
            .field(
                "current",
                &self.current.load().as_ref().map(|set| set.key_ids().len()),
            )
            .finish_non_exhaustive()
    }
}

impl KeySetCache {
    /// Create a cache from its key sources. Nothing is loaded until first use.
    pub fn new(static_keys: KeySet, directory: Option<Arc<dyn RemoteDirectory>>) -> Self {
        Self {
            current: ArcSwapOption::empty(),
            static_keys: Arc::new(static_keys),
            directory,
            last_load: Mutex::new(None),
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
            empty_reported: AtomicBool::new(false),
        }
    }

    /// Set the minimum time between refreshes (default 5 s)
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Cache backed only by statically configured keys
    pub fn with_static_keys(keys: KeySet) -> Self {
        Self::new(keys, None)
    }

    /// Cache backed only by the provider directory
    pub fn with_directory(directory: Arc<dyn RemoteDirectory>) -> Self {
        Self::new(KeySet::empty(), Some(directory))
    }

    /// Cache with no key source; every verification fails closed
    pub fn empty() -> Self {
        Self::new(KeySet::empty(), None)
    }

    /// The current key set, loading it on first use
    pub async fn get_keys(&self) -> Arc<KeySet> {
        if let Some(keys) = self.current.load_full() {
            return keys;
        }

        let mut last_load = self.last_load.lock().await;

        // Another caller may have finished the load while we waited
        if let Some(keys) = self.current.load_full() {
            debug!(key_count = keys.len(), "Key set loaded by concurrent caller");
            return keys;
        }

        self.load(&mut last_load).await
    }

    /// Re-run key sourcing and replace the whole set
    ///
    /// Use this when a token names a key id the current set does not hold;
    /// the provider may have rotated its keys. Within the minimum refresh
    /// interval of the previous load the current set is returned unchanged.
    /// If sourcing yields no keys, a non-empty current set is kept.
    pub async fn force_refresh(&self) -> Arc<KeySet> {
        let mut last_load = self.last_load.lock().await;

        if let (Some(current), Some(loaded_at)) = (self.current.load_full(), *last_load)
            && loaded_at.elapsed() < self.min_refresh_interval
        {
            debug!(
                key_count = current.len(),
                "Key set refreshed recently, skipping refresh"
            );
            return current;
        }

        info!("Refreshing signing keys");
        self.load(&mut last_load).await
    }

    /// The current key set without loading (`None` before first use)
    pub fn snapshot(&self) -> Option<Arc<KeySet>> {
        self.current.load_full()
    }

    /// Whether a directory is configured as a key source
    pub fn has_directory(&self) -> bool {
        self.directory.is_some()
    }

    /// Called with the `last_load` lock held
    async fn load(&self, last_load: &mut Option<Instant>) -> Arc<KeySet> {
        let (keys, source) = self.source_keys().await;
        *last_load = Some(Instant::now());
        record_key_set_load(source);

        if keys.is_empty()
            && let Some(current) = self.current.load_full()
            && !current.is_empty()
        {
            warn!(
                key_count = current.len(),
                "Key refresh yielded no keys, keeping the current set"
            );
            return current;
        }

        let keys = Arc::new(keys);
        if keys.is_empty() {
            if !self.empty_reported.swap(true, Ordering::Relaxed) {
                error!(
                    "No signing keys available: configure static keys or a directory secret key. \
                     Every session token will be rejected"
                );
            }
        } else {
            self.empty_reported.store(false, Ordering::Relaxed);
            info!(
                key_count = keys.len(),
                source = ?source,
                kids = ?keys.key_ids(),
                "Signing keys loaded"
            );
        }

        self.current.store(Some(Arc::clone(&keys)));
        keys
    }

    async fn source_keys(&self) -> (KeySet, KeySource) {
        if !self.static_keys.is_empty() {
            return (self.static_keys.as_ref().clone(), KeySource::Static);
        }

        let Some(directory) = &self.directory else {
            return (KeySet::empty(), KeySource::Empty);
        };

        match directory.fetch_key_set().await {
            Ok(keys) if !keys.is_empty() => (keys, KeySource::Remote),
            Ok(_) => {
                warn!("Directory returned an empty key set");
                (KeySet::empty(), KeySource::Empty)
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch signing keys from directory");
                (KeySet::empty(), KeySource::Empty)
            }
        }
    }
}
