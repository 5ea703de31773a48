//! GPU texture cache with estimated memory accounting
//!
//! Deduplicates texture loads by source key and keeps a running estimate of
//! the GPU memory held by cached textures. Nothing is ever evicted
//! automatically: entries leave the cache only through [`GpuTextureCache::release`],
//! [`GpuTextureCache::clear`], or when the last handle to the cache is
//! dropped. The near-limit signal is advisory and callers are expected to
//! act on it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};

use crate::config::CacheConfig;
use crate::error::ConfigError;
use crate::estimate::{bytes_to_mb, clamp_dimension_to, estimate_bytes};
use crate::loader::{GpuResource, LoaderCapabilities, TextureLoader};
use crate::memory_budget::{MemoryBudget, MemoryPressure};

/// Shared handle to a cached texture
///
/// Repeated acquisitions of the same key hand out clones of one `Arc`.
pub type TextureHandle<R> = Arc<R>;

/// Statistics about GPU texture cache usage
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GpuCacheStats {
    /// Number of textures currently in cache
    pub texture_count: usize,

    /// Estimated memory held by cached textures (bytes)
    pub memory_used: u64,

    /// Soft budget (bytes)
    pub memory_budget: u64,

    /// Number of acquisitions served from the cache
    pub hits: u64,

    /// Number of acquisitions that required a load
    pub misses: u64,

    /// Number of completed loads handed to the cache
    pub loads: u64,

    /// Number of loads that failed in the loader
    pub failed_loads: u64,

    /// Completed loads discarded because the key was already cached
    pub duplicate_loads: u64,

    /// Number of textures released individually
    pub releases: u64,
}

impl GpuCacheStats {
    /// Calculate the cache hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Estimated memory used relative to the budget; may exceed 1.0
    pub fn utilization(&self) -> f64 {
        if self.memory_budget == 0 {
            0.0
        } else {
            self.memory_used as f64 / self.memory_budget as f64
        }
    }

    /// Estimated memory used in megabytes
    pub fn memory_used_mb(&self) -> f64 {
        bytes_to_mb(self.memory_used)
    }
}

struct CacheEntry<R> {
    resource: TextureHandle<R>,
    dimension: u32,
    estimated_bytes: u64,
}

/// Internal cache state
struct CacheState<R: GpuResource> {
    entries: HashMap<String, CacheEntry<R>>,

    /// Sum of `estimated_bytes` over `entries`
    used_bytes: u64,

    stats: GpuCacheStats,

    /// Set once the near-limit warning has been logged, cleared when usage drops back
    warned: bool,
}

impl<R: GpuResource> CacheState<R> {
    fn new(budget: &MemoryBudget) -> Self {
        Self {
            entries: HashMap::new(),
            used_bytes: 0,
            stats: GpuCacheStats {
                memory_budget: budget.budget_bytes(),
                ..Default::default()
            },
            warned: false,
        }
    }

    fn sync_stats(&mut self) {
        self.stats.texture_count = self.entries.len();
        self.stats.memory_used = self.used_bytes;
    }

    fn track_pressure(&mut self, budget: &MemoryBudget) {
        let near_limit = budget.is_near_limit(self.used_bytes);
        if near_limit && !self.warned {
            warn!(
                "texture memory estimate {:.1} MB is above {:.1} MB ({:.0}% of {:.1} MB budget)",
                bytes_to_mb(self.used_bytes),
                budget.warning_mb(),
                budget.warning_threshold() * 100.0,
                budget.budget_mb()
            );
        }
        self.warned = near_limit;
    }
}

impl<R: GpuResource> Drop for CacheState<R> {
    fn drop(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        info!(
            "disposing {} cached textures on teardown ({:.1} MB)",
            self.entries.len(),
            bytes_to_mb(self.used_bytes)
        );
        for (_, entry) in self.entries.drain() {
            entry.resource.dispose();
        }
        self.used_bytes = 0;
    }
}

/// Result of the non-blocking half of an acquisition
pub enum Acquisition<R> {
    /// The key was already cached
    Cached(TextureHandle<R>),
    /// The key must be loaded and handed back with [`GpuTextureCache::complete`]
    Pending(PendingTexture),
}

/// A load the cache expects to be completed
///
/// Holding a ticket reserves nothing: a second acquisition of the same key
/// gets its own ticket and its own load.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "a pending texture must be completed or discarded"]
pub struct PendingTexture {
    key: String,
    dimension: u32,
    estimated_bytes: u64,
}

impl PendingTexture {
    /// Source key to load
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Clamped edge length to request from the loader, in pixels
    pub fn dimension(&self) -> u32 {
        self.dimension
    }

    /// Estimated bytes the entry will be charged once completed
    pub fn estimated_bytes(&self) -> u64 {
        self.estimated_bytes
    }

    /// Estimated megabytes the entry will be charged once completed
    pub fn estimated_mb(&self) -> f64 {
        bytes_to_mb(self.estimated_bytes)
    }

    /// Drop a load that is no longer wanted, freeing its GPU memory.
    pub fn discard<R: GpuResource>(self, resource: R) {
        debug!("discarding unneeded load for {}", self.key);
        resource.dispose();
    }
}

/// GPU texture cache keyed by source URL or identifier
///
/// Cloning the cache yields another handle to the same state, so one cache
/// can be owned by a rendering session and passed to every consumer. The
/// state is behind a single mutex; the lock is never held while the loader
/// runs or while a resource is disposed.
///
/// Memory figures are estimates from [`crate::estimate`], not measurements.
/// They assume a square RGBA8 texture at the clamped resolution ceiling
/// with a full mipmap chain, whatever the loader actually produced.
///
/// # Example
///
/// ```
/// use orrery_cache::{CacheConfig, GpuResource, GpuTextureCache, TextureLoader};
///
/// struct Texture;
///
/// impl GpuResource for Texture {
///     fn dispose(&self) {}
/// }
///
/// struct Loader;
///
/// impl TextureLoader for Loader {
///     type Resource = Texture;
///     type Error = std::convert::Infallible;
///
///     fn load(&self, _key: &str, _dimension: u32) -> Result<Texture, Self::Error> {
///         Ok(Texture)
///     }
/// }
///
/// let cache = GpuTextureCache::new(Loader, CacheConfig::default()).unwrap();
/// let earth = cache.acquire("textures/earth.jpg", None).unwrap();
/// let again = cache.acquire("textures/earth.jpg", None).unwrap();
/// assert!(std::sync::Arc::ptr_eq(&earth, &again));
///
/// if cache.is_near_limit() {
///     // request lower-resolution variants from here on
/// }
/// ```
pub struct GpuTextureCache<L: TextureLoader> {
    loader: Arc<L>,
    state: Arc<Mutex<CacheState<L::Resource>>>,
    budget: MemoryBudget,
    max_dimension: u32,
}

impl<L: TextureLoader> Clone for GpuTextureCache<L> {
    fn clone(&self) -> Self {
        Self {
            loader: Arc::clone(&self.loader),
            state: Arc::clone(&self.state),
            budget: self.budget,
            max_dimension: self.max_dimension,
        }
    }
}

impl<L: TextureLoader> GpuTextureCache<L> {
    /// Create a cache that loads through `loader`
    ///
    /// # Errors
    ///
    /// Returns an error if `config` fails validation.
    pub fn new(loader: L, config: CacheConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_parts(loader, &config))
    }

    /// Create a cache with the default 300 MB budget and 2048 px ceiling
    pub fn with_defaults(loader: L) -> Self {
        Self::from_parts(loader, &CacheConfig::default())
    }

    fn from_parts(loader: L, config: &CacheConfig) -> Self {
        let budget = config.memory_budget();
        Self {
            loader: Arc::new(loader),
            state: Arc::new(Mutex::new(CacheState::new(&budget))),
            budget,
            max_dimension: config.max_texture_dimension,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<L::Resource>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the cached texture for `key`, loading it on a miss
    ///
    /// On a miss the requested resolution is the smaller of the platform
    /// maximum (from `capabilities`, or the loader's own when `None`) and
    /// the configured ceiling. The entry is charged the estimated cost of
    /// that resolution.
    ///
    /// Loads are not deduplicated while in flight: two callers that miss
    /// on the same key before either load finishes both run the loader.
    /// The first to finish is cached and the other result is disposed.
    ///
    /// # Errors
    ///
    /// Returns the loader's error unchanged. Nothing is inserted.
    pub fn acquire(
        &self,
        key: &str,
        capabilities: Option<LoaderCapabilities>,
    ) -> Result<TextureHandle<L::Resource>, L::Error> {
        let pending = match self.begin_acquire(key, capabilities) {
            Acquisition::Cached(handle) => return Ok(handle),
            Acquisition::Pending(pending) => pending,
        };

        match self.loader.load(pending.key(), pending.dimension()) {
            Ok(resource) => Ok(self.complete(pending, resource)),
            Err(error) => {
                debug!("load failed for {}", pending.key());
                self.lock().stats.failed_loads += 1;
                Err(error)
            }
        }
    }

    /// Look up `key` and, on a miss, describe the load the caller must run
    ///
    /// This is the first half of an asynchronous acquisition. A miss adds
    /// no entry and no cost until [`complete`](Self::complete) is called.
    pub fn begin_acquire(
        &self,
        key: &str,
        capabilities: Option<LoaderCapabilities>,
    ) -> Acquisition<L::Resource> {
        {
            let mut state = self.lock();
            if let Some(entry) = state.entries.get(key) {
                let handle = Arc::clone(&entry.resource);
                state.stats.hits += 1;
                return Acquisition::Cached(handle);
            }
            state.stats.misses += 1;
        }

        let capabilities = capabilities.unwrap_or_else(|| self.loader.capabilities());
        let dimension = clamp_dimension_to(capabilities.max_texture_size, self.max_dimension);
        let estimated_bytes = estimate_bytes(dimension);
        debug!(
            "texture miss for {key}: loading at {dimension}px (~{:.2} MB)",
            bytes_to_mb(estimated_bytes)
        );

        Acquisition::Pending(PendingTexture {
            key: key.to_string(),
            dimension,
            estimated_bytes,
        })
    }

    /// Hand a loaded resource to the cache and get its shared handle
    ///
    /// If another load for the same key completed first, that entry wins:
    /// `resource` is disposed, the existing handle is returned, and no cost
    /// is added.
    pub fn complete(
        &self,
        pending: PendingTexture,
        resource: L::Resource,
    ) -> TextureHandle<L::Resource> {
        let mut state = self.lock();
        state.stats.loads += 1;

        if let Some(existing) = state.entries.get(&pending.key) {
            let handle = Arc::clone(&existing.resource);
            state.stats.duplicate_loads += 1;
            drop(state);

            debug!("{} was loaded twice; disposing the later copy", pending.key);
            resource.dispose();
            return handle;
        }

        let handle = Arc::new(resource);
        state.used_bytes += pending.estimated_bytes;
        state.entries.insert(
            pending.key,
            CacheEntry {
                resource: Arc::clone(&handle),
                dimension: pending.dimension,
                estimated_bytes: pending.estimated_bytes,
            },
        );
        state.sync_stats();
        state.track_pressure(&self.budget);

        handle
    }

    /// Dispose and remove the texture for `key`
    ///
    /// Returns `false` and changes nothing if `key` is not cached. Release
    /// only keys whose load has completed; a release racing an unfinished
    /// acquisition of the same key has no defined order.
    pub fn release(&self, key: &str) -> bool {
        let entry = {
            let mut state = self.lock();
            let Some(entry) = state.entries.remove(key) else {
                return false;
            };
            state.used_bytes -= entry.estimated_bytes;
            state.stats.releases += 1;
            state.sync_stats();
            state.track_pressure(&self.budget);
            entry
        };

        debug!(
            "released {key} ({}px, {:.2} MB)",
            entry.dimension,
            bytes_to_mb(entry.estimated_bytes)
        );
        entry.resource.dispose();
        true
    }

    /// Dispose every cached texture and reset the estimate to zero
    ///
    /// Returns the number of textures disposed.
    pub fn clear(&self) -> usize {
        let drained: Vec<CacheEntry<L::Resource>> = {
            let mut state = self.lock();
            let drained = state.entries.drain().map(|(_, entry)| entry).collect();
            state.used_bytes = 0;
            state.warned = false;
            state.sync_stats();
            drained
        };

        let count = drained.len();
        for entry in drained {
            entry.resource.dispose();
        }
        info!("cleared texture cache ({count} textures disposed)");
        count
    }

    /// True when the estimated memory exceeds `budget × threshold`
    ///
    /// Advisory only: acquisitions are never refused.
    pub fn is_near_limit(&self) -> bool {
        self.budget.is_near_limit(self.memory_used_bytes())
    }

    /// Current pressure level against the budget
    pub fn pressure(&self) -> MemoryPressure {
        self.budget.pressure(self.memory_used_bytes())
    }

    /// Check if a texture is cached without touching statistics
    pub fn contains(&self, key: &str) -> bool {
        self.lock().entries.contains_key(key)
    }

    /// Estimated cost of a cached texture in megabytes
    pub fn estimated_cost_mb(&self, key: &str) -> Option<f64> {
        self.lock()
            .entries
            .get(key)
            .map(|entry| bytes_to_mb(entry.estimated_bytes))
    }

    /// Cached keys in sorted order
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Get the number of textures currently in the cache
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// True when no textures are cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Estimated memory held by cached textures, in bytes
    pub fn memory_used_bytes(&self) -> u64 {
        self.lock().used_bytes
    }

    /// Estimated memory held by cached textures, in megabytes
    pub fn memory_used_mb(&self) -> f64 {
        bytes_to_mb(self.memory_used_bytes())
    }

    /// Get current cache statistics
    pub fn stats(&self) -> GpuCacheStats {
        self.lock().stats
    }

    /// Budget and warning threshold this cache reports against
    pub fn budget(&self) -> MemoryBudget {
        self.budget
    }

    /// Resolution ceiling applied on top of platform limits
    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    /// Loader used on cache misses
    pub fn loader(&self) -> &L {
        &self.loader
    }
}
