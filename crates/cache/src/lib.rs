//! Orrery texture cache
//!
//! Deduplicating GPU texture cache with an estimated memory budget, used by
//! the visualization renderer before it loads or allocates textures.

#![deny(rustdoc::broken_intra_doc_links)]

pub mod config;
pub mod error;
pub mod estimate;
pub mod gpu;
pub mod loader;
pub mod memory_budget;

pub use config::CacheConfig;
pub use error::ConfigError;
pub use gpu::{Acquisition, GpuCacheStats, GpuTextureCache, PendingTexture, TextureHandle};
pub use loader::{GpuResource, LoaderCapabilities, TextureLoader};
pub use memory_budget::{MemoryBudget, MemoryPressure};
