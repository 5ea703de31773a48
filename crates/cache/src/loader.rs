//! Collaborator traits the cache consumes
//!
//! The cache never creates or frees GPU memory itself. A [`TextureLoader`]
//! produces resources on a miss, and every resource knows how to release
//! its own GPU allocation through [`GpuResource::dispose`].

use crate::estimate::MAX_TEXTURE_DIMENSION;

/// What the platform (or renderer) reports it can allocate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderCapabilities {
    /// Largest texture edge length the platform supports, in pixels
    pub max_texture_size: u32,
}

impl LoaderCapabilities {
    pub fn new(max_texture_size: u32) -> Self {
        Self { max_texture_size }
    }
}

impl Default for LoaderCapabilities {
    fn default() -> Self {
        Self::new(MAX_TEXTURE_DIMENSION)
    }
}

/// A GPU-resident resource owned by the cache
///
/// `dispose` takes `&self` because handles are shared with callers; GPU
/// APIs typically expose destruction the same way. It may be called while
/// callers still hold a handle, after which the handle must not be drawn.
pub trait GpuResource {
    /// Release the underlying GPU allocation.
    fn dispose(&self);
}

/// Creates resources on a cache miss
pub trait TextureLoader {
    /// Resource type produced by this loader
    type Resource: GpuResource;

    /// Failure type, returned to cache callers unchanged
    type Error;

    /// Platform limits used when the caller does not pass its own.
    fn capabilities(&self) -> LoaderCapabilities {
        LoaderCapabilities::default()
    }

    /// Load the resource identified by `key` at an edge length of `dimension`
    /// pixels (already clamped by the cache).
    fn load(&self, key: &str, dimension: u32) -> Result<Self::Resource, Self::Error>;
}
