//! Fixed-formula texture memory estimates
//!
//! Nothing at this layer can ask the GPU how much memory a texture really
//! occupies. Every cached texture is instead charged as a square RGBA8
//! texture at the clamped resolution ceiling, plus a third again for its
//! mipmap chain. The numbers are approximations for admission control and
//! quality decisions, never measurements.

/// Hard ceiling on the texture edge length requested from a loader, in pixels.
pub const MAX_TEXTURE_DIMENSION: u32 = 2048;

/// Bytes per pixel assumed for every texture (RGBA8).
pub const BYTES_PER_PIXEL: u64 = 4;

/// Mipmap overhead as a percentage of the base level (1.33x).
pub const MIPMAP_OVERHEAD_PERCENT: u64 = 133;

/// Bytes in one megabyte as reported by this crate (MiB).
pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// Clamp a platform-reported maximum texture size to [`MAX_TEXTURE_DIMENSION`].
///
/// Constrained devices report small limits and get them; large desktop
/// limits are capped. The result is never zero.
pub fn clamp_dimension(platform_max: u32) -> u32 {
    clamp_dimension_to(platform_max, MAX_TEXTURE_DIMENSION)
}

/// Clamp a platform-reported maximum to an explicit ceiling.
pub fn clamp_dimension_to(platform_max: u32, ceiling: u32) -> u32 {
    platform_max.min(ceiling).max(1)
}

/// Estimated GPU bytes for a square texture of the given edge length.
///
/// `dimension² × 4 × 1.33`, truncated to whole bytes.
pub fn estimate_bytes(dimension: u32) -> u64 {
    let dimension = u64::from(dimension);
    dimension * dimension * BYTES_PER_PIXEL * MIPMAP_OVERHEAD_PERCENT / 100
}

/// Estimated megabytes for a square texture of the given edge length.
pub fn estimate_mb(dimension: u32) -> f64 {
    bytes_to_mb(estimate_bytes(dimension))
}

/// Convert a byte count to megabytes.
pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB as f64
}

/// Convert megabytes to a whole byte count, saturating at zero.
pub fn mb_to_bytes(mb: f64) -> u64 {
    if mb.is_nan() || mb <= 0.0 {
        0
    } else {
        (mb * BYTES_PER_MB as f64) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_caps_large_limits() {
        assert_eq!(clamp_dimension(16384), 2048);
        assert_eq!(clamp_dimension(2048), 2048);
    }

    #[test]
    fn test_clamp_keeps_small_limits() {
        assert_eq!(clamp_dimension(1024), 1024);
        assert_eq!(clamp_dimension(0), 1);
    }

    #[test]
    fn test_clamp_to_custom_ceiling() {
        assert_eq!(clamp_dimension_to(4096, 512), 512);
        assert_eq!(clamp_dimension_to(256, 512), 256);
    }

    #[test]
    fn test_full_size_estimate() {
        // 2048 * 2048 * 4 * 1.33
        assert_eq!(estimate_bytes(2048), 22_313_697);
        assert!((estimate_mb(2048) - 21.28).abs() < 0.01);
    }

    #[test]
    fn test_estimate_scales_quadratically() {
        assert_eq!(estimate_bytes(1024), 5_578_424);
        assert_eq!(estimate_bytes(512), 1_394_606);
        assert_eq!(estimate_bytes(1), 5);
    }

    #[test]
    fn test_mb_conversions() {
        assert_eq!(mb_to_bytes(1.0), BYTES_PER_MB);
        assert_eq!(mb_to_bytes(-3.0), 0);
        assert_eq!(bytes_to_mb(BYTES_PER_MB * 3), 3.0);
    }
}
