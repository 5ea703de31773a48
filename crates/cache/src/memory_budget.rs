//! Memory budget and pressure signalling for the texture cache
//!
//! The budget is soft. Nothing here blocks or evicts; it only answers
//! whether the estimated texture footprint has crossed the warning
//! threshold so rendering code can lower quality before the platform runs
//! out of GPU memory.

use crate::estimate::{bytes_to_mb, mb_to_bytes};

/// Default texture budget in megabytes.
pub const DEFAULT_BUDGET_MB: f64 = 300.0;

/// Default warning threshold as a fraction of the budget.
pub const DEFAULT_WARNING_THRESHOLD: f64 = 0.8;

/// Memory pressure level derived from budget utilization
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MemoryPressure {
    /// Below half of the budget
    Low,
    /// At or above half of the budget, not past the warning threshold
    Moderate,
    /// Past the warning threshold (near the limit)
    High,
    /// Past the full budget
    Critical,
}

impl MemoryPressure {
    /// Classify a utilization ratio against a warning threshold.
    pub fn from_utilization(utilization: f64, warning_threshold: f64) -> Self {
        if utilization > 1.0 {
            MemoryPressure::Critical
        } else if utilization > warning_threshold {
            MemoryPressure::High
        } else if utilization < 0.5 {
            MemoryPressure::Low
        } else {
            MemoryPressure::Moderate
        }
    }

    /// Returns true if callers should stop requesting high-resolution data
    pub fn should_degrade(&self) -> bool {
        matches!(self, MemoryPressure::High | MemoryPressure::Critical)
    }
}

/// Budget ceiling and warning threshold for estimated texture memory
///
/// # Example
///
/// ```
/// use orrery_cache::memory_budget::{MemoryBudget, MemoryPressure};
///
/// let budget = MemoryBudget::new(100.0);
/// let used = 85 * 1024 * 1024;
///
/// assert!(budget.is_near_limit(used));
/// assert_eq!(budget.pressure(used), MemoryPressure::High);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryBudget {
    budget_mb: f64,
    warning_threshold: f64,
}

impl MemoryBudget {
    /// Create a budget of `budget_mb` megabytes with the default 0.8 threshold
    pub fn new(budget_mb: f64) -> Self {
        Self {
            budget_mb: budget_mb.max(0.0),
            warning_threshold: DEFAULT_WARNING_THRESHOLD,
        }
    }

    /// Set the warning threshold (0.0 to 1.0)
    pub fn with_warning_threshold(mut self, threshold: f64) -> Self {
        self.warning_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Budget ceiling in megabytes
    pub fn budget_mb(&self) -> f64 {
        self.budget_mb
    }

    /// Budget ceiling in bytes
    pub fn budget_bytes(&self) -> u64 {
        mb_to_bytes(self.budget_mb)
    }

    /// Warning threshold as a fraction of the budget
    pub fn warning_threshold(&self) -> f64 {
        self.warning_threshold
    }

    /// Warning threshold in megabytes
    pub fn warning_mb(&self) -> f64 {
        self.budget_mb * self.warning_threshold
    }

    /// True when `used_bytes` is strictly above the warning threshold
    pub fn is_near_limit(&self, used_bytes: u64) -> bool {
        bytes_to_mb(used_bytes) > self.warning_mb()
    }

    /// Utilization ratio; may exceed 1.0 since the budget is advisory
    ///
    /// Any usage against a zero budget is infinite utilization.
    pub fn utilization(&self, used_bytes: u64) -> f64 {
        if self.budget_mb <= 0.0 {
            if used_bytes == 0 {
                0.0
            } else {
                f64::INFINITY
            }
        } else {
            bytes_to_mb(used_bytes) / self.budget_mb
        }
    }

    /// Bytes left before the full budget is reached
    pub fn headroom_bytes(&self, used_bytes: u64) -> u64 {
        self.budget_bytes().saturating_sub(used_bytes)
    }

    /// Pressure level for the given usage
    pub fn pressure(&self, used_bytes: u64) -> MemoryPressure {
        MemoryPressure::from_utilization(self.utilization(used_bytes), self.warning_threshold)
    }
}

impl Default for MemoryBudget {
    fn default() -> Self {
        Self::new(DEFAULT_BUDGET_MB)
    }
}
