/*!
 * Shard Sizing
 *
 * CPU-aware shard count calculation for the striped map and the object pool.
 *
 * # Design Rationale
 *
 * - **Power-of-2 shards**: shard selection is `hash & (n - 1)`
 * - **CPU-proportional scaling**: more cores means more simultaneous writers
 * - **Clamped**: between `MIN_SHARD_COUNT` and `MAX_SHARD_COUNT`
 */

use crate::core::errors::SyncError;
use crate::core::limits::{FALLBACK_CPU_COUNT, MAX_SHARD_COUNT, MIN_SHARD_COUNT};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Hardware-aware shard configuration (pure functions)
pub struct ShardManager;

impl ShardManager {
    /// Get CPU count
    #[inline]
    pub fn cpu_count() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or_else(|_| {
                tracing::warn!(
                    fallback = FALLBACK_CPU_COUNT,
                    "Failed to detect CPU count, using fallback"
                );
                FALLBACK_CPU_COUNT
            })
    }

    /// Calculate shard count for a given workload profile
    #[inline]
    pub fn shards(profile: WorkloadProfile) -> usize {
        Self::normalize(Self::cpu_count() * profile.multiplier())
    }

    /// Round an explicit shard request up to a power of two within bounds
    #[inline]
    pub fn normalize(requested: usize) -> usize {
        requested
            .max(1)
            .next_power_of_two()
            .clamp(MIN_SHARD_COUNT, MAX_SHARD_COUNT)
    }
}

/// Workload characterization for shard count calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadProfile {
    /// Many writers hammering the same container: 4x CPU cores
    HighContention,

    /// Mixed read/write traffic: 2x CPU cores
    MediumContention,

    /// Read-mostly or rarely shared: 1x CPU cores
    LowContention,
}

impl WorkloadProfile {
    #[inline]
    const fn multiplier(self) -> usize {
        match self {
            WorkloadProfile::HighContention => 4,
            WorkloadProfile::MediumContention => 2,
            WorkloadProfile::LowContention => 1,
        }
    }
}

impl FromStr for WorkloadProfile {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" | "high_contention" => Ok(WorkloadProfile::HighContention),
            "medium" | "medium_contention" => Ok(WorkloadProfile::MediumContention),
            "low" | "low_contention" => Ok(WorkloadProfile::LowContention),
            other => Err(SyncError::InvalidConfig(format!(
                "unknown workload profile '{}'",
                other
            ))),
        }
    }
}
