/*!
 * Synchronization Configuration
 *
 * Runtime configuration for contention strategy, pool and map sizing
 */

use super::management::{ShardManager, WorkloadProfile};
use crate::core::errors::{SyncError, SyncResult};
use crate::core::limits::{
    DEFAULT_MAX_SPINS, DEFAULT_POOL_SHARD_CAPACITY, DEFAULT_YIELD_AFTER, LONG_WAIT_MAX_SPINS,
    LOW_LATENCY_MAX_SPINS,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Environment variable selecting the contention strategy
pub const ENV_STRATEGY: &str = "AIOS_SYNC_STRATEGY";
/// Environment variable overriding the spin budget
pub const ENV_MAX_SPINS: &str = "AIOS_SYNC_MAX_SPINS";
/// Environment variable overriding per-shard pool capacity
pub const ENV_POOL_CAPACITY: &str = "AIOS_SYNC_POOL_CAPACITY";
/// Environment variable selecting the map workload profile
pub const ENV_MAP_PROFILE: &str = "AIOS_SYNC_MAP_PROFILE";

/// Contention strategy for blocking acquisitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
    /// Spin (with backoff) up to `max_spins` before parking
    Spin,
    /// Park immediately on contention
    Park,
    /// Spin on multi-core machines, park on single-core ones
    Auto,
}

impl FromStr for StrategyType {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spin" => Ok(StrategyType::Spin),
            "park" => Ok(StrategyType::Park),
            "auto" => Ok(StrategyType::Auto),
            other => Err(SyncError::InvalidConfig(format!(
                "unknown strategy '{}'",
                other
            ))),
        }
    }
}

/// Synchronization configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Preferred strategy
    pub strategy: StrategyType,
    /// Maximum spin iterations before parking
    pub max_spins: u32,
    /// Iteration after which spinning yields to the scheduler
    pub yield_after: u32,
    /// Objects cached per pool shard
    pub pool_shard_capacity: usize,
    /// Contention profile used to size map shards
    pub map_profile: WorkloadProfile,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyType::Auto,
            max_spins: DEFAULT_MAX_SPINS,
            yield_after: DEFAULT_YIELD_AFTER,
            pool_shard_capacity: DEFAULT_POOL_SHARD_CAPACITY,
            map_profile: WorkloadProfile::MediumContention,
        }
    }
}

impl SyncConfig {
    /// Configuration optimized for very short critical sections
    pub const fn low_latency() -> Self {
        Self {
            strategy: StrategyType::Spin,
            max_spins: LOW_LATENCY_MAX_SPINS,
            yield_after: DEFAULT_YIELD_AFTER * 2,
            pool_shard_capacity: DEFAULT_POOL_SHARD_CAPACITY,
            map_profile: WorkloadProfile::HighContention,
        }
    }

    /// Configuration optimized for long holds (park almost immediately)
    pub const fn long_wait() -> Self {
        Self {
            strategy: StrategyType::Auto,
            max_spins: LONG_WAIT_MAX_SPINS,
            yield_after: 1,
            pool_shard_capacity: DEFAULT_POOL_SHARD_CAPACITY,
            map_profile: WorkloadProfile::LowContention,
        }
    }

    /// Build from defaults overridden by `AIOS_SYNC_*` environment variables
    pub fn from_env() -> SyncResult<Self> {
        let mut config = Self::default();

        if let Ok(strategy) = std::env::var(ENV_STRATEGY) {
            config.strategy = strategy.parse()?;
        }
        if let Ok(spins) = std::env::var(ENV_MAX_SPINS) {
            config.max_spins = parse_number(ENV_MAX_SPINS, &spins)?;
            config.yield_after = config.yield_after.min(config.max_spins);
        }
        if let Ok(capacity) = std::env::var(ENV_POOL_CAPACITY) {
            config.pool_shard_capacity = parse_number(ENV_POOL_CAPACITY, &capacity)?;
        }
        if let Ok(profile) = std::env::var(ENV_MAP_PROFILE) {
            config.map_profile = profile.parse()?;
        }

        config.validate()?;
        tracing::debug!(?config, "sync configuration loaded from environment");
        Ok(config)
    }

    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json(json: &str) -> SyncResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the primitives cannot honor
    pub fn validate(&self) -> SyncResult<()> {
        if self.pool_shard_capacity == 0 {
            return Err(SyncError::InvalidConfig(
                "pool_shard_capacity must be at least 1".into(),
            ));
        }
        if self.yield_after > self.max_spins {
            return Err(SyncError::InvalidConfig(format!(
                "yield_after ({}) exceeds max_spins ({})",
                self.yield_after, self.max_spins
            )));
        }
        Ok(())
    }

    /// Resolve `Auto` against the current machine
    pub fn select_strategy(&self) -> StrategyType {
        match self.strategy {
            StrategyType::Auto => {
                // Spinning on one core only delays the holder
                if ShardManager::cpu_count() > 1 {
                    StrategyType::Spin
                } else {
                    StrategyType::Park
                }
            }
            other => other,
        }
    }

    /// Effective spin budget after strategy resolution
    #[inline]
    pub fn spin_budget(&self) -> u32 {
        match self.select_strategy() {
            StrategyType::Park => 0,
            _ => self.max_spins,
        }
    }

    /// Shard count for maps and pools built from this configuration
    #[inline]
    pub fn shard_count(&self) -> usize {
        ShardManager::shards(self.map_profile)
    }
}

fn parse_number<T: FromStr>(var: &str, raw: &str) -> SyncResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| SyncError::InvalidConfig(format!("{} must be a number, got '{}'", var, raw)))
}
