/*!
 * Adaptive Spin Backoff
 *
 * Bounded spinning used by the locks before parking a contended thread.
 *
 * # Two-Phase Backoff
 *
 * 1. **Tight spin**: exponentially growing bursts of `spin_loop` hints,
 *    best when the holder releases within a few hundred nanoseconds
 * 2. **Yield**: `thread::yield_now` lets the holder run on oversubscribed CPUs
 *
 * Once the budget is exhausted `spin` returns `false` and the caller parks.
 * There is no sleep phase: parked threads are woken precisely by unlock.
 */

use crate::core::sync::config::SyncConfig;
use crate::core::limits::{DEFAULT_MAX_SPINS, DEFAULT_YIELD_AFTER, MAX_SPIN_SHIFT};
use std::thread;

/// Spin budget carried by each lock instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpinPolicy {
    /// Spin iterations before parking (0 = park immediately)
    pub max_spins: u32,
    /// Iteration at which spinning switches to yielding
    pub yield_after: u32,
}

impl SpinPolicy {
    pub const DEFAULT: SpinPolicy = SpinPolicy {
        max_spins: DEFAULT_MAX_SPINS,
        yield_after: DEFAULT_YIELD_AFTER,
    };

    /// Never spin
    pub const PARK: SpinPolicy = SpinPolicy {
        max_spins: 0,
        yield_after: 0,
    };

    /// Derive from configuration (strategy resolved against the machine)
    pub fn from_config(config: &SyncConfig) -> Self {
        let max_spins = config.spin_budget();
        Self {
            max_spins,
            yield_after: config.yield_after.min(max_spins),
        }
    }
}

impl Default for SpinPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Per-acquisition spin state
#[derive(Debug)]
pub struct SpinWait {
    counter: u32,
    policy: SpinPolicy,
}

impl SpinWait {
    #[inline]
    pub fn new(policy: SpinPolicy) -> Self {
        Self { counter: 0, policy }
    }

    /// Spin once; returns false when the caller should park instead
    #[inline]
    pub fn spin(&mut self) -> bool {
        if self.counter >= self.policy.max_spins {
            return false;
        }

        if self.counter < self.policy.yield_after {
            let burst = 1u32 << self.counter.min(MAX_SPIN_SHIFT);
            for _ in 0..burst {
                std::hint::spin_loop();
            }
        } else {
            thread::yield_now();
        }

        self.counter += 1;
        true
    }

    /// Restart the budget (after a wakeup)
    #[inline]
    pub fn reset(&mut self) {
        self.counter = 0;
    }

    /// Iterations spent so far
    #[inline]
    pub fn spins(&self) -> u32 {
        self.counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sync::config::StrategyType;

    #[test]
    fn test_budget_exhaustion() {
        let mut spin = SpinWait::new(SpinPolicy {
            max_spins: 5,
            yield_after: 2,
        });

        let mut iterations = 0;
        while spin.spin() {
            iterations += 1;
        }

        assert_eq!(iterations, 5);
        assert_eq!(spin.spins(), 5);
        assert!(!spin.spin());

        spin.reset();
        assert!(spin.spin());
    }

    #[test]
    fn test_park_policy_never_spins() {
        let mut spin = SpinWait::new(SpinPolicy::PARK);
        assert!(!spin.spin());
    }

    #[test]
    fn test_policy_from_config() {
        let config = SyncConfig {
            strategy: StrategyType::Park,
            ..Default::default()
        };
        assert_eq!(SpinPolicy::from_config(&config), SpinPolicy::PARK);

        let config = SyncConfig {
            strategy: StrategyType::Spin,
            max_spins: 8,
            yield_after: 3,
            ..Default::default()
        };
        let policy = SpinPolicy::from_config(&config);
        assert_eq!(policy.max_spins, 8);
        assert_eq!(policy.yield_after, 3);
    }
}
