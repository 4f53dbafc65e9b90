/*!
 * Synchronization Limits and Constants
 *
 * Centralized location for spin budgets, shard bounds and counter limits
 * used by the primitives. Organized by primitive for discoverability.
 *
 * ## Conventions
 * - Performance-critical constants are marked with [PERF]
 * - Values that must match the state-word encoding are marked with [LAYOUT]
 */

// =============================================================================
// SPIN / PARK TUNING
// =============================================================================

/// Spin iterations before a blocked lock parks (40 iterations)
/// [PERF] Short critical sections usually release within this budget
pub const DEFAULT_MAX_SPINS: u32 = 40;

/// Iteration at which spinning switches from `spin_loop` to `yield_now`
/// [PERF] Tight spinning beyond this only burns the holder's CPU
pub const DEFAULT_YIELD_AFTER: u32 = 10;

/// Spin budget for the low-latency preset
pub const LOW_LATENCY_MAX_SPINS: u32 = 200;

/// Spin budget for the long-wait preset (park almost immediately)
pub const LONG_WAIT_MAX_SPINS: u32 = 4;

/// Upper bound on exponential spin_loop bursts (2^6 = 64 pause instructions)
pub const MAX_SPIN_SHIFT: u32 = 6;

// =============================================================================
// RWMUTEX
// =============================================================================

/// Maximum concurrent readers (2^30)
/// [LAYOUT] A pending writer biases the reader counter by this amount
pub const MAX_READERS: i32 = 1 << 30;

// =============================================================================
// WAITGROUP
// =============================================================================

/// Bit offset of the counter inside the WaitGroup state word
/// [LAYOUT] High 32 bits hold the counter, low 32 bits hold the waiter count
pub const WAITGROUP_COUNTER_SHIFT: u32 = 32;

// =============================================================================
// SHARDING
// =============================================================================

/// Shard count bounds (min/max)
/// [PERF] Auto-calculated based on CPU count, clamped to this range
pub const MIN_SHARD_COUNT: usize = 8;
pub const MAX_SHARD_COUNT: usize = 512;

/// Fallback CPU count when `available_parallelism` fails
pub const FALLBACK_CPU_COUNT: usize = 8;

// =============================================================================
// POOL
// =============================================================================

/// Objects cached per pool shard (64 objects)
/// Puts beyond this overflow to neighbouring shards, then get dropped
pub const DEFAULT_POOL_SHARD_CAPACITY: usize = 64;
