/*!
 * Synchronization Management
 *
 * CPU-topology-aware sizing for sharded containers:
 * - Shard count calculation
 * - Workload profiling
 */

mod shard_manager;

// Re-export public API
pub use shard_manager::{ShardManager, WorkloadProfile};
