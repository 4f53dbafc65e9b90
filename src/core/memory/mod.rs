/*!
 * Memory Utilities
 *
 * Object pooling for zero-allocation patterns: frequently allocated and
 * released objects (buffers, scratch structures) are cached per shard and
 * reused instead of going back to the allocator.
 */

mod pool;

pub use pool::{Pool, PoolStats};
