/*!
 * Core Module
 * Synchronization primitives, pooling, limits and error handling
 */

pub mod errors;
pub mod limits;
pub mod memory;
pub mod sync;

// Re-export for convenience
pub use errors::*;
pub use memory::{Pool, PoolStats};
