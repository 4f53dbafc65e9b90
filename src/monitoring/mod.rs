/*!
 * Monitoring
 * Tracing subscriber setup for primitive diagnostics
 */

mod tracer;

pub use tracer::{init_tracing, ENV_TRACE_JSON};
