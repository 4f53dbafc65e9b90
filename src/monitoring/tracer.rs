/*!
 * Structured Tracing
 * Subscriber setup for the `tracing` events the primitives emit
 *
 * The primitives log lifecycle and fault events only (shard sizing, pool
 * eviction, usage faults); lock and load fast paths never log.
 */

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable enabling JSON output
pub const ENV_TRACE_JSON: &str = "AIOS_SYNC_TRACE_JSON";

/// Install a global subscriber
///
/// Environment variables:
/// - RUST_LOG: log filter (default: info)
/// - AIOS_SYNC_TRACE_JSON: `1` or `true` for JSON output
///
/// Returns false if a global subscriber was already installed, which makes
/// repeated calls (one per test, say) harmless.
pub fn init_tracing() -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var(ENV_TRACE_JSON)
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_line_number(true)
                    .with_file(true),
            )
            .try_init()
            .is_ok()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .compact(),
            )
            .try_init()
            .is_ok()
    };

    if installed {
        info!(json = use_json, "sync tracing initialized");
    }
    installed
}
