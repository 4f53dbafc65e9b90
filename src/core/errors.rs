/*!
 * Error Types
 * Usage-fault taxonomy for the synchronization primitives, with thiserror,
 * miette and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for checked primitive operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Programmer errors detected by the primitives
///
/// None of these are transient: the blocking operations never fail, they
/// only block. Each variant corresponds to a contract violation that would
/// otherwise corrupt shared state.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum SyncError {
    #[error("sync: unlock of unlocked mutex")]
    #[diagnostic(
        code(sync::unlock_of_unlocked),
        help("Every unlock must be paired with a preceding lock or successful try_lock.")
    )]
    UnlockOfUnlocked,

    #[error("sync: RUnlock of unlocked RWMutex")]
    #[diagnostic(
        code(sync::runlock_of_unlocked),
        help("runlock was called more times than rlock/try_rlock succeeded.")
    )]
    RUnlockOfUnlocked,

    #[error("sync: Unlock of unlocked RWMutex")]
    #[diagnostic(
        code(sync::unlock_of_unlocked_rw),
        help("The write side is not held. Readers must use runlock.")
    )]
    UnlockOfUnlockedRw,

    #[error("sync: negative WaitGroup counter")]
    #[diagnostic(
        code(sync::negative_counter),
        help("done was called more times than the count registered with add.")
    )]
    NegativeCounter,

    #[error("sync: WaitGroup counter overflow")]
    #[diagnostic(
        code(sync::counter_overflow),
        help("The outstanding count exceeds i32::MAX. Register work in smaller batches.")
    )]
    CounterOverflow,

    #[error("sync: WaitGroup is reused before previous Wait has returned")]
    #[diagnostic(
        code(sync::waitgroup_misuse),
        help("Start a new round of add calls only after every waiter of the last round returned.")
    )]
    WaitGroupMisuse,

    #[error("Invalid sync configuration: {0}")]
    #[diagnostic(
        code(sync::invalid_config),
        help("Review SyncConfig fields and AIOS_SYNC_* environment variables.")
    )]
    InvalidConfig(String),
}

impl SyncError {
    /// Whether this error is a contract violation on a primitive (as opposed
    /// to a configuration problem)
    pub fn is_usage_fault(&self) -> bool {
        !matches!(self, SyncError::InvalidConfig(_))
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::InvalidConfig(err.to_string())
    }
}

/// Fail fast on a usage fault
///
/// Shared state may already be inconsistent from the caller's point of view,
/// so the fault is logged and the calling thread panics.
#[cold]
#[track_caller]
pub fn fault(err: SyncError) -> ! {
    let location = std::panic::Location::caller();
    tracing::error!(error = %err, %location, "synchronization usage fault");
    panic!("{}", err)
}
