use thiserror::Error;

/// A boxed error returned by a user-supplied eviction callback.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced by [`Cache`](crate::Cache) operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// `capacity` (at construction or via `set_size`) must be at least 1.
    #[error("capacity must be at least 1")]
    InvalidCapacity,

    /// `set_size` was called with a size of 0.
    #[error("size must be at least 1")]
    InvalidSize,

    /// `insert_with_ttl` was called with a ttl of 0. Use `-1` for no expiry,
    /// or a positive nanosecond count.
    #[error("ttl must be a positive number of nanoseconds, or -1 for no expiry")]
    InvalidTtl,

    /// The requested key is not present (or has already expired and been drained).
    #[error("key not found")]
    KeyNotFound,

    /// One or more eviction callbacks failed while servicing this operation.
    /// The eviction(s) still completed; this only reports that the callback
    /// itself returned an error. Errors are in the order the evictions occurred.
    #[error("{} eviction callback(s) failed", .0.len())]
    CallbackFailure(Vec<CallbackError>),
}

impl CacheError {
    pub(crate) fn coalesce_callback_errors(mut errors: Vec<CallbackError>) -> Option<CacheError> {
        if errors.is_empty() {
            None
        } else {
            errors.shrink_to_fit();
            Some(CacheError::CallbackFailure(errors))
        }
    }
}
