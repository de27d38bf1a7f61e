//! Error kinds shared by every fallible operation in this crate (spec §7).
//!
//! Every operation that can fail returns `Result<T, DalError>`; on failure,
//! partial outputs are left in a valid-but-unspecified state and any scoped
//! resource (block views, thread-local accumulators) has already been
//! released by its own `Drop` before the error reaches the caller.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DalError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("out of memory: {0}")]
    OutOfMemory(String),

    #[error("internal error: {0}")]
    InternalError(String),

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("collective operation failed: {0}")]
    CollectiveFailed(String),

    #[error("CPU topology unavailable, degraded to defaults: {0}")]
    TopologyUnavailable(String),
}

pub type DalResult<T> = Result<T, DalError>;
