//! Error types for shared-memory administration

use thiserror::Error;

/// Errors raised by `shmem_admin` administrative operations.
///
/// Variants map to the stable error kinds the rest of the system branches
/// on (`INVALID_ARG`, `NOT_FOUND`, ...); `Io` carries whatever `errno` the
/// kernel handed back verbatim.
#[derive(Error, Debug)]
pub enum ShmError {
    /// A precondition on name, page size, page count, CPU index, or mode
    /// failed validation.
    #[error("invalid argument: {reason}")]
    InvalidArg {
        /// Human-readable description of which argument failed and why.
        reason: String,
    },

    /// `info`/`unlink` on an absent region, or `info(page_sz=0)` when no
    /// size variant exists for the name.
    #[error("region not found: {name}")]
    NotFound {
        /// Region name.
        name: String,
    },

    /// `create` on a region whose backing file already exists.
    #[error("region already exists: {name}")]
    AlreadyExists {
        /// Region name.
        name: String,
    },

    /// The pre-fault lock could not be satisfied on the target node.
    #[error("out of memory pre-faulting region ({page_cnt} pages of {page_sz} bytes)")]
    NoMemory {
        /// Requested page size in bytes.
        page_sz: usize,
        /// Requested page count.
        page_cnt: usize,
    },

    /// Post-bind validation observed a page resident on an unintended node.
    #[error("page resident on numa node {actual}, expected {expected}")]
    WrongNode {
        /// Node the page actually landed on.
        actual: i32,
        /// Node the page was supposed to land on.
        expected: i32,
    },

    /// The mapping came back misaligned, or a region's stored size is not
    /// a page-size multiple. Indicates a corrupted or misconfigured mount.
    #[error("corrupt mount at {path}: {reason}")]
    CorruptMount {
        /// Path that triggered the diagnostic.
        path: String,
        /// What was observed.
        reason: String,
    },

    /// Any other kernel error from the underlying syscalls, surfaced
    /// verbatim.
    #[error("io error: {source}")]
    Io {
        /// Source IO error.
        #[from]
        source: std::io::Error,
    },
}

impl ShmError {
    /// Construct an `InvalidArg` error with a formatted reason.
    pub fn invalid_arg(reason: impl Into<String>) -> Self {
        ShmError::InvalidArg {
            reason: reason.into(),
        }
    }

    /// Build a `ShmError` from the current `errno`, logging the syscall
    /// that failed for diagnostic context.
    pub fn from_errno(syscall: &str) -> Self {
        let err = std::io::Error::last_os_error();
        tracing::warn!(syscall, %err, "syscall failed");
        ShmError::Io { source: err }
    }
}

/// Result type for shared-memory administration operations.
pub type ShmResult<T> = Result<T, ShmError>;
