//! Error type shared by the engine and the bridge.
//!
//! A `thiserror`-derived enum with one variant per internal failure
//! class, plus a crate-local `Result` alias. This is the *internal*
//! error dimension — distinct from the POSIX errno values returned
//! across the bridge boundary, which the dispatcher derives from
//! [`crate::Outcome`] rather than from this type.

use thiserror::Error;

/// Error type returned by fallible `memfs-core` operations that are not
/// already captured by the resolver's [`crate::Outcome`] enum.
#[derive(Error, Debug, PartialEq, Eq, Clone, Copy)]
pub enum FsError {
    /// The quota accountant could not satisfy a block request.
    #[error("no free space left on the volume")]
    NoFreeSpace,
    /// An inode handle did not refer to a live inode (stale handle, or
    /// out-of-range serial number).
    #[error("inode handle is stale or out of range")]
    StaleHandle,
    /// A tree mutation was attempted that would violate a structural
    /// invariant (e.g. inserting under a non-directory).
    #[error("invalid filesystem operation: {0}")]
    InvalidOperation(&'static str),
}

/// Shorthand `Result` alias for fallible engine operations.
pub type Result<T> = std::result::Result<T, FsError>;
