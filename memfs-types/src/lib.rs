//! Shared types for the in-memory filesystem engine and its FUSE bridge.
//!
//! This crate carries everything that both `memfs-core` (the engine) and
//! `memfs-bridge` (the FUSE-facing binary) need to agree on: the POSIX
//! `stat`/`statvfs`-shaped records, the caller identity the bridge hands the
//! engine on every call, the resolver's outcome codes, and the crate's
//! error type. It defines no behaviour of its own beyond small inherent
//! helpers on these types.

#![deny(missing_docs)]

pub mod caller;
pub mod error;
pub mod limits;
pub mod outcome;
pub mod stat;

pub use caller::CallerContext;
pub use error::FsError;
pub use outcome::{Outcome, OutcomeFlags};
pub use stat::{FType, Stat, SuperBlockSnapshot};
