//! The in-memory filesystem engine: inode arena, tree operator,
//! permission evaluator, resolver, data allocator, superblock
//! accountant, and operation dispatcher.
//!
//! This crate has no I/O of its own and knows nothing about FUSE; it is
//! driven entirely through [`Filesystem`]'s methods, which the bridge
//! binary calls with a [`memfs_types::CallerContext`] and path/handle
//! arguments translated from the kernel's own calling convention.

#![deny(missing_docs)]

mod alloc;
mod inode;
mod perm;
mod resolve;
mod superblock;
mod tree;

pub mod dispatch;

pub use dispatch::{DirEntry, Filesystem, OpResult, TimeUpdate};
pub use memfs_types::{CallerContext, FType, FsError, Outcome, OutcomeFlags, Stat, SuperBlockSnapshot};
