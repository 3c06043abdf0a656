//! The resolver's result code: a primary outcome plus OR-combined
//! permission flag bits.
//!
//! A C-style path resolver would pack both into one `int` (low bits
//! primary code, high bits flag bits). Rust lets us split them into two
//! distinct types without losing that shape: [`Outcome`] is the closed
//! primary enumeration, [`OutcomeFlags`] is the flag bitset, and the
//! resolver's `SearchResult` pairs them the way a [`crate::CallerContext`]
//! pairs with a path.

use bit_field::BitField;

/// Primary outcome of a path resolution, a closed set. Never carries
/// payload itself; the located inode (if any) and its
/// neighbours live alongside it in the resolver's `SearchResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Resolution is not yet meaningful (internal initial state only).
    NoError,
    /// The target exists at the resolved position.
    ExactFound,
    /// The target's parent exists and is searchable, but the final
    /// component does not exist; `left`/`right` bracket where it would go.
    ExactNotFound,
    /// Some non-final path component does not exist.
    HeadNotFound,
    /// Some non-final path component exists but is not a directory.
    HeadNotDirectory,
    /// Some non-final path component exists and is a directory, but the
    /// caller lacks search (execute) permission on it.
    HeadNoPermission,
    /// The operation could not be satisfied because the volume has no
    /// free blocks or inode slots left.
    NoFreeSpace,
    /// Catch-all for conditions the dispatcher does not otherwise
    /// recognise; always collapses to `EIO` at the bridge boundary.
    GeneralError,
}

/// OR-combinable permission/ownership bits describing the *caller's*
/// rights on the parent and/or target inode located by a resolution,
/// evaluated at resolve time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutcomeFlags(u32);

const BIT_IS_OWNER: usize = 0;
const BIT_CAN_READ_PARENT: usize = 1;
const BIT_CAN_WRITE_PARENT: usize = 2;
const BIT_CAN_EXECUTE_PARENT: usize = 3;
const BIT_CAN_READ_EXACT: usize = 4;
const BIT_CAN_WRITE_EXACT: usize = 5;
const BIT_CAN_EXECUTE_EXACT: usize = 6;

impl OutcomeFlags {
    /// The empty flag set.
    pub fn empty() -> Self {
        OutcomeFlags(0)
    }

    fn with_bit(mut self, bit: usize, value: bool) -> Self {
        self.0.set_bit(bit, value);
        self
    }

    /// Set whether the caller owns the target inode.
    pub fn set_is_owner(self, v: bool) -> Self {
        self.with_bit(BIT_IS_OWNER, v)
    }
    /// Set whether the caller can read the parent directory.
    pub fn set_can_read_parent(self, v: bool) -> Self {
        self.with_bit(BIT_CAN_READ_PARENT, v)
    }
    /// Set whether the caller can write the parent directory.
    pub fn set_can_write_parent(self, v: bool) -> Self {
        self.with_bit(BIT_CAN_WRITE_PARENT, v)
    }
    /// Set whether the caller can search (execute) the parent directory.
    pub fn set_can_execute_parent(self, v: bool) -> Self {
        self.with_bit(BIT_CAN_EXECUTE_PARENT, v)
    }
    /// Set whether the caller can read the target inode.
    pub fn set_can_read_exact(self, v: bool) -> Self {
        self.with_bit(BIT_CAN_READ_EXACT, v)
    }
    /// Set whether the caller can write the target inode.
    pub fn set_can_write_exact(self, v: bool) -> Self {
        self.with_bit(BIT_CAN_WRITE_EXACT, v)
    }
    /// Set whether the caller can search/execute the target inode.
    pub fn set_can_execute_exact(self, v: bool) -> Self {
        self.with_bit(BIT_CAN_EXECUTE_EXACT, v)
    }

    /// Whether the caller owns the target inode.
    pub fn is_owner(&self) -> bool {
        self.0.get_bit(BIT_IS_OWNER)
    }
    /// Whether the caller can read the parent directory.
    pub fn can_read_parent(&self) -> bool {
        self.0.get_bit(BIT_CAN_READ_PARENT)
    }
    /// Whether the caller can write the parent directory.
    pub fn can_write_parent(&self) -> bool {
        self.0.get_bit(BIT_CAN_WRITE_PARENT)
    }
    /// Whether the caller can search (execute) the parent directory.
    pub fn can_execute_parent(&self) -> bool {
        self.0.get_bit(BIT_CAN_EXECUTE_PARENT)
    }
    /// Whether the caller can read the target inode.
    pub fn can_read_exact(&self) -> bool {
        self.0.get_bit(BIT_CAN_READ_EXACT)
    }
    /// Whether the caller can write the target inode.
    pub fn can_write_exact(&self) -> bool {
        self.0.get_bit(BIT_CAN_WRITE_EXACT)
    }
    /// Whether the caller can search/execute the target inode.
    pub fn can_execute_exact(&self) -> bool {
        self.0.get_bit(BIT_CAN_EXECUTE_EXACT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_are_independent() {
        let f = OutcomeFlags::empty()
            .set_is_owner(true)
            .set_can_read_exact(true);
        assert!(f.is_owner());
        assert!(f.can_read_exact());
        assert!(!f.can_write_exact());
        assert!(!f.can_execute_parent());
    }
}
