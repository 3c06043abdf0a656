//! The identity the bridge supplies for the process issuing the current
//! filesystem call.

use crate::limits::MAX_SUPPLEMENTARY_GROUPS;

/// Snapshot of the calling process's identity, as handed down by the FUSE
/// bridge for a single operation. Constructed fresh per call; never
/// cached, since the same mount can service many different callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    /// Caller's effective user id.
    pub uid: u32,
    /// Caller's effective (primary) group id.
    pub gid: u32,
    /// Caller's umask, consulted only at `init` time to seed the root
    /// directory's initial mode.
    pub umask: u32,
    /// Supplementary group ids, truncated to
    /// [`MAX_SUPPLEMENTARY_GROUPS`], matching FUSE's own fixed-size
    /// `fuse_getgroups` buffer.
    pub supplementary_gids: Vec<u32>,
}

impl CallerContext {
    /// Build a caller context, truncating the supplementary group list to
    /// the fixed cap the permission evaluator honours.
    pub fn new(uid: u32, gid: u32, umask: u32, mut supplementary_gids: Vec<u32>) -> Self {
        supplementary_gids.truncate(MAX_SUPPLEMENTARY_GROUPS);
        CallerContext {
            uid,
            gid,
            umask,
            supplementary_gids,
        }
    }

    /// Whether this caller is the superuser, who bypasses the
    /// search-permission check during path resolution.
    pub fn is_superuser(&self) -> bool {
        self.uid == 0
    }
}
