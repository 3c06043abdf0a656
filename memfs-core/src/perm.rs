//! Permission evaluator: pure predicates over a caller identity and an
//! inode's stat block, under strict POSIX discretionary access rules —
//! exactly one class (owner, group, other) is consulted per check, never
//! an OR of several.

use memfs_types::{CallerContext, Stat};

/// Which permission class applies to this caller for this inode, chosen
/// by the first matching rule: owner, else group (primary or any
/// supplementary gid), else other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    Owner,
    Group,
    Other,
}

fn classify(caller: &CallerContext, stat: &Stat) -> Class {
    if caller.uid == stat.uid {
        Class::Owner
    } else if caller.gid == stat.gid || caller.supplementary_gids.contains(&stat.gid) {
        Class::Group
    } else {
        Class::Other
    }
}

fn rwx_for(stat: &Stat, class: Class) -> (bool, bool, bool) {
    match class {
        Class::Owner => stat.owner_rwx(),
        Class::Group => stat.group_rwx(),
        Class::Other => stat.other_rwx(),
    }
}

/// Whether `caller` may read `stat` under strict-POSIX DAC.
pub fn can_read(caller: &CallerContext, stat: &Stat) -> bool {
    rwx_for(stat, classify(caller, stat)).0
}

/// Whether `caller` may write `stat` under strict-POSIX DAC.
pub fn can_write(caller: &CallerContext, stat: &Stat) -> bool {
    rwx_for(stat, classify(caller, stat)).1
}

/// Whether `caller` may execute/search `stat` under strict-POSIX DAC.
pub fn can_execute(caller: &CallerContext, stat: &Stat) -> bool {
    rwx_for(stat, classify(caller, stat)).2
}

/// Whether `caller` owns `stat`, the precondition for `chmod`.
pub fn is_owner(caller: &CallerContext, stat: &Stat) -> bool {
    caller.uid == stat.uid
}
