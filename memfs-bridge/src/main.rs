//! Process entry point: wires [`memfs_core::Filesystem`] into the
//! `fuser` crate's low-level `Filesystem` trait.
//!
//! `memfs-core` is path-based throughout (the same shape as the original
//! driver's `fuse_operations` table, whose callbacks all take a
//! `const char *path`). The kernel ABI `fuser` implements is inode-number
//! based: every call after `lookup` addresses its target by `ino`, not by
//! path. This module bridges the two by caching the path each inode
//! number was last looked up under, keyed off `memfs-core`'s own stable
//! serial numbers (which double as FUSE inode numbers — `ROOT_INO` and
//! `fuser::FUSE_ROOT_ID` are both `1`).

use std::collections::HashMap;
use std::ffi::OsStr;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fuser::{
    FileAttr, FileType, Filesystem as FuseFilesystem, MountOption, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory,
    ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, Request, TimeOrNow,
};
use memfs_core::{CallerContext, DirEntry, FType, Filesystem as MemFs, Stat};
use memfs_types::limits::{MAX_NAME_LENGTH, ROOT_INO};

/// Attribute cache TTL handed back to the kernel. There is nothing behind
/// this filesystem that changes without going through us, so any value
/// works; one second is a conservative default.
const ATTR_TTL: Duration = Duration::from_secs(1);

fn main() -> anyhow::Result<()> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let verbose = take_flag(&mut args, "--verbose");

    let mountpoint = args
        .first()
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("usage: memfs <mountpoint> [fuse options...]"))?;
    let mount_options: Vec<MountOption> = args[1..]
        .iter()
        .map(|opt| MountOption::CUSTOM(opt.clone()))
        .collect();

    let caller = mount_caller();
    let bridge = Bridge::new(MemFs::init(&caller), verbose);

    if verbose {
        eprintln!("memfs: mounting at {mountpoint} as uid={} gid={}", caller.uid, caller.gid);
    }

    fuser::mount2(bridge, &mountpoint, &mount_options)?;
    Ok(())
}

fn take_flag(args: &mut Vec<String>, flag: &str) -> bool {
    if let Some(pos) = args.iter().position(|a| a == flag) {
        args.remove(pos);
        true
    } else {
        false
    }
}

/// Read the mounting process's umask via the classic "set to zero, read
/// the old value back, restore it" trick — `umask(2)` has no read-only
/// form. Grounded in the original driver's use of `context->umask` at
/// `asdfs_internal.c:218`, which reads the mounting caller's umask once
/// to seed the root directory's mode; `fuser::Request` exposes no
/// standing umask outside `mkdir`/`mknod`/`create`, so this is read once
/// here instead, at mount time.
fn read_umask() -> u32 {
    unsafe {
        let saved = libc::umask(0);
        libc::umask(saved);
        saved as u32
    }
}

fn mount_caller() -> CallerContext {
    // SAFETY: getuid/getgid take no arguments and cannot fail.
    let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };
    CallerContext::new(uid, gid, read_umask(), vec![])
}

/// Build the per-call identity `memfs-core` evaluates permissions
/// against. `fuser`'s request carries the effective uid/gid the kernel
/// resolved for the calling process, but no supplementary group list and
/// no umask (umask is only meaningful at root-creation time, already
/// captured in [`mount_caller`]).
fn caller_from(req: &Request<'_>) -> CallerContext {
    CallerContext::new(req.uid(), req.gid(), 0, vec![])
}

fn stat_to_attr(stat: &Stat) -> FileAttr {
    FileAttr {
        ino: stat.ino,
        size: stat.size,
        blocks: stat.blocks,
        atime: epoch(stat.atime),
        mtime: epoch(stat.mtime),
        ctime: epoch(stat.ctime),
        crtime: epoch(stat.ctime),
        kind: match stat.file_type() {
            FType::Directory => FileType::Directory,
            FType::Regular => FileType::RegularFile,
        },
        perm: stat.permission_bits() as u16,
        nlink: stat.nlink,
        uid: stat.uid,
        gid: stat.gid,
        rdev: stat.rdev as u32,
        blksize: memfs_types::limits::BLOCK_SIZE as u32,
        flags: 0,
    }
}

fn epoch(seconds: i64) -> SystemTime {
    if seconds >= 0 {
        UNIX_EPOCH + Duration::from_secs(seconds as u64)
    } else {
        UNIX_EPOCH - Duration::from_secs((-seconds) as u64)
    }
}

fn time_or_now_to_secs(t: TimeOrNow) -> i64 {
    match t {
        TimeOrNow::Now => SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0),
        TimeOrNow::SpecificTime(t) => t
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0),
    }
}

fn entry_kind(file_type: FType) -> FileType {
    match file_type {
        FType::Directory => FileType::Directory,
        FType::Regular => FileType::RegularFile,
    }
}

/// Inode-number-to-path cache, populated lazily as the kernel performs
/// `lookup` calls. Every FUSE inode number this bridge hands out is one
/// of `memfs-core`'s own stable serial numbers, so the cache is just the
/// inverse of the path the resolver would have walked to reach it.
struct PathCache {
    by_ino: HashMap<u64, String>,
}

impl PathCache {
    fn new() -> Self {
        let mut by_ino = HashMap::new();
        by_ino.insert(ROOT_INO, "/".to_string());
        PathCache { by_ino }
    }

    fn path_of(&self, ino: u64) -> Option<String> {
        self.by_ino.get(&ino).cloned()
    }

    fn remember(&mut self, ino: u64, path: String) {
        self.by_ino.insert(ino, path);
    }

    fn forget_path(&mut self, path: &str) {
        self.by_ino.retain(|_, p| p != path);
    }

    /// After a successful rename, every cached path under `old_path`
    /// (the renamed entry itself and, if it was a directory, its whole
    /// subtree) is rewritten with `new_path`'s prefix so later calls
    /// against already-looked-up descendants keep resolving correctly.
    fn rename_prefix(&mut self, old_path: &str, new_path: &str) {
        for path in self.by_ino.values_mut() {
            if path == old_path {
                *path = new_path.to_string();
            } else if let Some(rest) = path.strip_prefix(&format!("{old_path}/")) {
                *path = format!("{new_path}/{rest}");
            }
        }
    }
}

fn child_path(parent_path: &str, name: &OsStr) -> Option<String> {
    let name = name.to_str()?;
    if name.len() > MAX_NAME_LENGTH {
        return None;
    }
    Some(if parent_path == "/" {
        format!("/{name}")
    } else {
        format!("{parent_path}/{name}")
    })
}

/// Adapter implementing `fuser::Filesystem` over a [`memfs_core::Filesystem`].
struct Bridge {
    fs: MemFs,
    paths: Mutex<PathCache>,
    verbose: bool,
}

impl Bridge {
    fn new(fs: MemFs, verbose: bool) -> Self {
        Bridge {
            fs,
            paths: Mutex::new(PathCache::new()),
            verbose,
        }
    }

    fn log(&self, call: &str) {
        if self.verbose {
            eprintln!("memfs: {call}");
        }
    }

    fn path_of(&self, ino: u64) -> Result<String, i32> {
        self.paths.lock().unwrap().path_of(ino).ok_or(libc::ENOENT)
    }
}

impl FuseFilesystem for Bridge {
    fn lookup(&mut self, req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        self.log(&format!("lookup(parent={parent}, name={name:?})"));
        let parent_path = match self.path_of(parent) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        let path = match child_path(&parent_path, name) {
            Some(p) => p,
            None => return reply.error(libc::ENAMETOOLONG),
        };
        match self.fs.getattr(&caller_from(req), &path) {
            Ok(stat) => {
                self.paths.lock().unwrap().remember(stat.ino, path);
                reply.entry(&ATTR_TTL, &stat_to_attr(&stat), 0);
            }
            Err(errno) => reply.error(errno),
        }
    }

    fn forget(&mut self, _req: &Request<'_>, _ino: u64, _nlookup: u64) {
        // The cache never evicts entries on `forget`: paths are cheap to
        // keep and re-deriving them would require walking the tree
        // backwards, which `memfs-core` has no operation for.
    }

    fn getattr(&mut self, req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        self.log(&format!("getattr(ino={ino})"));
        let path = match self.path_of(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        match self.fs.getattr(&caller_from(req), &path) {
            Ok(stat) => reply.attr(&ATTR_TTL, &stat_to_attr(&stat)),
            Err(errno) => reply.error(errno),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn setattr(
        &mut self,
        req: &Request<'_>,
        ino: u64,
        mode: Option<u32>,
        uid: Option<u32>,
        gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        self.log(&format!("setattr(ino={ino})"));
        let path = match self.path_of(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        let caller = caller_from(req);
        let mut last = None;

        if let Some(mode) = mode {
            match self.fs.chmod(&caller, &path, mode) {
                Ok(stat) => last = Some(stat),
                Err(e) => return reply.error(e),
            }
        }
        if uid.is_some() || gid.is_some() {
            match self.fs.chown(&caller, &path, uid, gid) {
                Ok(stat) => last = Some(stat),
                Err(e) => return reply.error(e),
            }
        }
        if let Some(size) = size {
            match self.fs.truncate(&caller, &path, size) {
                Ok(stat) => last = Some(stat),
                Err(e) => return reply.error(e),
            }
        }
        if atime.is_some() || mtime.is_some() {
            let times = memfs_core::TimeUpdate {
                atime: atime.map(time_or_now_to_secs),
                mtime: mtime.map(time_or_now_to_secs),
            };
            match self.fs.utimens(&caller, &path, times) {
                Ok(stat) => last = Some(stat),
                Err(e) => return reply.error(e),
            }
        }

        let stat = match last {
            Some(stat) => stat,
            None => match self.fs.getattr(&caller, &path) {
                Ok(stat) => stat,
                Err(e) => return reply.error(e),
            },
        };
        reply.attr(&ATTR_TTL, &stat_to_attr(&stat));
    }

    fn mknod(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        rdev: u32,
        reply: ReplyEntry,
    ) {
        self.log(&format!("mknod(parent={parent}, name={name:?})"));
        let parent_path = match self.path_of(parent) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        let path = match child_path(&parent_path, name) {
            Some(p) => p,
            None => return reply.error(libc::ENAMETOOLONG),
        };
        match self.fs.mknod(&caller_from(req), &path, mode, rdev as u64) {
            Ok(stat) => {
                self.paths.lock().unwrap().remember(stat.ino, path);
                reply.entry(&ATTR_TTL, &stat_to_attr(&stat), 0);
            }
            Err(errno) => reply.error(errno),
        }
    }

    fn mkdir(&mut self, req: &Request<'_>, parent: u64, name: &OsStr, mode: u32, _umask: u32, reply: ReplyEntry) {
        self.log(&format!("mkdir(parent={parent}, name={name:?})"));
        let parent_path = match self.path_of(parent) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        let path = match child_path(&parent_path, name) {
            Some(p) => p,
            None => return reply.error(libc::ENAMETOOLONG),
        };
        match self.fs.mkdir(&caller_from(req), &path, mode) {
            Ok(stat) => {
                self.paths.lock().unwrap().remember(stat.ino, path);
                reply.entry(&ATTR_TTL, &stat_to_attr(&stat), 0);
            }
            Err(errno) => reply.error(errno),
        }
    }

    fn unlink(&mut self, req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        self.log(&format!("unlink(parent={parent}, name={name:?})"));
        let parent_path = match self.path_of(parent) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        let path = match child_path(&parent_path, name) {
            Some(p) => p,
            None => return reply.error(libc::ENAMETOOLONG),
        };
        match self.fs.unlink(&caller_from(req), &path) {
            Ok(()) => {
                self.paths.lock().unwrap().forget_path(&path);
                reply.ok();
            }
            Err(errno) => reply.error(errno),
        }
    }

    fn rmdir(&mut self, req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        self.log(&format!("rmdir(parent={parent}, name={name:?})"));
        let parent_path = match self.path_of(parent) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        let path = match child_path(&parent_path, name) {
            Some(p) => p,
            None => return reply.error(libc::ENAMETOOLONG),
        };
        match self.fs.rmdir(&caller_from(req), &path) {
            Ok(()) => {
                self.paths.lock().unwrap().forget_path(&path);
                reply.ok();
            }
            Err(errno) => reply.error(errno),
        }
    }

    fn rename(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        self.log(&format!("rename(parent={parent}, name={name:?} -> newparent={newparent}, newname={newname:?})"));
        let old_parent_path = match self.path_of(parent) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        let new_parent_path = match self.path_of(newparent) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        let old_path = match child_path(&old_parent_path, name) {
            Some(p) => p,
            None => return reply.error(libc::ENAMETOOLONG),
        };
        let new_path = match child_path(&new_parent_path, newname) {
            Some(p) => p,
            None => return reply.error(libc::ENAMETOOLONG),
        };
        match self.fs.rename(&caller_from(req), &old_path, &new_path) {
            Ok(()) => {
                self.paths.lock().unwrap().rename_prefix(&old_path, &new_path);
                reply.ok();
            }
            Err(errno) => reply.error(errno),
        }
    }

    fn open(&mut self, req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        self.log(&format!("open(ino={ino})"));
        let path = match self.path_of(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        match self.fs.open(&caller_from(req), &path, flags) {
            Ok(handle) => reply.opened(handle, 0),
            Err(errno) => reply.error(errno),
        }
    }

    fn create(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        flags: i32,
        reply: ReplyCreate,
    ) {
        self.log(&format!("create(parent={parent}, name={name:?})"));
        let parent_path = match self.path_of(parent) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        let path = match child_path(&parent_path, name) {
            Some(p) => p,
            None => return reply.error(libc::ENAMETOOLONG),
        };
        let caller = caller_from(req);
        let stat = match self.fs.mknod(&caller, &path, mode, 0) {
            Ok(stat) => stat,
            Err(errno) => return reply.error(errno),
        };
        self.paths.lock().unwrap().remember(stat.ino, path.clone());
        match self.fs.open(&caller, &path, flags) {
            Ok(handle) => reply.created(&ATTR_TTL, &stat_to_attr(&stat), 0, handle, 0),
            Err(errno) => reply.error(errno),
        }
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        self.fs.release(fh);
        reply.ok();
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        match self.fs.read(fh, size as usize, offset.max(0) as u64) {
            Ok(data) => reply.data(&data),
            Err(errno) => reply.error(errno),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        match self.fs.write(fh, data, offset.max(0) as u64) {
            Ok(written) => reply.written(written as u32),
            Err(errno) => reply.error(errno),
        }
    }

    fn opendir(&mut self, req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        self.log(&format!("opendir(ino={ino})"));
        let path = match self.path_of(ino) {
            Ok(p) => p,
            Err(e) => return reply.error(e),
        };
        match self.fs.opendir(&caller_from(req), &path) {
            Ok(handle) => reply.opened(handle, 0),
            Err(errno) => reply.error(errno),
        }
    }

    /// Always replies with the full listing from entry 0, ignoring
    /// `offset`, matching the original driver's `asdfs_readdir` and the
    /// resolved open question recorded for this crate: directory-stream
    /// pagination across multiple kernel `readdir` calls is out of scope.
    fn readdir(&mut self, _req: &Request<'_>, _ino: u64, fh: u64, offset: i64, reply: ReplyDirectory) {
        if offset > 0 {
            reply.ok();
            return;
        }
        let entries: Vec<DirEntry> = match self.fs.readdir(fh) {
            Ok(entries) => entries,
            Err(errno) => return reply.error(errno),
        };
        for (i, entry) in entries.iter().enumerate() {
            let full = reply.add(entry.ino, (i + 1) as i64, entry_kind(entry.file_type), &entry.name);
            if full {
                break;
            }
        }
        reply.ok();
    }

    fn releasedir(&mut self, _req: &Request<'_>, _ino: u64, fh: u64, _flags: i32, reply: ReplyEmpty) {
        self.fs.release(fh);
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
        let snap = self.fs.statfs();
        reply.statfs(
            snap.total_blocks,
            snap.free_blocks,
            snap.available_blocks,
            snap.total_inodes,
            snap.total_inodes - snap.inodes_in_use,
            snap.block_size as u32,
            snap.max_name_length as u32,
            snap.block_size as u32,
        );
    }
}
