//! Snapshots of directory trees.
//!
//! A [`TreeSnapshot`] records every file and directory under a root, keyed by
//! path relative to that root, together with the size and modification time
//! of each file. Snapshots are cheap to rebuild and are never cached.

mod tree;

pub use tree::{EntryKind, PathEntry, ScanError, TreeSnapshot};
