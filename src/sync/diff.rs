use std::time::{Duration, SystemTime};

use tracing::debug;

use crate::ext::{RelativePathExt, SystemTimeExt};
use crate::filesystem::{PathEntry, TreeSnapshot};
use crate::sync::Action;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffOptions {
    /// Largest modification time difference still considered "unchanged".
    pub mtime_tolerance: Duration,
}

/// Actions that turn `replica` into `source`, using default options.
pub fn diff(source: &TreeSnapshot, replica: &TreeSnapshot) -> Vec<Action> {
    diff_with(source, replica, &DiffOptions::default())
}

/// Actions that turn `replica` into `source`.
///
/// Deletes come first, deepest paths first, so directories are empty by the time
/// they are removed. Creates and updates follow, shallowest first, so parents
/// exist before their contents. Replica paths the source scan skipped are left alone.
///
/// Symbolic links and special files in the replica are unlinked unless the source
/// skipped the same path: writing through a link would land outside the replica.
pub fn diff_with(
    source: &TreeSnapshot,
    replica: &TreeSnapshot,
    options: &DiffOptions,
) -> Vec<Action> {
    let mut deletes = Vec::new();
    let mut writes = Vec::new();

    for (path, source_entry) in source.iter() {
        match replica.get(path) {
            None => writes.push(Action::Create {
                path: path.to_path_buf(),
                kind: source_entry.kind(),
            }),
            Some(replica_entry) if replica_entry.kind() != source_entry.kind() => {
                deletes.push(Action::Delete {
                    path: path.to_path_buf(),
                    kind: replica_entry.kind(),
                });
                writes.push(Action::Create {
                    path: path.to_path_buf(),
                    kind: source_entry.kind(),
                });
            }
            Some(replica_entry) => {
                if is_stale(source_entry, replica_entry, options) {
                    writes.push(Action::Update {
                        path: path.to_path_buf(),
                    });
                }
            }
        }
    }

    for (path, replica_entry) in replica.iter() {
        if source.contains(path) || source.is_skipped(path) {
            continue;
        }
        deletes.push(Action::Delete {
            path: path.to_path_buf(),
            kind: replica_entry.kind(),
        });
    }

    for path in replica.special_entries() {
        if !source.is_skipped(path) {
            deletes.push(Action::Unlink {
                path: path.to_path_buf(),
            });
        }
    }

    // Stable sorts keep lexical order between paths of equal depth.
    deletes.sort_by_key(|action| std::cmp::Reverse(action.path().depth()));
    writes.sort_by_key(|action| action.path().depth());

    debug!(
        "Planned {} deletions and {} writes",
        deletes.len(),
        writes.len()
    );

    deletes.extend(writes);
    deletes
}

fn is_stale(source: &PathEntry, replica: &PathEntry, options: &DiffOptions) -> bool {
    match (source, replica) {
        (
            PathEntry::File {
                size: source_size,
                modified_time: source_time,
            },
            PathEntry::File {
                size: replica_size,
                modified_time: replica_time,
            },
        ) => {
            source_size != replica_size
                || !times_match(*source_time, *replica_time, options.mtime_tolerance)
        }
        _ => false,
    }
}

fn times_match(source: Option<SystemTime>, replica: Option<SystemTime>, tolerance: Duration) -> bool {
    match (source, replica) {
        (Some(source), Some(replica)) => source.is_within(&replica, tolerance),
        // Without timestamps on either side only the size can be compared.
        (None, None) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    use rstest::rstest;

    use crate::filesystem::EntryKind;

    fn at(secs: u64) -> Option<SystemTime> {
        Some(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
    }

    fn file(path: &str, size: u64, secs: u64) -> (PathBuf, PathEntry) {
        (
            PathBuf::from(path),
            PathEntry::File {
                size,
                modified_time: at(secs),
            },
        )
    }

    fn dir(path: &str) -> (PathBuf, PathEntry) {
        (PathBuf::from(path), PathEntry::Directory)
    }

    fn snapshot(entries: Vec<(PathBuf, PathEntry)>) -> TreeSnapshot {
        TreeSnapshot::from_entries(entries, [])
    }

    fn create(path: &str, kind: EntryKind) -> Action {
        Action::Create {
            path: PathBuf::from(path),
            kind,
        }
    }

    fn delete(path: &str, kind: EntryKind) -> Action {
        Action::Delete {
            path: PathBuf::from(path),
            kind,
        }
    }

    fn update(path: &str) -> Action {
        Action::Update {
            path: PathBuf::from(path),
        }
    }

    #[test]
    fn identical_trees_produce_no_actions() {
        let tree = snapshot(vec![file("a.txt", 3, 10), dir("sub"), file("sub/b.txt", 4, 20)]);

        assert!(diff(&tree, &tree.clone()).is_empty());
    }

    #[test]
    fn empty_replica_creates_parents_before_children() {
        let source = snapshot(vec![
            dir("a"),
            dir("a/b"),
            file("a/b/c.txt", 1, 1),
            file("z.txt", 1, 1),
        ]);

        let actions = diff(&source, &TreeSnapshot::default());

        assert_eq!(
            actions,
            vec![
                create("a", EntryKind::Directory),
                create("z.txt", EntryKind::File),
                create("a/b", EntryKind::Directory),
                create("a/b/c.txt", EntryKind::File),
            ]
        );
    }

    #[test]
    fn extra_replica_entries_are_deleted_children_first() {
        let replica = snapshot(vec![dir("old"), dir("old/deep"), file("old/deep/x", 1, 1), file("y", 1, 1)]);

        let actions = diff(&TreeSnapshot::default(), &replica);

        assert_eq!(
            actions,
            vec![
                delete("old/deep/x", EntryKind::File),
                delete("old/deep", EntryKind::Directory),
                delete("old", EntryKind::Directory),
                delete("y", EntryKind::File),
            ]
        );
    }

    #[rstest]
    #[case::size_changed(file("a.txt", 5, 10), true)]
    #[case::mtime_changed(file("a.txt", 3, 11), true)]
    #[case::unchanged(file("a.txt", 3, 10), false)]
    fn files_are_updated_when_size_or_mtime_differ(
        #[case] source_file: (PathBuf, PathEntry),
        #[case] expect_update: bool,
    ) {
        let source = snapshot(vec![source_file]);
        let replica = snapshot(vec![file("a.txt", 3, 10)]);

        let actions = diff(&source, &replica);

        if expect_update {
            assert_eq!(actions, vec![update("a.txt")]);
        } else {
            assert!(actions.is_empty());
        }
    }

    #[test]
    fn mtime_tolerance_absorbs_coarse_timestamps() {
        let source = snapshot(vec![file("a.txt", 3, 10)]);
        let replica = snapshot(vec![file("a.txt", 3, 11)]);
        let options = DiffOptions {
            mtime_tolerance: Duration::from_secs(2),
        };

        assert!(diff_with(&source, &replica, &options).is_empty());
        assert_eq!(diff(&source, &replica), vec![update("a.txt")]);
    }

    #[test]
    fn kind_change_deletes_then_recreates() {
        let source = snapshot(vec![file("thing", 1, 1)]);
        let replica = snapshot(vec![dir("thing"), file("thing/inner", 1, 1)]);

        let actions = diff(&source, &replica);

        assert_eq!(
            actions,
            vec![
                delete("thing/inner", EntryKind::File),
                delete("thing", EntryKind::Directory),
                create("thing", EntryKind::File),
            ]
        );
    }

    #[test]
    fn skipped_source_paths_protect_replica_copies() {
        let source = TreeSnapshot::from_entries(
            vec![dir("locked"), file("kept.txt", 1, 1)],
            [PathBuf::from("locked"), PathBuf::from("link")],
        );
        let replica = snapshot(vec![
            dir("locked"),
            file("locked/secret.txt", 1, 1),
            file("link", 1, 1),
            file("kept.txt", 1, 1),
            file("stale.txt", 1, 1),
        ]);

        let actions = diff(&source, &replica);

        assert_eq!(actions, vec![delete("stale.txt", EntryKind::File)]);
        assert!(
            actions
                .iter()
                .all(|action| action.path() != Path::new("locked/secret.txt"))
        );
    }

    #[test]
    fn replica_links_in_the_way_of_source_directories_are_unlinked_first() {
        let source = snapshot(vec![dir("a"), file("a/x.txt", 1, 1)]);
        let replica = TreeSnapshot::default().with_special_entries([PathBuf::from("a")]);

        let actions = diff(&source, &replica);

        assert_eq!(
            actions,
            vec![
                Action::Unlink {
                    path: PathBuf::from("a")
                },
                create("a", EntryKind::Directory),
                create("a/x.txt", EntryKind::File),
            ]
        );
    }

    #[test]
    fn replica_only_links_are_unlinked_before_their_directory_is_deleted() {
        let replica =
            snapshot(vec![dir("gone")]).with_special_entries([PathBuf::from("gone/link")]);

        let actions = diff(&TreeSnapshot::default(), &replica);

        assert_eq!(
            actions,
            vec![
                Action::Unlink {
                    path: PathBuf::from("gone/link")
                },
                delete("gone", EntryKind::Directory),
            ]
        );
    }

    #[test]
    fn replica_links_matching_skipped_source_paths_are_kept() {
        let source = TreeSnapshot::from_entries(
            vec![dir("locked")],
            [PathBuf::from("link"), PathBuf::from("locked")],
        );
        let replica = snapshot(vec![dir("locked")])
            .with_special_entries([PathBuf::from("link"), PathBuf::from("locked/inner")]);

        assert!(diff(&source, &replica).is_empty());
    }

    #[test]
    fn deletes_precede_writes() {
        let source = snapshot(vec![file("new.txt", 1, 1)]);
        let replica = snapshot(vec![dir("gone"), file("gone/old.txt", 1, 1)]);

        let actions = diff(&source, &replica);

        assert_eq!(
            actions,
            vec![
                delete("gone/old.txt", EntryKind::File),
                delete("gone", EntryKind::Directory),
                create("new.txt", EntryKind::File),
            ]
        );
    }
}
