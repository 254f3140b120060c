use std::path::{Component, Path, PathBuf};

/// Absolute, normalized form of `path`, resolving symlinks when the path exists.
pub fn best_effort_absolute(path: &Path) -> PathBuf {
    match path.canonicalize() {
        Ok(canonical_path) => canonical_path,
        Err(_) => {
            let absolute_path = if path.is_absolute() {
                path.to_path_buf()
            } else {
                match std::env::current_dir() {
                    Ok(current_dir) => current_dir.join(path),
                    Err(_) => path.to_path_buf(),
                }
            };

            let normalized = normalize_path(&absolute_path);
            // A file that does not exist yet still resolves through its parent.
            match (normalized.parent(), normalized.file_name()) {
                (Some(parent), Some(file_name)) => match parent.canonicalize() {
                    Ok(canonical_parent) => canonical_parent.join(file_name),
                    Err(_) => normalized,
                },
                _ => normalized,
            }
        }
    }
}

fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !components.is_empty() && !matches!(components.last(), Some(Component::RootDir))
                {
                    components.pop();
                }
            }
            _ => components.push(component),
        }
    }

    components.iter().collect()
}

pub trait BestEffortPathExt {
    fn best_effort_path_display(&self) -> String;

    /// Whether both paths resolve to the same location, or one lies inside the other.
    fn overlaps(&self, other: &Path) -> bool;

    /// Whether the path resolves to `root` or to a location below it.
    fn lies_within(&self, root: &Path) -> bool;
}

impl BestEffortPathExt for Path {
    fn best_effort_path_display(&self) -> String {
        best_effort_absolute(self).display().to_string()
    }

    fn overlaps(&self, other: &Path) -> bool {
        self.lies_within(other) || other.lies_within(self)
    }

    fn lies_within(&self, root: &Path) -> bool {
        best_effort_absolute(self).starts_with(best_effort_absolute(root))
    }
}

impl BestEffortPathExt for PathBuf {
    fn best_effort_path_display(&self) -> String {
        self.as_path().best_effort_path_display()
    }

    fn overlaps(&self, other: &Path) -> bool {
        self.as_path().overlaps(other)
    }

    fn lies_within(&self, root: &Path) -> bool {
        self.as_path().lies_within(root)
    }
}

/// Helpers for paths relative to a tree root.
pub trait RelativePathExt {
    /// Number of normal components; `a/b/c` has depth 3.
    fn depth(&self) -> usize;
}

impl RelativePathExt for Path {
    fn depth(&self) -> usize {
        self.components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .count()
    }
}
