use std::fmt;
use std::path::{Path, PathBuf};

use derive_more::Display;

use crate::filesystem::EntryKind;

/// One change to bring a replica path in line with the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Create { path: PathBuf, kind: EntryKind },
    Update { path: PathBuf },
    Delete { path: PathBuf, kind: EntryKind },
    /// Removes a symbolic link or special file itself, never what it points to.
    Unlink { path: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ActionKind {
    #[display("create")]
    Create,
    #[display("update")]
    Update,
    #[display("delete")]
    Delete,
    #[display("unlink")]
    Unlink,
}

impl Action {
    pub fn path(&self) -> &Path {
        match self {
            Action::Create { path, .. }
            | Action::Update { path }
            | Action::Delete { path, .. }
            | Action::Unlink { path } => path,
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Create { .. } => ActionKind::Create,
            Action::Update { .. } => ActionKind::Update,
            Action::Delete { .. } => ActionKind::Delete,
            Action::Unlink { .. } => ActionKind::Unlink,
        }
    }

    /// `None` for entries the scanner does not model, such as symbolic links.
    pub fn entry_kind(&self) -> Option<EntryKind> {
        match self {
            Action::Create { kind, .. } | Action::Delete { kind, .. } => Some(*kind),
            Action::Update { .. } => Some(EntryKind::File),
            Action::Unlink { .. } => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.kind())?;
        if let Some(entry_kind) = self.entry_kind() {
            write!(f, "{entry_kind} ")?;
        }
        write!(f, "'{}'", self.path().display())
    }
}
