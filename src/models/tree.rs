//! Tree object DTOs.
//!
//! - `FileMode`: remote-API mode strings for tree entries
//! - `TreeEntry`: one named entry of a tree object (mode, kind, hash)
//! - `upsert`: the pure remove-then-append merge step used while rebuilding
//!   a destination tree from a baseline listing

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::models::ObjectKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileMode {
    Directory,
    Regular,
    Executable,
    Symlink,
}

impl FileMode {
    /// The mode string used by the remote API.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileMode::Directory => "040000",
            FileMode::Regular => "100644",
            FileMode::Executable => "100755",
            FileMode::Symlink => "120000",
        }
    }

    pub fn from_str(mode: &str) -> Result<Self> {
        match mode {
            "040000" => Ok(FileMode::Directory),
            "100644" => Ok(FileMode::Regular),
            "100755" => Ok(FileMode::Executable),
            "120000" => Ok(FileMode::Symlink),
            other => Err(SyncError::UnsupportedOperation(format!(
                "unknown file mode '{other}'"
            ))),
        }
    }

    pub fn kind(&self) -> ObjectKind {
        match self {
            FileMode::Directory => ObjectKind::Tree,
            _ => ObjectKind::Blob,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub name: String,
    pub mode: FileMode,
    pub kind: ObjectKind,
    pub hash: String,
}

impl TreeEntry {
    pub fn new(name: &str, mode: FileMode, hash: &str) -> Self {
        Self {
            name: name.to_string(),
            mode,
            kind: mode.kind(),
            hash: hash.to_string(),
        }
    }
}

/// Replace-on-name-match: drop any baseline entry with the same name, then
/// append the new one. Produces a new list; the input is consumed, never
/// edited in place by callers holding other references.
pub fn upsert(entries: Vec<TreeEntry>, entry: TreeEntry) -> Vec<TreeEntry> {
    let mut merged: Vec<TreeEntry> = entries
        .into_iter()
        .filter(|e| e.name != entry.name)
        .collect();
    merged.push(entry);
    merged
}

/// Drop the entry with the given name, if present.
pub fn without(entries: Vec<TreeEntry>, name: &str) -> Vec<TreeEntry> {
    entries.into_iter().filter(|e| e.name != name).collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn names(entries: &[TreeEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn mode_round_trip() {
        for mode in [
            FileMode::Directory,
            FileMode::Regular,
            FileMode::Executable,
            FileMode::Symlink,
        ] {
            assert_eq!(FileMode::from_str(mode.as_str()).unwrap(), mode);
        }
        assert!(FileMode::from_str("160000").is_err());
    }

    #[test]
    fn upsert_appends_new_name() {
        let baseline = vec![
            TreeEntry::new("a.txt", FileMode::Regular, "shaA"),
            TreeEntry::new("b.txt", FileMode::Regular, "shaB"),
        ];
        let merged = upsert(baseline, TreeEntry::new("c.txt", FileMode::Regular, "shaC"));
        assert_eq!(names(&merged), vec!["a.txt", "b.txt", "c.txt"]);
    }

    #[test]
    fn upsert_replaces_on_collision() {
        let baseline = vec![
            TreeEntry::new("a.txt", FileMode::Regular, "shaA"),
            TreeEntry::new("b.txt", FileMode::Regular, "shaB"),
        ];
        let merged = upsert(baseline, TreeEntry::new("b.txt", FileMode::Regular, "shaB2"));
        assert_eq!(names(&merged), vec!["a.txt", "b.txt"]);
        assert_eq!(merged[1].hash, "shaB2");
    }

    #[test]
    fn without_removes_by_name() {
        let baseline = vec![
            TreeEntry::new("a.txt", FileMode::Regular, "shaA"),
            TreeEntry::new("b.txt", FileMode::Regular, "shaB"),
        ];
        let trimmed = without(baseline, "a.txt");
        assert_eq!(names(&trimmed), vec!["b.txt"]);
    }
}
