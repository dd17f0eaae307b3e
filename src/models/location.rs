//! Location: a pointer to one object inside one hosted repository.
//!
//! - `ObjectKind`: tree (directory) or blob (file content)
//! - `Location`: owner + repo + branch + path segments + optional resolved
//!   content hash
//!
//! A location is immutable after construction except for the hash, which is
//! filled in exactly once during enrichment (`with_hash`). Identity is
//! owner/repo/branch/path; the hash is metadata, not identity.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Tree,
    Blob,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub kind: ObjectKind,
    pub path: Vec<String>,
    pub hash: Option<String>,
}

impl Location {
    /// The root of a repository at a branch. Roots are always trees.
    pub fn root(owner: &str, repo: &str, branch: &str) -> Self {
        Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            branch: branch.to_string(),
            kind: ObjectKind::Tree,
            path: Vec::new(),
            hash: None,
        }
    }

    /// Build a location from configuration strings: an "owner/repo" spec, a
    /// branch name, and a slash-separated path ("" or "/" for the root).
    pub fn parse(repo_spec: &str, branch: &str, path: &str, kind: ObjectKind) -> Result<Self> {
        let (owner, repo) = repo_spec.split_once('/').ok_or_else(|| {
            SyncError::ConfigurationConflict(format!(
                "repository spec '{repo_spec}' is not of the form owner/repo"
            ))
        })?;
        if owner.is_empty() || repo.is_empty() {
            return Err(SyncError::ConfigurationConflict(format!(
                "repository spec '{repo_spec}' is not of the form owner/repo"
            )));
        }

        let segments: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect();

        if segments.is_empty() && kind != ObjectKind::Tree {
            return Err(SyncError::InvalidTraversal(format!(
                "the root of {repo_spec} is a tree, not a blob"
            )));
        }

        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            branch: branch.to_string(),
            kind,
            path: segments,
            hash: None,
        })
    }

    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    /// Last path segment, if any.
    pub fn name(&self) -> Option<&str> {
        self.path.last().map(|s| s.as_str())
    }

    pub fn path_str(&self) -> String {
        self.path.join("/")
    }

    /// A child location one level deeper. Fails unless this location is a
    /// tree: blobs have no children.
    pub fn combine(&self, kind: ObjectKind, name: &str, hash: Option<String>) -> Result<Self> {
        if self.kind != ObjectKind::Tree {
            return Err(SyncError::InvalidTraversal(format!(
                "cannot descend below blob {}",
                self.url()
            )));
        }
        let mut path = self.path.clone();
        path.push(name.to_string());
        Ok(Self {
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            branch: self.branch.clone(),
            kind,
            path,
            hash,
        })
    }

    /// The location one path segment shorter. The repository root has no
    /// parent; asking for one is a programming error, never a degenerate
    /// value.
    pub fn parent(&self) -> Result<Self> {
        if self.is_root() {
            return Err(SyncError::InvalidTraversal(format!(
                "repository root {} has no parent",
                self.url()
            )));
        }
        let mut path = self.path.clone();
        path.pop();
        Ok(Self {
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            branch: self.branch.clone(),
            kind: ObjectKind::Tree,
            path,
            hash: None,
        })
    }

    /// Copy of this location with the content hash resolved.
    pub fn with_hash(&self, hash: &str) -> Self {
        let mut loc = self.clone();
        loc.hash = Some(hash.to_string());
        loc
    }

    /// Display-only identifier for logging. Not parsed back.
    pub fn url(&self) -> String {
        let kind = match self.kind {
            ObjectKind::Tree => "tree",
            ObjectKind::Blob => "blob",
        };
        if self.path.is_empty() {
            format!("{}/{}@{} ({kind})", self.owner, self.repo, self.branch)
        } else {
            format!(
                "{}/{}@{}:{} ({kind})",
                self.owner,
                self.repo,
                self.branch,
                self.path_str()
            )
        }
    }
}

// Identity is owner/repo/branch/path. Kind and hash are metadata: the hash
// is resolved late, and the kind of an existing object is determined by the
// object graph, not by the pointer.
impl PartialEq for Location {
    fn eq(&self, other: &Self) -> bool {
        self.owner == other.owner
            && self.repo == other.repo
            && self.branch == other.branch
            && self.path == other.path
    }
}

impl Eq for Location {}

impl std::hash::Hash for Location {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.owner.hash(state);
        self.repo.hash(state);
        self.branch.hash(state);
        self.path.hash(state);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_root() {
        let loc = Location::parse("acme/widgets", "main", "", ObjectKind::Tree).unwrap();
        assert!(loc.is_root());
        assert_eq!(loc.kind, ObjectKind::Tree);
        assert_eq!(loc.owner, "acme");
        assert_eq!(loc.repo, "widgets");
    }

    #[test]
    fn parse_rejects_bad_spec() {
        assert!(Location::parse("acme", "main", "", ObjectKind::Tree).is_err());
        assert!(Location::parse("/widgets", "main", "", ObjectKind::Tree).is_err());
    }

    #[test]
    fn parse_rejects_blob_root() {
        assert!(Location::parse("acme/widgets", "main", "/", ObjectKind::Blob).is_err());
    }

    #[test]
    fn root_parent_fails() {
        let root = Location::root("acme", "widgets", "main");
        assert!(matches!(
            root.parent(),
            Err(SyncError::InvalidTraversal(_))
        ));
    }

    #[test]
    fn combine_below_blob_fails() {
        let blob = Location::parse("acme/widgets", "main", "a.txt", ObjectKind::Blob).unwrap();
        assert!(blob.combine(ObjectKind::Blob, "b.txt", None).is_err());
    }

    #[test]
    fn parent_combine_round_trip() {
        let loc = Location::parse("acme/widgets", "main", "scripts/build.sh", ObjectKind::Blob)
            .unwrap()
            .with_hash("abc123");
        let rebuilt = loc
            .parent()
            .unwrap()
            .combine(loc.kind, loc.name().unwrap(), loc.hash.clone())
            .unwrap();
        assert_eq!(rebuilt, loc);
        assert_eq!(rebuilt.hash, loc.hash);
    }

    #[test]
    fn identity_ignores_hash() {
        let a = Location::parse("acme/widgets", "main", "scripts", ObjectKind::Tree).unwrap();
        let b = a.with_hash("abc123");
        assert_eq!(a, b);
    }

    #[test]
    fn identity_includes_branch() {
        let a = Location::root("acme", "widgets", "main");
        let b = Location::root("acme", "widgets", "develop");
        assert_ne!(a, b);
    }
}
