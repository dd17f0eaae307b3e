//! Remote git object gateway.
//!
//! The engine never talks to the hosting service directly; every remote
//! read and write goes through `GitGateway`. Retry and rate-limit policy
//! for transient failures belongs to gateway implementations, not to the
//! engine.
//!
//! - `GitGateway`: async trait over the object-store API
//! - `TreeListing`, `Blob`, `Commit`: wire-level support types
//! - `memory`: a content-addressed in-memory implementation

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{FileMode, Location, TreeEntry};

pub use memory::InMemoryGateway;

/// A tree listing with its location enriched by the live content hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeListing {
    pub location: Location,
    pub entries: Vec<TreeEntry>,
}

/// Blob content and metadata, location enriched by the live content hash.
/// The mode comes from the entry in the enclosing tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blob {
    pub location: Location,
    pub mode: FileMode,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    /// Hash of the commit's root tree.
    pub tree: String,
    pub message: String,
    pub timestamp: i64,
}

/// Async interface to the remote object store.
///
/// The `required` flag on reads selects the failure mode for absent
/// objects: a required object that is missing is a `NotFound` error, an
/// optional one resolves to `Ok(None)`. Sources must exist; destinations
/// may not yet.
#[async_trait]
pub trait GitGateway: Send + Sync {
    /// Fetch the tree listing at a location, resolved via its branch head.
    async fn get_tree(&self, location: &Location, required: bool) -> Result<Option<TreeListing>>;

    /// Fetch blob content and metadata at a location.
    async fn get_blob(&self, location: &Location, required: bool) -> Result<Option<Blob>>;

    /// Upload blob content; returns its content hash.
    async fn create_blob(&self, owner: &str, repo: &str, content: &[u8]) -> Result<String>;

    /// Create a tree object from an entry list; returns its content hash.
    async fn create_tree(&self, owner: &str, repo: &str, entries: &[TreeEntry]) -> Result<String>;

    /// Current head commit of a branch.
    async fn branch_head(&self, owner: &str, repo: &str, branch: &str) -> Result<Commit>;

    /// Create a commit whose root tree is `tree_sha` on top of `parent_sha`.
    async fn create_commit(
        &self,
        owner: &str,
        repo: &str,
        message: &str,
        tree_sha: &str,
        parent_sha: &str,
    ) -> Result<Commit>;

    /// Create a new branch pointing at a commit.
    async fn create_branch(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        commit_sha: &str,
    ) -> Result<()>;

    /// Advance an existing branch ref to a commit. The final, visible step
    /// of a commit-mode sync.
    async fn update_branch(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        commit_sha: &str,
    ) -> Result<()>;

    /// Open a pull request from `head_branch` into `base_branch`; returns
    /// the pull request number.
    async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        head_branch: &str,
        base_branch: &str,
        title: &str,
    ) -> Result<u64>;

    /// Apply labels to an open pull request.
    async fn add_labels(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        labels: &[String],
    ) -> Result<()>;
}

// A shared reference to a gateway is itself a gateway, so an engine can
// borrow a gateway the caller keeps inspecting.
#[async_trait]
impl<T: GitGateway + ?Sized> GitGateway for &T {
    async fn get_tree(&self, location: &Location, required: bool) -> Result<Option<TreeListing>> {
        (**self).get_tree(location, required).await
    }

    async fn get_blob(&self, location: &Location, required: bool) -> Result<Option<Blob>> {
        (**self).get_blob(location, required).await
    }

    async fn create_blob(&self, owner: &str, repo: &str, content: &[u8]) -> Result<String> {
        (**self).create_blob(owner, repo, content).await
    }

    async fn create_tree(&self, owner: &str, repo: &str, entries: &[TreeEntry]) -> Result<String> {
        (**self).create_tree(owner, repo, entries).await
    }

    async fn branch_head(&self, owner: &str, repo: &str, branch: &str) -> Result<Commit> {
        (**self).branch_head(owner, repo, branch).await
    }

    async fn create_commit(
        &self,
        owner: &str,
        repo: &str,
        message: &str,
        tree_sha: &str,
        parent_sha: &str,
    ) -> Result<Commit> {
        (**self)
            .create_commit(owner, repo, message, tree_sha, parent_sha)
            .await
    }

    async fn create_branch(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        commit_sha: &str,
    ) -> Result<()> {
        (**self).create_branch(owner, repo, branch, commit_sha).await
    }

    async fn update_branch(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        commit_sha: &str,
    ) -> Result<()> {
        (**self).update_branch(owner, repo, branch, commit_sha).await
    }

    async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        head_branch: &str,
        base_branch: &str,
        title: &str,
    ) -> Result<u64> {
        (**self)
            .create_pull_request(owner, repo, head_branch, base_branch, title)
            .await
    }

    async fn add_labels(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        labels: &[String],
    ) -> Result<()> {
        (**self).add_labels(owner, repo, number, labels).await
    }
}
