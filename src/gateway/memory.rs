//! In-memory git object gateway.
//!
//! A complete, content-addressed implementation of `GitGateway` backed by
//! process memory: per-repository object stores keyed by SHA-256, branch
//! refs, commits, and pull requests. Identical content yields identical
//! hashes across repositories, so cross-repo dedup behaves exactly as it
//! does against the hosting service.
//!
//! Carries per-call counters (`GatewayStats`) so tests can assert which
//! remote calls a sync actually performed, plus seeding and read-back
//! helpers (`add_repo`, `commit_files`, `read_file`, ...). Seeding helpers
//! do not touch the counters.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::error::{Result, SyncError};
use crate::gateway::{Blob, Commit, GitGateway, TreeListing};
use crate::models::tree::upsert;
use crate::models::{FileMode, Location, ObjectKind, TreeEntry};

/// Content hash of a blob, over a `blob {len}\0{content}` encoding.
pub fn blob_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("blob {}\0", content.len()).as_bytes());
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Content hash of a tree. Entries are hashed sorted by name, so the hash
/// depends only on the entry set, not on insertion order.
pub fn tree_hash(entries: &[TreeEntry]) -> String {
    let mut sorted: Vec<&TreeEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));
    let mut hasher = Sha256::new();
    hasher.update(b"tree\0");
    for entry in sorted {
        hasher.update(format!("{} {} {}\n", entry.mode.as_str(), entry.name, entry.hash).as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone)]
enum StoredObject {
    Blob(Vec<u8>),
    Tree(Vec<TreeEntry>),
}

#[derive(Debug, Clone)]
struct StoredCommit {
    tree: String,
    message: String,
    timestamp: i64,
}

#[derive(Debug, Clone)]
pub struct PullRequest {
    pub number: u64,
    pub head: String,
    pub base: String,
    pub title: String,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct GatewayStats {
    pub tree_fetches: usize,
    pub blob_fetches: usize,
    pub tree_creates: usize,
    pub blob_creates: usize,
    pub commits_created: usize,
    pub branches_created: usize,
    pub branch_updates: usize,
}

impl GatewayStats {
    /// Total remote calls that write to a destination.
    pub fn writes(&self) -> usize {
        self.tree_creates
            + self.blob_creates
            + self.commits_created
            + self.branches_created
            + self.branch_updates
    }
}

#[derive(Default)]
struct RepoState {
    objects: HashMap<String, StoredObject>,
    /// branch name -> head commit sha
    branches: HashMap<String, String>,
    commits: HashMap<String, StoredCommit>,
    pulls: Vec<PullRequest>,
}

impl RepoState {
    /// Walk the branch head's root tree down the path. Returns the content
    /// hash at that path and the mode of the entry pointing at it.
    fn resolve(&self, branch: &str, path: &[String]) -> Option<(String, FileMode)> {
        let head = self.branches.get(branch)?;
        let commit = self.commits.get(head)?;
        let mut hash = commit.tree.clone();
        let mut mode = FileMode::Directory;
        for segment in path {
            let entries = match self.objects.get(&hash)? {
                StoredObject::Tree(entries) => entries,
                StoredObject::Blob(_) => return None,
            };
            let entry = entries.iter().find(|e| e.name == *segment)?;
            hash = entry.hash.clone();
            mode = entry.mode;
        }
        Some((hash, mode))
    }

    fn store_tree(&mut self, entries: &[TreeEntry]) -> String {
        let mut sorted = entries.to_vec();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));
        let hash = tree_hash(&sorted);
        self.objects.insert(hash.clone(), StoredObject::Tree(sorted));
        hash
    }

    fn store_blob(&mut self, content: &[u8]) -> String {
        let hash = blob_hash(content);
        self.objects
            .insert(hash.clone(), StoredObject::Blob(content.to_vec()));
        hash
    }

    /// Insert a file into the tree at `tree` (None for a fresh directory),
    /// creating intermediate trees, and return the new tree hash.
    fn insert_file(
        &mut self,
        tree: Option<&str>,
        segments: &[&str],
        content: &[u8],
        mode: FileMode,
    ) -> String {
        let entries = match tree.and_then(|h| self.objects.get(h)) {
            Some(StoredObject::Tree(entries)) => entries.clone(),
            _ => Vec::new(),
        };
        let entry = if segments.len() == 1 {
            let hash = self.store_blob(content);
            TreeEntry::new(segments[0], mode, &hash)
        } else {
            let existing = entries
                .iter()
                .find(|e| e.name == segments[0] && e.kind == ObjectKind::Tree)
                .map(|e| e.hash.clone());
            let child = self.insert_file(existing.as_deref(), &segments[1..], content, mode);
            TreeEntry::new(segments[0], FileMode::Directory, &child)
        };
        let merged = upsert(entries, entry);
        self.store_tree(&merged)
    }
}

#[derive(Default)]
struct State {
    repos: HashMap<(String, String), RepoState>,
    stats: GatewayStats,
    /// Commit sha uniqueness across identical trees/timestamps.
    commit_seq: u64,
}

impl State {
    fn repo(&self, owner: &str, repo: &str) -> Option<&RepoState> {
        self.repos.get(&(owner.to_string(), repo.to_string()))
    }

    fn repo_mut(&mut self, owner: &str, repo: &str) -> Result<&mut RepoState> {
        self.repos
            .get_mut(&(owner.to_string(), repo.to_string()))
            .ok_or_else(|| SyncError::NotFound(format!("repository {owner}/{repo}")))
    }
}

#[derive(Default)]
pub struct InMemoryGateway {
    state: Mutex<State>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| SyncError::Internal("Lock poisoned".to_string()))
    }

    /// Create an empty repository with one branch pointing at an empty
    /// root tree.
    pub fn add_repo(&self, owner: &str, repo: &str, branch: &str) -> Result<()> {
        let mut state = self.locked()?;
        let seq = {
            state.commit_seq += 1;
            state.commit_seq
        };
        let repo_state = state
            .repos
            .entry((owner.to_string(), repo.to_string()))
            .or_default();
        let tree = repo_state.store_tree(&[]);
        let sha = commit_sha(&tree, seq);
        repo_state.commits.insert(
            sha.clone(),
            StoredCommit {
                tree,
                message: "initial".to_string(),
                timestamp: Utc::now().timestamp(),
            },
        );
        repo_state.branches.insert(branch.to_string(), sha);
        Ok(())
    }

    /// Commit a set of files onto a branch, creating intermediate
    /// directories. Paths are slash-separated. Bypasses the call counters.
    pub fn commit_files(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        files: &[(&str, &str, FileMode)],
    ) -> Result<()> {
        let mut state = self.locked()?;
        let seq = {
            state.commit_seq += 1;
            state.commit_seq
        };
        let repo_state = state.repo_mut(owner, repo)?;
        let head = repo_state
            .branches
            .get(branch)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(format!("{owner}/{repo}@{branch}")))?;
        let mut tree = repo_state
            .commits
            .get(&head)
            .map(|c| c.tree.clone())
            .ok_or_else(|| SyncError::Internal(format!("dangling branch {branch}")))?;

        for (path, content, mode) in files {
            let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
            if segments.is_empty() {
                return Err(SyncError::InvalidTraversal(format!(
                    "cannot commit file at repository root of {owner}/{repo}"
                )));
            }
            tree = repo_state.insert_file(Some(&tree), &segments, content.as_bytes(), *mode);
        }

        let sha = commit_sha(&tree, seq);
        repo_state.commits.insert(
            sha.clone(),
            StoredCommit {
                tree,
                message: "seed".to_string(),
                timestamp: Utc::now().timestamp(),
            },
        );
        repo_state.branches.insert(branch.to_string(), sha);
        Ok(())
    }

    /// Read a file back through the branch head. For test assertions.
    pub fn read_file(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        path: &str,
    ) -> Option<(Vec<u8>, FileMode)> {
        let state = self.state.lock().ok()?;
        let repo_state = state.repo(owner, repo)?;
        let segments: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect();
        let (hash, mode) = repo_state.resolve(branch, &segments)?;
        match repo_state.objects.get(&hash)? {
            StoredObject::Blob(content) => Some((content.clone(), mode)),
            StoredObject::Tree(_) => None,
        }
    }

    /// Content hash of the tree at a path ("" for the root tree).
    pub fn tree_hash_at(&self, owner: &str, repo: &str, branch: &str, path: &str) -> Option<String> {
        let state = self.state.lock().ok()?;
        let repo_state = state.repo(owner, repo)?;
        let segments: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect();
        let (hash, _) = repo_state.resolve(branch, &segments)?;
        match repo_state.objects.get(&hash)? {
            StoredObject::Tree(_) => Some(hash),
            StoredObject::Blob(_) => None,
        }
    }

    pub fn branch_names(&self, owner: &str, repo: &str) -> Vec<String> {
        let state = match self.state.lock() {
            Ok(s) => s,
            Err(_) => return Vec::new(),
        };
        let mut names: Vec<String> = state
            .repo(owner, repo)
            .map(|r| r.branches.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    pub fn pull_requests(&self, owner: &str, repo: &str) -> Vec<PullRequest> {
        let state = match self.state.lock() {
            Ok(s) => s,
            Err(_) => return Vec::new(),
        };
        state
            .repo(owner, repo)
            .map(|r| r.pulls.clone())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> GatewayStats {
        self.state
            .lock()
            .map(|s| s.stats.clone())
            .unwrap_or_default()
    }

    pub fn reset_stats(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.stats = GatewayStats::default();
        }
    }
}

fn commit_sha(tree: &str, seq: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("commit {seq} {tree}").as_bytes());
    hex::encode(hasher.finalize())
}

fn absent<T>(location: &Location, required: bool) -> Result<Option<T>> {
    if required {
        Err(SyncError::NotFound(location.url()))
    } else {
        Ok(None)
    }
}

#[async_trait]
impl GitGateway for InMemoryGateway {
    async fn get_tree(&self, location: &Location, required: bool) -> Result<Option<TreeListing>> {
        let mut state = self.locked()?;
        state.stats.tree_fetches += 1;
        let Some(repo_state) = state.repo(&location.owner, &location.repo) else {
            return absent(location, required);
        };
        let Some((hash, _)) = repo_state.resolve(&location.branch, &location.path) else {
            return absent(location, required);
        };
        match repo_state.objects.get(&hash) {
            Some(StoredObject::Tree(entries)) => Ok(Some(TreeListing {
                location: location.with_hash(&hash),
                entries: entries.clone(),
            })),
            _ => absent(location, required),
        }
    }

    async fn get_blob(&self, location: &Location, required: bool) -> Result<Option<Blob>> {
        let mut state = self.locked()?;
        state.stats.blob_fetches += 1;
        let Some(repo_state) = state.repo(&location.owner, &location.repo) else {
            return absent(location, required);
        };
        let Some((hash, mode)) = repo_state.resolve(&location.branch, &location.path) else {
            return absent(location, required);
        };
        match repo_state.objects.get(&hash) {
            Some(StoredObject::Blob(content)) => Ok(Some(Blob {
                location: location.with_hash(&hash),
                mode,
                content: content.clone(),
            })),
            _ => absent(location, required),
        }
    }

    async fn create_blob(&self, owner: &str, repo: &str, content: &[u8]) -> Result<String> {
        let mut state = self.locked()?;
        state.stats.blob_creates += 1;
        let repo_state = state.repo_mut(owner, repo)?;
        Ok(repo_state.store_blob(content))
    }

    async fn create_tree(&self, owner: &str, repo: &str, entries: &[TreeEntry]) -> Result<String> {
        let mut state = self.locked()?;
        state.stats.tree_creates += 1;
        let repo_state = state.repo_mut(owner, repo)?;
        for entry in entries {
            if !repo_state.objects.contains_key(&entry.hash) {
                return Err(SyncError::Gateway(format!(
                    "tree entry '{}' references unknown object {}",
                    entry.name, entry.hash
                )));
            }
        }
        Ok(repo_state.store_tree(entries))
    }

    async fn branch_head(&self, owner: &str, repo: &str, branch: &str) -> Result<Commit> {
        let state = self.locked()?;
        let commit = state
            .repo(owner, repo)
            .and_then(|r| {
                let sha = r.branches.get(branch)?;
                r.commits.get(sha).map(|c| (sha.clone(), c.clone()))
            })
            .ok_or_else(|| SyncError::NotFound(format!("{owner}/{repo}@{branch}")))?;
        Ok(Commit {
            sha: commit.0,
            tree: commit.1.tree,
            message: commit.1.message,
            timestamp: commit.1.timestamp,
        })
    }

    async fn create_commit(
        &self,
        owner: &str,
        repo: &str,
        message: &str,
        tree_sha: &str,
        parent_sha: &str,
    ) -> Result<Commit> {
        let mut state = self.locked()?;
        state.stats.commits_created += 1;
        let seq = {
            state.commit_seq += 1;
            state.commit_seq
        };
        let repo_state = state.repo_mut(owner, repo)?;
        if !repo_state.commits.contains_key(parent_sha) {
            return Err(SyncError::Gateway(format!(
                "unknown parent commit {parent_sha} in {owner}/{repo}"
            )));
        }
        if !matches!(repo_state.objects.get(tree_sha), Some(StoredObject::Tree(_))) {
            return Err(SyncError::Gateway(format!(
                "unknown root tree {tree_sha} in {owner}/{repo}"
            )));
        }
        let sha = commit_sha(tree_sha, seq);
        let timestamp = Utc::now().timestamp();
        repo_state.commits.insert(
            sha.clone(),
            StoredCommit {
                tree: tree_sha.to_string(),
                message: message.to_string(),
                timestamp,
            },
        );
        Ok(Commit {
            sha,
            tree: tree_sha.to_string(),
            message: message.to_string(),
            timestamp,
        })
    }

    async fn create_branch(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        commit_sha: &str,
    ) -> Result<()> {
        let mut state = self.locked()?;
        state.stats.branches_created += 1;
        let repo_state = state.repo_mut(owner, repo)?;
        if repo_state.branches.contains_key(branch) {
            return Err(SyncError::Gateway(format!(
                "branch '{branch}' already exists in {owner}/{repo}"
            )));
        }
        if !repo_state.commits.contains_key(commit_sha) {
            return Err(SyncError::Gateway(format!(
                "unknown commit {commit_sha} in {owner}/{repo}"
            )));
        }
        repo_state
            .branches
            .insert(branch.to_string(), commit_sha.to_string());
        Ok(())
    }

    async fn update_branch(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        commit_sha: &str,
    ) -> Result<()> {
        let mut state = self.locked()?;
        state.stats.branch_updates += 1;
        let repo_state = state.repo_mut(owner, repo)?;
        if !repo_state.branches.contains_key(branch) {
            return Err(SyncError::NotFound(format!("{owner}/{repo}@{branch}")));
        }
        if !repo_state.commits.contains_key(commit_sha) {
            return Err(SyncError::Gateway(format!(
                "unknown commit {commit_sha} in {owner}/{repo}"
            )));
        }
        repo_state
            .branches
            .insert(branch.to_string(), commit_sha.to_string());
        Ok(())
    }

    async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        head_branch: &str,
        base_branch: &str,
        title: &str,
    ) -> Result<u64> {
        let mut state = self.locked()?;
        let repo_state = state.repo_mut(owner, repo)?;
        for branch in [head_branch, base_branch] {
            if !repo_state.branches.contains_key(branch) {
                return Err(SyncError::NotFound(format!("{owner}/{repo}@{branch}")));
            }
        }
        let number = repo_state.pulls.len() as u64 + 1;
        repo_state.pulls.push(PullRequest {
            number,
            head: head_branch.to_string(),
            base: base_branch.to_string(),
            title: title.to_string(),
            labels: Vec::new(),
        });
        Ok(number)
    }

    async fn add_labels(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        labels: &[String],
    ) -> Result<()> {
        let mut state = self.locked()?;
        let repo_state = state.repo_mut(owner, repo)?;
        let pull = repo_state
            .pulls
            .iter_mut()
            .find(|p| p.number == number)
            .ok_or_else(|| SyncError::NotFound(format!("{owner}/{repo}#{number}")))?;
        for label in labels {
            if !pull.labels.contains(label) {
                pull.labels.push(label.clone());
            }
        }
        Ok(())
    }
}
