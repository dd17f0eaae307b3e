//! The reconciler: diff computation and destination rebuild.
//!
//! - `cache`: known-object dedup cache shared across destination groups
//! - `merge`: arena merge tree consumed by the rebuild walk
//! - `Reconciler`: enriches locations with live hashes, computes diff
//!   results, rebuilds destination trees bottom-up, and proposes the
//!   result as a commit, branch, or pull request
//!
//! All remote traffic is sequential: the rebuild mutates baseline entry
//! lists and the dedup cache, and both depend on the single depth-first
//! walk order. Destination groups are processed one at a time.

pub mod cache;
pub mod merge;

use std::collections::HashMap;

use chrono::Utc;

use crate::error::{Result, SyncError};
use crate::gateway::GitGateway;
use crate::models::tree::{upsert, without};
use crate::models::{
    DestinationGroup, DiffEntry, DiffMap, DiffResult, FileMode, Location, ObjectKind, OutputMode,
    SyncOutcome, SyncPlan, TreeEntry,
};

pub use cache::KnownObjects;
pub use merge::{MergeNode, MergeTree, NodeId};

/// Short hash prefix used in decision logging.
fn short(hash: &str) -> &str {
    &hash[..hash.len().min(8)]
}

pub struct Reconciler<G> {
    gateway: G,
    known: KnownObjects,
    prune: bool,
}

impl<G: GitGateway> Reconciler<G> {
    pub fn new(gateway: G) -> Self {
        Self::with_cache(gateway, KnownObjects::new())
    }

    /// Inject a pre-seeded dedup cache; useful for tests and for embedders
    /// that keep one engine alive across runs.
    pub fn with_cache(gateway: G, known: KnownObjects) -> Self {
        Self {
            gateway,
            known,
            prune: false,
        }
    }

    /// Remove destination entries not present in any source mapping while
    /// rebuilding. Off by default: removals are computed and reported but
    /// not acted upon.
    pub fn with_prune(mut self, prune: bool) -> Self {
        self.prune = prune;
        self
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn known_objects(&self) -> &KnownObjects {
        &self.known
    }

    /// Resolve a location's live content hash. A missing required object
    /// is `NotFound`; a missing optional one resolves to `None`.
    async fn enrich(&self, location: &Location, required: bool) -> Result<Option<Location>> {
        match location.kind {
            ObjectKind::Tree => Ok(self
                .gateway
                .get_tree(location, required)
                .await?
                .map(|listing| listing.location)),
            ObjectKind::Blob => Ok(self
                .gateway
                .get_blob(location, required)
                .await?
                .map(|blob| blob.location)),
        }
    }

    /// Compare a diff map against live repository state. Read-only: the
    /// only side effect is decision logging.
    pub async fn diff(&self, map: &DiffMap) -> Result<DiffResult> {
        let mut result = DiffResult::default();
        // destination parent directory -> names covered by the mapping
        let mut covered: Vec<(Location, Vec<String>)> = Vec::new();

        for (source, destinations) in map.iter() {
            let source = self
                .enrich(source, true)
                .await?
                .ok_or_else(|| SyncError::NotFound(source.url()))?;
            let source_hash = source
                .hash
                .clone()
                .ok_or_else(|| SyncError::Internal(format!("unenriched source {}", source.url())))?;

            for destination in destinations {
                if let (Some(name), Ok(parent)) = (destination.name(), destination.parent()) {
                    match covered.iter_mut().find(|(p, _)| *p == parent) {
                        Some((_, names)) => names.push(name.to_string()),
                        None => covered.push((parent, vec![name.to_string()])),
                    }
                }

                match self.enrich(destination, false).await? {
                    Some(enriched) if enriched.hash.as_deref() == Some(source_hash.as_str()) => {
                        tracing::debug!(
                            "{} already in sync with {} ({})",
                            destination.url(),
                            source.url(),
                            short(&source_hash)
                        );
                    }
                    Some(enriched) => {
                        tracing::info!(
                            "{} will be updated from {} ({} -> {})",
                            destination.url(),
                            source.url(),
                            enriched.hash.as_deref().map(short).unwrap_or("?"),
                            short(&source_hash)
                        );
                        result.to_sync.push(DiffEntry {
                            destination: enriched,
                            source: source.clone(),
                        });
                    }
                    None => {
                        tracing::info!(
                            "{} will be created from {} ({})",
                            destination.url(),
                            source.url(),
                            short(&source_hash)
                        );
                        result.to_sync.push(DiffEntry {
                            destination: destination.clone(),
                            source: source.clone(),
                        });
                    }
                }
            }
        }

        // Entries present in a mapped destination directory but covered by
        // no mapping. Reported always; acted upon only when pruning.
        for (parent, names) in covered {
            let Some(listing) = self.gateway.get_tree(&parent, false).await? else {
                continue;
            };
            for entry in listing.entries {
                if !names.iter().any(|n| *n == entry.name) {
                    tracing::debug!(
                        "{} has unmapped entry '{}' ({})",
                        parent.url(),
                        entry.name,
                        short(&entry.hash)
                    );
                    result
                        .to_remove
                        .push(parent.combine(entry.kind, &entry.name, Some(entry.hash))?);
                }
            }
        }

        Ok(result)
    }

    /// Rebuild each destination group's tree graph and propose the result
    /// in the requested output mode. One outcome per group; a failing
    /// group aborts the run without touching groups already completed.
    pub async fn sync(
        &self,
        diff: &DiffResult,
        mode: OutputMode,
        labels: &[String],
    ) -> Result<Vec<SyncOutcome>> {
        self.sync_inner(diff, mode, labels, self.prune).await
    }

    /// Diff a whole plan and sync whatever differs. Short-circuits without
    /// remote writes when everything is already in sync.
    pub async fn run(&self, plan: &SyncPlan) -> Result<Vec<SyncOutcome>> {
        let map = plan.to_diff_map()?;
        let diff = self.diff(&map).await?;
        // a non-empty to_remove still needs a rebuild when pruning
        if diff.to_sync.is_empty() && (diff.to_remove.is_empty() || !plan.prune) {
            tracing::info!("all {} mapped sources already in sync", map.len());
            return Ok(Vec::new());
        }
        self.sync_inner(&diff, plan.mode, &plan.labels, plan.prune)
            .await
    }

    async fn sync_inner(
        &self,
        diff: &DiffResult,
        mode: OutputMode,
        labels: &[String],
        prune: bool,
    ) -> Result<Vec<SyncOutcome>> {
        if !labels.is_empty() && mode != OutputMode::PullRequest {
            return Err(SyncError::ConfigurationConflict(format!(
                "labels {labels:?} require pull request mode"
            )));
        }

        let mut groups = diff.transpose();
        if prune {
            // destinations that only have removals still need a rebuild
            for removal in &diff.to_remove {
                let grouped = groups.iter().any(|g| {
                    g.owner == removal.owner
                        && g.repo == removal.repo
                        && g.branch == removal.branch
                });
                if !grouped {
                    groups.push(DestinationGroup {
                        owner: removal.owner.clone(),
                        repo: removal.repo.clone(),
                        branch: removal.branch.clone(),
                        pairs: Vec::new(),
                    });
                }
            }
        }

        let mut outcomes = Vec::new();
        for group in groups {
            let root = Location::root(&group.owner, &group.repo, &group.branch);
            let mut tree = MergeTree::build(root, &group.pairs)?;
            let removals = if prune {
                diff.removals_for(&group.owner, &group.repo, &group.branch)
            } else {
                Vec::new()
            };
            for removal in &removals {
                tree.ensure_directory(&removal.parent()?.path)?;
            }

            let head = self
                .gateway
                .branch_head(&group.owner, &group.repo, &group.branch)
                .await?;
            let root_hash = self.rebuild(&tree, &removals).await?;

            let message = sync_message(&group.pairs);
            let commit = self
                .gateway
                .create_commit(&group.owner, &group.repo, &message, &root_hash, &head.sha)
                .await?;
            tracing::info!(
                "created commit {} on {}/{}@{}",
                short(&commit.sha),
                group.owner,
                group.repo,
                group.branch
            );

            let outcome = match mode {
                OutputMode::Commit => {
                    self.gateway
                        .update_branch(&group.owner, &group.repo, &group.branch, &commit.sha)
                        .await?;
                    SyncOutcome {
                        owner: group.owner.clone(),
                        repo: group.repo.clone(),
                        base_branch: group.branch.clone(),
                        sync_branch: group.branch.clone(),
                        commit_sha: commit.sha.clone(),
                        pull_request: None,
                        url: format!(
                            "https://github.com/{}/{}/commit/{}",
                            group.owner, group.repo, commit.sha
                        ),
                    }
                }
                OutputMode::Branch => {
                    let branch = sync_branch_name(&group.branch);
                    self.gateway
                        .create_branch(&group.owner, &group.repo, &branch, &commit.sha)
                        .await?;
                    SyncOutcome {
                        owner: group.owner.clone(),
                        repo: group.repo.clone(),
                        base_branch: group.branch.clone(),
                        sync_branch: branch.clone(),
                        commit_sha: commit.sha.clone(),
                        pull_request: None,
                        url: format!(
                            "https://github.com/{}/{}/compare/{}...{}",
                            group.owner, group.repo, group.branch, branch
                        ),
                    }
                }
                OutputMode::PullRequest => {
                    let branch = sync_branch_name(&group.branch);
                    self.gateway
                        .create_branch(&group.owner, &group.repo, &branch, &commit.sha)
                        .await?;
                    let number = self
                        .gateway
                        .create_pull_request(
                            &group.owner,
                            &group.repo,
                            &branch,
                            &group.branch,
                            &message,
                        )
                        .await?;
                    if !labels.is_empty() {
                        self.gateway
                            .add_labels(&group.owner, &group.repo, number, labels)
                            .await?;
                    }
                    SyncOutcome {
                        owner: group.owner.clone(),
                        repo: group.repo.clone(),
                        base_branch: group.branch.clone(),
                        sync_branch: branch.clone(),
                        commit_sha: commit.sha.clone(),
                        pull_request: Some(number),
                        url: format!(
                            "https://github.com/{}/{}/pull/{}",
                            group.owner, group.repo, number
                        ),
                    }
                }
            };
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Rebuild the remote tree graph for one merge tree, children before
    /// parents. Returns the new root tree hash. Nothing visible changes at
    /// the destination until the commit produced from this hash lands on a
    /// ref; interrupted rebuilds leave only inert content-addressed
    /// objects behind.
    async fn rebuild(&self, tree: &MergeTree, removals: &[&Location]) -> Result<String> {
        let mut hashes: HashMap<NodeId, String> = HashMap::new();

        for id in tree.post_order() {
            let node = tree.node(id);
            let owner = node.current.owner.clone();
            let repo = node.current.repo.clone();

            let mut entries = self
                .gateway
                .get_tree(&node.current, false)
                .await?
                .map(|listing| listing.entries)
                .unwrap_or_default();

            // everything listed at the destination is known to exist there
            for entry in &entries {
                self.known.record(&owner, &repo, &entry.hash, entry.mode);
            }

            for removal in removals {
                if removal.parent()? != node.current {
                    continue;
                }
                let Some(name) = removal.name() else { continue };
                if let Some(existing) = entries.iter().find(|e| e.name == name) {
                    if existing.kind == ObjectKind::Tree {
                        return Err(SyncError::UnsupportedOperation(format!(
                            "cannot prune directory entry '{}' from {}",
                            name,
                            node.current.url()
                        )));
                    }
                    tracing::info!("pruning '{}' from {}", name, node.current.url());
                    entries = without(entries, name);
                }
            }

            for (name, child) in &node.subtrees {
                let hash = hashes.get(child).ok_or_else(|| {
                    SyncError::Internal(format!("subtree '{name}' rebuilt out of order"))
                })?;
                entries = upsert(entries, TreeEntry::new(name, FileMode::Directory, hash));
            }

            for (name, pair) in &node.leaves {
                let entry = self.sync_leaf(name, pair, &owner, &repo).await?;
                entries = upsert(entries, entry);
            }

            let hash = self.gateway.create_tree(&owner, &repo, &entries).await?;
            self.known.record(&owner, &repo, &hash, FileMode::Directory);
            hashes.insert(id, hash);
        }

        hashes
            .remove(&MergeTree::ROOT)
            .ok_or_else(|| SyncError::Internal("merge tree has no root".to_string()))
    }

    /// Realize one leaf at the destination and return its tree entry.
    async fn sync_leaf(
        &self,
        name: &str,
        pair: &DiffEntry,
        dest_owner: &str,
        dest_repo: &str,
    ) -> Result<TreeEntry> {
        let source_hash = pair.source.hash.as_deref().ok_or_else(|| {
            SyncError::Internal(format!("unenriched source {}", pair.source.url()))
        })?;

        match pair.source.kind {
            ObjectKind::Blob => {
                if let Some(mode) = self.known.lookup(dest_owner, dest_repo, source_hash) {
                    tracing::debug!(
                        "{}/{} already has blob {}, skipping upload",
                        dest_owner,
                        dest_repo,
                        short(source_hash)
                    );
                    return Ok(TreeEntry::new(name, mode, source_hash));
                }
                let blob = self
                    .gateway
                    .get_blob(&pair.source, true)
                    .await?
                    .ok_or_else(|| SyncError::NotFound(pair.source.url()))?;
                let hash = self
                    .gateway
                    .create_blob(dest_owner, dest_repo, &blob.content)
                    .await?;
                if hash != source_hash {
                    return Err(SyncError::Internal(format!(
                        "content address mismatch for {}: expected {}, created {}",
                        pair.source.url(),
                        short(source_hash),
                        short(&hash)
                    )));
                }
                self.known.record(dest_owner, dest_repo, &hash, blob.mode);
                Ok(TreeEntry::new(name, blob.mode, &hash))
            }
            ObjectKind::Tree => {
                let hash = self.copy_tree(&pair.source, dest_owner, dest_repo).await?;
                if hash != source_hash {
                    return Err(SyncError::Internal(format!(
                        "content address mismatch for {}: expected {}, created {}",
                        pair.source.url(),
                        short(source_hash),
                        short(&hash)
                    )));
                }
                Ok(TreeEntry::new(name, FileMode::Directory, &hash))
            }
        }
    }

    /// Copy an entire source subtree into the destination repository and
    /// return its root tree hash. Discovery walks the source top-down with
    /// an explicit stack; creation replays bottom-up so every tree's
    /// children exist before the tree referencing them. Content addressing
    /// guarantees the copied root hash equals the source hash.
    async fn copy_tree(
        &self,
        source: &Location,
        dest_owner: &str,
        dest_repo: &str,
    ) -> Result<String> {
        if let Some(hash) = source.hash.as_deref() {
            if self.known.lookup(dest_owner, dest_repo, hash).is_some() {
                tracing::debug!(
                    "{dest_owner}/{dest_repo} already has tree {}, skipping copy",
                    short(hash)
                );
                return Ok(hash.to_string());
            }
        }

        struct Pending {
            location: Location,
            hash: String,
            entries: Vec<TreeEntry>,
        }

        let mut pending: Vec<Pending> = Vec::new();
        let mut stack = vec![source.clone()];
        while let Some(location) = stack.pop() {
            let listing = self
                .gateway
                .get_tree(&location, true)
                .await?
                .ok_or_else(|| SyncError::NotFound(location.url()))?;
            let hash = listing.location.hash.clone().ok_or_else(|| {
                SyncError::Internal(format!("unenriched listing for {}", location.url()))
            })?;
            for entry in &listing.entries {
                if entry.kind == ObjectKind::Tree
                    && self
                        .known
                        .lookup(dest_owner, dest_repo, &entry.hash)
                        .is_none()
                {
                    stack.push(listing.location.combine(
                        ObjectKind::Tree,
                        &entry.name,
                        Some(entry.hash.clone()),
                    )?);
                }
            }
            pending.push(Pending {
                location: listing.location,
                hash,
                entries: listing.entries,
            });
        }

        let root_hash = pending[0].hash.clone();
        for node in pending.iter().rev() {
            for entry in &node.entries {
                if entry.kind != ObjectKind::Blob
                    || self
                        .known
                        .lookup(dest_owner, dest_repo, &entry.hash)
                        .is_some()
                {
                    continue;
                }
                let blob_location =
                    node.location
                        .combine(ObjectKind::Blob, &entry.name, Some(entry.hash.clone()))?;
                let blob = self
                    .gateway
                    .get_blob(&blob_location, true)
                    .await?
                    .ok_or_else(|| SyncError::NotFound(blob_location.url()))?;
                let created = self
                    .gateway
                    .create_blob(dest_owner, dest_repo, &blob.content)
                    .await?;
                if created != entry.hash {
                    return Err(SyncError::Internal(format!(
                        "content address mismatch for {}: expected {}, created {}",
                        blob_location.url(),
                        short(&entry.hash),
                        short(&created)
                    )));
                }
                self.known
                    .record(dest_owner, dest_repo, &created, blob.mode);
            }

            let created = self
                .gateway
                .create_tree(dest_owner, dest_repo, &node.entries)
                .await?;
            if created != node.hash {
                return Err(SyncError::Internal(format!(
                    "content address mismatch for {}: expected {}, created {}",
                    node.location.url(),
                    short(&node.hash),
                    short(&created)
                )));
            }
            self.known
                .record(dest_owner, dest_repo, &created, FileMode::Directory);
        }

        Ok(root_hash)
    }
}

fn sync_branch_name(base: &str) -> String {
    format!("content-sync/{}-{}", base, Utc::now().format("%Y%m%d%H%M%S"))
}

fn sync_message(pairs: &[DiffEntry]) -> String {
    let mut sources: Vec<String> = Vec::new();
    for pair in pairs {
        let repo = format!("{}/{}", pair.source.owner, pair.source.repo);
        if !sources.contains(&repo) {
            sources.push(repo);
        }
    }
    if sources.is_empty() {
        return "Remove unmapped content".to_string();
    }
    format!("Sync content from {}", sources.join(", "))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn short_handles_tiny_hashes() {
        assert_eq!(short("abc"), "abc");
        assert_eq!(short("0123456789abcdef"), "01234567");
    }

    #[test]
    fn message_lists_each_source_repo_once() {
        let pair = |src: &str| DiffEntry {
            destination: Location::parse("acme/widgets", "main", "a.txt", ObjectKind::Blob)
                .unwrap(),
            source: Location::parse(src, "main", "a.txt", ObjectKind::Blob).unwrap(),
        };
        let message = sync_message(&[
            pair("acme/template"),
            pair("acme/template"),
            pair("acme/extra"),
        ]);
        assert_eq!(message, "Sync content from acme/template, acme/extra");
    }

    #[test]
    fn message_for_removal_only_group() {
        assert_eq!(sync_message(&[]), "Remove unmapped content");
    }
}
