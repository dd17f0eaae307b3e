//! Configuration surface and result DTOs.
//!
//! - `LocationSpec`: one location as written in configuration
//! - `MappingSpec`: one source fanned out to its destinations
//! - `SyncPlan`: mappings plus output mode, labels, and the prune policy
//! - `OutputMode`: how a destination group's result is proposed
//! - `SyncOutcome`: one result per destination group, with its URL

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{DiffMap, Location, ObjectKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationSpec {
    /// "owner/repo"
    pub repo: String,
    pub branch: String,
    /// Slash-separated path; empty for the repository root.
    #[serde(default)]
    pub path: String,
    #[serde(default = "default_kind")]
    pub kind: ObjectKind,
}

fn default_kind() -> ObjectKind {
    ObjectKind::Tree
}

impl LocationSpec {
    pub fn to_location(&self) -> Result<Location> {
        Location::parse(&self.repo, &self.branch, &self.path, self.kind)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingSpec {
    pub source: LocationSpec,
    pub destinations: Vec<LocationSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    Commit,
    Branch,
    PullRequest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncPlan {
    pub mappings: Vec<MappingSpec>,
    pub mode: OutputMode,
    #[serde(default)]
    pub labels: Vec<String>,
    /// Remove destination entries not present in any source mapping.
    #[serde(default)]
    pub prune: bool,
}

impl SyncPlan {
    /// Resolve every mapping into one diff map, destination sets merged
    /// across mappings that share a source.
    pub fn to_diff_map(&self) -> Result<DiffMap> {
        let mut map = DiffMap::new();
        for mapping in &self.mappings {
            let source = mapping.source.to_location()?;
            for dest in &mapping.destinations {
                map.insert(source.clone(), dest.to_location()?);
            }
        }
        Ok(map)
    }
}

/// The visible result of syncing one destination group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub owner: String,
    pub repo: String,
    /// Branch the content was proposed against.
    pub base_branch: String,
    /// Branch carrying the sync commit; equals `base_branch` in commit mode.
    pub sync_branch: String,
    pub commit_sha: String,
    pub pull_request: Option<u64>,
    /// Commit, compare, or pull-request URL depending on the output mode.
    pub url: String,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn plan_round_trips_through_json() {
        let json = r#"{
            "mappings": [{
                "source": { "repo": "acme/template", "branch": "main", "path": "buildSupport" },
                "destinations": [
                    { "repo": "acme/widgets", "branch": "main", "path": "buildSupport" }
                ]
            }],
            "mode": "pullrequest",
            "labels": ["auto-sync"]
        }"#;
        let plan: SyncPlan = serde_json::from_str(json).unwrap();
        assert_eq!(plan.mode, OutputMode::PullRequest);
        assert!(!plan.prune);

        let map = plan.to_diff_map().unwrap();
        assert_eq!(map.len(), 1);
        let (source, dests) = map.iter().next().unwrap();
        assert_eq!(source.kind, ObjectKind::Tree);
        assert_eq!(source.path, vec!["buildSupport".to_string()]);
        assert_eq!(dests.len(), 1);
    }

    #[test]
    fn shared_source_merges_destinations() {
        let spec = |repo: &str| LocationSpec {
            repo: repo.to_string(),
            branch: "main".to_string(),
            path: "scripts".to_string(),
            kind: ObjectKind::Tree,
        };
        let plan = SyncPlan {
            mappings: vec![
                MappingSpec {
                    source: spec("acme/template"),
                    destinations: vec![spec("acme/one")],
                },
                MappingSpec {
                    source: spec("acme/template"),
                    destinations: vec![spec("acme/two")],
                },
            ],
            mode: OutputMode::Commit,
            labels: Vec::new(),
            prune: false,
        };
        let map = plan.to_diff_map().unwrap();
        assert_eq!(map.len(), 1);
        let (_, dests) = map.iter().next().unwrap();
        assert_eq!(dests.len(), 2);
    }
}
