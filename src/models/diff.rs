//! Diff model.
//!
//! - `DiffMap`: declared intent, each source location must appear at one
//!   or more destination locations
//! - `DiffEntry`: one (destination, source) pair, both sides enriched with
//!   live content hashes
//! - `DiffResult`: computed outcome, the pairs to create or update plus
//!   destination entries absent from any source mapping
//! - `DestinationGroup`: `to_sync` regrouped by destination repository and
//!   branch, the unit one merge tree is built from

use serde::{Deserialize, Serialize};

use crate::models::Location;

/// Ordered mapping from a source location to its destination set. Insertion
/// order is irrelevant for correctness but preserved for deterministic
/// logging.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiffMap {
    entries: Vec<(Location, Vec<Location>)>,
}

impl DiffMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one destination for a source. Destinations for an already-known
    /// source append to its existing set.
    pub fn insert(&mut self, source: Location, destination: Location) {
        match self.entries.iter_mut().find(|(s, _)| *s == source) {
            Some((_, dests)) => {
                if !dests.contains(&destination) {
                    dests.push(destination);
                }
            }
            None => self.entries.push((source, vec![destination])),
        }
    }

    /// Fold another map into this one; later entries' destination sets
    /// append to earlier ones for the same source.
    pub fn merge(&mut self, other: DiffMap) {
        for (source, dests) in other.entries {
            for dest in dests {
                self.insert(source.clone(), dest);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Location, &[Location])> {
        self.entries.iter().map(|(s, d)| (s, d.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// One enriched (destination, source) pair that must be created or updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffEntry {
    pub destination: Location,
    pub source: Location,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiffResult {
    /// Pairs whose destination is absent or differs from the source.
    pub to_sync: Vec<DiffEntry>,
    /// Destination entries not covered by any source mapping. Only acted
    /// upon when pruning is enabled.
    pub to_remove: Vec<Location>,
}

impl DiffResult {
    /// True when there is nothing to write and nothing prunable.
    pub fn is_empty(&self) -> bool {
        self.to_sync.is_empty() && self.to_remove.is_empty()
    }

    /// Regroup `to_sync` by destination (owner, repo, branch). Each group
    /// shares one root commit ancestor and feeds one merge tree. Group
    /// order and in-group pair order follow first appearance.
    pub fn transpose(&self) -> Vec<DestinationGroup> {
        let mut groups: Vec<DestinationGroup> = Vec::new();
        for entry in &self.to_sync {
            let dest = &entry.destination;
            let group = groups.iter_mut().find(|g| {
                g.owner == dest.owner && g.repo == dest.repo && g.branch == dest.branch
            });
            match group {
                Some(g) => g.pairs.push(entry.clone()),
                None => groups.push(DestinationGroup {
                    owner: dest.owner.clone(),
                    repo: dest.repo.clone(),
                    branch: dest.branch.clone(),
                    pairs: vec![entry.clone()],
                }),
            }
        }
        groups
    }

    /// Removals that live under the given destination repository/branch.
    pub fn removals_for(&self, owner: &str, repo: &str, branch: &str) -> Vec<&Location> {
        self.to_remove
            .iter()
            .filter(|loc| loc.owner == owner && loc.repo == repo && loc.branch == branch)
            .collect()
    }
}

/// All to-sync pairs targeting one (repository, branch) destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationGroup {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub pairs: Vec<DiffEntry>,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::models::ObjectKind;

    fn blob(repo_spec: &str, branch: &str, path: &str) -> Location {
        Location::parse(repo_spec, branch, path, ObjectKind::Blob).unwrap()
    }

    #[test]
    fn insert_appends_to_existing_source() {
        let mut map = DiffMap::new();
        let source = blob("acme/template", "main", "a.txt");
        map.insert(source.clone(), blob("acme/one", "main", "a.txt"));
        map.insert(source.clone(), blob("acme/two", "main", "a.txt"));
        assert_eq!(map.len(), 1);
        let (_, dests) = map.iter().next().map(|(s, d)| (s.clone(), d.to_vec())).unwrap();
        assert_eq!(dests.len(), 2);
    }

    #[test]
    fn merge_combines_destination_sets() {
        let source = blob("acme/template", "main", "a.txt");
        let mut first = DiffMap::new();
        first.insert(source.clone(), blob("acme/one", "main", "a.txt"));
        let mut second = DiffMap::new();
        second.insert(source.clone(), blob("acme/two", "main", "a.txt"));
        second.insert(blob("acme/template", "main", "b.txt"), blob("acme/one", "main", "b.txt"));

        first.merge(second);
        assert_eq!(first.len(), 2);
        let (_, dests) = first.iter().next().map(|(s, d)| (s.clone(), d.to_vec())).unwrap();
        assert_eq!(dests.len(), 2);
    }

    #[test]
    fn transpose_groups_by_repo_and_branch() {
        let result = DiffResult {
            to_sync: vec![
                DiffEntry {
                    destination: blob("acme/one", "main", "a.txt"),
                    source: blob("acme/template", "main", "a.txt"),
                },
                DiffEntry {
                    destination: blob("acme/two", "main", "a.txt"),
                    source: blob("acme/template", "main", "a.txt"),
                },
                DiffEntry {
                    destination: blob("acme/one", "main", "b.txt"),
                    source: blob("acme/template", "main", "b.txt"),
                },
                DiffEntry {
                    destination: blob("acme/one", "develop", "a.txt"),
                    source: blob("acme/template", "main", "a.txt"),
                },
            ],
            to_remove: Vec::new(),
        };

        let groups = result.transpose();
        assert_eq!(groups.len(), 3);
        assert_eq!((groups[0].repo.as_str(), groups[0].branch.as_str()), ("one", "main"));
        assert_eq!(groups[0].pairs.len(), 2);
        assert_eq!((groups[1].repo.as_str(), groups[1].branch.as_str()), ("two", "main"));
        assert_eq!((groups[2].repo.as_str(), groups[2].branch.as_str()), ("one", "develop"));
    }

    #[test]
    fn empty_result_is_empty() {
        assert!(DiffResult::default().is_empty());
    }
}
