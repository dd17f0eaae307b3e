//! Merge tree: per-destination accumulator of subtree and leaf changes.
//!
//! One merge tree is built per (destination repository, branch) group and
//! consumed once by the rebuild walk. Nodes live in an arena indexed by
//! `NodeId` rather than in boxed recursion, so very deep directory trees
//! cannot grow the call stack and intermediate state stays inspectable.
//!
//! Routing invariant: every pair is walked segment-by-segment from the
//! group root, intermediate subtree nodes are created on demand, and the
//! leaf attaches at the node matching its immediate parent directory.

use crate::error::{Result, SyncError};
use crate::models::{DiffEntry, Location, ObjectKind};

pub type NodeId = usize;

#[derive(Debug)]
pub struct MergeNode {
    /// The destination directory this node represents.
    pub current: Location,
    /// Child name -> child node, in creation order.
    pub subtrees: Vec<(String, NodeId)>,
    /// Leaf name -> the (destination, source) pair to realize there.
    pub leaves: Vec<(String, DiffEntry)>,
}

#[derive(Debug)]
pub struct MergeTree {
    nodes: Vec<MergeNode>,
}

impl MergeTree {
    /// Build the merge tree for one destination group rooted at `root`
    /// (the repository root of the group's branch).
    pub fn build(root: Location, pairs: &[DiffEntry]) -> Result<Self> {
        let mut tree = Self {
            nodes: vec![MergeNode {
                current: root,
                subtrees: Vec::new(),
                leaves: Vec::new(),
            }],
        };
        for pair in pairs {
            tree.insert(pair)?;
        }
        Ok(tree)
    }

    pub const ROOT: NodeId = 0;

    pub fn node(&self, id: NodeId) -> &MergeNode {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        // the root node always exists
        self.nodes[Self::ROOT].subtrees.is_empty() && self.nodes[Self::ROOT].leaves.is_empty()
    }

    fn insert(&mut self, pair: &DiffEntry) -> Result<()> {
        let segments = pair.destination.path.clone();
        let Some((leaf_name, dirs)) = segments.split_last() else {
            return Err(SyncError::InvalidTraversal(format!(
                "destination {} is a repository root, not an entry within one",
                pair.destination.url()
            )));
        };

        let node = self.ensure_directory(dirs)?;
        self.nodes[node]
            .leaves
            .push((leaf_name.clone(), pair.clone()));
        Ok(())
    }

    /// Route a directory path from the root, creating intermediate subtree
    /// nodes on demand, and return the deepest node. Lets the rebuild walk
    /// visit directories that carry removals but no leaves.
    pub fn ensure_directory(&mut self, dirs: &[String]) -> Result<NodeId> {
        let mut node = Self::ROOT;
        for segment in dirs {
            node = self.subtree(node, segment)?;
        }
        Ok(node)
    }

    /// Child subtree node of `parent` named `name`, created on demand.
    fn subtree(&mut self, parent: NodeId, name: &str) -> Result<NodeId> {
        if let Some((_, id)) = self.nodes[parent]
            .subtrees
            .iter()
            .find(|(n, _)| n == name)
        {
            return Ok(*id);
        }
        let current = self.nodes[parent]
            .current
            .combine(ObjectKind::Tree, name, None)?;
        let id = self.nodes.len();
        self.nodes.push(MergeNode {
            current,
            subtrees: Vec::new(),
            leaves: Vec::new(),
        });
        self.nodes[parent].subtrees.push((name.to_string(), id));
        Ok(id)
    }

    /// Node ids children-first, parents after all their descendants. Uses
    /// an explicit work stack; tree hashes depend on child hashes, so the
    /// rebuild consumes nodes in exactly this order.
    pub fn post_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![Self::ROOT];
        while let Some(id) = stack.pop() {
            order.push(id);
            for (_, child) in self.nodes[id].subtrees.iter().rev() {
                stack.push(*child);
            }
        }
        order.reverse();
        order
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::models::Location;

    fn pair(path: &str) -> DiffEntry {
        DiffEntry {
            destination: Location::parse("acme/widgets", "main", path, ObjectKind::Blob).unwrap(),
            source: Location::parse("acme/template", "main", path, ObjectKind::Blob).unwrap(),
        }
    }

    fn root() -> Location {
        Location::root("acme", "widgets", "main")
    }

    #[test]
    fn leaf_attaches_at_immediate_parent() {
        let tree = MergeTree::build(root(), &[pair("a/b/c.txt")]).unwrap();
        assert_eq!(tree.len(), 3);

        let root_node = tree.node(MergeTree::ROOT);
        assert_eq!(root_node.subtrees.len(), 1);
        assert!(root_node.leaves.is_empty());

        let a = tree.node(root_node.subtrees[0].1);
        assert_eq!(a.current.path, vec!["a".to_string()]);
        assert_eq!(a.subtrees.len(), 1);

        let b = tree.node(a.subtrees[0].1);
        assert_eq!(b.current.path, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(b.leaves.len(), 1);
        assert_eq!(b.leaves[0].0, "c.txt");
    }

    #[test]
    fn shared_directories_are_not_duplicated() {
        let tree = MergeTree::build(
            root(),
            &[pair("a/one.txt"), pair("a/two.txt"), pair("a/b/three.txt")],
        )
        .unwrap();
        // root, a, a/b
        assert_eq!(tree.len(), 3);
        let a = tree.node(tree.node(MergeTree::ROOT).subtrees[0].1);
        assert_eq!(a.leaves.len(), 2);
        assert_eq!(a.subtrees.len(), 1);
    }

    #[test]
    fn root_leaf_goes_to_root_node() {
        let tree = MergeTree::build(root(), &[pair("README.md")]).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.node(MergeTree::ROOT).leaves[0].0, "README.md");
    }

    #[test]
    fn root_destination_is_rejected() {
        let entry = DiffEntry {
            destination: Location::root("acme", "widgets", "main"),
            source: Location::root("acme", "template", "main"),
        };
        assert!(matches!(
            MergeTree::build(root(), &[entry]),
            Err(SyncError::InvalidTraversal(_))
        ));
    }

    #[test]
    fn post_order_yields_children_before_parents() {
        let tree = MergeTree::build(
            root(),
            &[pair("a/b/c.txt"), pair("a/d.txt"), pair("e/f.txt")],
        )
        .unwrap();
        let order = tree.post_order();
        assert_eq!(order.len(), tree.len());
        assert_eq!(*order.last().unwrap(), MergeTree::ROOT);

        let position = |id: NodeId| order.iter().position(|n| *n == id).unwrap();
        for id in 0..tree.len() {
            for (_, child) in &tree.node(id).subtrees {
                assert!(position(*child) < position(id));
            }
        }
    }

    #[test]
    fn ensure_directory_routes_without_leaves() {
        let mut tree = MergeTree::build(root(), &[]).unwrap();
        let dirs = vec!["a".to_string(), "b".to_string()];
        let id = tree.ensure_directory(&dirs).unwrap();
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.node(id).current.path, dirs);
        assert!(tree.node(id).leaves.is_empty());

        // routing again reuses the existing nodes
        assert_eq!(tree.ensure_directory(&dirs).unwrap(), id);
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn empty_group_is_empty() {
        let tree = MergeTree::build(root(), &[]).unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.post_order(), vec![MergeTree::ROOT]);
    }
}
