//! Core data model.
//!
//! - `location`: Location and ObjectKind, pointers into a repository's
//!   object graph
//! - `tree`: TreeEntry, FileMode, the pure baseline-merge step
//! - `diff`: DiffMap, DiffEntry, DiffResult, DestinationGroup
//! - `plan`: configuration specs, OutputMode, SyncOutcome

pub mod diff;
pub mod location;
pub mod plan;
pub mod tree;

pub use diff::*;
pub use location::*;
pub use plan::*;
pub use tree::*;
