//! repo-sync - content-addressed file-tree synchronization between hosted
//! git repositories.
//!
//! The engine compares tree and blob objects by content hash and rebuilds
//! only the differing subtrees at each destination, then proposes the
//! result as a commit, a branch, or a pull request.
//!
//! # Usage
//! ```no_run
//! use repo_sync::engine::Reconciler;
//! use repo_sync::gateway::InMemoryGateway;
//! use repo_sync::models::{DiffMap, Location, ObjectKind, OutputMode};
//!
//! # async fn example() -> repo_sync::error::Result<()> {
//! let gateway = InMemoryGateway::new();
//! let engine = Reconciler::new(gateway);
//!
//! let mut map = DiffMap::new();
//! map.insert(
//!     Location::parse("acme/template", "main", "buildSupport", ObjectKind::Tree)?,
//!     Location::parse("acme/widgets", "main", "buildSupport", ObjectKind::Tree)?,
//! );
//!
//! let diff = engine.diff(&map).await?;
//! if !diff.to_sync.is_empty() {
//!     let outcomes = engine.sync(&diff, OutputMode::PullRequest, &[]).await?;
//!     for outcome in outcomes {
//!         println!("{}", outcome.url);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Production deployments implement [`gateway::GitGateway`] against the
//! hosting service's REST API; the crate ships [`gateway::InMemoryGateway`]
//! for tests and dry runs.

pub mod engine;
pub mod error;
pub mod gateway;
pub mod models;

pub use engine::{KnownObjects, MergeTree, Reconciler};
pub use error::{Result, SyncError};
pub use gateway::{GitGateway, InMemoryGateway};
pub use models::{
    DiffEntry, DiffMap, DiffResult, FileMode, Location, ObjectKind, OutputMode, SyncOutcome,
    SyncPlan, TreeEntry,
};
