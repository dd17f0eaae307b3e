//! Known-object dedup cache.
//!
//! Remembers which content hashes are already present at a destination
//! repository, so identical content is never uploaded twice. This is the
//! common case when many destinations share one template source. Populated whenever an
//! object is fetched from or created at a destination; never invalidated
//! within a run (destinations are append-only by hash while a sync runs).
//!
//! The cache also remembers the file mode the object was seen with, so a
//! cache hit can produce a complete tree entry without refetching.
//!
//! Single-writer discipline: only the sequential rebuild walk writes to
//! the cache. The interior mutex exists so the reconciler can share it
//! behind `&self`, not for concurrent writers.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::models::FileMode;

#[derive(Debug, Default)]
pub struct KnownObjects {
    known: Mutex<HashMap<(String, String, String), FileMode>>,
}

impl KnownObjects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Is this hash known to exist at the destination? Returns the mode it
    /// was last seen with.
    pub fn lookup(&self, owner: &str, repo: &str, hash: &str) -> Option<FileMode> {
        let known = self.known.lock().ok()?;
        known
            .get(&(owner.to_string(), repo.to_string(), hash.to_string()))
            .copied()
    }

    /// Record that an object with this hash exists at the destination.
    pub fn record(&self, owner: &str, repo: &str, hash: &str, mode: FileMode) {
        if let Ok(mut known) = self.known.lock() {
            known.insert(
                (owner.to_string(), repo.to_string(), hash.to_string()),
                mode,
            );
        }
    }

    pub fn len(&self) -> usize {
        self.known.lock().map(|k| k.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
