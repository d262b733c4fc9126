//! The cached set of matching file paths.
//!
//! `CacheStore` keeps an ordered list of unique absolute paths behind a single
//! mutex. Every accessor takes the lock for the duration of the call and
//! releases it before returning, so readers never observe a half-applied
//! change. Writes are rare next to lookups; a reader/writer split buys nothing
//! here.
//!
//! ## Layout
//!
//! - A `Vec<PathBuf>` keeps insertion order for deterministic iteration
//! - A `HashSet<PathBuf>` mirrors it for O(1) duplicate checks

use crate::error::Result;
use crate::types::RootDescriptor;
use crate::walk;
use parking_lot::Mutex;
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, instrument};

#[derive(Default)]
struct Entries {
    paths: Vec<PathBuf>,
    members: HashSet<PathBuf>,
}

impl Entries {
    fn insert(&mut self, path: PathBuf) -> bool {
        if self.members.contains(&path) {
            return false;
        }
        self.members.insert(path.clone());
        self.paths.push(path);
        true
    }

    fn remove_prefixed(&mut self, prefix: &Path) -> usize {
        let before = self.paths.len();
        self.paths.retain(|p| !p.starts_with(prefix));
        self.members.retain(|p| !p.starts_with(prefix));
        before - self.paths.len()
    }

    fn replace_all(&mut self, paths: Vec<PathBuf>) {
        self.paths.clear();
        self.members.clear();
        for path in paths {
            self.insert(path);
        }
    }
}

/// Thread-safe, duplicate-free collection of cached file paths.
#[derive(Default)]
pub struct CacheStore {
    entries: Mutex<Entries>,

    /// Bumped on every mutation that changed the contents
    generation: AtomicU64,
}

impl CacheStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached paths.
    pub fn len(&self) -> usize {
        self.entries.lock().paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().paths.is_empty()
    }

    /// Current modification counter.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Return the first cached path accepted by `matcher`.
    pub fn find<F>(&self, mut matcher: F) -> Option<PathBuf>
    where
        F: FnMut(&Path) -> bool,
    {
        self.entries
            .lock()
            .paths
            .iter()
            .find(|p| matcher(p))
            .cloned()
    }

    /// Return every cached path accepted by `matcher`, in cache order.
    pub fn find_all<F>(&self, mut matcher: F) -> Vec<PathBuf>
    where
        F: FnMut(&Path) -> bool,
    {
        self.entries
            .lock()
            .paths
            .iter()
            .filter(|p| matcher(p))
            .cloned()
            .collect()
    }

    /// Return the first cached path whose textual form matches `regex`.
    pub fn find_regex(&self, regex: &Regex) -> Option<PathBuf> {
        self.find(|p| regex.is_match(&p.to_string_lossy()))
    }

    /// Copy of all cached paths, in cache order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.entries.lock().paths.clone()
    }

    /// Replace the whole contents with a fresh walk of `descriptor`.
    ///
    /// The lock is held for the entire walk, so queued change events wait and
    /// are applied on top of the new snapshot. On error the previous contents
    /// are left untouched.
    #[instrument(skip(self, descriptor), fields(root = %descriptor.root().display()))]
    pub fn refresh(&self, descriptor: &RootDescriptor) -> Result<usize> {
        let mut entries = self.entries.lock();
        let paths = walk::enumerate(descriptor.root(), descriptor)?;
        entries.replace_all(paths);
        let count = entries.paths.len();
        drop(entries);

        self.bump();
        debug!(count, "Cache refreshed");
        Ok(count)
    }

    /// Insert `path` unless it is already cached.
    pub fn add_unique(&self, path: PathBuf) -> bool {
        let added = self.entries.lock().insert(path);
        if added {
            self.bump();
        }
        added
    }

    /// Insert every path not already cached, under one lock acquisition.
    pub fn add_all_unique(&self, paths: impl IntoIterator<Item = PathBuf>) -> usize {
        let mut entries = self.entries.lock();
        let added = paths.into_iter().filter(|p| entries.insert(p.clone())).count();
        drop(entries);

        if added > 0 {
            self.bump();
        }
        added
    }

    /// Remove every entry equal to or nested under `prefix`.
    ///
    /// Matching is component-wise: removing `/music/sub` leaves
    /// `/music/sub2/a.mp3` alone.
    pub fn remove_prefixed(&self, prefix: &Path) -> usize {
        let removed = self.entries.lock().remove_prefixed(prefix);
        if removed > 0 {
            self.bump();
        }
        removed
    }

    /// Remove everything under `old` and insert `new_paths` as one mutation.
    ///
    /// Returns `(removed, added)`.
    pub fn replace_prefixed(
        &self,
        old: &Path,
        new_paths: impl IntoIterator<Item = PathBuf>,
    ) -> (usize, usize) {
        let mut entries = self.entries.lock();
        let removed = entries.remove_prefixed(old);
        let added = new_paths
            .into_iter()
            .filter(|p| entries.insert(p.clone()))
            .count();
        drop(entries);

        if removed + added > 0 {
            self.bump();
        }
        (removed, added)
    }

    /// Drop every cached path.
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        entries.paths.clear();
        entries.members.clear();
        drop(entries);
        self.bump();
    }

    fn bump(&self) {
        self.generation.fetch_add(1, Ordering::Release);
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("len", &self.len())
            .field("generation", &self.generation())
            .finish()
    }
}
