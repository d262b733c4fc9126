//! Core data types for Locus.
//!
//! - `RootDescriptor`: what is indexed (root, file-name pattern, recursion)
//! - `ChangeEvent`: a path-level change reported by a watch backend
//! - `LifecycleState`: where an index is in its init/stop cycle

use crate::error::{LocusError, Result};
use glob::{MatchOptions, Pattern};
use std::fmt;
use std::path::{Path, PathBuf};

/// The directory subtree and file-name pattern an index covers.
///
/// A descriptor is fixed for the lifetime of one index session; changing it
/// requires a full `init()`. The pattern is matched against the file name only,
/// so `*.mp3` finds `a.mp3` in any directory the recursion rule reaches.
#[derive(Clone)]
pub struct RootDescriptor {
    root: PathBuf,
    pattern: String,
    compiled: Pattern,
    recursive: bool,
    case_sensitive: bool,
}

impl RootDescriptor {
    /// Create a descriptor with case-insensitive matching.
    pub fn new(root: impl Into<PathBuf>, pattern: &str, recursive: bool) -> Result<Self> {
        let compiled = Pattern::new(pattern).map_err(|e| LocusError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        Ok(RootDescriptor {
            root: root.into(),
            pattern: pattern.to_string(),
            compiled,
            recursive,
            case_sensitive: false,
        })
    }

    /// Set whether file names are matched case-sensitively
    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// Replace the root with its canonical absolute form.
    ///
    /// Fails with `RootNotFound` or `NotADirectory` when the root is unusable.
    pub fn resolve(mut self) -> Result<Self> {
        let canonical = self.root.canonicalize().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => LocusError::RootNotFound {
                path: self.root.clone(),
            },
            _ => LocusError::enumeration(&self.root, e),
        })?;

        if !canonical.is_dir() {
            return Err(LocusError::NotADirectory { path: canonical });
        }

        self.root = canonical;
        Ok(self)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_recursive(&self) -> bool {
        self.recursive
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Check a bare file name against the pattern.
    pub fn matches_name(&self, name: &str) -> bool {
        let options = MatchOptions {
            case_sensitive: self.case_sensitive,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };
        self.compiled.matches_with(name, options)
    }

    /// Whether `path` lies inside the watched scope, ignoring the pattern.
    ///
    /// Non-recursive descriptors only reach direct children of the root.
    pub fn in_scope(&self, path: &Path) -> bool {
        if path == self.root || !path.starts_with(&self.root) {
            return false;
        }
        self.recursive || path.parent() == Some(self.root.as_path())
    }

    /// Whether a file at `path` belongs in the index.
    pub fn admits(&self, path: &Path) -> bool {
        if !self.in_scope(path) {
            return false;
        }
        match path.file_name() {
            Some(name) => self.matches_name(&name.to_string_lossy()),
            None => false,
        }
    }
}

impl fmt::Debug for RootDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootDescriptor")
            .field("root", &self.root)
            .field("pattern", &self.pattern)
            .field("recursive", &self.recursive)
            .field("case_sensitive", &self.case_sensitive)
            .finish()
    }
}

impl PartialEq for RootDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root
            && self.pattern == other.pattern
            && self.recursive == other.recursive
            && self.case_sensitive == other.case_sensitive
    }
}

impl Eq for RootDescriptor {}

/// A path-level filesystem change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// A file or directory appeared at this path
    Created(PathBuf),

    /// The file or directory at this path is gone
    Deleted(PathBuf),

    /// A file or directory moved from the first path to the second
    Renamed(PathBuf, PathBuf),
}

impl ChangeEvent {
    /// The path the event leaves behind on disk (the new side of a rename).
    pub fn path(&self) -> &Path {
        match self {
            ChangeEvent::Created(path) | ChangeEvent::Deleted(path) => path,
            ChangeEvent::Renamed(_, to) => to,
        }
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeEvent::Created(path) => write!(f, "created {}", path.display()),
            ChangeEvent::Deleted(path) => write!(f, "deleted {}", path.display()),
            ChangeEvent::Renamed(from, to) => {
                write!(f, "renamed {} -> {}", from.display(), to.display())
            }
        }
    }
}

/// Lifecycle of an index session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Stopped,
    Initializing,
    Running,
    Stopping,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Stopped => write!(f, "stopped"),
            LifecycleState::Initializing => write!(f, "initializing"),
            LifecycleState::Running => write!(f, "running"),
            LifecycleState::Stopping => write!(f, "stopping"),
        }
    }
}
