//! Application state management.

use anyhow::Context;
use clap::Args;
use locus_core::{Config, FileIndex, NotifyBackend};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Command-line overrides for the `[index]` config section.
#[derive(Args, Debug, Default, Clone)]
pub struct Overrides {
    /// Directory to index
    #[arg(short, long, global = true)]
    pub root: Option<PathBuf>,

    /// Glob matched against file names (e.g. "*.mp3")
    #[arg(short, long, global = true)]
    pub pattern: Option<String>,

    /// Only index direct children of the root
    #[arg(long, global = true)]
    pub no_recurse: bool,

    /// Match the pattern case-sensitively
    #[arg(long, global = true)]
    pub case_sensitive: bool,
}

/// Shared application state.
pub struct App {
    /// Configuration with command-line overrides applied
    pub config: Config,
}

impl App {
    /// Create a new application instance.
    pub fn new(mut config: Config, overrides: &Overrides) -> anyhow::Result<Self> {
        if let Some(root) = &overrides.root {
            config.index.root = Some(root.clone());
        }
        if let Some(pattern) = &overrides.pattern {
            config.index.pattern = pattern.clone();
        }
        if overrides.no_recurse {
            config.index.recursive = false;
        }
        if overrides.case_sensitive {
            config.index.case_sensitive = true;
        }

        Ok(App { config })
    }

    /// Build and initialize an index for the configured root.
    pub fn open_index(&self) -> anyhow::Result<FileIndex> {
        let descriptor = self
            .config
            .descriptor()
            .context("No root to index; pass --root or set [index] root in locus.toml")?;

        let index = FileIndex::with_backend(
            Arc::new(NotifyBackend::new()),
            self.config.restart_policy(),
        )?;

        let start = Instant::now();
        index
            .init_with(descriptor)
            .context("Failed to initialize the index")?;

        info!(
            entries = index.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Index ready"
        );

        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_win_over_config() {
        let mut config = Config::default();
        config.index.root = Some(PathBuf::from("/from/config"));
        config.index.pattern = "*.flac".to_string();

        let overrides = Overrides {
            root: Some(PathBuf::from("/from/cli")),
            pattern: None,
            no_recurse: true,
            case_sensitive: false,
        };
        let app = App::new(config, &overrides).unwrap();

        assert_eq!(app.config.index.root, Some(PathBuf::from("/from/cli")));
        assert_eq!(app.config.index.pattern, "*.flac");
        assert!(!app.config.index.recursive);
        assert!(!app.config.index.case_sensitive);
    }

    #[test]
    fn test_open_index_without_root() {
        let app = App::new(Config::default(), &Overrides::default()).unwrap();
        assert!(app.open_index().is_err());
    }

    #[test]
    fn test_open_index() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.mp3"), b"").unwrap();
        std::fs::write(dir.path().join("b.txt"), b"").unwrap();

        let overrides = Overrides {
            root: Some(dir.path().to_path_buf()),
            pattern: Some("*.mp3".to_string()),
            ..Overrides::default()
        };
        let app = App::new(Config::default(), &overrides).unwrap();
        let index = app.open_index().unwrap();

        assert_eq!(index.len(), 1);
    }
}
