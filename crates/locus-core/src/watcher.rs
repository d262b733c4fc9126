//! `notify`-based watch backend.
//!
//! Translates native notifications into path-level `ChangeEvent`s:
//!
//! | notify event                    | ChangeEvent                       |
//! |---------------------------------|-----------------------------------|
//! | `Create(_)`                     | `Created(path)`                   |
//! | `Remove(_)`                     | `Deleted(path)`                   |
//! | `Modify(Name(Both))`            | `Renamed(from, to)`               |
//! | `Modify(Name(From))`            | `Deleted(path)`                   |
//! | `Modify(Name(To))`              | `Created(path)`                   |
//! | `Modify(Name(Any \| Other))`    | `Created` if it exists, else `Deleted` |
//!
//! Inotify reports a move as `From`, `To` and then `Both`. Applying all three
//! is harmless: the later ones find the work already done.
//!
//! Callback errors and events flagged as needing a rescan (queue overflow)
//! are reported through `ChangeHandler::on_error`.

use crate::backend::{ChangeHandler, WatchBackend, WatchHandle};
use crate::error::Result;
use crate::types::{ChangeEvent, RootDescriptor};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, trace, warn};

/// What a single native event means for the index.
#[derive(Debug, PartialEq, Eq)]
enum Translation {
    Changes(Vec<ChangeEvent>),
    Rescan,
}

/// Watch backend built on the platform's recommended `notify` watcher.
pub struct NotifyBackend {
    config: notify::Config,
}

impl NotifyBackend {
    pub fn new() -> Self {
        NotifyBackend {
            config: notify::Config::default(),
        }
    }

    /// Use a custom `notify` configuration
    pub fn with_config(config: notify::Config) -> Self {
        NotifyBackend { config }
    }
}

impl Default for NotifyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchBackend for NotifyBackend {
    fn watch(
        &self,
        descriptor: &RootDescriptor,
        handler: Arc<dyn ChangeHandler>,
    ) -> Result<WatchHandle> {
        let mut watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| match result {
                Ok(event) => dispatch(event, handler.as_ref()),
                Err(error) => handler.on_error(error.to_string()),
            },
            self.config.clone(),
        )?;

        let mode = if descriptor.is_recursive() {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher.watch(descriptor.root(), mode)?;

        info!(
            root = %descriptor.root().display(),
            recursive = descriptor.is_recursive(),
            "Watching for changes"
        );

        Ok(WatchHandle::new(watcher))
    }

    fn name(&self) -> &'static str {
        "notify"
    }
}

fn dispatch(event: Event, handler: &dyn ChangeHandler) {
    match translate(event) {
        Translation::Changes(changes) => {
            for change in changes {
                handler.on_change(change);
            }
        }
        Translation::Rescan => {
            warn!("Watcher dropped events, rescan required");
            handler.on_error("event queue overflow, rescan required".to_string());
        }
    }
}

fn translate(event: Event) -> Translation {
    if event.need_rescan() {
        return Translation::Rescan;
    }

    let changes = match event.kind {
        EventKind::Create(_) => each(event.paths, ChangeEvent::Created),
        EventKind::Remove(_) => each(event.paths, ChangeEvent::Deleted),
        EventKind::Modify(ModifyKind::Name(mode)) => rename(mode, event.paths),
        other => {
            trace!(kind = ?other, "Ignoring event");
            Vec::new()
        }
    };

    Translation::Changes(changes)
}

fn each(paths: Vec<PathBuf>, make: fn(PathBuf) -> ChangeEvent) -> Vec<ChangeEvent> {
    paths.into_iter().map(make).collect()
}

fn rename(mode: RenameMode, mut paths: Vec<PathBuf>) -> Vec<ChangeEvent> {
    match mode {
        RenameMode::Both if paths.len() == 2 => {
            let to = paths.remove(1);
            let from = paths.remove(0);
            vec![ChangeEvent::Renamed(from, to)]
        }
        RenameMode::From => each(paths, ChangeEvent::Deleted),
        RenameMode::To => each(paths, ChangeEvent::Created),
        // FSEvents cannot tell which side of a move it saw.
        _ => paths
            .into_iter()
            .map(|path| {
                if path.exists() {
                    ChangeEvent::Created(path)
                } else {
                    ChangeEvent::Deleted(path)
                }
            })
            .collect(),
    }
}
