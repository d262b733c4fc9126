//! The single writer that applies queued changes to the cache.
//!
//! One `Reconciler` thread runs per index session. It drains the session's
//! `ChangeQueue` in arrival order and applies each event as one `CacheStore`
//! mutation. It exits only when the queue is completed and drained, so a
//! `join` after `complete` guarantees every queued event has been applied.
//!
//! A change that cannot be applied (typically a directory that became
//! unreadable between the notification and the walk) is logged and dropped.
//! The worker never dies on a single bad event.

use crate::error::{LocusError, Result};
use crate::queue::ChangeQueue;
use crate::store::CacheStore;
use crate::types::{ChangeEvent, RootDescriptor};
use crate::walk;
use crossbeam_channel::Sender;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Items carried by a session's queue.
#[derive(Debug)]
pub enum Message {
    /// A change to apply
    Change(ChangeEvent),

    /// Acknowledged once everything queued before it has been applied
    Barrier(Sender<()>),
}

/// Handle to a running reconciler thread.
pub struct Reconciler {
    thread: Option<JoinHandle<()>>,
}

impl Reconciler {
    /// Start draining `queue` into `store`.
    pub fn spawn(
        store: Arc<CacheStore>,
        descriptor: RootDescriptor,
        queue: Arc<ChangeQueue<Message>>,
    ) -> Result<Self> {
        let thread = thread::Builder::new()
            .name("locus-reconciler".to_string())
            .spawn(move || run(&store, &descriptor, &queue))
            .map_err(LocusError::Io)?;

        Ok(Reconciler {
            thread: Some(thread),
        })
    }

    /// Wait for the thread to exit.
    ///
    /// Returns immediately unless the queue has been completed; callers
    /// complete the queue first.
    pub fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Reconciler thread panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("running", &self.is_running())
            .finish()
    }
}

fn run(store: &CacheStore, descriptor: &RootDescriptor, queue: &ChangeQueue<Message>) {
    debug!(root = %descriptor.root().display(), "Reconciler started");
    let mut applied = 0u64;

    while let Some(message) = queue.take() {
        match message {
            Message::Change(event) => {
                apply(store, descriptor, &event);
                applied += 1;
            }
            Message::Barrier(ack) => {
                let _ = ack.send(());
            }
        }
    }

    info!(applied, "Reconciler drained and stopped");
}

/// Apply one change to `store`.
///
/// Failures are logged and the event is dropped.
pub fn apply(store: &CacheStore, descriptor: &RootDescriptor, event: &ChangeEvent) {
    debug!(%event, "Applying change");

    match event {
        ChangeEvent::Created(path) => match expand(path, descriptor) {
            Ok(paths) => {
                store.add_all_unique(paths);
            }
            Err(e) => warn!(%event, error = %e, "Dropping change event"),
        },
        ChangeEvent::Deleted(path) => {
            store.remove_prefixed(path);
        }
        ChangeEvent::Renamed(from, to) => match expand(to, descriptor) {
            Ok(paths) => {
                store.replace_prefixed(from, paths);
            }
            Err(e) => {
                // The old side is gone regardless.
                store.remove_prefixed(from);
                warn!(%event, error = %e, "Could not index rename target");
            }
        },
    }
}

/// Resolve a created path into the cache entries it contributes.
fn expand(path: &Path, descriptor: &RootDescriptor) -> Result<Vec<PathBuf>> {
    if !descriptor.in_scope(path) {
        return Ok(Vec::new());
    }

    // Links are judged by their own name, exactly as the snapshot walk does.
    match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.is_dir() => walk::enumerate(path, descriptor),
        Ok(_) if descriptor.admits(path) => Ok(vec![path.to_path_buf()]),
        Ok(_) => Ok(Vec::new()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Path vanished before it could be indexed");
            Ok(Vec::new())
        }
        Err(e) => Err(LocusError::enumeration(path, e)),
    }
}
