//! Live file-location index.
//!
//! `FileIndex` owns the whole lifecycle of one watched root:
//!
//! - `init()` subscribes a watch backend, seeds the cache with a synchronous
//!   walk, then starts the reconciler that applies buffered changes on top
//! - `stop()` releases the subscription, completes the queue, joins the
//!   reconciler (so every queued event is applied) and clears the cache
//! - a watcher failure triggers `stop()` + `init()` with the same descriptor
//!   on a dedicated recovery thread
//!
//! ## States
//!
//! ```text
//! Stopped -> Initializing -> Running -> Stopping -> Stopped
//!                               |                      ^
//!                               +-- watcher failure ---+--> Initializing
//! ```
//!
//! Lookups (`find`, `find_regex`, ...) go straight to the `CacheStore` and
//! never wait on lifecycle transitions. Lifecycle operations serialize on a
//! separate control mutex, so two restarts can never overlap.
//!
//! ## Example
//!
//! ```rust,no_run
//! use locus_core::FileIndex;
//!
//! let index = FileIndex::open("/srv/audiobooks", "*.m4b", true)?;
//! if let Some(path) = index.find(|p| p.ends_with("Dune.m4b")) {
//!     println!("{}", path.display());
//! }
//! # Ok::<(), locus_core::LocusError>(())
//! ```

use crate::backend::{ChangeHandler, WatchBackend, WatchHandle};
use crate::error::{LocusError, Result};
use crate::queue::ChangeQueue;
use crate::reconciler::{Message, Reconciler};
use crate::store::CacheStore;
use crate::types::{ChangeEvent, LifecycleState, RootDescriptor};
use crate::watcher::NotifyBackend;
use crossbeam_channel::{select, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// How the index reacts when re-initialization after a watcher failure
/// itself fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartPolicy {
    /// Consecutive failed re-initializations tolerated (None = unbounded)
    pub max_attempts: Option<u32>,

    /// Delay before the first retry
    pub initial_backoff: Duration,

    /// Upper bound for the exponentially growing delay
    pub max_backoff: Duration,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        RestartPolicy {
            max_attempts: None,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RestartPolicy {
    /// Retry forever without waiting.
    pub fn immediate() -> Self {
        RestartPolicy {
            max_attempts: None,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay before the retry following `failures` consecutive failures.
    pub fn backoff(&self, failures: u32) -> Duration {
        let shift = failures.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << shift)
            .min(self.max_backoff)
    }

    fn exhausted(&self, failures: u32) -> bool {
        self.max_attempts.is_some_and(|max| failures >= max)
    }
}

/// A failure reported by the backend of a particular session.
#[derive(Debug)]
struct WatchFailure {
    generation: u64,
    reason: String,
}

/// One init-to-stop span: a subscription, its queue and its reconciler.
struct Session {
    generation: u64,
    queue: Arc<ChangeQueue<Message>>,
    watch: WatchHandle,
    reconciler: Reconciler,
}

struct Lifecycle {
    state: LifecycleState,
    descriptor: Option<RootDescriptor>,
    session: Option<Session>,
    generation: u64,

    /// Set while the recovery thread is retrying a failed restart
    recovering: bool,
}

/// Feeds backend callbacks into the session queue.
struct SessionHandler {
    generation: u64,
    queue: Arc<ChangeQueue<Message>>,
    failures: Sender<WatchFailure>,
}

impl ChangeHandler for SessionHandler {
    fn on_change(&self, event: ChangeEvent) {
        self.queue.push(Message::Change(event));
    }

    fn on_error(&self, reason: String) {
        warn!(generation = self.generation, reason = %reason, "Watcher reported an error");
        let _ = self.failures.send(WatchFailure {
            generation: self.generation,
            reason,
        });
    }
}

struct Shared {
    store: Arc<CacheStore>,
    backend: Arc<dyn WatchBackend>,
    policy: RestartPolicy,
    lifecycle: Mutex<Lifecycle>,
    failures: Sender<WatchFailure>,
    restarts: AtomicU64,
}

/// A self-healing index of the files under one root that match a pattern.
pub struct FileIndex {
    shared: Arc<Shared>,
    recovery: Option<JoinHandle<()>>,
    shutdown: Option<Sender<()>>,
}

impl FileIndex {
    /// Create a stopped index backed by the platform's `notify` watcher.
    pub fn new() -> Result<Self> {
        Self::with_backend(Arc::new(NotifyBackend::new()), RestartPolicy::default())
    }

    /// Create a stopped index with a specific backend and restart policy.
    pub fn with_backend(backend: Arc<dyn WatchBackend>, policy: RestartPolicy) -> Result<Self> {
        let (failures_tx, failures_rx) = crossbeam_channel::unbounded();
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);

        let shared = Arc::new(Shared {
            store: Arc::new(CacheStore::new()),
            backend,
            policy,
            lifecycle: Mutex::new(Lifecycle {
                state: LifecycleState::Stopped,
                descriptor: None,
                session: None,
                generation: 0,
                recovering: false,
            }),
            failures: failures_tx,
            restarts: AtomicU64::new(0),
        });

        let recovery = {
            let shared = shared.clone();
            thread::Builder::new()
                .name("locus-recovery".to_string())
                .spawn(move || recovery_loop(&shared, &failures_rx, &shutdown_rx))
                .map_err(LocusError::Io)?
        };

        Ok(FileIndex {
            shared,
            recovery: Some(recovery),
            shutdown: Some(shutdown_tx),
        })
    }

    /// Create an index and initialize it in one step.
    pub fn open(root: impl AsRef<Path>, pattern: &str, recurse: bool) -> Result<Self> {
        let index = Self::new()?;
        index.init(root, pattern, recurse)?;
        Ok(index)
    }

    /// Start indexing `root` for files whose name matches `pattern`.
    ///
    /// Blocks until the initial snapshot is complete. Fails with
    /// `InvalidState` unless the index is stopped.
    pub fn init(&self, root: impl AsRef<Path>, pattern: &str, recurse: bool) -> Result<()> {
        let descriptor = RootDescriptor::new(root.as_ref(), pattern, recurse)?;
        self.init_with(descriptor)
    }

    /// Start indexing with a fully specified descriptor.
    #[instrument(skip(self), fields(root = %descriptor.root().display()))]
    pub fn init_with(&self, descriptor: RootDescriptor) -> Result<()> {
        let descriptor = descriptor.resolve()?;

        let mut lifecycle = self.shared.lifecycle.lock();
        if lifecycle.state != LifecycleState::Stopped {
            return Err(LocusError::InvalidState {
                operation: "init",
                state: lifecycle.state.to_string(),
            });
        }

        lifecycle.recovering = false;
        self.shared.init_locked(&mut lifecycle, descriptor)
    }

    /// Tear the session down and clear the cache.
    ///
    /// Every change queued before the call is applied before the cache is
    /// cleared. Stopping a stopped index is a no-op.
    #[instrument(skip(self))]
    pub fn stop(&self) {
        let mut lifecycle = self.shared.lifecycle.lock();
        lifecycle.recovering = false;
        self.shared.stop_locked(&mut lifecycle);
    }

    /// Replace the cache with a fresh walk of the root.
    ///
    /// Useful when a change notification is suspected to have been missed.
    /// Returns the number of cached paths.
    ///
    /// The cache lock is held for the whole walk so readers never see a
    /// partial snapshot; lookups made meanwhile block until it completes.
    pub fn refresh(&self) -> Result<usize> {
        let lifecycle = self.shared.lifecycle.lock();
        match (&lifecycle.state, &lifecycle.descriptor) {
            (LifecycleState::Running, Some(descriptor)) => self.shared.store.refresh(descriptor),
            (state, _) => Err(LocusError::InvalidState {
                operation: "refresh",
                state: state.to_string(),
            }),
        }
    }

    /// First cached path accepted by `matcher`, if any.
    pub fn find<F>(&self, matcher: F) -> Option<PathBuf>
    where
        F: FnMut(&Path) -> bool,
    {
        self.shared.store.find(matcher)
    }

    /// First cached path whose textual form matches `regex`.
    pub fn find_regex(&self, regex: &Regex) -> Option<PathBuf> {
        self.shared.store.find_regex(regex)
    }

    /// Every cached path accepted by `matcher`.
    pub fn find_all<F>(&self, matcher: F) -> Vec<PathBuf>
    where
        F: FnMut(&Path) -> bool,
    {
        self.shared.store.find_all(matcher)
    }

    /// Snapshot of all cached paths.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.shared.store.paths()
    }

    pub fn len(&self) -> usize {
        self.shared.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.store.is_empty()
    }

    /// Cache modification counter.
    pub fn generation(&self) -> u64 {
        self.shared.store.generation()
    }

    pub fn state(&self) -> LifecycleState {
        self.shared.lifecycle.lock().state
    }

    /// Descriptor of the current (or last attempted) session.
    pub fn descriptor(&self) -> Option<RootDescriptor> {
        self.shared.lifecycle.lock().descriptor.clone()
    }

    /// Number of successful self-heals since creation.
    pub fn restart_count(&self) -> u64 {
        self.shared.restarts.load(Ordering::Acquire)
    }

    /// Whether a failed restart is waiting to be retried.
    pub fn is_recovering(&self) -> bool {
        self.shared.lifecycle.lock().recovering
    }

    /// Queue a change exactly as the watcher would.
    ///
    /// Returns false if the index is not running.
    pub fn inject(&self, event: ChangeEvent) -> bool {
        match self.current_queue() {
            Some(queue) => queue.push(Message::Change(event)),
            None => false,
        }
    }

    /// Block until every change queued before this call has been applied.
    pub fn flush(&self) {
        let Some(queue) = self.current_queue() else {
            return;
        };

        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        if queue.push(Message::Barrier(ack_tx)) {
            let _ = ack_rx.recv();
        }
    }

    fn current_queue(&self) -> Option<Arc<ChangeQueue<Message>>> {
        self.shared
            .lifecycle
            .lock()
            .session
            .as_ref()
            .map(|s| s.queue.clone())
    }
}

impl Drop for FileIndex {
    fn drop(&mut self) {
        self.stop();
        // Dropping the sender wakes the recovery thread.
        self.shutdown.take();
        if let Some(recovery) = self.recovery.take() {
            if recovery.join().is_err() {
                error!("Recovery thread panicked");
            }
        }
    }
}

impl std::fmt::Debug for FileIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileIndex")
            .field("state", &self.state())
            .field("descriptor", &self.descriptor())
            .field("len", &self.len())
            .finish()
    }
}

impl Shared {
    fn init_locked(&self, lifecycle: &mut Lifecycle, descriptor: RootDescriptor) -> Result<()> {
        lifecycle.state = LifecycleState::Initializing;
        lifecycle.descriptor = Some(descriptor.clone());

        // Every attempt gets its own generation, so a handler left behind by
        // a failed start can never pass for the next session's.
        lifecycle.generation += 1;

        match self.start_session(&descriptor, lifecycle.generation) {
            Ok(session) => {
                lifecycle.session = Some(session);
                lifecycle.state = LifecycleState::Running;
                info!(
                    root = %descriptor.root().display(),
                    pattern = descriptor.pattern(),
                    recursive = descriptor.is_recursive(),
                    entries = self.store.len(),
                    "Index running"
                );
                Ok(())
            }
            Err(e) => {
                self.store.clear();
                lifecycle.state = LifecycleState::Stopped;
                Err(e)
            }
        }
    }

    /// Subscribe first so nothing that happens during the seed walk is lost;
    /// buffered changes are applied on top of the snapshot once the
    /// reconciler starts.
    fn start_session(&self, descriptor: &RootDescriptor, generation: u64) -> Result<Session> {
        let queue = Arc::new(ChangeQueue::new());
        let handler = Arc::new(SessionHandler {
            generation,
            queue: queue.clone(),
            failures: self.failures.clone(),
        });

        let watch = self.backend.watch(descriptor, handler)?;
        let seeded = self.store.refresh(descriptor)?;
        debug!(entries = seeded, backend = self.backend.name(), "Seeded cache");

        let reconciler = Reconciler::spawn(self.store.clone(), descriptor.clone(), queue.clone())?;

        Ok(Session {
            generation,
            queue,
            watch,
            reconciler,
        })
    }

    fn stop_locked(&self, lifecycle: &mut Lifecycle) {
        if let Some(mut session) = lifecycle.session.take() {
            lifecycle.state = LifecycleState::Stopping;

            session.watch.stop();
            session.queue.complete();
            session.reconciler.join();

            info!(generation = session.generation, "Index stopped");
        }

        self.store.clear();
        lifecycle.state = LifecycleState::Stopped;
    }

    /// Restart after a failure from session `failure.generation`.
    fn recover(&self, failure: WatchFailure, shutdown: &Receiver<()>) {
        {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.state != LifecycleState::Running
                || lifecycle.generation != failure.generation
            {
                debug!(generation = failure.generation, "Ignoring stale watcher failure");
                return;
            }

            warn!(reason = %failure.reason, "Watcher failed, restarting index");
            if self.restart_locked(&mut lifecycle) {
                return;
            }
            lifecycle.recovering = true;
        }

        let mut failures = 1u32;
        loop {
            if self.policy.exhausted(failures) {
                error!(failures, "Giving up on restarting the index");
                self.lifecycle.lock().recovering = false;
                return;
            }

            match shutdown.recv_timeout(self.policy.backoff(failures)) {
                Err(RecvTimeoutError::Timeout) => {}
                _ => return,
            }

            let mut lifecycle = self.lifecycle.lock();
            // An explicit init() or stop() takes precedence.
            if !lifecycle.recovering {
                return;
            }
            if self.restart_locked(&mut lifecycle) {
                lifecycle.recovering = false;
                return;
            }
            failures += 1;
        }
    }

    fn restart_locked(&self, lifecycle: &mut Lifecycle) -> bool {
        self.stop_locked(lifecycle);

        let Some(descriptor) = lifecycle.descriptor.clone() else {
            return false;
        };

        match self.init_locked(lifecycle, descriptor) {
            Ok(()) => {
                self.restarts.fetch_add(1, Ordering::AcqRel);
                info!(generation = lifecycle.generation, "Index restarted");
                true
            }
            Err(e) => {
                warn!(error = %e, "Restart failed");
                false
            }
        }
    }
}

fn recovery_loop(shared: &Shared, failures: &Receiver<WatchFailure>, shutdown: &Receiver<()>) {
    loop {
        select! {
            recv(failures) -> failure => match failure {
                Ok(failure) => shared.recover(failure, shutdown),
                Err(_) => break,
            },
            recv(shutdown) -> _ => break,
        }
    }
    debug!("Recovery thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::manual::ManualBackend;
    use std::fs;
    use std::time::Instant;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"").unwrap();
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        condition()
    }

    fn library() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        touch(&root.join("a.mp3"));
        touch(&root.join("sub/b.mp3"));
        touch(&root.join("sub/cover.jpg"));
        (dir, root)
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("locus_core=debug")
            .with_test_writer()
            .try_init();
    }

    fn manual_index(policy: RestartPolicy) -> (Arc<ManualBackend>, FileIndex) {
        init_tracing();
        let backend = ManualBackend::new();
        let index = FileIndex::with_backend(backend.clone(), policy).unwrap();
        (backend, index)
    }

    #[test]
    fn test_snapshot_matches_disk() {
        let (_dir, root) = library();
        let (_backend, index) = manual_index(RestartPolicy::immediate());

        index.init(&root, "*.mp3", true).unwrap();

        assert_eq!(index.state(), LifecycleState::Running);
        assert_eq!(index.paths(), vec![root.join("a.mp3"), root.join("sub/b.mp3")]);
    }

    #[test]
    fn test_delete_and_create_scenario() {
        let (_dir, root) = library();
        let (_backend, index) = manual_index(RestartPolicy::immediate());
        index.init(&root, "*.mp3", true).unwrap();

        fs::remove_dir_all(root.join("sub")).unwrap();
        assert!(index.inject(ChangeEvent::Deleted(root.join("sub"))));
        index.flush();
        assert_eq!(index.paths(), vec![root.join("a.mp3")]);

        touch(&root.join("sub2/c.mp3"));
        assert!(index.inject(ChangeEvent::Created(root.join("sub2"))));
        index.flush();
        assert_eq!(index.paths(), vec![root.join("a.mp3"), root.join("sub2/c.mp3")]);
    }

    #[test]
    fn test_events_from_backend_are_applied() {
        let (_dir, root) = library();
        let (backend, index) = manual_index(RestartPolicy::immediate());
        index.init(&root, "*.mp3", true).unwrap();

        touch(&root.join("new.mp3"));
        let handler = backend.latest().unwrap();
        handler.on_change(ChangeEvent::Created(root.join("new.mp3")));
        handler.on_change(ChangeEvent::Created(root.join("new.mp3")));
        index.flush();

        assert_eq!(index.find_all(|p| p.ends_with("new.mp3")).len(), 1);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_find_and_find_regex() {
        let (_dir, root) = library();
        let (_backend, index) = manual_index(RestartPolicy::immediate());
        index.init(&root, "*.mp3", true).unwrap();

        assert_eq!(index.find(|p| p.ends_with("b.mp3")), Some(root.join("sub/b.mp3")));
        assert_eq!(index.find(|p| p.ends_with("cover.jpg")), None);

        let re = Regex::new(r"[/\\]a\.mp3$").unwrap();
        assert_eq!(index.find_regex(&re), Some(root.join("a.mp3")));
    }

    #[test]
    fn test_init_requires_stopped() {
        let (_dir, root) = library();
        let (_backend, index) = manual_index(RestartPolicy::immediate());
        index.init(&root, "*.mp3", true).unwrap();

        let err = index.init(&root, "*.mp3", true).unwrap_err();
        assert!(matches!(err, LocusError::InvalidState { operation: "init", .. }));
    }

    #[test]
    fn test_init_missing_root_stays_stopped() {
        let (_dir, root) = library();
        let (backend, index) = manual_index(RestartPolicy::immediate());

        let err = index.init(root.join("missing"), "*", true).unwrap_err();
        assert!(matches!(err, LocusError::RootNotFound { .. }));
        assert_eq!(index.state(), LifecycleState::Stopped);
        assert_eq!(backend.active(), 0);
    }

    #[test]
    fn test_init_watch_failure_stays_stopped() {
        let (_dir, root) = library();
        let (backend, index) = manual_index(RestartPolicy::immediate());
        backend.fail_next(1);

        let err = index.init(&root, "*.mp3", true).unwrap_err();
        assert!(matches!(err, LocusError::Watcher { .. }));
        assert_eq!(index.state(), LifecycleState::Stopped);
        assert!(index.is_empty());

        index.init(&root, "*.mp3", true).unwrap();
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_stop_releases_everything() {
        let (_dir, root) = library();
        let (backend, index) = manual_index(RestartPolicy::immediate());
        index.init(&root, "*.mp3", true).unwrap();
        assert_eq!(backend.active(), 1);

        index.stop();
        assert_eq!(index.state(), LifecycleState::Stopped);
        assert!(index.is_empty());
        assert_eq!(backend.active(), 0);
        assert!(!index.inject(ChangeEvent::Deleted(root.join("a.mp3"))));

        // Stopping twice is harmless
        index.stop();
    }

    #[test]
    fn test_refresh_requires_running() {
        let (_backend, index) = manual_index(RestartPolicy::immediate());
        let err = index.refresh().unwrap_err();
        assert!(matches!(err, LocusError::InvalidState { operation: "refresh", .. }));
    }

    #[test]
    fn test_refresh_picks_up_missed_changes() {
        let (_dir, root) = library();
        let (_backend, index) = manual_index(RestartPolicy::immediate());
        index.init(&root, "*.mp3", true).unwrap();

        touch(&root.join("missed.mp3"));
        assert_eq!(index.len(), 2);

        assert_eq!(index.refresh().unwrap(), 3);
        let first = index.paths();
        assert_eq!(index.refresh().unwrap(), 3);
        assert_eq!(index.paths(), first);
    }

    #[test]
    fn test_restart_discards_queued_history() {
        let (_dir, root) = library();
        let (_backend, index) = manual_index(RestartPolicy::immediate());
        index.init(&root, "*.mp3", true).unwrap();

        touch(&root.join("temp.mp3"));
        index.inject(ChangeEvent::Created(root.join("temp.mp3")));
        index.stop();
        fs::remove_file(root.join("temp.mp3")).unwrap();

        index.init(&root, "*.mp3", true).unwrap();
        assert_eq!(index.paths(), vec![root.join("a.mp3"), root.join("sub/b.mp3")]);
    }

    #[test]
    fn test_watcher_failure_self_heals() {
        let (_dir, root) = library();
        let (backend, index) = manual_index(RestartPolicy::immediate());
        index.init(&root, "*.mp3", true).unwrap();

        // A change the watcher never reported is picked up by the fresh snapshot
        touch(&root.join("unreported.mp3"));
        backend.latest().unwrap().on_error("buffer overflow".to_string());

        assert!(wait_until(|| index.restart_count() == 1));
        assert_eq!(index.state(), LifecycleState::Running);
        assert_eq!(backend.watch_count(), 2);
        assert_eq!(backend.active(), 1);
        assert!(index.find(|p| p.ends_with("unreported.mp3")).is_some());
    }

    #[test]
    fn test_stale_failure_is_ignored() {
        let (_dir, root) = library();
        let (backend, index) = manual_index(RestartPolicy::immediate());
        index.init(&root, "*.mp3", true).unwrap();

        let first = backend.latest().unwrap();
        first.on_error("overflow".to_string());
        assert!(wait_until(|| index.restart_count() == 1));

        first.on_error("late duplicate".to_string());
        thread::sleep(Duration::from_millis(100));
        assert_eq!(index.restart_count(), 1);
        assert_eq!(backend.watch_count(), 2);
    }

    #[test]
    fn test_failed_restart_is_retried() {
        let (_dir, root) = library();
        let (backend, index) = manual_index(RestartPolicy::immediate());
        index.init(&root, "*.mp3", true).unwrap();

        backend.fail_next(2);
        backend.latest().unwrap().on_error("handle invalidated".to_string());

        assert!(wait_until(|| index.state() == LifecycleState::Running
            && index.restart_count() == 1));
        assert!(!index.is_recovering());
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_bounded_policy_gives_up() {
        let (_dir, root) = library();
        let policy = RestartPolicy {
            max_attempts: Some(2),
            ..RestartPolicy::immediate()
        };
        let (backend, index) = manual_index(policy);
        index.init(&root, "*.mp3", true).unwrap();

        backend.fail_next(10);
        backend.latest().unwrap().on_error("gone".to_string());

        assert!(wait_until(|| index.state() == LifecycleState::Stopped
            && !index.is_recovering()
            && backend.watch_count() == 1));
        assert_eq!(index.restart_count(), 0);
        assert!(index.is_empty());
    }

    #[test]
    fn test_backoff_growth() {
        let policy = RestartPolicy {
            max_attempts: None,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(1),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(4), Duration::from_millis(800));
        assert_eq!(policy.backoff(5), Duration::from_secs(1));
        assert_eq!(policy.backoff(60), Duration::from_secs(1));
    }

    #[test]
    fn test_drop_releases_subscription() {
        let (_dir, root) = library();
        let (backend, index) = manual_index(RestartPolicy::immediate());
        index.init(&root, "*.mp3", true).unwrap();

        drop(index);
        assert_eq!(backend.active(), 0);
    }

    #[test]
    fn test_notify_backend_end_to_end() {
        let (_dir, root) = library();
        let index = FileIndex::open(&root, "*.mp3", true).unwrap();
        assert_eq!(index.len(), 2);

        touch(&root.join("live.mp3"));
        assert!(wait_until(|| index.find(|p| p.ends_with("live.mp3")).is_some()));

        fs::remove_file(root.join("a.mp3")).unwrap();
        assert!(wait_until(|| index.find(|p| p.ends_with("a.mp3")).is_none()));
    }

    #[test]
    fn test_failed_start_does_not_reuse_generation() {
        let (_dir, root) = library();
        let policy = RestartPolicy {
            max_attempts: Some(1),
            ..RestartPolicy::immediate()
        };
        let (backend, index) = manual_index(policy);
        index.init(&root, "*.mp3", true).unwrap();

        // The restart subscribes, then fails on the seed walk
        fs::remove_dir_all(&root).unwrap();
        backend.latest().unwrap().on_error("root vanished".to_string());
        assert!(wait_until(|| index.state() == LifecycleState::Stopped
            && !index.is_recovering()
            && backend.watch_count() == 2));
        let abandoned = backend.latest().unwrap();

        touch(&root.join("a.mp3"));
        index.init(&root, "*.mp3", true).unwrap();
        assert_eq!(backend.watch_count(), 3);

        abandoned.on_error("late failure".to_string());
        thread::sleep(Duration::from_millis(100));
        assert_eq!(index.restart_count(), 0);
        assert_eq!(backend.watch_count(), 3);
        assert_eq!(index.state(), LifecycleState::Running);
    }
}
