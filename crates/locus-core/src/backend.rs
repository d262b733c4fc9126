//! Change-notification backend traits.
//!
//! The index never talks to an OS notification API directly. It hands a
//! `ChangeHandler` to a `WatchBackend` and keeps the returned `WatchHandle`
//! alive for as long as it wants events. Backend threads call the handler;
//! the handler only enqueues, it never touches the cache.
//!
//! ## Implementing a New Backend
//!
//! 1. Implement `WatchBackend::watch` to subscribe to create/delete/rename
//!    notifications under `descriptor.root()` (recursively iff
//!    `descriptor.is_recursive()`)
//! 2. Translate native events into `ChangeEvent`s and call `on_change`
//! 3. Report overflow, invalidated handles and similar conditions through
//!    `on_error` instead of panicking; the index restarts itself
//! 4. Stop delivering events once the `WatchHandle` is stopped or dropped

use crate::error::Result;
use crate::types::{ChangeEvent, RootDescriptor};
use std::any::Any;
use std::sync::Arc;

/// Receiver for events produced by a backend.
///
/// Implementations must be cheap and non-blocking: they run on whatever
/// thread the backend delivers notifications on.
pub trait ChangeHandler: Send + Sync {
    /// Called for every path-level change under the watched root
    fn on_change(&self, event: ChangeEvent);

    /// Called when the subscription can no longer be trusted
    fn on_error(&self, reason: String);
}

/// Abstract source of filesystem change notifications.
pub trait WatchBackend: Send + Sync {
    /// Start delivering changes under `descriptor` to `handler`.
    ///
    /// Delivery continues until the returned handle is stopped or dropped.
    fn watch(
        &self,
        descriptor: &RootDescriptor,
        handler: Arc<dyn ChangeHandler>,
    ) -> Result<WatchHandle>;

    /// Get the backend name (e.g., "notify")
    fn name(&self) -> &'static str;
}

/// Handle for a running subscription.
///
/// Stopping or dropping the handle releases the backend's resources, after
/// which no further events are delivered.
pub struct WatchHandle {
    inner: Option<Box<dyn Any + Send>>,
}

impl WatchHandle {
    /// Wrap whatever the backend needs to keep alive
    pub fn new<T: Send + 'static>(inner: T) -> Self {
        WatchHandle {
            inner: Some(Box::new(inner)),
        }
    }

    /// A handle that owns nothing
    pub fn dummy() -> Self {
        WatchHandle { inner: None }
    }

    /// Release the subscription now rather than at drop time
    pub fn stop(&mut self) {
        self.inner.take();
    }

    pub fn is_active(&self) -> bool {
        self.inner.is_some()
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("active", &self.is_active())
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::manual::ManualBackend;
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<ChangeEvent>>,
        errors: Mutex<Vec<String>>,
    }

    impl ChangeHandler for Recorder {
        fn on_change(&self, event: ChangeEvent) {
            self.events.lock().push(event);
        }

        fn on_error(&self, reason: String) {
            self.errors.lock().push(reason);
        }
    }

    #[test]
    fn test_watch_handle_stop() {
        let mut handle = WatchHandle::new(42u32);
        assert!(handle.is_active());
        handle.stop();
        assert!(!handle.is_active());
        assert!(!WatchHandle::dummy().is_active());
    }

    #[test]
    fn test_manual_backend_tracks_handles() {
        let backend = ManualBackend::new();
        let desc = RootDescriptor::new("/m", "*", true).unwrap();
        let recorder = Arc::new(Recorder::default());

        let handle = backend.watch(&desc, recorder.clone()).unwrap();
        assert_eq!(backend.active(), 1);

        backend
            .latest()
            .unwrap()
            .on_change(ChangeEvent::Created("/m/a".into()));
        assert_eq!(recorder.events.lock().len(), 1);

        backend.latest().unwrap().on_error("overflow".to_string());
        assert_eq!(*recorder.errors.lock(), vec!["overflow".to_string()]);

        drop(handle);
        assert_eq!(backend.active(), 0);
    }

    #[test]
    fn test_manual_backend_scripted_failure() {
        let backend = ManualBackend::new();
        let desc = RootDescriptor::new("/m", "*", true).unwrap();
        backend.fail_next(1);

        assert!(backend.watch(&desc, Arc::new(Recorder::default())).is_err());
        assert!(backend.watch(&desc, Arc::new(Recorder::default())).is_ok());
        assert_eq!(backend.watch_count(), 1);
    }
}
