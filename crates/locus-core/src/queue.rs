//! FIFO handoff between watch callbacks and the reconciler.
//!
//! `ChangeQueue` wraps an unbounded crossbeam channel. Producers (watch
//! backend threads) only ever `push`, which never blocks. A single consumer
//! blocks in `take` until an item arrives or the queue has been completed and
//! fully drained.
//!
//! Completion is a separate one-shot signal rather than dropping the sender,
//! because the queue itself owns both channel ends and may be shared behind an
//! `Arc` by producers that outlive the session.

use crossbeam_channel::{select, Receiver, Sender};
use parking_lot::RwLock;
use tracing::trace;

/// Unbounded multi-producer, single-consumer queue with drain-then-stop.
pub struct ChangeQueue<T> {
    sender: Sender<T>,
    receiver: Receiver<T>,
    /// Pushes hold the read side so none can land after completion
    completed: RwLock<bool>,
    done_tx: Sender<()>,
    done_rx: Receiver<()>,
}

impl<T> ChangeQueue<T> {
    /// Create an empty, open queue.
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        ChangeQueue {
            sender,
            receiver,
            completed: RwLock::new(false),
            done_tx,
            done_rx,
        }
    }

    /// Enqueue an item without blocking.
    ///
    /// Returns false, dropping the item, once the queue has been completed.
    pub fn push(&self, item: T) -> bool {
        let completed = self.completed.read();
        if *completed {
            trace!("Push after completion dropped");
            return false;
        }
        // Cannot fail: the queue holds its own receiver.
        self.sender.send(item).is_ok()
    }

    /// Block until an item is available.
    ///
    /// Returns `None` (end of stream) only once the queue is completed and
    /// every item pushed before completion has been taken.
    pub fn take(&self) -> Option<T> {
        if self.is_completed() {
            return self.receiver.try_recv().ok();
        }

        select! {
            recv(self.receiver) -> item => item.ok(),
            recv(self.done_rx) -> _ => self.receiver.try_recv().ok(),
        }
    }

    /// Signal that no further items will be pushed.
    ///
    /// Already queued items are still delivered by `take`. Calling this more
    /// than once has no further effect.
    pub fn complete(&self) {
        let mut completed = self.completed.write();
        if !*completed {
            *completed = true;
            let _ = self.done_tx.try_send(());
        }
    }

    pub fn is_completed(&self) -> bool {
        *self.completed.read()
    }

    /// Number of items waiting to be taken.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl<T> Default for ChangeQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for ChangeQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeQueue")
            .field("pending", &self.len())
            .field("completed", &self.is_completed())
            .finish()
    }
}
