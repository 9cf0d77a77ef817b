//! Update coalescer
//!
//! The store notifies once per field per peer, so one logical update to a
//! node arrives as a burst. The coalescer queues the merges produced by such
//! a burst and applies them together after a short window, publishing a
//! single snapshot instead of one per field.
//!
//! ```text
//!            enqueue (arms timer)
//!   Idle  ------------------------>  Pending
//!    ^                                 |
//!    +--------- timer fires -----------+
//!         (apply queue in order, publish once)
//! ```
//!
//! The timer is a tokio task owned by the coalescer. `flush_now` applies the
//! queue immediately (and disarms the timer), `cancel` disarms the timer but
//! keeps the queue. Enqueueing requires a tokio runtime.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::graph::Snapshot;

/// Default coalescing window in milliseconds
pub const DEFAULT_COALESCE_WINDOW_MS: u64 = 50;

/// A queued transformation of the snapshot
pub type MergeFn = Box<dyn FnOnce(Snapshot) -> Snapshot + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoalescerState {
    /// No flush scheduled
    Idle,
    /// A flush timer is armed
    Pending,
}

/// Batches snapshot merges into one published update per window
#[derive(Clone)]
pub struct UpdateCoalescer {
    inner: Arc<Mutex<CoalescerInner>>,
    window: Duration,
}

struct CoalescerInner {
    snapshot: Snapshot,
    queue: Vec<MergeFn>,
    timer: Option<JoinHandle<()>>,
    /// Bumped whenever the armed timer is retired, so a stale timer task
    ///  that already woke up does not flush someone else's queue
    generation: u64,
    subscribers: Vec<flume::Sender<Snapshot>>,
}

impl std::fmt::Debug for UpdateCoalescer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("UpdateCoalescer")
            .field("window", &self.window)
            .field("queued", &inner.queue.len())
            .field("pending", &inner.timer.is_some())
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}

impl UpdateCoalescer {
    /// Create a coalescer and the receiving end of its snapshot feed
    pub fn new(window: Duration, initial: Snapshot) -> (Self, SnapshotReceiver) {
        let (tx, rx) = flume::unbounded();
        let coalescer = Self {
            inner: Arc::new(Mutex::new(CoalescerInner {
                snapshot: initial,
                queue: Vec::new(),
                timer: None,
                generation: 0,
                subscribers: vec![tx],
            })),
            window,
        };
        (coalescer, SnapshotReceiver { rx })
    }

    /// Another receiver of every snapshot published from now on
    pub fn subscribe(&self) -> SnapshotReceiver {
        let (tx, rx) = flume::unbounded();
        self.inner.lock().subscribers.push(tx);
        SnapshotReceiver { rx }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn state(&self) -> CoalescerState {
        if self.inner.lock().timer.is_some() {
            CoalescerState::Pending
        } else {
            CoalescerState::Idle
        }
    }

    /// Current snapshot, without any queued merges applied
    pub fn snapshot(&self) -> Snapshot {
        self.inner.lock().snapshot.clone()
    }

    /// Number of merges waiting for the next flush
    pub fn queued(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Queue a merge, arming the flush timer if none is armed
    pub fn enqueue<F>(&self, merge: F)
    where
        F: FnOnce(Snapshot) -> Snapshot + Send + 'static,
    {
        let mut inner = self.inner.lock();
        inner.queue.push(Box::new(merge));
        if inner.timer.is_some() {
            return;
        }

        let generation = inner.generation;
        let window = self.window;
        let this = self.clone();
        tracing::trace!(?window, "arming flush timer");
        inner.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            this.fire(generation);
        }));
    }

    /// Apply a merge right away and publish, ahead of anything queued
    ///
    /// Used for optimistic local writes.
    pub fn apply_now<F>(&self, merge: F)
    where
        F: FnOnce(Snapshot) -> Snapshot,
    {
        let mut inner = self.inner.lock();
        // merges run on a copy; a panicking merge leaves the snapshot intact
        inner.snapshot = merge(inner.snapshot.clone());
        inner.publish();
    }

    /// Flush the queue now instead of waiting for the timer
    ///
    /// Returns whether anything was flushed.
    pub fn flush_now(&self) -> bool {
        let mut inner = self.inner.lock();
        if let Some(timer) = inner.timer.take() {
            timer.abort();
        }
        self.flush_locked(&mut inner)
    }

    /// Disarm the timer; queued merges stay queued for the next flush
    pub fn cancel(&self) {
        let mut inner = self.inner.lock();
        if let Some(timer) = inner.timer.take() {
            timer.abort();
            inner.generation += 1;
        }
    }

    fn fire(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return;
        }
        // our own task; let it finish rather than abort it
        inner.timer = None;
        self.flush_locked(&mut inner);
    }

    fn flush_locked(&self, inner: &mut CoalescerInner) -> bool {
        inner.generation += 1;
        if inner.queue.is_empty() {
            return false;
        }

        let queue = std::mem::take(&mut inner.queue);
        let merges = queue.len();
        let mut snapshot = inner.snapshot.clone();
        for merge in queue {
            snapshot = merge(snapshot);
        }
        inner.snapshot = snapshot;

        tracing::debug!(merges, entities = inner.snapshot.len(), "flushing coalesced updates");
        inner.publish();
        true
    }
}

impl CoalescerInner {
    fn publish(&mut self) {
        let snapshot = &self.snapshot;
        self.subscribers
            .retain(|subscriber| subscriber.send(snapshot.clone()).is_ok());
        if self.subscribers.is_empty() {
            tracing::trace!("no snapshot subscriber");
        }
    }
}

/// Receiving end of the coalescer's snapshot feed
#[derive(Debug)]
pub struct SnapshotReceiver {
    rx: flume::Receiver<Snapshot>,
}

impl SnapshotReceiver {
    /// Wait for the next published snapshot
    ///
    /// Returns None once the coalescer and all its clones are gone.
    pub async fn recv(&self) -> Option<Snapshot> {
        self.rx.recv_async().await.ok()
    }

    /// Take a published snapshot without waiting
    pub fn try_recv(&self) -> Option<Snapshot> {
        self.rx.try_recv().ok()
    }

    /// Drain everything published so far, returning the newest
    pub fn latest(&self) -> Option<Snapshot> {
        self.rx.try_iter().last()
    }

    /// Get an async stream of snapshots
    pub fn into_async(self) -> flume::r#async::RecvStream<'static, Snapshot> {
        self.rx.into_stream()
    }
}
