use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tokio::sync::{oneshot, watch};
use tracing::{trace, warn};

use crate::error::StoreError;
use crate::item::Item;

/// An immutable view of the whole table, newest item first.
pub type Snapshot = Arc<[Item]>;

/// Handle returned by [`LiveItems::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Source = Box<dyn Fn() -> Result<Vec<Item>, StoreError> + Send + Sync>;

struct Dispatcher {
    stop: oneshot::Sender<()>,
    thread: JoinHandle<()>,
}

/// Live "all items" query.
///
/// Holds the latest committed snapshot and pushes each replacement to every
/// subscriber. Subscribers always see the current snapshot first. A slow
/// subscriber may skip intermediate snapshots, but the last one it sees is
/// the latest published.
///
/// When built over a source, a snapshot that could not be re-read is marked
/// stale and re-read on the next refresh, read or subscription.
pub struct LiveItems {
    tx: watch::Sender<Snapshot>,
    subscribers: Mutex<HashMap<SubscriptionId, Dispatcher>>,
    next_id: AtomicU64,
    source: Option<Source>,
    stale: AtomicBool,
    // serializes read-then-publish so an older read never overwrites a newer one
    refreshing: Mutex<()>,
}

impl LiveItems {
    pub fn new(initial: Vec<Item>) -> Self {
        Self::build(initial, None)
    }

    /// Loads the first snapshot from `source` and keeps it for later
    /// refreshes.
    pub fn with_source<F>(source: F) -> Result<Self, StoreError>
    where
        F: Fn() -> Result<Vec<Item>, StoreError> + Send + Sync + 'static,
    {
        let initial = source()?;
        Ok(Self::build(initial, Some(Box::new(source))))
    }

    fn build(initial: Vec<Item>, source: Option<Source>) -> Self {
        let (tx, _) = watch::channel(Snapshot::from(initial));
        LiveItems {
            tx,
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            source,
            stale: AtomicBool::new(false),
            refreshing: Mutex::new(()),
        }
    }

    /// The most recently published snapshot.
    pub fn current(&self) -> Snapshot {
        self.refresh_if_stale();
        self.tx.borrow().clone()
    }

    /// Whether the last refresh failed and the snapshot may lag the store.
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }

    /// Re-reads the source and publishes the result. On failure the current
    /// snapshot is kept and marked stale.
    pub(crate) fn refresh(&self) {
        let Some(source) = &self.source else {
            return;
        };
        let _guard = self.refreshing.lock().unwrap_or_else(PoisonError::into_inner);
        match source() {
            Ok(items) => {
                self.publish(items);
                self.stale.store(false, Ordering::Release);
            }
            Err(err) => {
                self.stale.store(true, Ordering::Release);
                warn!(%err, "failed to refresh item snapshot");
            }
        }
    }

    fn refresh_if_stale(&self) {
        if self.is_stale() {
            self.refresh();
        }
    }

    /// A receiver for async consumers.
    ///
    /// The receiver starts out marked as changed, so the first
    /// `changed().await` completes immediately with the current snapshot.
    pub fn watch(&self) -> watch::Receiver<Snapshot> {
        self.refresh_if_stale();
        let mut rx = self.tx.subscribe();
        rx.mark_changed();
        rx
    }

    /// Registers a callback that runs on its own thread, once with the
    /// current snapshot and then after every change.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: FnMut(&[Item]) + Send + 'static,
    {
        self.refresh_if_stale();
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (stop, stopped) = oneshot::channel();
        let rx = self.tx.subscribe();

        let thread = thread::Builder::new()
            .name(format!("catalog-subscriber-{}", id.0))
            .spawn(move || dispatch(rx, stopped, callback));

        match thread {
            Ok(thread) => {
                self.lock().insert(id, Dispatcher { stop, thread });
            }
            // The id stays unregistered; unsubscribing it is a no-op.
            Err(err) => warn!(%err, subscription = id.0, "failed to start subscriber thread"),
        }
        id
    }

    /// Stops delivery to a subscriber. Unknown or already removed ids are
    /// ignored.
    ///
    /// Once this returns, the callback is not running and will not run
    /// again, unless it is called from inside that same callback.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let removed = self.lock().remove(&id);
        if let Some(dispatcher) = removed {
            stop(dispatcher);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    /// Replaces the current snapshot and wakes every subscriber.
    pub(crate) fn publish(&self, items: Vec<Item>) {
        trace!(count = items.len(), "publishing item snapshot");
        self.tx.send_replace(Snapshot::from(items));
    }

    /// Removes every subscriber.
    pub fn close(&self) {
        let drained: Vec<_> = self.lock().drain().map(|(_, d)| d).collect();
        for dispatcher in drained {
            stop(dispatcher);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SubscriptionId, Dispatcher>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for LiveItems {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for LiveItems {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveItems")
            .field("items", &self.tx.borrow().len())
            .field("subscribers", &self.subscriber_count())
            .field("stale", &self.is_stale())
            .finish()
    }
}

fn stop(dispatcher: Dispatcher) {
    let _ = dispatcher.stop.send(());
    if dispatcher.thread.thread().id() == thread::current().id() {
        return;
    }
    if dispatcher.thread.join().is_err() {
        warn!("subscriber callback panicked");
    }
}

fn dispatch<F>(mut rx: watch::Receiver<Snapshot>, mut stopped: oneshot::Receiver<()>, mut callback: F)
where
    F: FnMut(&[Item]),
{
    futures::executor::block_on(async move {
        loop {
            let snapshot = rx.borrow_and_update().clone();
            callback(&snapshot);

            tokio::select! {
                biased;
                _ = &mut stopped => break,
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
    });
}
