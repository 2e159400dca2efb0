use std::sync::Arc;

use tracing::debug;

use crate::config::WorkerConfig;
use crate::error::CatalogError;
use crate::item::{Item, ItemDraft, ItemId};
use crate::live::{LiveItems, SubscriptionId};
use crate::store::Store;
use crate::writer::{Pending, WriteSerializer};

/// The public face of the catalog.
///
/// Mutations are validated on the caller's thread, then queued on a single
/// writer thread and applied in submission order. After each successful
/// mutation the writer re-reads the table and publishes the new snapshot on
/// [`LiveItems`]; if that re-read fails the snapshot is marked stale and
/// re-read later. Reads go straight to the store.
///
/// Construct one per process and hand out references; dropping it drains
/// the queue.
pub struct Catalog<S: Store> {
    store: Arc<S>,
    live: Arc<LiveItems>,
    writer: WriteSerializer<S>,
}

impl<S: Store + 'static> Catalog<S> {
    pub fn open(store: S) -> Result<Self, CatalogError> {
        Self::with_config(store, &WorkerConfig::default())
    }

    pub fn with_config(store: S, config: &WorkerConfig) -> Result<Self, CatalogError> {
        let store = Arc::new(store);
        let source = Arc::clone(&store);
        let live = Arc::new(LiveItems::with_source(move || source.all())?);

        let publisher = Arc::clone(&live);
        let writer = WriteSerializer::spawn(&config.thread_name, Arc::clone(&store), move |_: &S| {
            publisher.refresh();
        })?;

        debug!(items = live.current().len(), "catalog opened");
        Ok(Catalog { store, live, writer })
    }

    /// Validates a draft and queues its insertion.
    ///
    /// Validation errors come back immediately; the handle resolves to the
    /// stored item carrying its new id.
    pub fn create(&self, draft: ItemDraft) -> Result<Pending<Item>, CatalogError> {
        self.insert(draft.validate()?)
    }

    /// Queues insertion of an already built item. Any id it carries is
    /// replaced.
    pub fn insert(&self, item: Item) -> Result<Pending<Item>, CatalogError> {
        self.writer.submit(move |store: &S| {
            let id = store.insert(&item)?;
            Ok(item.with_id(id))
        })
    }

    /// Validates a draft and queues a full replacement of record `id`.
    pub fn update(&self, id: ItemId, draft: ItemDraft) -> Result<Pending<()>, CatalogError> {
        self.replace(draft.validate()?.with_id(id))
    }

    /// Queues a full replacement of the record `item.id()` points at.
    pub fn replace(&self, item: Item) -> Result<Pending<()>, CatalogError> {
        self.writer.submit(move |store: &S| Ok(store.update(&item)?))
    }

    pub fn delete(&self, id: ItemId) -> Result<Pending<()>, CatalogError> {
        self.writer.submit(move |store: &S| Ok(store.delete(id)?))
    }

    /// Reads one record on the calling thread, blocking until the store
    /// answers.
    pub fn get(&self, id: ItemId) -> Result<Option<Item>, CatalogError> {
        Ok(self.store.get(id)?)
    }

    /// The live "all items" query.
    pub fn all(&self) -> &LiveItems {
        &self.live
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: FnMut(&[Item]) + Send + 'static,
    {
        self.live.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.live.unsubscribe(id);
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: Store> Catalog<S> {
    /// Stops accepting mutations, waits for queued ones to finish, then
    /// detaches all subscribers. Safe to call more than once.
    pub fn close(&self) {
        self.writer.shutdown();
        self.live.close();
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_running()
    }
}

impl<S: Store> Drop for Catalog<S> {
    fn drop(&mut self) {
        self.close();
    }
}
