use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::StoreError;
use crate::item::{Item, ItemId};

/// Durable table of items keyed by [`ItemId`].
///
/// Stores only persist and fetch; validation happens when an [`Item`] is
/// built, and serialization of writes is the caller's concern (see
/// `WriteSerializer`). Every mutating call must be committed before it
/// returns, so a read on any thread observes it afterwards.
///
/// All methods take `&self` to support stores with internal locking (e.g., RocksDB).
pub trait Store: Send + Sync {
    /// Persists a new record and returns its freshly assigned id.
    ///
    /// Any id already on `item` is ignored. Ids grow monotonically and are
    /// never handed out twice, even after the record is deleted.
    fn insert(&self, item: &Item) -> Result<ItemId, StoreError>;

    /// Replaces the record with `item.id()` in full.
    fn update(&self, item: &Item) -> Result<(), StoreError>;

    /// Removes the record. Deleting an absent id reports `NotFound`.
    fn delete(&self, id: ItemId) -> Result<(), StoreError>;

    /// Retrieves a record, or None if not present.
    fn get(&self, id: ItemId) -> Result<Option<Item>, StoreError>;

    /// All records, newest (highest id) first.
    fn all(&self) -> Result<Vec<Item>, StoreError>;
}

/// Blanket impl: a shared store is still a store.
impl<S: Store + ?Sized> Store for Arc<S> {
    fn insert(&self, item: &Item) -> Result<ItemId, StoreError> {
        (**self).insert(item)
    }

    fn update(&self, item: &Item) -> Result<(), StoreError> {
        (**self).update(item)
    }

    fn delete(&self, id: ItemId) -> Result<(), StoreError> {
        (**self).delete(id)
    }

    fn get(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        (**self).get(id)
    }

    fn all(&self) -> Result<Vec<Item>, StoreError> {
        (**self).all()
    }
}

/// An in-memory store backed by a BTreeMap.
///
/// Useful for testing and as a reference implementation. Nothing survives
/// the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: RwLock<Table>,
}

#[derive(Debug, Default)]
struct Table {
    rows: BTreeMap<ItemId, Item>,
    last_id: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.table.read().unwrap_or_else(PoisonError::into_inner).rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Store for MemoryStore {
    fn insert(&self, item: &Item) -> Result<ItemId, StoreError> {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        table.last_id += 1;
        let id = ItemId::new(table.last_id);
        table.rows.insert(id, item.clone().with_id(id));
        Ok(id)
    }

    fn update(&self, item: &Item) -> Result<(), StoreError> {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        let row = table
            .rows
            .get_mut(&item.id())
            .ok_or(StoreError::NotFound(item.id()))?;
        *row = item.clone();
        Ok(())
    }

    fn delete(&self, id: ItemId) -> Result<(), StoreError> {
        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        table.rows.remove(&id).map(|_| ()).ok_or(StoreError::NotFound(id))
    }

    fn get(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        Ok(table.rows.get(&id).cloned())
    }

    fn all(&self) -> Result<Vec<Item>, StoreError> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        Ok(table.rows.values().rev().cloned().collect())
    }
}
