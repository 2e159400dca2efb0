//! RocksDB-backed store for the confection catalog.
//!
//! Key layout:
//! - `i` + big-endian id: one CBOR-encoded item per key, so byte order is id order
//! - `m:next_id`: the next id to hand out, big-endian
//! - `m:schema`: the [`SchemaStamp`] the database was written with

use std::path::Path;
use std::sync::{Mutex, PoisonError};

use confection_core::codec::{self, CodecError};
use confection_core::{Item, ItemId, SchemaStamp, Store, StoreConfig, StoreError};
use rocksdb::{DB, Direction, IteratorMode, Options, WriteBatch, WriteOptions};
use thiserror::Error;
use tracing::{debug, info, warn};

const ITEM_PREFIX: u8 = b'i';
const NEXT_ID_KEY: &[u8] = b"m:next_id";
const SCHEMA_KEY: &[u8] = b"m:schema";

#[derive(Debug, Error)]
pub enum RocksError {
    #[error("RocksDB error: {0}")]
    Db(#[from] rocksdb::Error),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("corrupt id counter")]
    CorruptCounter,
}

impl From<RocksError> for StoreError {
    fn from(err: RocksError) -> Self {
        StoreError::storage(err)
    }
}

/// A persistent item table backed by RocksDB.
///
/// Mutations hold an internal lock and are durably committed before they
/// return. Reads take no lock.
pub struct RocksStore {
    db: DB,
    write_opts: WriteOptions,
    next_id: Mutex<u64>,
}

impl RocksStore {
    /// Opens a store at the given path with synced writes.
    ///
    /// Creates the database if it doesn't exist. A database written with a
    /// different schema is destroyed and recreated empty.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RocksError> {
        Self::open_with(path, true, SchemaStamp::current())
    }

    /// Opens the store described by a [`StoreConfig`].
    pub fn from_config(config: &StoreConfig) -> Result<Self, RocksError> {
        Self::open_with(config.resolved_path(), config.sync_writes, SchemaStamp::current())
    }

    /// Opens a store expecting `schema`.
    pub fn open_with(path: impl AsRef<Path>, sync_writes: bool, schema: SchemaStamp) -> Result<Self, RocksError> {
        let path = path.as_ref();
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let mut db = DB::open(&opts, path)?;
        if !schema_matches(&db, &schema)? {
            warn!(path = %path.display(), expected = %schema, "schema mismatch, recreating empty store");
            drop(db);
            DB::destroy(&opts, path)?;
            db = DB::open(&opts, path)?;
            db.put(SCHEMA_KEY, codec::encode(&schema)?)?;
        }

        let next_id = match db.get(NEXT_ID_KEY)? {
            Some(bytes) => u64::from_be_bytes(bytes.as_slice().try_into().map_err(|_| RocksError::CorruptCounter)?),
            None => 1,
        };

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(sync_writes);

        info!(path = %path.display(), next_id, "opened item store");
        Ok(Self {
            db,
            write_opts,
            next_id: Mutex::new(next_id),
        })
    }

    fn contains(&self, id: ItemId) -> Result<bool, RocksError> {
        Ok(self.db.get_pinned(item_key(id))?.is_some())
    }
}

/// A fresh database gets the stamp written; an existing one must carry
/// exactly `schema`.
fn schema_matches(db: &DB, schema: &SchemaStamp) -> Result<bool, RocksError> {
    match db.get(SCHEMA_KEY)? {
        Some(bytes) => match codec::decode::<SchemaStamp>(&bytes) {
            Ok(found) if found == *schema => Ok(true),
            Ok(found) => {
                debug!(%found, "stored schema differs");
                Ok(false)
            }
            Err(err) => {
                debug!(%err, "stored schema unreadable");
                Ok(false)
            }
        },
        None => {
            let empty = db.iterator(IteratorMode::Start).next().transpose()?.is_none();
            if empty {
                db.put(SCHEMA_KEY, codec::encode(schema)?)?;
            }
            Ok(empty)
        }
    }
}

fn item_key(id: ItemId) -> [u8; 9] {
    let mut key = [ITEM_PREFIX; 9];
    key[1..].copy_from_slice(&id.get().to_be_bytes());
    key
}

impl Store for RocksStore {
    fn insert(&self, item: &Item) -> Result<ItemId, StoreError> {
        let mut next_id = self.next_id.lock().unwrap_or_else(PoisonError::into_inner);
        let id = ItemId::new(*next_id);
        let record = codec::encode(&item.clone().with_id(id)).map_err(RocksError::from)?;

        let mut batch = WriteBatch::default();
        batch.put(item_key(id), record);
        batch.put(NEXT_ID_KEY, (id.get() + 1).to_be_bytes());
        self.db.write_opt(batch, &self.write_opts).map_err(RocksError::from)?;

        *next_id = id.get() + 1;
        Ok(id)
    }

    fn update(&self, item: &Item) -> Result<(), StoreError> {
        let _writer = self.next_id.lock().unwrap_or_else(PoisonError::into_inner);
        if item.id().is_unset() || !self.contains(item.id())? {
            return Err(StoreError::NotFound(item.id()));
        }
        let record = codec::encode(item).map_err(RocksError::from)?;
        self.db
            .put_opt(item_key(item.id()), record, &self.write_opts)
            .map_err(RocksError::from)?;
        Ok(())
    }

    fn delete(&self, id: ItemId) -> Result<(), StoreError> {
        let _writer = self.next_id.lock().unwrap_or_else(PoisonError::into_inner);
        if id.is_unset() || !self.contains(id)? {
            return Err(StoreError::NotFound(id));
        }
        self.db
            .delete_opt(item_key(id), &self.write_opts)
            .map_err(RocksError::from)?;
        Ok(())
    }

    fn get(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        let Some(bytes) = self.db.get_pinned(item_key(id)).map_err(RocksError::from)? else {
            return Ok(None);
        };
        Ok(Some(codec::decode(&bytes).map_err(RocksError::from)?))
    }

    fn all(&self) -> Result<Vec<Item>, StoreError> {
        let from = item_key(ItemId::new(u64::MAX));
        let mut items = Vec::new();
        for entry in self.db.iterator(IteratorMode::From(&from, Direction::Reverse)) {
            let (key, value) = entry.map_err(RocksError::from)?;
            if key.first() != Some(&ITEM_PREFIX) {
                break;
            }
            items.push(codec::decode(&value).map_err(RocksError::from)?);
        }
        Ok(items)
    }
}
