//! Confection is a small, durable catalog of confectionery items.
//!
//! Core concepts:
//! - **Item**: a validated catalog record; an invalid `Item` cannot exist
//! - **Store**: a durable table of items with CRUD and a newest-first listing
//! - **LiveItems**: a live view of the whole table, re-published after every write
//! - **WriteSerializer**: a single worker thread applying writes in submission order
//! - **Catalog**: the façade tying the three together
//!
//! # Example
//!
//! ```
//! use confection_core::{Catalog, ItemDraft, MemoryStore};
//!
//! let catalog = Catalog::open(MemoryStore::new()).unwrap();
//!
//! let draft = ItemDraft {
//!     name: "Napoleon".into(),
//!     category: "cake".into(),
//!     price: 14.5,
//!     weight: 1000,
//!     ..Default::default()
//! };
//! let cake = catalog.create(draft).unwrap().wait().unwrap();
//!
//! assert_eq!(catalog.get(cake.id()).unwrap(), Some(cake.clone()));
//! assert_eq!(catalog.all().current()[0], cake);
//! ```
//!
//! # Schema changes
//!
//! Persistent stores record a [`SchemaStamp`]. A store written with any other
//! stamp is wiped and recreated empty when opened; there are no migrations.

mod catalog;
pub mod codec;
mod config;
mod error;
mod item;
mod live;
mod schema;
mod store;
mod writer;

pub use catalog::Catalog;
pub use config::{CatalogConfig, ConfigError, StoreConfig, WorkerConfig, default_store_path};
pub use error::{CatalogError, StoreError, ValidationError};
pub use item::{Item, ItemDraft, ItemId, Status};
pub use live::{LiveItems, Snapshot, SubscriptionId};
pub use schema::{Fingerprint, ITEM_COLUMNS, SCHEMA_VERSION, SchemaStamp};
pub use store::{MemoryStore, Store};
pub use writer::{Pending, WriteSerializer};
