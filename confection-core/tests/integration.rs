//! Integration tests exercising the catalog from several callers at once.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use confection_core::{Catalog, CatalogConfig, Item, ItemDraft, ItemId, MemoryStore, Status, Store, StoreError};

fn draft(name: impl Into<String>) -> ItemDraft {
    ItemDraft {
        name: name.into(),
        category: "cookie".into(),
        price: 0.75,
        weight: 25,
        description: None,
        status: None,
    }
}

fn ids(items: &[Item]) -> Vec<u64> {
    items.iter().map(|i| i.id().get()).collect()
}

#[test]
fn concurrent_inserts_are_all_applied() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 50;

    let catalog = Arc::new(Catalog::open(MemoryStore::new()).unwrap());

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let catalog = Arc::clone(&catalog);
            thread::spawn(move || {
                (0..PER_THREAD)
                    .map(|n| catalog.create(draft(format!("cookie {t}-{n}"))).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut assigned = HashSet::new();
    for handle in handles {
        for pending in handle.join().unwrap() {
            assert!(assigned.insert(pending.wait().unwrap().id()));
        }
    }

    assert_eq!(assigned.len(), THREADS * PER_THREAD);
    assert_eq!(catalog.store().len(), THREADS * PER_THREAD);
    assert_eq!(catalog.all().current().len(), THREADS * PER_THREAD);
}

#[test]
fn per_caller_order_is_preserved() {
    let catalog = Catalog::open(MemoryStore::new()).unwrap();
    let created: Vec<_> = ["A", "B", "C"]
        .into_iter()
        .map(|name| catalog.create(draft(name)).unwrap())
        .collect();
    let created: Vec<_> = created.into_iter().map(|p| p.wait().unwrap()).collect();

    assert!(created[0].id() < created[1].id());
    assert!(created[1].id() < created[2].id());

    let names: Vec<_> = catalog.all().current().iter().map(|i| i.name().to_string()).collect();
    assert_eq!(names, ["C", "B", "A"]);
}

#[test]
fn subscriber_converges_to_store_state() {
    let catalog = Catalog::open(MemoryStore::new()).unwrap();
    let (tx, rx) = mpsc::channel();
    let subscription = catalog.subscribe(move |snapshot| {
        let _ = tx.send(ids(snapshot));
    });

    let first = catalog.create(draft("A")).unwrap().wait().unwrap();
    let second = catalog.create(draft("B")).unwrap().wait().unwrap();
    let mut edited = first.clone();
    edited.set_status(Status::OnOrder);
    catalog.replace(edited).unwrap().wait().unwrap();
    catalog.delete(second.id()).unwrap().wait().unwrap();

    let expected = ids(&catalog.store().all().unwrap());
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut seen = Vec::new();
    while seen != expected {
        let left = deadline.saturating_duration_since(Instant::now());
        seen = rx.recv_timeout(left).expect("subscriber never caught up");
    }
    assert_eq!(seen, vec![first.id().get()]);

    catalog.unsubscribe(subscription);
    catalog.unsubscribe(subscription);
}

#[test]
fn snapshot_after_awaited_mutation_is_current() {
    let catalog = Catalog::open(MemoryStore::new()).unwrap();
    for n in 0..20 {
        let item = catalog.create(draft(format!("cookie {n}"))).unwrap().wait().unwrap();
        assert_eq!(catalog.all().current().first(), Some(&item));
    }
}

#[test]
fn drop_drains_queued_writes() {
    let store = Arc::new(MemoryStore::new());
    {
        let catalog = Catalog::open(Arc::clone(&store)).unwrap();
        for n in 0..200 {
            // fire-and-forget
            let _ = catalog.create(draft(format!("cookie {n}"))).unwrap();
        }
    }
    assert_eq!(store.len(), 200);
}

#[test]
fn existing_rows_form_the_first_snapshot() {
    let store = MemoryStore::new();
    store.insert(&Item::new("Baklava", "pastry", 3.0, 60).unwrap()).unwrap();

    let catalog = Catalog::open(store).unwrap();
    assert_eq!(catalog.all().current().len(), 1);
}

/// Records the name of the thread each insert runs on.
struct InsertThreadRecorder {
    inner: MemoryStore,
    insert_thread: Mutex<Option<String>>,
}

impl Store for InsertThreadRecorder {
    fn insert(&self, item: &Item) -> Result<ItemId, StoreError> {
        *self.insert_thread.lock().unwrap() = thread::current().name().map(str::to_string);
        self.inner.insert(item)
    }

    fn update(&self, item: &Item) -> Result<(), StoreError> {
        self.inner.update(item)
    }

    fn delete(&self, id: ItemId) -> Result<(), StoreError> {
        self.inner.delete(id)
    }

    fn get(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        self.inner.get(id)
    }

    fn all(&self) -> Result<Vec<Item>, StoreError> {
        self.inner.all()
    }
}

#[test]
fn writes_run_on_the_configured_worker() {
    let config = CatalogConfig::from_toml("[worker]\nthread_name = \"sweets-writer\"").unwrap();
    let recorder = Arc::new(InsertThreadRecorder {
        inner: MemoryStore::new(),
        insert_thread: Mutex::new(None),
    });

    let catalog = Catalog::with_config(Arc::clone(&recorder), &config.worker).unwrap();
    catalog.create(draft("A")).unwrap().wait().unwrap();

    assert_eq!(recorder.insert_thread.lock().unwrap().as_deref(), Some("sweets-writer"));
}

#[tokio::test]
async fn async_callers_await_mutations() {
    let catalog = Catalog::open(MemoryStore::new()).unwrap();
    let mut rx = catalog.all().watch();
    rx.changed().await.unwrap();
    assert!(rx.borrow_and_update().is_empty());

    let cake = catalog.create(draft("Esterhazy")).unwrap().await.unwrap();
    rx.changed().await.unwrap();
    assert_eq!(rx.borrow_and_update().first(), Some(&cake));

    let err = catalog.delete(ItemId::new(404)).unwrap().await.unwrap_err();
    assert!(err.is_not_found());
}
