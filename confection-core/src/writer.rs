use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::thread::{self, JoinHandle};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::error::CatalogError;

type Job<S> = Box<dyn FnOnce(&S, &dyn Fn(&S)) + Send>;

/// Runs mutations one at a time, in submission order, on a dedicated
/// thread.
///
/// Submitting never blocks. After a mutation succeeds the commit hook runs
/// on the worker, before the submitter is told about the result.
pub struct WriteSerializer<S> {
    tx: Mutex<Option<mpsc::UnboundedSender<Job<S>>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<S: Send + Sync + 'static> WriteSerializer<S> {
    /// Starts the worker thread.
    pub fn spawn<H>(name: &str, store: Arc<S>, on_commit: H) -> Result<Self, CatalogError>
    where
        H: Fn(&S) + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job<S>>();
        let worker = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                debug!("write worker started");
                let on_commit: &dyn Fn(&S) = &on_commit;
                while let Some(job) = rx.blocking_recv() {
                    job(store.as_ref(), on_commit);
                }
                debug!("write worker drained and stopped");
            })
            .map_err(CatalogError::Spawn)?;

        Ok(WriteSerializer {
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Enqueues a mutation.
    ///
    /// The returned [`Pending`] may be dropped for fire-and-forget use.
    /// Fails with `ShutDown` once [`shutdown`](Self::shutdown) has begun.
    pub fn submit<T, F>(&self, op: F) -> Result<Pending<T>, CatalogError>
    where
        T: Send + 'static,
        F: FnOnce(&S) -> Result<T, CatalogError> + Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        let job: Job<S> = Box::new(move |store: &S, on_commit: &dyn Fn(&S)| {
            let result = op(store);
            match &result {
                Ok(_) => on_commit(store),
                Err(err) => warn!(%err, "mutation failed"),
            }
            // The submitter may have dropped its handle.
            let _ = reply.send(result);
        });

        let tx = lock(&self.tx);
        let tx = tx.as_ref().ok_or(CatalogError::ShutDown)?;
        tx.send(job).map_err(|_| CatalogError::ShutDown)?;
        Ok(Pending { rx })
    }
}

impl<S> WriteSerializer<S> {
    pub fn is_running(&self) -> bool {
        lock(&self.tx).is_some()
    }

    /// Stops accepting work and waits for everything already queued to
    /// finish. Calling it again is a no-op.
    pub fn shutdown(&self) {
        drop(lock(&self.tx).take());

        let Some(worker) = lock(&self.worker).take() else {
            return;
        };
        // A job cannot wait for its own worker.
        if worker.thread().id() == thread::current().id() {
            return;
        }
        if worker.join().is_err() {
            warn!("write worker panicked");
        }
    }
}

impl<S> Drop for WriteSerializer<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Outcome of a queued mutation.
///
/// Await it, or call [`wait`](Pending::wait) from synchronous code.
#[derive(Debug)]
pub struct Pending<T> {
    rx: oneshot::Receiver<Result<T, CatalogError>>,
}

impl<T> Pending<T> {
    /// Blocks the current thread until the mutation has run.
    ///
    /// Must not be called from within an async runtime; await the handle
    /// there instead.
    pub fn wait(self) -> Result<T, CatalogError> {
        self.rx.blocking_recv().unwrap_or(Err(CatalogError::ShutDown))
    }
}

impl<T> Future for Pending<T> {
    type Output = Result<T, CatalogError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(CatalogError::ShutDown)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Log {
        entries: Mutex<Vec<usize>>,
        commits: AtomicUsize,
    }

    fn spawn_log() -> (Arc<Log>, WriteSerializer<Log>) {
        let log = Arc::new(Log::default());
        let writer = WriteSerializer::spawn("test-writer", Arc::clone(&log), |log: &Log| {
            log.commits.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
        (log, writer)
    }

    #[test]
    fn runs_in_submission_order() {
        let (log, writer) = spawn_log();
        for n in 0..100 {
            let _ = writer.submit(move |log: &Log| {
                log.entries.lock().unwrap().push(n);
                Ok(())
            });
        }
        writer.shutdown();

        assert_eq!(*log.entries.lock().unwrap(), (0..100).collect::<Vec<_>>());
        assert_eq!(log.commits.load(Ordering::SeqCst), 100);
    }

    #[test]
    fn failed_job_skips_commit_hook() {
        let (log, writer) = spawn_log();
        let pending = writer
            .submit(|_: &Log| Err::<(), _>(CatalogError::NotFound(crate::ItemId::new(1))))
            .unwrap();

        assert!(pending.wait().unwrap_err().is_not_found());
        writer.shutdown();
        assert_eq!(log.commits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn submit_after_shutdown_fails() {
        let (_log, writer) = spawn_log();
        writer.shutdown();
        writer.shutdown();

        assert!(!writer.is_running());
        assert!(matches!(writer.submit(|_: &Log| Ok(())), Err(CatalogError::ShutDown)));
    }

    #[test]
    fn runs_off_the_calling_thread() {
        let (_log, writer) = spawn_log();
        let caller = thread::current().id();
        let worker = writer.submit(|_: &Log| Ok(thread::current().id())).unwrap().wait().unwrap();
        assert_ne!(worker, caller);
    }

    #[tokio::test]
    async fn pending_can_be_awaited() {
        let (_log, writer) = spawn_log();
        let value = writer.submit(|_: &Log| Ok(7)).unwrap().await.unwrap();
        assert_eq!(value, 7);
    }
}
