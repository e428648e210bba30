//! Entity stores
//!
//! Each store wraps the shared persistent context with CRUD for one entity.
//! Every operation takes a completion callback that is invoked exactly once,
//! on the store's dispatcher, with either the result or a `StoreError`.

pub mod customer;
pub mod license;

pub use customer::CustomerStore;
pub use license::LicenseStore;

use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;
use crate::dispatch::Dispatcher;
use crate::storage::{ContextHandle, ContextWorker, PersistentContext};
use crate::{FatalError, StoreError};

/// Run `op` on the confined context and deliver its result on `dispatcher`.
///
/// `unavailable` is reported when the context is no longer running.
pub(crate) fn submit<T, F, C>(
    context: &ContextHandle,
    dispatcher: &Arc<dyn Dispatcher>,
    unavailable: StoreError,
    completion: C,
    op: F,
) where
    T: Send + 'static,
    F: FnOnce(&mut PersistentContext) -> Result<T, StoreError> + Send + 'static,
    C: FnOnce(Result<T, StoreError>) + Send + 'static,
{
    let dispatcher = Arc::clone(dispatcher);
    context.perform(move |context| {
        let result = match context {
            Some(context) => op(context),
            None => {
                warn!("{}: persistent context unavailable", unavailable);
                Err(unavailable)
            }
        };
        dispatcher.dispatch(Box::new(move || completion(result)));
    });
}

/// Fold a storage failure into the caller-facing error, logging the cause
pub(crate) fn fold<T>(result: crate::Result<T>, failure: impl FnOnce() -> StoreError) -> Result<T, StoreError> {
    result.map_err(|e| {
        let failure = failure();
        warn!(cause = %e, "{}", failure);
        failure
    })
}

/// Composition root: one store per entity over one persistent context
pub struct Stores {
    pub customers: CustomerStore,
    pub licenses: LicenseStore,
    worker: ContextWorker,
}

impl Stores {
    pub fn new(worker: ContextWorker, dispatcher: Arc<dyn Dispatcher>) -> Self {
        let context = worker.handle();
        Self {
            customers: CustomerStore::new(context.clone(), Arc::clone(&dispatcher)),
            licenses: LicenseStore::new(context, dispatcher),
            worker,
        }
    }

    /// Open the database file and build both stores
    pub fn open(path: impl Into<PathBuf>, dispatcher: Arc<dyn Dispatcher>) -> Result<Self, FatalError> {
        Ok(Self::new(ContextWorker::open(path)?, dispatcher))
    }

    /// In-memory variant (for testing)
    pub fn open_in_memory(dispatcher: Arc<dyn Dispatcher>) -> Result<Self, FatalError> {
        Ok(Self::new(ContextWorker::open_in_memory()?, dispatcher))
    }

    /// Direct handle to the shared context, for bulk maintenance
    pub fn context(&self) -> ContextHandle {
        self.worker.handle()
    }

    /// Stop the context worker and run its final save
    pub fn shutdown(self) -> Result<(), FatalError> {
        let Stores { worker, .. } = self;
        worker.shutdown()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::dispatch::MainQueue;

    pub fn stores() -> Stores {
        let queue = MainQueue::start().unwrap();
        Stores::open_in_memory(Arc::new(queue)).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;
    use crossbeam::channel;
    use crate::customer::Customer;

    #[test]
    fn test_panicking_callbacks_keep_delivery_on_main_queue() {
        let stores = testing::stores();
        stores.customers.fetch_customers(|_| panic!("caller bug"));
        stores.customers.fetch_customers(|_| panic!("caller bug"));

        let (tx, rx) = channel::bounded(1);
        stores.customers.create_customer(Customer::new("amy", "Amy"), move |result| {
            let _ = tx.send((thread::current().name().map(str::to_string), result));
        });
        let (name, result) = rx.recv().unwrap();
        assert_eq!(name.as_deref(), Some("main-queue"));
        assert_eq!(result.unwrap().id, "amy");

        stores.shutdown().unwrap();
    }

    #[test]
    fn test_callback_fires_after_runtime_is_gone() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let stores = Stores::open_in_memory(Arc::new(runtime.handle().clone())).unwrap();
        drop(runtime);

        let (tx, rx) = channel::bounded(1);
        stores.customers.fetch_customers(move |result| {
            let _ = tx.send(result);
        });
        let result = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(result, Ok(Vec::new()));
    }

    #[tokio::test]
    async fn test_round_trip_on_tokio_runtime() {
        let stores = Stores::open_in_memory(Arc::new(tokio::runtime::Handle::current())).unwrap();
        let bob = Customer::new("bob", "Bob").with_license("b1", "s1").with_license("b2", "s2");

        let (tx, rx) = tokio::sync::oneshot::channel();
        stores.customers.create_customer(bob.clone(), move |result| {
            let _ = tx.send(result);
        });
        rx.await.unwrap().unwrap();

        let (tx, rx) = tokio::sync::oneshot::channel();
        stores.customers.fetch_customer("bob", move |result| {
            let _ = tx.send(result);
        });
        let fetched = rx.await.unwrap().unwrap();
        assert_eq!(fetched.name, "Bob");
        assert_eq!(fetched.license_set(), bob.license_set());

        stores.shutdown().unwrap();
    }
}
