//! Delivery of store results
//!
//! Store operations run on the persistent context worker, then hand their
//! completion to a `Dispatcher`, the "main" execution context callers
//! receive results on.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread;
use crossbeam::channel::{self, RecvError, Sender};
use tracing::{error, warn};

/// A ready-to-run completion callback
pub type Completion = Box<dyn FnOnce() + Send + 'static>;

/// Execution context that runs completion callbacks
pub trait Dispatcher: Send + Sync + 'static {
    fn dispatch(&self, completion: Completion);
}

/// Dedicated thread running completions one after another, in arrival order
pub struct MainQueue {
    tx: Option<Sender<Completion>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl MainQueue {
    pub fn start() -> std::io::Result<Self> {
        let (tx, rx) = channel::unbounded::<Completion>();
        let thread = thread::Builder::new()
            .name("main-queue".to_string())
            .spawn(move || {
                for completion in rx {
                    // Caller panics stay inside their own completion
                    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(completion)) {
                        error!("Completion panicked on main queue: {}", panic_message(&*payload));
                    }
                }
            })?;

        Ok(Self {
            tx: Some(tx),
            thread: Some(thread),
        })
    }
}

impl Dispatcher for MainQueue {
    fn dispatch(&self, completion: Completion) {
        // The queue thread only exits once `tx` is dropped
        let sent = self.tx.as_ref().map(|tx| tx.send(completion));
        if !matches!(sent, Some(Ok(()))) {
            error!("Main queue is gone, completion dropped");
        }
    }
}

impl Drop for MainQueue {
    fn drop(&mut self) {
        // Closing the channel lets the thread drain and exit
        self.tx.take();
        if let Some(thread) = self.thread.take() {
            if thread.thread().id() != thread::current().id() {
                let _ = thread.join();
            }
        }
    }
}

/// Completion that still runs if its task is dropped unpolled
struct PendingCompletion(Option<Completion>);

impl PendingCompletion {
    fn run(mut self) {
        if let Some(completion) = self.0.take() {
            completion();
        }
    }
}

impl Drop for PendingCompletion {
    fn drop(&mut self) {
        if let Some(completion) = self.0.take() {
            warn!("Runtime shut down before delivery, running completion on the dropping thread");
            completion();
        }
    }
}

/// Deliver completions as tasks on a Tokio runtime.
///
/// A runtime that has shut down drops the task; the completion then runs
/// on whichever thread drops it.
impl Dispatcher for tokio::runtime::Handle {
    fn dispatch(&self, completion: Completion) {
        let pending = PendingCompletion(Some(completion));
        self.spawn(async move { pending.run() });
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Start an operation taking a completion callback and block until it fires.
///
/// Must not be called on the dispatcher that delivers the callback.
pub fn wait_for<T, F>(start: F) -> Result<T, RecvError>
where
    T: Send + 'static,
    F: FnOnce(Box<dyn FnOnce(T) + Send + 'static>),
{
    let (tx, rx) = channel::bounded(1);
    start(Box::new(move |value| {
        let _ = tx.send(value);
    }));
    rx.recv()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_main_queue_runs_on_its_own_thread() {
        let queue = MainQueue::start().unwrap();
        let name = wait_for(|done| {
            queue.dispatch(Box::new(move || done(thread::current().name().map(str::to_string))))
        })
        .unwrap();
        assert_eq!(name.as_deref(), Some("main-queue"));
    }

    #[test]
    fn test_main_queue_keeps_order() {
        let queue = MainQueue::start().unwrap();
        let (tx, rx) = channel::unbounded();
        for i in 0..10 {
            let tx = tx.clone();
            queue.dispatch(Box::new(move || {
                let _ = tx.send(i);
            }));
        }
        drop(queue);
        let seen: Vec<i32> = rx.try_iter().collect();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_main_queue_survives_panicking_completion() {
        let queue = MainQueue::start().unwrap();
        queue.dispatch(Box::new(|| panic!("callback failed")));

        let name = wait_for(|done| {
            queue.dispatch(Box::new(move || done(thread::current().name().map(str::to_string))))
        })
        .unwrap();
        assert_eq!(name.as_deref(), Some("main-queue"));
    }

    #[test]
    fn test_tokio_dispatch_after_runtime_shutdown() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let handle = runtime.handle().clone();
        drop(runtime);

        let (tx, rx) = channel::bounded(1);
        handle.dispatch(Box::new(move || {
            let _ = tx.send(7);
        }));
        assert_eq!(rx.recv_timeout(std::time::Duration::from_secs(2)), Ok(7));
    }

    #[tokio::test]
    async fn test_tokio_handle_dispatch() {
        let dispatcher: Arc<dyn Dispatcher> = Arc::new(tokio::runtime::Handle::current());
        let (tx, rx) = tokio::sync::oneshot::channel();
        dispatcher.dispatch(Box::new(move || {
            let _ = tx.send(42);
        }));
        assert_eq!(rx.await.unwrap(), 42);
    }
}
