//! Confined execution context for the persistent context
//!
//! One dedicated thread owns the `PersistentContext`; every read and write
//! runs there, one job at a time. Handles only send jobs.

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::thread;
use crossbeam::channel::{self, Sender};
use tracing::{debug, error};
use crate::{Error, FatalError, Result};
use super::PersistentContext;

type JobFn = Box<dyn FnOnce(Option<&mut PersistentContext>) + Send + 'static>;

/// A unit of work for the worker.
///
/// A job always runs exactly once: with the context when the worker takes
/// it, or with `None` if it is dropped unrun (worker gone or shut down).
struct Job(Option<JobFn>);

impl Job {
    fn run(mut self, context: &mut PersistentContext) {
        if let Some(f) = self.0.take() {
            f(Some(context));
        }
    }
}

impl Drop for Job {
    fn drop(&mut self) {
        if let Some(f) = self.0.take() {
            f(None);
        }
    }
}

enum Message {
    Run(Job),
    Shutdown,
}

/// Cloneable handle for submitting work to the confined context
#[derive(Clone)]
pub struct ContextHandle {
    tx: Sender<Message>,
}

impl ContextHandle {
    /// Queue a job. The job receives `None` if the context is no longer running.
    pub fn perform<F>(&self, job: F)
    where
        F: FnOnce(Option<&mut PersistentContext>) + Send + 'static,
    {
        let job: JobFn = Box::new(job);
        // On failure the returned job is dropped here and runs with `None`
        let _ = self.tx.send(Message::Run(Job(Some(job))));
    }

    /// Run `f` on the context and block until it returns.
    ///
    /// Must not be called from a job running on the worker itself.
    pub fn call<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PersistentContext) -> Result<T> + Send + 'static,
    {
        let (tx, rx) = channel::bounded(1);
        self.perform(move |context| {
            let result = match context {
                Some(context) => f(context),
                None => Err(Error::ContextUnavailable),
            };
            let _ = tx.send(result);
        });
        rx.recv().unwrap_or(Err(Error::ContextUnavailable))
    }
}

/// Owner of the worker thread holding the persistent context
pub struct ContextWorker {
    handle: ContextHandle,
    thread: Option<thread::JoinHandle<std::result::Result<(), FatalError>>>,
}

impl ContextWorker {
    /// Start the worker, opening the context on the worker thread itself
    pub fn start<F>(open: F) -> std::result::Result<Self, FatalError>
    where
        F: FnOnce() -> std::result::Result<PersistentContext, FatalError> + Send + 'static,
    {
        let (tx, rx) = channel::unbounded::<Message>();
        let (ready_tx, ready_rx) = channel::bounded(1);

        let thread = thread::Builder::new()
            .name("persistent-context".to_string())
            .spawn(move || {
                let mut context = match open() {
                    Ok(context) => {
                        let _ = ready_tx.send(Ok(()));
                        context
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return Ok(());
                    }
                };

                for message in rx.iter() {
                    match message {
                        Message::Run(job) => {
                            if panic::catch_unwind(AssertUnwindSafe(|| job.run(&mut context))).is_err() {
                                error!("Job panicked on persistent context worker");
                            }
                        }
                        Message::Shutdown => break,
                    }
                }

                // Jobs still queued resolve as unavailable
                drop(rx);
                debug!("Persistent context worker stopping");
                context.close()
            })
            .map_err(FatalError::Spawn)?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                handle: ContextHandle { tx },
                thread: Some(thread),
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(FatalError::WorkerPanicked)
            }
        }
    }

    /// Start a worker over a database file
    pub fn open(path: impl Into<PathBuf>) -> std::result::Result<Self, FatalError> {
        let path = path.into();
        Self::start(move || PersistentContext::open(&path))
    }

    /// Start a worker over an in-memory database (for testing)
    pub fn open_in_memory() -> std::result::Result<Self, FatalError> {
        Self::start(PersistentContext::open_in_memory)
    }

    pub fn handle(&self) -> ContextHandle {
        self.handle.clone()
    }

    /// Stop the worker after the jobs already queued and run the final save
    pub fn shutdown(mut self) -> std::result::Result<(), FatalError> {
        self.stop()
    }

    fn stop(&mut self) -> std::result::Result<(), FatalError> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        let _ = self.handle.tx.send(Message::Shutdown);
        thread.join().map_err(|_| FatalError::WorkerPanicked)?
    }
}

impl Drop for ContextWorker {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!("Persistent context shutdown failed: {}", e);
        }
    }
}
