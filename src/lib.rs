//! # Relationship - Customer and License persistence
//!
//! A small local persistence layer for customers and the licenses they own,
//! backed by a single embedded SQLite file.
//!
//! Relationship provides:
//! - Plain domain records (`Customer`, `License`) and their persisted rows
//! - A persistent context confined to one worker thread
//! - Per-entity stores with callback-based async CRUD
//! - Typed per-call failures (`StoreError`) separate from fatal open/close errors
//! - A seed loader for demo fixtures

pub mod customer;
pub mod license;
pub mod mapper;
pub mod storage;
pub mod dispatch;
pub mod store;
pub mod seeds;
pub mod config;
pub mod ui;

// Re-exports for convenient access
pub use customer::Customer;
pub use license::License;
pub use dispatch::{Dispatcher, MainQueue};
pub use storage::{ContextHandle, ContextWorker, PersistentContext, Predicate};
pub use store::{CustomerStore, LicenseStore, Stores};

use std::path::PathBuf;

/// Result type alias for storage-level operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised inside the persistent context
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Entity {0} has no parent link")]
    NoParentLink(String),

    #[error("Persistent context is no longer running")]
    ContextUnavailable,
}

/// Failure reported to a store caller through its completion callback.
///
/// Two errors are equal when they have the same kind and the same message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    CannotFetch(String),

    #[error("{0}")]
    CannotCreate(String),

    #[error("{0}")]
    CannotUpdate(String),

    #[error("{0}")]
    CannotDelete(String),
}

impl StoreError {
    /// The human-readable message carried by the error
    pub fn message(&self) -> &str {
        match self {
            StoreError::CannotFetch(m)
            | StoreError::CannotCreate(m)
            | StoreError::CannotUpdate(m)
            | StoreError::CannotDelete(m) => m,
        }
    }
}

/// Unrecoverable failure while opening or closing the persistent context.
///
/// Callers are expected to abort startup or shutdown on these.
#[derive(Debug, thiserror::Error)]
pub enum FatalError {
    #[error("Error opening store at {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Error loading schema: {0}")]
    Schema(#[source] rusqlite::Error),

    #[error("Error spawning persistent context worker: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Persistent context worker panicked")]
    WorkerPanicked,

    #[error("Error saving persistent context on shutdown: {0}")]
    Close(#[source] Error),
}
