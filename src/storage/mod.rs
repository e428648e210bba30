//! Storage Layer - SQLite-backed persistence
//!
//! System of record is SQLite with tables:
//! - customers(id, name)
//! - licenses(id, serial, customer_id)
//!
//! The `PersistentContext` is owned by a single `ContextWorker` thread and
//! reached through `ContextHandle`s.

pub mod schema;
pub mod context;
pub mod worker;

pub use context::{DbStats, PersistentContext, Predicate, Record};
pub use worker::{ContextHandle, ContextWorker};
