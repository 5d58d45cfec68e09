//! SQLite backend for the Trellis matrix store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! pool without blocking the async runtime. Uniqueness constraints in the
//! schema are the source of truth for placement slot races and for BCC
//! credit idempotency.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
