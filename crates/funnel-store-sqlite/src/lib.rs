//! SQLite backend for the funnel store.
//!
//! Every query goes through a [`tokio_rusqlite`] connection, which owns its
//! own worker thread.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
