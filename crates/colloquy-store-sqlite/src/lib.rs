//! SQLite backend for the Colloquy discussion data layer.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. Each store method executes
//! as one transaction on that thread; the uniqueness constraints in
//! [`schema`] carry the concurrency invariants (unique invite codes, one
//! membership per user-group pair, one document per paper, one status row
//! per session).

mod encode;
mod schema;
mod store;

pub use store::SqliteStore;

#[cfg(test)]
mod tests;
