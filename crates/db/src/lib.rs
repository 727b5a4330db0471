//! `db` crate — Postgres-backed collaborators.
//!
//! Provides a connection pool, typed row structs, repository functions, and
//! implementations of the engine's storage trait and the node library's
//! data-source trait. No business logic lives here.

pub mod collaborators;
pub mod error;
pub mod models;
pub mod pool;
pub mod repository;

pub use collaborators::{PgExecutionStore, PgInvoiceSource};
pub use error::DbError;
pub use pool::DbPool;
