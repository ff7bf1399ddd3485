//! Persistence layer: backend-agnostic `Database` trait, libSQL backend,
//! and versioned migrations.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{Database, NewTransaction, Transaction, User};
