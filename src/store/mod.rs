//! Persistence layer — libSQL-backed storage for integrations, the
//! processing log, created business records, and the notification queue.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::Database;
