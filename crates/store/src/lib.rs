//! Quill SQLite storage adapter.
//!
//! [`SqliteStore`] implements both [`pipeline::RunStore`] (saved runs and
//! per-identity history) and [`pipeline::MemoryStore`] (trait profiles) over
//! one embedded database file.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Schema creation, SQL and JSON column encoding live
//! here; the executor sees only the port traits and [`pipeline::StoreError`].

mod sqlite;

pub use sqlite::SqliteStore;
