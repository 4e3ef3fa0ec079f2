//! # myhub-store
//!
//! Relational storage for the MyHub backend, backed by SQLite through an
//! r2d2 connection pool. The crate exposes a cloneable [`Store`] handle with
//! typed CRUD helpers for every domain model; write paths that must be
//! atomic (message send, user deletion) run inside a single transaction.

pub mod conversations;
pub mod database;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod users;

mod error;

pub use database::Store;
pub use error::StoreError;
pub use models::*;
