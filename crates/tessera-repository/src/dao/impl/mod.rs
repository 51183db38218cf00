//! DAO implementations.
//!
//! Trait definitions live in the parent `dao/` module (e.g. `node_dao.rs`).
//! Implementations are organized by technology.

pub mod sqlite;
