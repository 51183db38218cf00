//! # Tessera Bootstrap
//!
//! Startup for the Tessera data-access tier: opens the configured store,
//! applies migrations, wires the DAO module and reports what the store holds.

pub mod app;
pub mod startup;

pub use app::{App, Inventory};
