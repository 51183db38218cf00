//! # Tessera Config
//!
//! Configuration for the Tessera data-access tier, layered from TOML files
//! and `TESSERA__*` environment variables and validated before use.

mod app_config;
mod loader;
mod validation;

pub use app_config::*;
pub use loader::*;
pub use validation::*;
