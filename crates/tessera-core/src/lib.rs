//! # Tessera Core
//!
//! Shared building blocks of the Tessera data-access tier: the error
//! taxonomy every DAO reports, typed ids, etags, paging, and the domain
//! objects that the DAOs read and write.

pub mod domain;
pub mod error;
pub mod id;
pub mod pagination;
pub mod result;
pub mod telemetry;
pub mod validation;

pub use domain::*;
pub use error::*;
pub use id::*;
pub use pagination::*;
pub use result::*;
pub use telemetry::{init_telemetry, LogFormat, TelemetryConfig};
pub use validation::*;

// Re-export shaku for dependency injection
pub use shaku::Interface;
