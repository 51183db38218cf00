//! Domain objects and value objects persisted by the DAOs.

pub mod entities;
pub mod value_objects;

pub use entities::*;
pub use value_objects::*;
