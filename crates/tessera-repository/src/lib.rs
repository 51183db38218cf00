//! # Tessera Repository
//!
//! SQLite data-access objects for the Tessera metadata store.
//!
//! ```text
//! Caller
//!   ↓  Arc<dyn NodeDao>          (DAO interface, resolved from DaoModule)
//! SqliteNodeDaoImpl              (DAO impl, SQLx)
//!   ↓  Arc<dyn DatabasePoolInterface>
//! SQLite
//! ```
//!
//! ## Structure
//!
//! ```text
//! src/
//!   pool.rs                      ← DatabasePool, migrations
//!   locking.rs                   ← etag lock/check/increment protocol
//!   module.rs                    ← DaoModule (Shaku)
//!   dao/
//!     node_dao.rs, team_dao.rs, ...   ← DAO traits
//!     impl/sqlite/*_dao_impl.rs       ← SQLite implementations
//! ```
//!
//! Every write runs in a single transaction that also records the object's
//! latest change in the change log.

pub mod dao;
pub mod locking;
pub mod module;
pub mod pool;

pub use dao::*;
pub use locking::LockTarget;
pub use module::{build_dao_module, dao_module_with_pool, DaoModule};
pub use pool::*;
