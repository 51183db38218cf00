//! Dependency injection wiring with Shaku.
//!
//! [`DaoModule`] holds the pool and one SQLite implementation per DAO
//! interface. Callers resolve DAOs as `Arc<dyn XxxDao>`:
//!
//! ```ignore
//! use shaku::HasComponent;
//!
//! let module = build_dao_module(&config.database).await?;
//! let nodes: Arc<dyn NodeDao> = module.resolve();
//! ```

use crate::dao::{
    SqliteAccessApprovalDaoImpl, SqliteAccessControlListDaoImpl, SqliteAccessRequirementDaoImpl,
    SqliteChangeDaoImpl, SqliteGroupMembersDaoImpl, SqliteNodeDaoImpl, SqlitePrincipalAliasDaoImpl,
    SqliteTeamDaoImpl, SqliteUserGroupDaoImpl, SqliteWikiPageDaoImpl,
};
use crate::{create_pool, DatabasePool, DatabasePoolInterface, DatabasePoolParameters};
use shaku::module;
use sqlx::SqlitePool;
use std::sync::Arc;
use tessera_config::DatabaseConfig;
use tessera_core::TesseraResult;
use tracing::info;

module! {
    pub DaoModule {
        components = [
            DatabasePool,
            SqliteChangeDaoImpl,
            SqliteUserGroupDaoImpl,
            SqliteGroupMembersDaoImpl,
            SqlitePrincipalAliasDaoImpl,
            SqliteTeamDaoImpl,
            SqliteNodeDaoImpl,
            SqliteAccessControlListDaoImpl,
            SqliteAccessRequirementDaoImpl,
            SqliteAccessApprovalDaoImpl,
            SqliteWikiPageDaoImpl,
        ],
        providers = [],
    }
}

/// Builds the module around an already opened and migrated pool.
#[must_use]
pub fn dao_module_with_pool(pool: SqlitePool) -> Arc<DaoModule> {
    let module = DaoModule::builder()
        .with_component_parameters::<DatabasePool>(DatabasePoolParameters { pool })
        .build();
    Arc::new(module)
}

/// Opens the configured database, applies migrations and builds the module.
pub async fn build_dao_module(config: &DatabaseConfig) -> TesseraResult<Arc<DaoModule>> {
    let pool = create_pool(config).await?;
    info!("Building DAO module");
    Ok(dao_module_with_pool(pool.inner().clone()))
}
