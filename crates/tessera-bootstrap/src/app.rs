//! Application lifecycle.

use shaku::HasComponent;
use std::sync::Arc;
use tessera_config::AppConfig;
use tessera_core::TesseraResult;
use tessera_repository::{
    build_dao_module, AccessApprovalDao, AccessRequirementDao, ChangeDao, DaoModule,
    DatabasePoolInterface, NodeDao, TeamDao, UserGroupDao, WikiPageDao,
};
use tracing::info;

/// Row counts of the main tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Inventory {
    pub principals: u64,
    pub teams: u64,
    pub nodes: u64,
    pub access_requirements: u64,
    pub access_approvals: u64,
    pub wiki_pages: u64,
    pub changes: u64,
    pub current_change_number: i64,
}

/// A started application: configuration plus the wired DAO module.
pub struct App {
    config: AppConfig,
    module: Arc<DaoModule>,
}

impl App {
    /// Opens the database, applies migrations and checks the connection.
    pub async fn start(config: AppConfig) -> TesseraResult<Self> {
        info!("Starting {} ({})", config.app.name, config.app.environment);

        let module = build_dao_module(&config.database).await?;
        let pool: Arc<dyn DatabasePoolInterface> = module.resolve();
        pool.health_check().await?;
        info!("Database is ready");

        Ok(Self { config, module })
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub fn module(&self) -> Arc<DaoModule> {
        self.module.clone()
    }

    /// Counts the rows of every DAO-managed table.
    pub async fn inventory(&self) -> TesseraResult<Inventory> {
        let principals: Arc<dyn UserGroupDao> = self.module.resolve();
        let teams: Arc<dyn TeamDao> = self.module.resolve();
        let nodes: Arc<dyn NodeDao> = self.module.resolve();
        let requirements: Arc<dyn AccessRequirementDao> = self.module.resolve();
        let approvals: Arc<dyn AccessApprovalDao> = self.module.resolve();
        let wikis: Arc<dyn WikiPageDao> = self.module.resolve();
        let changes: Arc<dyn ChangeDao> = self.module.resolve();

        Ok(Inventory {
            principals: principals.count().await?,
            teams: teams.get_count().await?,
            nodes: nodes.get_count().await?,
            access_requirements: requirements.get_count().await?,
            access_approvals: approvals.get_count().await?,
            wiki_pages: wikis.get_count().await?,
            changes: changes.get_count().await?,
            current_change_number: changes.get_current_change_number().await?,
        })
    }

    /// Closes the connection pool.
    pub async fn shutdown(self) {
        let pool: Arc<dyn DatabasePoolInterface> = self.module.resolve();
        pool.close().await;
        info!("Shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{Node, NodeType, UserGroup};

    fn file_config(dir: &tempfile::TempDir) -> AppConfig {
        let mut config = AppConfig::default();
        config.database.url = format!("sqlite://{}", dir.path().join("store.db").display());
        config
    }

    #[tokio::test]
    async fn test_start_on_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let app = App::start(file_config(&dir)).await.unwrap();

        assert_eq!(app.inventory().await.unwrap(), Inventory::default());
        assert_eq!(app.config().app.name, "tessera");
        app.shutdown().await;
    }

    #[tokio::test]
    async fn test_inventory_counts_rows() {
        let dir = tempfile::tempdir().unwrap();
        let app = App::start(file_config(&dir)).await.unwrap();
        let module = app.module();

        let principals: Arc<dyn UserGroupDao> = module.resolve();
        let nodes: Arc<dyn NodeDao> = module.resolve();
        let user = principals.create(&UserGroup::individual()).await.unwrap();
        nodes
            .create_new_node(&Node::new("root", NodeType::Folder, user))
            .await
            .unwrap();

        let inventory = app.inventory().await.unwrap();
        assert_eq!(inventory.principals, 1);
        assert_eq!(inventory.nodes, 1);
        assert_eq!(inventory.changes, 2);
        assert!(inventory.current_change_number >= 2);
        app.shutdown().await;
    }

    #[tokio::test]
    async fn test_restart_keeps_data() {
        let dir = tempfile::tempdir().unwrap();

        let app = App::start(file_config(&dir)).await.unwrap();
        let principals: Arc<dyn UserGroupDao> = app.module().resolve();
        principals.create(&UserGroup::group()).await.unwrap();
        app.shutdown().await;

        let reopened = App::start(file_config(&dir)).await.unwrap();
        assert_eq!(reopened.inventory().await.unwrap().principals, 1);
        reopened.shutdown().await;
    }
}
