//! Common test infrastructure for database integration tests.

#![allow(dead_code)]

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use tessera_core::{Node, NodeId, NodeType, PrincipalId, UserGroup};
use tessera_repository::{
    DatabasePool, DatabasePoolInterface, NodeDao, SqliteNodeDaoImpl, SqliteUserGroupDaoImpl,
    UserGroupDao,
};

/// Private in-memory database with the schema applied.
///
/// The pool holds exactly one connection that never expires, so the
/// in-memory database lives as long as the `TestDatabase`. A test must not
/// use the pool while it holds a transaction of its own.
pub struct TestDatabase {
    pool: Arc<DatabasePool>,
}

impl TestDatabase {
    pub async fn new() -> Self {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .expect("Invalid in-memory URL")
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .expect("Failed to open in-memory database");

        let pool = DatabasePool::with_pool(pool);
        pool.run_migrations().await.expect("Failed to run migrations");

        Self { pool: Arc::new(pool) }
    }

    /// Pool handle as the DAOs receive it.
    pub fn pool(&self) -> Arc<dyn DatabasePoolInterface> {
        self.pool.clone()
    }

    pub fn raw_pool(&self) -> &sqlx::SqlitePool {
        self.pool.inner()
    }

    /// Creates an individual principal.
    pub async fn create_user(&self) -> PrincipalId {
        SqliteUserGroupDaoImpl::new(self.pool())
            .create(&UserGroup::individual())
            .await
            .expect("Failed to create user")
    }

    /// Creates a group principal.
    pub async fn create_group(&self) -> PrincipalId {
        SqliteUserGroupDaoImpl::new(self.pool())
            .create(&UserGroup::group())
            .await
            .expect("Failed to create group")
    }

    /// Creates a root folder owned by `created_by`.
    pub async fn create_root(&self, created_by: PrincipalId) -> NodeId {
        SqliteNodeDaoImpl::new(self.pool())
            .create_new_node(&Node::new("root", NodeType::Folder, created_by))
            .await
            .expect("Failed to create root node")
            .id
            .expect("Root node has no id")
    }

    /// Creates a child node.
    pub async fn create_node(
        &self,
        name: &str,
        node_type: NodeType,
        parent: NodeId,
        created_by: PrincipalId,
    ) -> Node {
        SqliteNodeDaoImpl::new(self.pool())
            .create_new_node(&Node::new(name, node_type, created_by).with_parent(parent))
            .await
            .expect("Failed to create node")
    }
}
