//! Tests for pool configuration and concurrent writers.

use shaku::HasComponent;
use std::collections::HashSet;
use std::sync::Arc;
use tessera_config::DatabaseConfig;
use tessera_core::{Node, NodeType, UserGroup};
use tessera_repository::{
    build_dao_module, create_pool, DaoModule, DatabasePoolInterface, NodeDao, UserGroupDao,
};

const WRITERS: usize = 12;

async fn file_module(dir: &tempfile::TempDir) -> Arc<DaoModule> {
    let config = DatabaseConfig {
        url: format!("sqlite://{}", dir.path().join("concurrent.db").display()),
        max_connections: 4,
        ..DatabaseConfig::default()
    };
    build_dao_module(&config).await.expect("Failed to build module")
}

#[tokio::test]
async fn test_in_memory_pool_uses_one_connection() {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 8,
        ..DatabaseConfig::default()
    };
    let pool = create_pool(&config).await.unwrap();
    assert_eq!(pool.inner().options().get_max_connections(), 1);
    assert!(pool.inner().options().get_idle_timeout().is_none());
    assert!(pool.inner().options().get_max_lifetime().is_none());

    let pool: Arc<dyn DatabasePoolInterface> = pool;
    let groups: Arc<dyn UserGroupDao> =
        Arc::new(tessera_repository::SqliteUserGroupDaoImpl::new(pool.clone()));
    let mut handles = Vec::new();
    for _ in 0..8 {
        let groups = groups.clone();
        handles.push(tokio::spawn(async move {
            groups.create(&UserGroup::individual()).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(groups.count().await.unwrap(), 8);
    pool.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_under_one_parent() {
    let dir = tempfile::tempdir().unwrap();
    let module = file_module(&dir).await;
    let groups: Arc<dyn UserGroupDao> = module.resolve();
    let nodes: Arc<dyn NodeDao> = module.resolve();

    let user = groups.create(&UserGroup::individual()).await.unwrap();
    let root = nodes
        .create_new_node(&Node::new("root", NodeType::Folder, user))
        .await
        .unwrap()
        .id
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..WRITERS {
        let nodes = nodes.clone();
        handles.push(tokio::spawn(async move {
            let child = Node::new(format!("child-{i}"), NodeType::File, user).with_parent(root);
            nodes.create_new_node(&child).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(nodes.get_children_ids(root).await.unwrap().len(), WRITERS);
    let pool: Arc<dyn DatabasePoolInterface> = module.resolve();
    pool.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_touches_all_commit() {
    let dir = tempfile::tempdir().unwrap();
    let module = file_module(&dir).await;
    let groups: Arc<dyn UserGroupDao> = module.resolve();
    let user = groups.create(&UserGroup::individual()).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..WRITERS {
        let groups = groups.clone();
        handles.push(tokio::spawn(async move { groups.touch(user).await }));
    }
    let mut etags = HashSet::new();
    for handle in handles {
        etags.insert(handle.await.unwrap().unwrap());
    }

    assert_eq!(etags.len(), WRITERS);
    let pool: Arc<dyn DatabasePoolInterface> = module.resolve();
    pool.close().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_updates_with_same_etag_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let module = file_module(&dir).await;
    let groups: Arc<dyn UserGroupDao> = module.resolve();
    let nodes: Arc<dyn NodeDao> = module.resolve();

    let user = groups.create(&UserGroup::individual()).await.unwrap();
    let root = nodes
        .create_new_node(&Node::new("root", NodeType::Folder, user))
        .await
        .unwrap();
    let id = root.id.unwrap();
    let etag = root.etag.unwrap();

    let mut handles = Vec::new();
    for _ in 0..WRITERS {
        let nodes = nodes.clone();
        let etag = etag.clone();
        handles.push(tokio::spawn(async move {
            nodes.lock_node_and_increment_etag(id, &etag).await
        }));
    }

    let mut committed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => committed += 1,
            Err(e) => assert!(e.is_conflicting_update(), "unexpected error: {e}"),
        }
    }
    assert_eq!(committed, 1);
    let pool: Arc<dyn DatabasePoolInterface> = module.resolve();
    pool.close().await;
}
