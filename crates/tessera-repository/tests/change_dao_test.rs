//! Integration tests for the change log.

mod common;

use common::TestDatabase;
use tessera_core::{ChangeMessage, ChangeType, Etag, NodeType, ObjectType};
use tessera_repository::{ChangeDao, NodeDao, SqliteChangeDaoImpl, SqliteNodeDaoImpl};

#[tokio::test]
async fn test_replace_change_moves_object_to_end() {
    let db = TestDatabase::new().await;
    let dao = SqliteChangeDaoImpl::new(db.pool());

    let first = dao
        .replace_change(ChangeMessage::new(1, ObjectType::Entity, ChangeType::Create))
        .await
        .unwrap();
    let second = dao
        .replace_change(ChangeMessage::new(2, ObjectType::Entity, ChangeType::Create))
        .await
        .unwrap();
    let again = dao
        .replace_change(
            ChangeMessage::new(1, ObjectType::Entity, ChangeType::Update)
                .with_etag(Etag::from("e2")),
        )
        .await
        .unwrap();

    assert!(first.change_number < second.change_number);
    assert!(again.change_number > second.change_number);
    assert_eq!(dao.get_count().await.unwrap(), 2);
    assert_eq!(dao.get_current_change_number().await.unwrap(), again.change_number.unwrap());
    assert_eq!(dao.get_minimum_change_number().await.unwrap(), second.change_number.unwrap());

    let listed = dao.list_changes(0, None, 10).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].object_id, 2);
    assert_eq!(listed[1].object_id, 1);
    assert_eq!(listed[1].change_type, ChangeType::Update);
    assert_eq!(listed[1].object_etag, Some(Etag::from("e2")));
}

#[tokio::test]
async fn test_same_id_different_type_are_separate() {
    let db = TestDatabase::new().await;
    let dao = SqliteChangeDaoImpl::new(db.pool());

    dao.replace_changes(vec![
        ChangeMessage::new(5, ObjectType::Entity, ChangeType::Create),
        ChangeMessage::new(5, ObjectType::Team, ChangeType::Create),
        ChangeMessage::new(3, ObjectType::Entity, ChangeType::Delete),
    ])
    .await
    .unwrap();

    assert_eq!(dao.get_count().await.unwrap(), 3);
    let teams = dao.list_changes(0, Some(ObjectType::Team), 10).await.unwrap();
    assert_eq!(teams.len(), 1);
    assert_eq!(teams[0].object_id, 5);

    assert!(dao.delete_change(5, ObjectType::Team).await.unwrap());
    assert!(!dao.delete_change(5, ObjectType::Team).await.unwrap());
    assert_eq!(dao.delete_all_changes().await.unwrap(), 2);
    assert_eq!(dao.get_current_change_number().await.unwrap(), 0);
}

#[tokio::test]
async fn test_list_changes_window() {
    let db = TestDatabase::new().await;
    let dao = SqliteChangeDaoImpl::new(db.pool());

    let recorded = dao
        .replace_changes(
            (1..=5)
                .map(|id| ChangeMessage::new(id, ObjectType::Wiki, ChangeType::Create))
                .collect(),
        )
        .await
        .unwrap();
    let third = recorded[2].change_number.unwrap();

    let window = dao.list_changes(third, None, 2).await.unwrap();
    assert_eq!(window.len(), 2);
    assert_eq!(window[0].change_number, Some(third));
    assert_eq!(window[0].object_id, 3);

    let err = dao.list_changes(0, None, 0).await.unwrap_err();
    assert_eq!(err.error_code(), "INVALID_ARGUMENT");
}

#[tokio::test]
async fn test_writes_record_changes() {
    let db = TestDatabase::new().await;
    let changes = SqliteChangeDaoImpl::new(db.pool());
    let nodes = SqliteNodeDaoImpl::new(db.pool());
    let user = db.create_user().await;
    let root = db.create_root(user).await;
    let folder = db.create_node("data", NodeType::Folder, root, user).await;
    let folder_id = folder.id.unwrap();

    let entities = changes
        .list_changes(0, Some(ObjectType::Entity), 10)
        .await
        .unwrap();
    assert_eq!(entities.len(), 2);
    let last = entities.last().unwrap();
    assert_eq!(last.object_id, folder_id.into_inner());
    assert_eq!(last.change_type, ChangeType::Create);
    assert_eq!(last.object_etag, folder.etag);

    let principals = changes
        .list_changes(0, Some(ObjectType::Principal), 10)
        .await
        .unwrap();
    assert_eq!(principals.len(), 1);
    assert_eq!(principals[0].object_id, user.into_inner());

    nodes.delete(root).await.unwrap();
    let after_delete = changes
        .list_changes(0, Some(ObjectType::Entity), 10)
        .await
        .unwrap();
    assert_eq!(after_delete.len(), 2);
    assert!(after_delete
        .iter()
        .all(|change| change.change_type == ChangeType::Delete && change.object_etag.is_none()));
}
