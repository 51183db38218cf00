//! Integration tests for user groups, group membership and principal aliases.

mod common;

use common::TestDatabase;
use tessera_core::{AliasType, PageRequest, PrincipalAlias, PrincipalId, UserGroup};
use tessera_repository::{
    GroupMembersDao, PrincipalAliasDao, SqliteGroupMembersDaoImpl, SqlitePrincipalAliasDaoImpl,
    SqliteUserGroupDaoImpl, UserGroupDao,
};

#[tokio::test]
async fn test_create_and_get_principal() {
    let db = TestDatabase::new().await;
    let dao = SqliteUserGroupDaoImpl::new(db.pool());

    let id = dao.create(&UserGroup::individual()).await.expect("Failed to create");
    let found = dao.get(id).await.expect("Failed to get");

    assert_eq!(found.id, Some(id));
    assert!(found.is_individual);
    assert!(found.etag.is_some());
    assert!(found.creation_date.is_some());
    assert!(dao.does_principal_exist(id).await.unwrap());
}

#[tokio::test]
async fn test_get_missing_principal_is_not_found() {
    let db = TestDatabase::new().await;
    let dao = SqliteUserGroupDaoImpl::new(db.pool());

    let err = dao.get(PrincipalId::new(404)).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(!dao.does_principal_exist(PrincipalId::new(404)).await.unwrap());
}

#[tokio::test]
async fn test_create_with_taken_id_is_rejected() {
    let db = TestDatabase::new().await;
    let dao = SqliteUserGroupDaoImpl::new(db.pool());

    let id = dao
        .create(&UserGroup::group().with_id(PrincipalId::new(273_948)))
        .await
        .unwrap();
    assert_eq!(id, PrincipalId::new(273_948));

    let err = dao
        .create(&UserGroup::individual().with_id(id))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_ARGUMENT");
}

#[tokio::test]
async fn test_get_all_pages_by_kind() {
    let db = TestDatabase::new().await;
    let dao = SqliteUserGroupDaoImpl::new(db.pool());

    for _ in 0..3 {
        db.create_user().await;
    }
    db.create_group().await;

    let users = dao.get_all(true, PageRequest::new(0, 2)).await.unwrap();
    assert_eq!(users.content.len(), 2);
    assert_eq!(users.info.total_elements, 3);
    assert!(users.content.iter().all(|g| g.is_individual));

    let rest = dao.get_all(true, PageRequest::new(1, 2)).await.unwrap();
    assert_eq!(rest.content.len(), 1);

    let groups = dao.get_all(false, PageRequest::first()).await.unwrap();
    assert_eq!(groups.info.total_elements, 1);

    assert_eq!(dao.get_all_principals().await.unwrap().len(), 4);
    assert_eq!(dao.count().await.unwrap(), 4);
}

#[tokio::test]
async fn test_touch_changes_etag() {
    let db = TestDatabase::new().await;
    let dao = SqliteUserGroupDaoImpl::new(db.pool());
    let id = db.create_group().await;

    let before = dao.get_etag_for_update(id).await.unwrap();
    let touched = dao.touch(id).await.unwrap();

    assert_ne!(before, touched);
    assert_eq!(dao.get(id).await.unwrap().etag, Some(touched));
}

#[tokio::test]
async fn test_delete_principal() {
    let db = TestDatabase::new().await;
    let dao = SqliteUserGroupDaoImpl::new(db.pool());
    let id = db.create_user().await;

    assert!(dao.delete(id).await.unwrap());
    assert!(!dao.delete(id).await.unwrap());
    assert!(dao.get(id).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_add_and_remove_members() {
    let db = TestDatabase::new().await;
    let members = SqliteGroupMembersDaoImpl::new(db.pool());
    let groups = SqliteUserGroupDaoImpl::new(db.pool());

    let group = db.create_group().await;
    let alice = db.create_user().await;
    let bob = db.create_user().await;
    let etag_before = groups.get(group).await.unwrap().etag;

    members.add_members(group, &[alice, bob]).await.unwrap();
    // Adding an existing member again is a no-op.
    members.add_members(group, &[alice]).await.unwrap();

    let ids: Vec<_> = members
        .get_members(group)
        .await
        .unwrap()
        .into_iter()
        .filter_map(|g| g.id)
        .collect();
    assert_eq!(ids, vec![alice, bob]);
    assert_eq!(members.get_member_count(group).await.unwrap(), 2);
    assert!(members.is_member(group, alice).await.unwrap());
    assert_ne!(groups.get(group).await.unwrap().etag, etag_before);

    let alice_groups = members.get_users_groups(alice).await.unwrap();
    assert_eq!(alice_groups.len(), 1);
    assert_eq!(alice_groups[0].id, Some(group));

    members.remove_members(group, &[alice]).await.unwrap();
    assert!(!members.is_member(group, alice).await.unwrap());
    assert_eq!(members.get_member_count(group).await.unwrap(), 1);
}

#[tokio::test]
async fn test_group_cannot_contain_itself() {
    let db = TestDatabase::new().await;
    let members = SqliteGroupMembersDaoImpl::new(db.pool());
    let group = db.create_group().await;

    let err = members.add_members(group, &[group]).await.unwrap_err();
    assert_eq!(err.error_code(), "INVALID_ARGUMENT");
}

#[tokio::test]
async fn test_add_members_to_missing_group_is_not_found() {
    let db = TestDatabase::new().await;
    let members = SqliteGroupMembersDaoImpl::new(db.pool());
    let user = db.create_user().await;

    let err = members
        .add_members(PrincipalId::new(999), &[user])
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_add_missing_member_violates_integrity() {
    let db = TestDatabase::new().await;
    let members = SqliteGroupMembersDaoImpl::new(db.pool());
    let group = db.create_group().await;

    let err = members
        .add_members(group, &[PrincipalId::new(999)])
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INTEGRITY_VIOLATION");
    assert_eq!(members.get_member_count(group).await.unwrap(), 0);
}

#[tokio::test]
async fn test_bind_and_find_alias() {
    let db = TestDatabase::new().await;
    let dao = SqlitePrincipalAliasDaoImpl::new(db.pool());
    let user = db.create_user().await;

    let bound = dao
        .bind_alias(&PrincipalAlias::new(user, "Jane_Doe", AliasType::UserName))
        .await
        .unwrap();
    assert!(bound.id.is_some());
    assert_eq!(bound.alias, "Jane_Doe");

    let found = dao
        .find_principal_with_alias(" jane_doe ")
        .await
        .unwrap()
        .expect("Alias not found");
    assert_eq!(found.principal_id, user);
    assert!(!dao.is_alias_available("JANE_DOE").await.unwrap());
    assert!(dao.is_alias_available("john").await.unwrap());

    let by_id = dao.get_principal_alias(bound.id.unwrap()).await.unwrap();
    assert_eq!(by_id, bound);
}

#[tokio::test]
async fn test_alias_taken_by_another_principal_conflicts() {
    let db = TestDatabase::new().await;
    let dao = SqlitePrincipalAliasDaoImpl::new(db.pool());
    let first = db.create_user().await;
    let second = db.create_user().await;

    dao.bind_alias(&PrincipalAlias::new(first, "jane@example.com", AliasType::UserEmail))
        .await
        .unwrap();

    let err = dao
        .bind_alias(&PrincipalAlias::new(second, "JANE@example.com", AliasType::UserEmail))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "NAME_CONFLICT");
}

#[tokio::test]
async fn test_rebinding_same_alias_returns_existing() {
    let db = TestDatabase::new().await;
    let dao = SqlitePrincipalAliasDaoImpl::new(db.pool());
    let user = db.create_user().await;
    let alias = PrincipalAlias::new(user, "jane", AliasType::UserName);

    let first = dao.bind_alias(&alias).await.unwrap();
    let second = dao.bind_alias(&alias).await.unwrap();
    assert_eq!(first.id, second.id);
}

#[tokio::test]
async fn test_user_name_is_replaced_but_emails_accumulate() {
    let db = TestDatabase::new().await;
    let dao = SqlitePrincipalAliasDaoImpl::new(db.pool());
    let user = db.create_user().await;

    dao.bind_alias(&PrincipalAlias::new(user, "jane", AliasType::UserName))
        .await
        .unwrap();
    dao.bind_alias(&PrincipalAlias::new(user, "jane_doe", AliasType::UserName))
        .await
        .unwrap();
    dao.bind_alias(&PrincipalAlias::new(user, "a@example.com", AliasType::UserEmail))
        .await
        .unwrap();
    dao.bind_alias(&PrincipalAlias::new(user, "b@example.com", AliasType::UserEmail))
        .await
        .unwrap();

    let names = dao
        .list_principal_aliases(user, Some(AliasType::UserName))
        .await
        .unwrap();
    assert_eq!(names.len(), 1);
    assert_eq!(names[0].alias, "jane_doe");
    assert!(dao.is_alias_available("jane").await.unwrap());

    let emails = dao
        .list_principal_aliases(user, Some(AliasType::UserEmail))
        .await
        .unwrap();
    assert_eq!(emails.len(), 2);
    assert_eq!(dao.list_principal_aliases(user, None).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_invalid_alias_is_rejected() {
    let db = TestDatabase::new().await;
    let dao = SqlitePrincipalAliasDaoImpl::new(db.pool());
    let user = db.create_user().await;

    let err = dao
        .bind_alias(&PrincipalAlias::new(user, "not an email", AliasType::UserEmail))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INVALID_MODEL");
}

#[tokio::test]
async fn test_remove_aliases() {
    let db = TestDatabase::new().await;
    let dao = SqlitePrincipalAliasDaoImpl::new(db.pool());
    let user = db.create_user().await;
    let other = db.create_user().await;

    let name = dao
        .bind_alias(&PrincipalAlias::new(user, "jane", AliasType::UserName))
        .await
        .unwrap();
    dao.bind_alias(&PrincipalAlias::new(user, "jane@example.com", AliasType::UserEmail))
        .await
        .unwrap();

    // Removing through the wrong principal does nothing.
    assert!(!dao.remove_alias_from_principal(other, name.id.unwrap()).await.unwrap());
    assert!(dao.remove_alias_from_principal(user, name.id.unwrap()).await.unwrap());
    assert!(dao.is_alias_available("jane").await.unwrap());

    assert_eq!(dao.remove_all_aliases_from_principal(user).await.unwrap(), 1);
    assert!(dao.list_principal_aliases(user, None).await.unwrap().is_empty());
}
