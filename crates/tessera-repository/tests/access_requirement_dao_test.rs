//! Integration tests for access requirements and access approvals.

mod common;

use chrono::{Duration, Utc};
use common::TestDatabase;
use tessera_core::{
    AccessApproval, AccessRequirement, AccessRequirementDetails, AccessRequirementId, AccessType,
    PageRequest, PrincipalId, RestrictableObjectDescriptor, RestrictableObjectType,
};
use tessera_repository::{
    AccessApprovalDao, AccessRequirementDao, SqliteAccessApprovalDaoImpl,
    SqliteAccessRequirementDaoImpl,
};

fn entity(id: i64) -> RestrictableObjectDescriptor {
    RestrictableObjectDescriptor {
        id,
        object_type: RestrictableObjectType::Entity,
    }
}

fn terms_of_use() -> AccessRequirementDetails {
    AccessRequirementDetails::TermsOfUse {
        terms_of_use: Some("Do not redistribute".to_string()),
        file_handle_id: None,
    }
}

fn lock() -> AccessRequirementDetails {
    AccessRequirementDetails::Lock {
        jira_key: "PLFM-42".to_string(),
    }
}

async fn create_requirement(
    dao: &SqliteAccessRequirementDaoImpl,
    created_by: PrincipalId,
    details: AccessRequirementDetails,
    subjects: &[i64],
) -> AccessRequirementId {
    let requirement = subjects.iter().fold(
        AccessRequirement::new(created_by, AccessType::Download, details),
        |requirement, id| requirement.with_subject(entity(*id)),
    );
    dao.create(&requirement)
        .await
        .expect("Failed to create requirement")
        .id
        .unwrap()
}

#[tokio::test]
async fn test_create_and_get_requirement() {
    let db = TestDatabase::new().await;
    let dao = SqliteAccessRequirementDaoImpl::new(db.pool());
    let user = db.create_user().await;

    let mut requirement = AccessRequirement::new(user, AccessType::Download, terms_of_use())
        .with_subject(entity(20))
        .with_subject(RestrictableObjectDescriptor {
            id: 3,
            object_type: RestrictableObjectType::Team,
        })
        .with_subject(entity(10))
        // Duplicate subjects are stored once.
        .with_subject(entity(10));
    requirement.description = Some("Data use terms".to_string());

    let created = dao.create(&requirement).await.expect("Failed to create");
    let id = created.id.unwrap();
    assert!(created.etag.is_some());
    assert_eq!(created.subjects.len(), 3);
    assert_eq!(created.subjects[0], entity(10));
    assert_eq!(created.subjects[1], entity(20));
    assert_eq!(created.subjects[2].object_type, RestrictableObjectType::Team);

    let found = dao.get(id).await.unwrap();
    assert_eq!(found, created);
    assert_eq!(found.details, terms_of_use());
    assert_eq!(found.description.as_deref(), Some("Data use terms"));
    assert_eq!(
        dao.get_concrete_type(id).await.unwrap(),
        AccessRequirementDetails::TERMS_OF_USE
    );
    assert_eq!(dao.get_subjects(id).await.unwrap(), created.subjects);
    assert_eq!(dao.get_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_missing_requirement_is_not_found() {
    let db = TestDatabase::new().await;
    let dao = SqliteAccessRequirementDaoImpl::new(db.pool());
    let missing = AccessRequirementId::new(404);

    assert!(dao.get(missing).await.unwrap_err().is_not_found());
    assert!(dao.get_subjects(missing).await.unwrap_err().is_not_found());
    assert!(dao.get_concrete_type(missing).await.unwrap_err().is_not_found());
    assert!(dao.delete(missing).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_description_too_long_is_invalid() {
    let db = TestDatabase::new().await;
    let dao = SqliteAccessRequirementDaoImpl::new(db.pool());
    let user = db.create_user().await;

    let mut requirement = AccessRequirement::new(user, AccessType::Download, lock());
    requirement.description = Some("x".repeat(51));
    let err = dao.create(&requirement).await.unwrap_err();
    assert_eq!(err.error_code(), "INVALID_MODEL");
    assert_eq!(dao.get_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_requirements_for_subjects() {
    let db = TestDatabase::new().await;
    let dao = SqliteAccessRequirementDaoImpl::new(db.pool());
    let user = db.create_user().await;

    let first = create_requirement(&dao, user, terms_of_use(), &[1, 2]).await;
    let second = create_requirement(&dao, user, lock(), &[2]).await;
    let third = create_requirement(&dao, user, terms_of_use(), &[2, 3]).await;

    let all = dao
        .get_all_for_subject(&[1, 3], RestrictableObjectType::Entity)
        .await
        .unwrap();
    let ids: Vec<_> = all.iter().filter_map(|r| r.id).collect();
    assert_eq!(ids, vec![first, third]);
    assert!(dao
        .get_all_for_subject(&[1, 2, 3], RestrictableObjectType::Team)
        .await
        .unwrap()
        .is_empty());
    assert!(dao
        .get_all_for_subject(&[], RestrictableObjectType::Entity)
        .await
        .unwrap()
        .is_empty());

    let page = dao
        .get_for_subject(2, RestrictableObjectType::Entity, PageRequest::new(0, 2))
        .await
        .unwrap();
    assert_eq!(page.info.total_elements, 3);
    assert_eq!(page.content.len(), 2);
    assert_eq!(page.content[0].id, Some(first));
    assert_eq!(page.content[1].id, Some(second));

    let rest = dao
        .get_for_subject(2, RestrictableObjectType::Entity, PageRequest::new(1, 2))
        .await
        .unwrap();
    assert_eq!(rest.content.len(), 1);
    assert_eq!(rest.content[0].id, Some(third));
    assert_eq!(rest.content[0].subjects, vec![entity(2), entity(3)]);
}

#[tokio::test]
async fn test_update_requirement() {
    let db = TestDatabase::new().await;
    let dao = SqliteAccessRequirementDaoImpl::new(db.pool());
    let user = db.create_user().await;
    let id = create_requirement(&dao, user, terms_of_use(), &[1]).await;
    let created = dao.get(id).await.unwrap();

    let mut changed = created.clone();
    changed.access_type = AccessType::Participate;
    changed.details = lock();
    changed.subjects = vec![entity(5), entity(6)];
    let updated = dao.update(&changed).await.expect("Failed to update");

    assert_ne!(updated.etag, created.etag);
    assert_eq!(updated.access_type, AccessType::Participate);
    assert_eq!(updated.subjects, vec![entity(5), entity(6)]);
    assert_eq!(dao.get_concrete_type(id).await.unwrap(), AccessRequirementDetails::LOCK);
    assert!(dao
        .get_all_for_subject(&[1], RestrictableObjectType::Entity)
        .await
        .unwrap()
        .is_empty());

    // The original etag is now stale.
    let err = dao.update(&created).await.unwrap_err();
    assert!(err.is_conflicting_update());
}

#[tokio::test]
async fn test_delete_requirement_blocked_by_approval() {
    let db = TestDatabase::new().await;
    let requirements = SqliteAccessRequirementDaoImpl::new(db.pool());
    let approvals = SqliteAccessApprovalDaoImpl::new(db.pool());
    let user = db.create_user().await;
    let id = create_requirement(&requirements, user, terms_of_use(), &[1]).await;
    let approval = approvals
        .create(&AccessApproval::new(id, user, user))
        .await
        .unwrap();

    let err = requirements.delete(id).await.unwrap_err();
    assert_eq!(err.error_code(), "INTEGRITY_VIOLATION");
    assert!(err.to_string().contains("referenced by access approvals"));

    assert!(approvals.delete(approval.id.unwrap()).await.unwrap());
    requirements.delete(id).await.unwrap();
    assert!(requirements.get(id).await.unwrap_err().is_not_found());
    assert!(requirements
        .get_all_for_subject(&[1], RestrictableObjectType::Entity)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_unmet_requirements() {
    let db = TestDatabase::new().await;
    let requirements = SqliteAccessRequirementDaoImpl::new(db.pool());
    let approvals = SqliteAccessApprovalDaoImpl::new(db.pool());
    let user = db.create_user().await;
    let approved = create_requirement(&requirements, user, terms_of_use(), &[1]).await;
    let expired = create_requirement(&requirements, user, terms_of_use(), &[1]).await;
    let revoked = create_requirement(&requirements, user, terms_of_use(), &[1]).await;
    let untouched = create_requirement(&requirements, user, lock(), &[1]).await;

    approvals
        .create(&AccessApproval::new(approved, user, user))
        .await
        .unwrap();
    let mut stale = AccessApproval::new(expired, user, user);
    stale.expired_on = Some(Utc::now() - Duration::days(1));
    approvals.create(&stale).await.unwrap();
    approvals
        .create(&AccessApproval::new(revoked, user, user))
        .await
        .unwrap();
    assert!(approvals.revoke(revoked, user, user).await.unwrap());

    let unmet = requirements
        .get_all_unmet(&[1], RestrictableObjectType::Entity, &[user], &[AccessType::Download])
        .await
        .unwrap();
    assert_eq!(unmet, vec![expired, revoked, untouched]);

    let nobody = requirements
        .get_all_unmet(&[1], RestrictableObjectType::Entity, &[], &[AccessType::Download])
        .await
        .unwrap();
    assert_eq!(nobody.len(), 4);

    assert!(requirements
        .get_all_unmet(&[1], RestrictableObjectType::Entity, &[user], &[AccessType::Participate])
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_requirement_stats() {
    let db = TestDatabase::new().await;
    let dao = SqliteAccessRequirementDaoImpl::new(db.pool());
    let user = db.create_user().await;
    let tou = create_requirement(&dao, user, terms_of_use(), &[1]).await;
    let locked = create_requirement(&dao, user, lock(), &[2]).await;

    let stats = dao
        .get_stats(&[1, 2], RestrictableObjectType::Entity)
        .await
        .unwrap();
    assert_eq!(stats.requirement_ids.len(), 2);
    assert!(stats.requirement_ids.contains(&tou));
    assert!(stats.requirement_ids.contains(&locked));
    assert!(stats.has_terms_of_use);
    assert!(stats.has_lock);
    assert!(!stats.has_act);

    let none = dao.get_stats(&[9], RestrictableObjectType::Entity).await.unwrap();
    assert!(none.requirement_ids.is_empty());
    assert!(!none.has_terms_of_use);
}

#[tokio::test]
async fn test_create_and_get_approval() {
    let db = TestDatabase::new().await;
    let requirements = SqliteAccessRequirementDaoImpl::new(db.pool());
    let dao = SqliteAccessApprovalDaoImpl::new(db.pool());
    let user = db.create_user().await;
    let requirement = create_requirement(&requirements, user, terms_of_use(), &[1]).await;

    let created = dao
        .create(&AccessApproval::new(requirement, user, user))
        .await
        .expect("Failed to create approval");
    assert!(created.etag.is_some());
    assert_eq!(dao.get(created.id.unwrap()).await.unwrap(), created);
    assert!(dao.has_approval(requirement, user).await.unwrap());
    assert_eq!(dao.get_count().await.unwrap(), 1);

    let duplicate = dao
        .create(&AccessApproval::new(requirement, user, user))
        .await
        .unwrap_err();
    assert_eq!(duplicate.error_code(), "NAME_CONFLICT");
}

#[tokio::test]
async fn test_approval_for_missing_accessor_violates_integrity() {
    let db = TestDatabase::new().await;
    let requirements = SqliteAccessRequirementDaoImpl::new(db.pool());
    let dao = SqliteAccessApprovalDaoImpl::new(db.pool());
    let user = db.create_user().await;
    let requirement = create_requirement(&requirements, user, terms_of_use(), &[1]).await;

    let err = dao
        .create(&AccessApproval::new(requirement, PrincipalId::new(999), user))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "INTEGRITY_VIOLATION");
}

#[tokio::test]
async fn test_update_approval_checks_etag() {
    let db = TestDatabase::new().await;
    let requirements = SqliteAccessRequirementDaoImpl::new(db.pool());
    let dao = SqliteAccessApprovalDaoImpl::new(db.pool());
    let user = db.create_user().await;
    let requirement = create_requirement(&requirements, user, terms_of_use(), &[1]).await;
    let created = dao
        .create(&AccessApproval::new(requirement, user, user))
        .await
        .unwrap();

    let mut expiring = created.clone();
    expiring.expired_on = Some(Utc::now() - Duration::hours(1));
    let updated = dao.update(&expiring).await.unwrap();
    assert_ne!(updated.etag, created.etag);
    assert!(!dao.has_approval(requirement, user).await.unwrap());

    let err = dao.update(&created).await.unwrap_err();
    assert!(err.is_conflicting_update());
}

#[tokio::test]
async fn test_revoke_approval() {
    let db = TestDatabase::new().await;
    let requirements = SqliteAccessRequirementDaoImpl::new(db.pool());
    let dao = SqliteAccessApprovalDaoImpl::new(db.pool());
    let user = db.create_user().await;
    let reviewer = db.create_user().await;
    let requirement = create_requirement(&requirements, user, terms_of_use(), &[1]).await;
    let created = dao
        .create(&AccessApproval::new(requirement, user, user))
        .await
        .unwrap();

    assert!(dao.revoke(requirement, user, reviewer).await.unwrap());
    assert!(!dao.revoke(requirement, user, reviewer).await.unwrap());
    assert!(!dao.revoke(requirement, reviewer, reviewer).await.unwrap());

    let revoked = dao.get(created.id.unwrap()).await.unwrap();
    assert_eq!(revoked.modified_by, reviewer);
    assert_ne!(revoked.etag, created.etag);
    assert!(!dao.has_approval(requirement, user).await.unwrap());
}

#[tokio::test]
async fn test_approvals_for_accessor_and_requirements() {
    let db = TestDatabase::new().await;
    let requirements = SqliteAccessRequirementDaoImpl::new(db.pool());
    let dao = SqliteAccessApprovalDaoImpl::new(db.pool());
    let alice = db.create_user().await;
    let bob = db.create_user().await;
    let first = create_requirement(&requirements, alice, terms_of_use(), &[1]).await;
    let second = create_requirement(&requirements, alice, terms_of_use(), &[2]).await;
    let third = create_requirement(&requirements, alice, terms_of_use(), &[3]).await;

    for requirement in [first, second, third] {
        dao.create(&AccessApproval::new(requirement, alice, alice))
            .await
            .unwrap();
    }
    dao.create(&AccessApproval::new(first, bob, alice)).await.unwrap();

    let page = dao
        .get_for_accessor(alice, PageRequest::new(0, 2))
        .await
        .unwrap();
    assert_eq!(page.info.total_elements, 3);
    assert_eq!(page.content.len(), 2);
    assert_eq!(page.content[0].requirement_id, first);
    assert_eq!(page.content[1].requirement_id, second);

    let found = dao
        .get_for_requirements_and_principals(&[first, third], &[bob])
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].accessor_id, bob);
    assert_eq!(
        dao.get_for_requirements_and_principals(&[first, third], &[alice, bob])
            .await
            .unwrap()
            .len(),
        3
    );
    assert!(dao
        .get_for_requirements_and_principals(&[], &[alice])
        .await
        .unwrap()
        .is_empty());
}
