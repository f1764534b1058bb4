//! Integration tests for the user repository.
//!
//! Requires a live database; see `common` for the environment variables.

mod common;

use capstan::auth::UNUSABLE_PASSWORD;
use capstan::models::{User, UserStatus};
use capstan::storage::UserRepository;
use serial_test::serial;

#[tokio::test]
#[serial]
async fn test_create_assigns_id_and_created_at() {
    let Some(db) = common::database().await else {
        return;
    };
    let users = UserRepository::new(db);
    let name = common::unique("create");
    let user = User::new(&name, format!("{name}@example.com"), "$2b$04$hash");

    let stored = users.create(&user).await.unwrap();
    assert!(!stored.id.is_nil());
    assert!(stored.created_at.is_some());
    assert!(stored.updated_at.is_none());
    assert_eq!(stored.username, name);
    assert_eq!(stored.status, UserStatus::Pending);
}

#[tokio::test]
#[serial]
async fn test_get_by_email_matches_get() {
    let Some(db) = common::database().await else {
        return;
    };
    let users = UserRepository::new(db.clone());
    let stored = common::seed_user(&db).await;

    let by_id = users.get(&stored.id).await.unwrap();
    let by_email = users.get_by_email(&stored.email).await.unwrap();
    assert_eq!(by_id.id, by_email.id);
    assert_eq!(by_id.username, by_email.username);
}

#[tokio::test]
#[serial]
async fn test_get_missing_user_is_not_found() {
    let Some(db) = common::database().await else {
        return;
    };
    let users = UserRepository::new(db);
    let id = capstan::models::Id::new(capstan::models::EntityKind::User);
    let err = users.get(&id).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
#[serial]
async fn test_update_stamps_updated_at_and_keeps_created_at() {
    let Some(db) = common::database().await else {
        return;
    };
    let users = UserRepository::new(db.clone());
    let mut stored = common::seed_user(&db).await;
    let created_at = stored.created_at;

    stored.title = Some("Engineer".to_string());
    stored.status = UserStatus::Active;
    let updated = users.update(&stored).await.unwrap();

    assert_eq!(updated.title.as_deref(), Some("Engineer"));
    assert_eq!(updated.status, UserStatus::Active);
    assert!(updated.updated_at.is_some());
    let drift = (updated.created_at.unwrap() - created_at.unwrap())
        .num_milliseconds()
        .abs();
    assert!(drift <= 100, "created_at drifted by {drift} ms");
}

#[tokio::test]
#[serial]
async fn test_update_rejects_illegal_status_transition() {
    let Some(db) = common::database().await else {
        return;
    };
    let users = UserRepository::new(db.clone());
    let mut stored = common::seed_user(&db).await;

    // pending -> inactive skips a lifecycle step
    stored.status = UserStatus::Inactive;
    assert!(users.update(&stored).await.is_err());
}

#[tokio::test]
#[serial]
async fn test_soft_delete_keeps_node_and_disables_login() {
    let Some(db) = common::database().await else {
        return;
    };
    let users = UserRepository::new(db.clone());
    let stored = common::seed_user(&db).await;

    users.delete(&stored.id, false).await.unwrap();
    let after = users.get(&stored.id).await.unwrap();
    assert_eq!(after.status, UserStatus::Deleted);
    assert_eq!(after.password, UNUSABLE_PASSWORD);
}

#[tokio::test]
#[serial]
async fn test_force_delete_removes_node() {
    let Some(db) = common::database().await else {
        return;
    };
    let users = UserRepository::new(db.clone());
    let stored = common::seed_user(&db).await;

    users.delete(&stored.id, true).await.unwrap();
    assert!(users.get(&stored.id).await.unwrap_err().is_not_found());

    // deleting again is not an error
    users.delete(&stored.id, true).await.unwrap();
}

#[tokio::test]
#[serial]
async fn test_get_all_respects_limit() {
    let Some(db) = common::database().await else {
        return;
    };
    let users = UserRepository::new(db.clone());
    for _ in 0..3 {
        common::seed_user(&db).await;
    }
    let page = users.get_all(0, 2).await.unwrap();
    assert!(page.len() <= 2);
}
