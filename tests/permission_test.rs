//! Integration tests for permission grants, authorisation queries and
//! user tokens.

mod common;

use capstan::auth::{generate_token, is_token_matching};
use capstan::models::{
    Namespace, Organization, Permission, PermissionKind, Role, SystemRole, TokenContext,
    UserToken,
};
use capstan::storage::{
    NamespaceRepository, OrganizationRepository, PermissionRepository, RoleRepository,
    UserTokenRepository,
};
use serial_test::serial;

async fn seed_org(
    db: &capstan::storage::Database,
    creator: &capstan::models::Id,
) -> Organization {
    let orgs = OrganizationRepository::new(db.clone());
    let name = common::unique("org");
    orgs.create(
        &Organization::new(&name, format!("{name}@example.com")),
        creator,
    )
    .await
    .unwrap()
}

#[tokio::test]
#[serial]
async fn test_direct_grant_allows_only_granted_kinds() {
    let Some(db) = common::database().await else {
        return;
    };
    let permissions = PermissionRepository::new(db.clone());
    let user = common::seed_user(&db).await;
    let other = common::seed_user(&db).await;
    let org = seed_org(&db, &other.id).await;

    permissions
        .create(&Permission::new(
            user.id.clone(),
            org.id.clone(),
            PermissionKind::Read,
        ))
        .await
        .unwrap();

    assert!(permissions
        .has_permission(&user.id, &org.id, &[PermissionKind::Read])
        .await
        .unwrap());
    assert!(!permissions
        .has_permission(&user.id, &org.id, &[PermissionKind::Delete])
        .await
        .unwrap());
}

#[tokio::test]
#[serial]
async fn test_all_grant_satisfies_every_kind() {
    let Some(db) = common::database().await else {
        return;
    };
    let permissions = PermissionRepository::new(db.clone());
    let user = common::seed_user(&db).await;
    let other = common::seed_user(&db).await;
    let org = seed_org(&db, &other.id).await;

    permissions
        .create(&Permission::new(
            user.id.clone(),
            org.id.clone(),
            PermissionKind::All,
        ))
        .await
        .unwrap();

    for kind in PermissionKind::all() {
        assert!(
            permissions
                .has_permission(&user.id, &org.id, &[*kind])
                .await
                .unwrap(),
            "all grant did not satisfy {kind}"
        );
    }
}

#[tokio::test]
#[serial]
async fn test_role_mediated_grant() {
    let Some(db) = common::database().await else {
        return;
    };
    let permissions = PermissionRepository::new(db.clone());
    let roles = RoleRepository::new(db.clone());
    let owner = common::seed_user(&db).await;
    let user = common::seed_user(&db).await;
    let org = seed_org(&db, &owner.id).await;

    let role = roles
        .create(&Role::new("Editors"), &org.id, &owner.id)
        .await
        .unwrap();
    // the user holds `write` on the role; the role holds an edge to the
    // organization
    permissions
        .create(&Permission::new(
            user.id.clone(),
            role.id.clone(),
            PermissionKind::Write,
        ))
        .await
        .unwrap();
    permissions
        .create(&Permission::new(
            role.id.clone(),
            org.id.clone(),
            PermissionKind::Write,
        ))
        .await
        .unwrap();

    assert!(permissions
        .has_permission(&user.id, &org.id, &[PermissionKind::Write])
        .await
        .unwrap());
    assert!(!permissions
        .has_permission(&user.id, &org.id, &[PermissionKind::Delete])
        .await
        .unwrap());
}

#[tokio::test]
#[serial]
async fn test_system_role_bypasses_permission_checks() {
    let Some(db) = common::database().await else {
        return;
    };
    db.ensure_system_roles().await.unwrap();
    let permissions = PermissionRepository::new(db.clone());
    let roles = RoleRepository::new(db.clone());
    let admin = common::seed_user(&db).await;
    let owner = common::seed_user(&db).await;
    let org = seed_org(&db, &owner.id).await;

    roles
        .add_system_member(SystemRole::Admin, &admin.id)
        .await
        .unwrap();

    assert!(permissions
        .has_permission(&admin.id, &org.id, &[PermissionKind::Delete])
        .await
        .unwrap());
    assert!(permissions
        .has_system_role(&admin.id, &[SystemRole::Admin])
        .await
        .unwrap());
    assert!(permissions
        .has_system_role(&admin.id, &[])
        .await
        .unwrap());
    assert!(!permissions
        .has_system_role(&admin.id, &[SystemRole::Owner])
        .await
        .unwrap());
    assert!(!permissions
        .has_system_role(&owner.id, &[])
        .await
        .unwrap());
}

#[tokio::test]
#[serial]
async fn test_regrant_replaces_kind_instead_of_stacking() {
    let Some(db) = common::database().await else {
        return;
    };
    let permissions = PermissionRepository::new(db.clone());
    let user = common::seed_user(&db).await;
    let other = common::seed_user(&db).await;
    let org = seed_org(&db, &other.id).await;

    let first = permissions
        .create(&Permission::new(
            user.id.clone(),
            org.id.clone(),
            PermissionKind::Read,
        ))
        .await
        .unwrap();
    let second = permissions
        .create(&Permission::new(
            user.id.clone(),
            org.id.clone(),
            PermissionKind::Write,
        ))
        .await
        .unwrap();

    // one edge per (subject, target) pair; the re-grant kept the edge ID
    // and replaced the kind
    assert_eq!(second.id, first.id);
    let grants = permissions.get_by_subject(&user.id).await.unwrap();
    assert_eq!(grants.len(), 1);
    assert_eq!(grants[0].kind, PermissionKind::Write);
    assert!(!permissions
        .has_permission(&user.id, &org.id, &[PermissionKind::Read])
        .await
        .unwrap());
}

#[tokio::test]
#[serial]
async fn test_permission_update_and_revoke() {
    let Some(db) = common::database().await else {
        return;
    };
    let permissions = PermissionRepository::new(db.clone());
    let user = common::seed_user(&db).await;
    let other = common::seed_user(&db).await;
    let org = seed_org(&db, &other.id).await;

    let mut grant = permissions
        .create(&Permission::new(
            user.id.clone(),
            org.id.clone(),
            PermissionKind::Read,
        ))
        .await
        .unwrap();
    grant.kind = PermissionKind::Write;
    let updated = permissions.update(&grant).await.unwrap();
    assert_eq!(updated.kind, PermissionKind::Write);

    permissions.delete(&grant.id).await.unwrap();
    assert!(permissions.get(&grant.id).await.unwrap_err().is_not_found());
    assert!(!permissions
        .has_permission(&user.id, &org.id, &[PermissionKind::Write])
        .await
        .unwrap());
}

#[tokio::test]
#[serial]
async fn test_has_any_relation_is_symmetric() {
    let Some(db) = common::database().await else {
        return;
    };
    let permissions = PermissionRepository::new(db.clone());
    let namespaces = NamespaceRepository::new(db.clone());
    let member = common::seed_user(&db).await;
    let stranger = common::seed_user(&db).await;
    let org = seed_org(&db, &member.id).await;
    let namespace = namespaces
        .create(&Namespace::new(common::unique("ns")), &org.id)
        .await
        .unwrap();

    // member -> org -> namespace is a path of length 2
    assert!(permissions
        .has_any_relation(&member.id, &namespace.id)
        .await
        .unwrap());
    assert!(permissions
        .has_any_relation(&namespace.id, &member.id)
        .await
        .unwrap());
    assert!(!permissions
        .has_any_relation(&stranger.id, &namespace.id)
        .await
        .unwrap());
}

#[tokio::test]
#[serial]
async fn test_one_live_token_per_user_and_context() {
    let Some(db) = common::database().await else {
        return;
    };
    let tokens = UserTokenRepository::new(db.clone());
    let user = common::seed_user(&db).await;

    let payload = serde_json::json!({"email": user.email});
    let (first_public, first_hash) = generate_token("confirm", &payload).unwrap();
    let stored = tokens
        .create(
            &UserToken::new(&user.email, &first_hash, TokenContext::Confirm),
            &user.id,
        )
        .await
        .unwrap();
    assert_eq!(stored.user.as_ref(), Some(&user.id));

    // re-issuing replaces the stored hash instead of adding a second token
    let (second_public, second_hash) = generate_token("confirm", &payload).unwrap();
    tokens
        .create(
            &UserToken::new(&user.email, &second_hash, TokenContext::Confirm),
            &user.id,
        )
        .await
        .unwrap();

    let live = tokens
        .get_by_user(&user.id, TokenContext::Confirm)
        .await
        .unwrap();
    assert_eq!(live.id, stored.id);
    assert!(!is_token_matching(&first_public, &live.token_hash));
    assert!(is_token_matching(&second_public, &live.token_hash));

    tokens
        .delete_by_user(&user.id, TokenContext::Confirm)
        .await
        .unwrap();
    assert!(tokens
        .get_by_user(&user.id, TokenContext::Confirm)
        .await
        .unwrap_err()
        .is_not_found());
}
