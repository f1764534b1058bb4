//! Integration tests for the containment hierarchy: organizations,
//! namespaces, projects and roles.

mod common;

use capstan::models::{Namespace, Organization, Project, Role};
use capstan::storage::{
    NamespaceRepository, OrganizationRepository, ProjectRepository, RoleRepository,
};
use serial_test::serial;

#[tokio::test]
#[serial]
async fn test_organization_creator_is_first_member() {
    let Some(db) = common::database().await else {
        return;
    };
    let orgs = OrganizationRepository::new(db.clone());
    let creator = common::seed_user(&db).await;

    let name = common::unique("org");
    let org = Organization::new(&name, format!("{name}@example.com"));
    let stored = orgs.create(&org, &creator.id).await.unwrap();

    assert!(!stored.id.is_nil());
    assert_eq!(stored.members, vec![creator.id]);
}

#[tokio::test]
#[serial]
async fn test_organization_create_with_missing_creator_fails() {
    let Some(db) = common::database().await else {
        return;
    };
    let orgs = OrganizationRepository::new(db);
    let ghost = capstan::models::Id::new(capstan::models::EntityKind::User);
    let org = Organization::new("nowhere", "nowhere@example.com");
    let err = orgs.create(&org, &ghost).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
#[serial]
async fn test_membership_is_idempotent() {
    let Some(db) = common::database().await else {
        return;
    };
    let orgs = OrganizationRepository::new(db.clone());
    let creator = common::seed_user(&db).await;
    let joiner = common::seed_user(&db).await;

    let name = common::unique("org");
    let org = orgs
        .create(
            &Organization::new(&name, format!("{name}@example.com")),
            &creator.id,
        )
        .await
        .unwrap();

    orgs.add_member(&org.id, &joiner.id).await.unwrap();
    orgs.add_member(&org.id, &joiner.id).await.unwrap();
    let after = orgs.get(&org.id).await.unwrap();
    assert_eq!(after.members.len(), 2);

    orgs.remove_member(&org.id, &joiner.id).await.unwrap();
    orgs.remove_member(&org.id, &joiner.id).await.unwrap();
    let after = orgs.get(&org.id).await.unwrap();
    assert_eq!(after.members, vec![creator.id]);
}

#[tokio::test]
#[serial]
async fn test_namespace_and_project_nesting() {
    let Some(db) = common::database().await else {
        return;
    };
    let orgs = OrganizationRepository::new(db.clone());
    let namespaces = NamespaceRepository::new(db.clone());
    let projects = ProjectRepository::new(db.clone());
    let creator = common::seed_user(&db).await;

    let name = common::unique("org");
    let org = orgs
        .create(
            &Organization::new(&name, format!("{name}@example.com")),
            &creator.id,
        )
        .await
        .unwrap();
    let namespace = namespaces
        .create(&Namespace::new(common::unique("platform")), &org.id)
        .await
        .unwrap();
    let key: String = common::unique("k")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(6)
        .collect::<String>()
        .to_uppercase();
    let project = projects
        .create(&Project::new(&key, "Capstan"), &namespace.id)
        .await
        .unwrap();

    let org = orgs.get(&org.id).await.unwrap();
    assert!(org.namespaces.contains(&namespace.id));

    let namespace = namespaces.get(&namespace.id).await.unwrap();
    assert!(namespace.projects.contains(&project.id));

    let by_key = projects.get_by_key(&key).await.unwrap();
    assert_eq!(by_key.id, project.id);
}

#[tokio::test]
#[serial]
async fn test_organization_delete_detaches_children() {
    let Some(db) = common::database().await else {
        return;
    };
    let orgs = OrganizationRepository::new(db.clone());
    let namespaces = NamespaceRepository::new(db.clone());
    let creator = common::seed_user(&db).await;

    let name = common::unique("org");
    let org = orgs
        .create(
            &Organization::new(&name, format!("{name}@example.com")),
            &creator.id,
        )
        .await
        .unwrap();
    let namespace = namespaces
        .create(&Namespace::new(common::unique("platform")), &org.id)
        .await
        .unwrap();

    orgs.delete(&org.id).await.unwrap();
    assert!(orgs.get(&org.id).await.unwrap_err().is_not_found());
    // the namespace node survives; only the containment edge is gone
    assert!(namespaces.get(&namespace.id).await.is_ok());
}

#[tokio::test]
#[serial]
async fn test_role_creator_becomes_member_with_grant() {
    let Some(db) = common::database().await else {
        return;
    };
    let orgs = OrganizationRepository::new(db.clone());
    let roles = RoleRepository::new(db.clone());
    let creator = common::seed_user(&db).await;

    let name = common::unique("org");
    let org = orgs
        .create(
            &Organization::new(&name, format!("{name}@example.com")),
            &creator.id,
        )
        .await
        .unwrap();

    let role = roles
        .create(&Role::new("Maintainers"), &org.id, &creator.id)
        .await
        .unwrap();
    assert_eq!(role.members, vec![creator.id.clone()]);
    assert!(!role.system);

    let org = orgs.get(&org.id).await.unwrap();
    assert!(org.teams.contains(&role.id));

    roles.add_member(&role.id, &creator.id).await.unwrap();
    let after = roles.get(&role.id).await.unwrap();
    assert_eq!(after.members.len(), 1);
}
