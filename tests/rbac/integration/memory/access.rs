use core::error::Error;

use palisade_rbac_store::{
    kv::{KvTable as _, WritePrecondition},
    repository::{
        assignment::AssignmentStore as _, principal::PrincipalStore as _,
        resource::ResourceStore as _, role::RoleStore as _, scope::ScopeStore as _,
    },
};
use palisade_rbac_types::{
    key::ItemKey,
    name::{PrincipalId, ResourceName, RoleName, ScopeName},
};
use pretty_assertions::assert_eq;

use crate::TestStore;

async fn seed(store: &TestStore) -> Result<(), Box<dyn Error>> {
    let resource = ResourceName::from("R1");
    store
        .repository
        .create_resource(&resource, &store.cancel)
        .await?;
    for scope in ["prod", "dev"] {
        store
            .repository
            .create_scope(&resource, &ScopeName::from(scope), &store.cancel)
            .await?;
    }
    store
        .repository
        .create_role(&resource, &RoleName::from("reader"), &store.cancel)
        .await?;
    store
        .repository
        .create_assignment(
            &resource,
            &RoleName::from("reader"),
            &PrincipalId::from("arn:p1"),
            &store.cancel,
        )
        .await?;
    Ok(())
}

#[tokio::test]
async fn default_scope_expands_to_every_scope_of_the_resource() -> Result<(), Box<dyn Error>> {
    let store = TestStore::new();
    seed(&store).await?;

    let access = store
        .repository
        .get_principal_access(
            &PrincipalId::from("arn:p1"),
            &ResourceName::from("R1"),
            Some(&ScopeName::from(".default")),
            &store.cancel,
        )
        .await?;
    assert_eq!(access.scopes, [ScopeName::from("dev"), ScopeName::from("prod")]);
    assert_eq!(access.roles, [RoleName::from("reader")]);
    Ok(())
}

#[tokio::test]
async fn requested_scope_narrows_the_view() -> Result<(), Box<dyn Error>> {
    let store = TestStore::new();
    seed(&store).await?;

    let access = store
        .repository
        .get_principal_access(
            &PrincipalId::from("arn:p1"),
            &ResourceName::from("R1"),
            Some(&ScopeName::from("prod")),
            &store.cancel,
        )
        .await?;
    assert_eq!(access.scopes, [ScopeName::from("prod")]);
    Ok(())
}

#[tokio::test]
async fn stale_assignments_to_deleted_roles_are_dropped() -> Result<(), Box<dyn Error>> {
    let store = TestStore::new();
    seed(&store).await?;

    // Remove the role row out-of-band, leaving the assignment rows stale.
    let role_key = ItemKey::role(&ResourceName::from("R1"), &RoleName::from("reader"));
    store
        .repository
        .table()
        .delete(&role_key, WritePrecondition::None, &store.cancel)
        .await?;

    let access = store
        .repository
        .get_principal_access(
            &PrincipalId::from("arn:p1"),
            &ResourceName::from("R1"),
            None,
            &store.cancel,
        )
        .await?;
    assert!(access.roles.is_empty());
    Ok(())
}

#[tokio::test]
async fn principal_resources_are_sorted_and_deduplicated() -> Result<(), Box<dyn Error>> {
    let store = TestStore::new();

    for resource in ["api://b", "api://a"] {
        let resource = ResourceName::from(resource);
        store
            .repository
            .create_resource(&resource, &store.cancel)
            .await?;
        for role in ["reader", "writer"] {
            store
                .repository
                .create_role(&resource, &RoleName::from(role), &store.cancel)
                .await?;
            store
                .repository
                .create_assignment(
                    &resource,
                    &RoleName::from(role),
                    &PrincipalId::from("arn:p1"),
                    &store.cancel,
                )
                .await?;
        }
    }

    let resources = store
        .repository
        .get_principal_resources(&PrincipalId::from("arn:p1"), &store.cancel)
        .await?;
    assert_eq!(
        resources,
        [ResourceName::from("api://a"), ResourceName::from("api://b")]
    );
    Ok(())
}

#[tokio::test]
async fn access_to_a_missing_resource_is_empty() -> Result<(), Box<dyn Error>> {
    let store = TestStore::new();

    let access = store
        .repository
        .get_principal_access(
            &PrincipalId::from("arn:p1"),
            &ResourceName::from("R1"),
            None,
            &store.cancel,
        )
        .await?;
    assert!(access.roles.is_empty());
    assert!(access.scopes.is_empty());
    Ok(())
}
