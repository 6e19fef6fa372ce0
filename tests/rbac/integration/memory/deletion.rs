use core::error::Error;

use palisade_rbac_store::{
    kv::KvTable as _,
    repository::{
        assignment::AssignmentStore as _, events::EventLog as _, principal::PrincipalStore as _,
        resource::ResourceStore as _, role::RoleStore as _, scope::ScopeStore as _,
    },
};
use palisade_rbac_types::{
    key,
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
    store
        .repository
        .create_role(&resource, &RoleName::from("reader"), &store.cancel)
        .await?;
    store
        .repository
        .create_scope(&resource, &ScopeName::from("prod"), &store.cancel)
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
async fn deleting_a_resource_cascades_to_every_child() -> Result<(), Box<dyn Error>> {
    let store = TestStore::new();
    seed(&store).await?;

    let resource = ResourceName::from("R1");
    store
        .repository
        .delete_resource(&resource, &store.cancel)
        .await?;

    assert_eq!(
        store.repository.get_resource(&resource, &store.cancel).await?,
        None
    );
    assert!(
        store
            .repository
            .get_principals_for_role(&resource, &RoleName::from("reader"), &store.cancel)
            .await?
            .is_empty()
    );
    let access = store
        .repository
        .get_principal_access(
            &PrincipalId::from("arn:p1"),
            &resource,
            None,
            &store.cancel,
        )
        .await?;
    assert!(access.roles.is_empty());
    assert!(access.scopes.is_empty());

    // No row survives under the resource partition nor under the principal view.
    let children = store
        .repository
        .table()
        .query(&key::resource_partition(&resource), "", &store.cancel)
        .await?;
    assert!(children.is_empty());
    let resource_rows = store
        .repository
        .table()
        .query(key::RESOURCE_MARKER, key::RESOURCE_MARKER, &store.cancel)
        .await?;
    assert!(resource_rows.is_empty());
    let principal_rows = store
        .repository
        .table()
        .query(
            &key::principal_partition(&PrincipalId::from("arn:p1")),
            "",
            &store.cancel,
        )
        .await?;
    assert!(principal_rows.is_empty());
    Ok(())
}

#[tokio::test]
async fn deleting_a_resource_twice_is_idempotent() -> Result<(), Box<dyn Error>> {
    let store = TestStore::new();
    seed(&store).await?;

    let resource = ResourceName::from("R1");
    store
        .repository
        .delete_resource(&resource, &store.cancel)
        .await?;
    let events_after_first = store.repository.get_events(100, &store.cancel).await?.len();

    store
        .repository
        .delete_resource(&resource, &store.cancel)
        .await?;
    let events_after_second = store.repository.get_events(100, &store.cancel).await?.len();

    // The second delete found nothing and emitted no event.
    assert_eq!(events_after_first, events_after_second);
    Ok(())
}

#[tokio::test]
async fn deleting_a_role_cascades_to_its_assignments_only() -> Result<(), Box<dyn Error>> {
    let store = TestStore::new();
    seed(&store).await?;

    let resource = ResourceName::from("R1");
    store
        .repository
        .delete_role(&resource, &RoleName::from("reader"), &store.cancel)
        .await?;

    assert!(
        store
            .repository
            .get_principals_for_role(&resource, &RoleName::from("reader"), &store.cancel)
            .await?
            .is_empty()
    );
    let principal_rows = store
        .repository
        .table()
        .query(
            &key::principal_partition(&PrincipalId::from("arn:p1")),
            "",
            &store.cancel,
        )
        .await?;
    assert!(principal_rows.is_empty());

    // The scope and the resource itself are untouched.
    let view = store
        .repository
        .get_resource(&resource, &store.cancel)
        .await?
        .expect("resource should survive");
    assert_eq!(view.scopes, [ScopeName::from("prod")]);
    assert!(view.roles.is_empty());
    Ok(())
}

#[tokio::test]
async fn deleting_a_scope_leaves_assignments_alone() -> Result<(), Box<dyn Error>> {
    let store = TestStore::new();
    seed(&store).await?;

    let resource = ResourceName::from("R1");
    store
        .repository
        .delete_scope(&resource, &ScopeName::from("prod"), &store.cancel)
        .await?;

    assert_eq!(
        store
            .repository
            .get_principals_for_role(&resource, &RoleName::from("reader"), &store.cancel)
            .await?,
        [PrincipalId::from("arn:p1")]
    );
    Ok(())
}

#[tokio::test]
async fn deleting_a_principal_removes_both_views() -> Result<(), Box<dyn Error>> {
    let store = TestStore::new();
    seed(&store).await?;

    let principal = PrincipalId::from("arn:p1");
    store
        .repository
        .delete_principal(&principal, &store.cancel)
        .await?;

    assert!(
        store
            .repository
            .get_principals_for_role(
                &ResourceName::from("R1"),
                &RoleName::from("reader"),
                &store.cancel
            )
            .await?
            .is_empty()
    );
    assert!(
        store
            .repository
            .get_principal_resources(&principal, &store.cancel)
            .await?
            .is_empty()
    );
    Ok(())
}
