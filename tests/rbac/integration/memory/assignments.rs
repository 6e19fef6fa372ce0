use core::error::Error;

use palisade_rbac_store::{
    error::RbacError,
    kv::{ATTR_ETAG, KvTable as _, WriteOperation},
    repository::{
        assignment::{AssignmentStore as _, UnassignmentStatus},
        principal::PrincipalStore as _,
        resource::ResourceStore as _,
        role::RoleStore as _,
    },
};
use palisade_rbac_types::{
    key::ItemKey,
    name::{PrincipalId, ResourceName, RoleName},
};
use pretty_assertions::assert_eq;

use crate::TestStore;

async fn seed(store: &TestStore) -> Result<(), Box<dyn Error>> {
    store
        .repository
        .create_resource(&ResourceName::from("R1"), &store.cancel)
        .await?;
    store
        .repository
        .create_role(&ResourceName::from("R1"), &RoleName::from("reader"), &store.cancel)
        .await?;
    Ok(())
}

#[tokio::test]
async fn assignment_round_trip() -> Result<(), Box<dyn Error>> {
    let store = TestStore::new();
    seed(&store).await?;

    store
        .repository
        .create_assignment(
            &ResourceName::from("R1"),
            &RoleName::from("reader"),
            &PrincipalId::from("arn:p1"),
            &store.cancel,
        )
        .await?;

    let principals = store
        .repository
        .get_principals_for_role(&ResourceName::from("R1"), &RoleName::from("reader"), &store.cancel)
        .await?;
    assert_eq!(principals, [PrincipalId::from("arn:p1")]);

    let access = store
        .repository
        .get_principal_access(
            &PrincipalId::from("arn:p1"),
            &ResourceName::from("R1"),
            None,
            &store.cancel,
        )
        .await?;
    assert_eq!(access.principal_id, PrincipalId::from("arn:p1"));
    assert_eq!(access.resource_name, ResourceName::from("R1"));
    assert!(access.scopes.is_empty());
    assert_eq!(access.roles, [RoleName::from("reader")]);
    Ok(())
}

#[tokio::test]
async fn both_twin_rows_exist_with_matching_metadata() -> Result<(), Box<dyn Error>> {
    let store = TestStore::new();
    seed(&store).await?;

    store
        .repository
        .create_assignment(
            &ResourceName::from("R1"),
            &RoleName::from("reader"),
            &PrincipalId::from("arn:p1"),
            &store.cancel,
        )
        .await?;

    let by_resource = ItemKey::assignment_by_resource(
        &ResourceName::from("R1"),
        &RoleName::from("reader"),
        &PrincipalId::from("arn:p1"),
    );
    let by_principal = ItemKey::assignment_by_principal(
        &PrincipalId::from("arn:p1"),
        &ResourceName::from("R1"),
        &RoleName::from("reader"),
    );

    let primary = store
        .repository
        .table()
        .get(&by_resource, &store.cancel)
        .await?
        .expect("by-resource row should exist");
    let twin = store
        .repository
        .table()
        .get(&by_principal, &store.cancel)
        .await?
        .expect("by-principal row should exist");
    assert_eq!(primary.get(ATTR_ETAG), twin.get(ATTR_ETAG));
    Ok(())
}

#[tokio::test]
async fn assignment_requires_resource_and_role() -> Result<(), Box<dyn Error>> {
    let store = TestStore::new();

    let error = store
        .repository
        .create_assignment(
            &ResourceName::from("R1"),
            &RoleName::from("reader"),
            &PrincipalId::from("arn:p1"),
            &store.cancel,
        )
        .await
        .expect_err("assignment without resource should fail");
    assert_eq!(
        *error.current_context(),
        RbacError::ResourceNotFound(ResourceName::from("R1"))
    );

    store
        .repository
        .create_resource(&ResourceName::from("R1"), &store.cancel)
        .await?;
    let error = store
        .repository
        .create_assignment(
            &ResourceName::from("R1"),
            &RoleName::from("reader"),
            &PrincipalId::from("arn:p1"),
            &store.cancel,
        )
        .await
        .expect_err("assignment without role should fail");
    assert_eq!(
        *error.current_context(),
        RbacError::RoleNotFound {
            resource: ResourceName::from("R1"),
            role: RoleName::from("reader"),
        }
    );
    Ok(())
}

#[tokio::test]
async fn duplicate_assignment_is_a_conflict() -> Result<(), Box<dyn Error>> {
    let store = TestStore::new();
    seed(&store).await?;

    store
        .repository
        .create_assignment(
            &ResourceName::from("R1"),
            &RoleName::from("reader"),
            &PrincipalId::from("arn:p1"),
            &store.cancel,
        )
        .await?;
    let error = store
        .repository
        .create_assignment(
            &ResourceName::from("R1"),
            &RoleName::from("reader"),
            &PrincipalId::from("arn:p1"),
            &store.cancel,
        )
        .await
        .expect_err("duplicate assignment should fail");
    assert!(matches!(
        error.current_context(),
        RbacError::AlreadyExists(_)
    ));
    Ok(())
}

#[tokio::test]
async fn half_written_twin_pair_counts_as_absent() -> Result<(), Box<dyn Error>> {
    let store = TestStore::new();
    seed(&store).await?;

    store
        .repository
        .create_assignment(
            &ResourceName::from("R1"),
            &RoleName::from("reader"),
            &PrincipalId::from("arn:p1"),
            &store.cancel,
        )
        .await?;

    // Simulate a crash that lost the by-principal twin.
    let by_principal = ItemKey::assignment_by_principal(
        &PrincipalId::from("arn:p1"),
        &ResourceName::from("R1"),
        &RoleName::from("reader"),
    );
    store
        .repository
        .table()
        .batch_write(
            vec![WriteOperation::Delete(by_principal.clone())],
            &store.cancel,
        )
        .await?;

    // Re-creating the assignment heals the pair instead of reporting a conflict.
    store
        .repository
        .create_assignment(
            &ResourceName::from("R1"),
            &RoleName::from("reader"),
            &PrincipalId::from("arn:p1"),
            &store.cancel,
        )
        .await?;
    assert!(
        store
            .repository
            .table()
            .get(&by_principal, &store.cancel)
            .await?
            .is_some()
    );
    Ok(())
}

#[tokio::test]
async fn delete_assignment_is_idempotent() -> Result<(), Box<dyn Error>> {
    let store = TestStore::new();
    seed(&store).await?;

    store
        .repository
        .create_assignment(
            &ResourceName::from("R1"),
            &RoleName::from("reader"),
            &PrincipalId::from("arn:p1"),
            &store.cancel,
        )
        .await?;

    let status = store
        .repository
        .delete_assignment(
            &ResourceName::from("R1"),
            &RoleName::from("reader"),
            &PrincipalId::from("arn:p1"),
            &store.cancel,
        )
        .await?;
    assert_eq!(status, UnassignmentStatus::Unassigned);

    let status = store
        .repository
        .delete_assignment(
            &ResourceName::from("R1"),
            &RoleName::from("reader"),
            &PrincipalId::from("arn:p1"),
            &store.cancel,
        )
        .await?;
    assert_eq!(status, UnassignmentStatus::NotAssigned);

    let principals = store
        .repository
        .get_principals_for_role(&ResourceName::from("R1"), &RoleName::from("reader"), &store.cancel)
        .await?;
    assert!(principals.is_empty());
    Ok(())
}
