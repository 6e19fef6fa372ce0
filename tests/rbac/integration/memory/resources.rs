use core::error::Error;

use palisade_rbac_store::{
    error::RbacError,
    repository::{resource::ResourceStore as _, role::RoleStore as _, scope::ScopeStore as _},
};
use palisade_rbac_types::name::{ResourceName, RoleName, ScopeName};
use pretty_assertions::assert_eq;

use crate::TestStore;

#[tokio::test]
async fn create_and_list_resources() -> Result<(), Box<dyn Error>> {
    let store = TestStore::new();

    store
        .repository
        .create_resource(&ResourceName::from("api://a"), &store.cancel)
        .await?;
    store
        .repository
        .create_resource(&ResourceName::from("api://b"), &store.cancel)
        .await?;

    let names = store.repository.get_resources(&store.cancel).await?;
    assert_eq!(
        names,
        [ResourceName::from("api://a"), ResourceName::from("api://b")]
    );
    Ok(())
}

#[tokio::test]
async fn duplicate_create_is_a_conflict() -> Result<(), Box<dyn Error>> {
    let store = TestStore::new();
    let name = ResourceName::from("api://a");

    store.repository.create_resource(&name, &store.cancel).await?;
    let error = store
        .repository
        .create_resource(&name, &store.cancel)
        .await
        .expect_err("duplicate create should fail");
    assert!(matches!(
        error.current_context(),
        RbacError::AlreadyExists(_)
    ));
    Ok(())
}

#[tokio::test]
async fn invalid_names_are_rejected_before_any_write() -> Result<(), Box<dyn Error>> {
    let store = TestStore::new();

    let error = store
        .repository
        .create_resource(&ResourceName::from("api #1"), &store.cancel)
        .await
        .expect_err("invalid name should fail");
    assert_eq!(
        *error.current_context(),
        RbacError::InvalidResourceName("api #1".to_owned())
    );
    assert!(store.repository.table().is_empty().await);
    Ok(())
}

#[tokio::test]
async fn resource_view_lists_children_sorted() -> Result<(), Box<dyn Error>> {
    let store = TestStore::new();
    let name = ResourceName::from("api://a");

    store.repository.create_resource(&name, &store.cancel).await?;
    for scope in ["prod", "dev", "staging"] {
        store
            .repository
            .create_scope(&name, &ScopeName::from(scope), &store.cancel)
            .await?;
    }
    for role in ["writer", "admin", "reader"] {
        store
            .repository
            .create_role(&name, &RoleName::from(role), &store.cancel)
            .await?;
    }

    let view = store
        .repository
        .get_resource(&name, &store.cancel)
        .await?
        .expect("resource should exist");
    assert_eq!(
        view.scopes,
        [
            ScopeName::from("dev"),
            ScopeName::from("prod"),
            ScopeName::from("staging")
        ]
    );
    assert_eq!(
        view.roles,
        [
            RoleName::from("admin"),
            RoleName::from("reader"),
            RoleName::from("writer")
        ]
    );
    Ok(())
}

#[tokio::test]
async fn missing_resource_reads_as_none() -> Result<(), Box<dyn Error>> {
    let store = TestStore::new();
    let view = store
        .repository
        .get_resource(&ResourceName::from("api://ghost"), &store.cancel)
        .await?;
    assert_eq!(view, None);
    Ok(())
}

#[tokio::test]
async fn children_require_their_resource() -> Result<(), Box<dyn Error>> {
    let store = TestStore::new();
    let name = ResourceName::from("api://a");

    let error = store
        .repository
        .create_scope(&name, &ScopeName::from("prod"), &store.cancel)
        .await
        .expect_err("scope without resource should fail");
    assert_eq!(
        *error.current_context(),
        RbacError::ResourceNotFound(name.clone())
    );

    let error = store
        .repository
        .create_role(&name, &RoleName::from("reader"), &store.cancel)
        .await
        .expect_err("role without resource should fail");
    assert_eq!(
        *error.current_context(),
        RbacError::ResourceNotFound(name)
    );
    Ok(())
}

#[tokio::test]
async fn cancelled_calls_fail_promptly() -> Result<(), Box<dyn Error>> {
    let store = TestStore::new();
    store.cancel.cancel();

    let error = store
        .repository
        .create_resource(&ResourceName::from("api://a"), &store.cancel)
        .await
        .expect_err("cancelled call should fail");
    assert_eq!(*error.current_context(), RbacError::Cancelled);
    Ok(())
}
