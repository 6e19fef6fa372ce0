use core::{
    error::Error,
    sync::atomic::{AtomicBool, Ordering},
};

use error_stack::Report;
use futures::join;
use palisade_rbac_store::{
    config::StoreConfig,
    error::RbacError,
    kv::{
        AttributeMap, KvError, KvTable, WriteOperation, WritePrecondition, memory::InMemoryTable,
    },
    repository::{
        RbacRepository, assignment::{AssignmentStore as _, UnassignmentStatus},
        resource::ResourceStore as _, role::RoleStore as _,
    },
};
use palisade_rbac_types::{
    key::ItemKey,
    name::{PrincipalId, ResourceName, RoleName},
};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use crate::TestStore;

/// Forwards to an in-memory table, but the first conditional delete finds its row
/// already taken by a simulated concurrent winner.
#[derive(Debug, Default)]
struct ContendedTable {
    inner: InMemoryTable,
    raced: AtomicBool,
}

impl KvTable for ContendedTable {
    async fn put(
        &self,
        item: AttributeMap,
        precondition: WritePrecondition,
        cancel: &CancellationToken,
    ) -> Result<(), Report<KvError>> {
        self.inner.put(item, precondition, cancel).await
    }

    async fn get(
        &self,
        key: &ItemKey,
        cancel: &CancellationToken,
    ) -> Result<Option<AttributeMap>, Report<KvError>> {
        self.inner.get(key, cancel).await
    }

    async fn delete(
        &self,
        key: &ItemKey,
        precondition: WritePrecondition,
        cancel: &CancellationToken,
    ) -> Result<(), Report<KvError>> {
        if matches!(precondition, WritePrecondition::EtagMatches(_))
            && !self.raced.swap(true, Ordering::SeqCst)
        {
            self.inner
                .delete(key, WritePrecondition::None, cancel)
                .await?;
        }
        self.inner.delete(key, precondition, cancel).await
    }

    async fn batch_write(
        &self,
        operations: Vec<WriteOperation>,
        cancel: &CancellationToken,
    ) -> Result<(), Report<KvError>> {
        self.inner.batch_write(operations, cancel).await
    }

    async fn query(
        &self,
        partition: &str,
        prefix: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<AttributeMap>, Report<KvError>> {
        self.inner.query(partition, prefix, cancel).await
    }

    async fn scan(
        &self,
        partition: &str,
        prefix: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<AttributeMap>, Report<KvError>> {
        self.inner.scan(partition, prefix, cancel).await
    }
}

#[tokio::test]
async fn losing_a_delete_race_surfaces_the_etag_mismatch() -> Result<(), Box<dyn Error>> {
    let repository = RbacRepository::new(ContendedTable::default(), &StoreConfig::new("rbac-test"));
    let cancel = CancellationToken::new();

    let resource = ResourceName::from("R1");
    repository.create_resource(&resource, &cancel).await?;
    repository
        .create_role(&resource, &RoleName::from("reader"), &cancel)
        .await?;
    repository
        .create_assignment(
            &resource,
            &RoleName::from("reader"),
            &PrincipalId::from("arn:p1"),
            &cancel,
        )
        .await?;

    let error = repository
        .delete_assignment(
            &resource,
            &RoleName::from("reader"),
            &PrincipalId::from("arn:p1"),
            &cancel,
        )
        .await
        .expect_err("losing the race should fail");
    assert!(matches!(
        error.current_context(),
        RbacError::ConcurrentModification(_)
    ));
    Ok(())
}

#[tokio::test]
async fn at_most_one_concurrent_unassignment_wins() -> Result<(), Box<dyn Error>> {
    let store = TestStore::new();
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
        .create_assignment(
            &resource,
            &RoleName::from("reader"),
            &PrincipalId::from("arn:p1"),
            &store.cancel,
        )
        .await?;

    let role = RoleName::from("reader");
    let principal = PrincipalId::from("arn:p1");
    let (first, second) = join!(
        store
            .repository
            .delete_assignment(&resource, &role, &principal, &store.cancel),
        store
            .repository
            .delete_assignment(&resource, &role, &principal, &store.cancel),
    );

    let winners = [&first, &second]
        .into_iter()
        .filter(|outcome| matches!(outcome, Ok(UnassignmentStatus::Unassigned)))
        .count();
    assert_eq!(winners, 1);

    // The loser either observed absence or lost the ETag race; never a second win.
    for outcome in [first, second] {
        match outcome {
            Ok(status) if status == UnassignmentStatus::Unassigned => {}
            Ok(status) => assert_eq!(status, UnassignmentStatus::NotAssigned),
            Err(error) => assert!(matches!(
                error.current_context(),
                RbacError::ConcurrentModification(_)
            )),
        }
    }
    Ok(())
}
