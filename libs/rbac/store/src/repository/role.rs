use error_stack::{Report, ResultExt as _};
use futures::try_join;
use palisade_rbac_types::{
    entity::Role,
    event::SaveAction,
    key::{self, ETag, ItemKey},
    name::{ResourceName, RoleName},
};
use tokio_util::sync::CancellationToken;

use super::{RbacRepository, read_failure, write_failure};
use crate::{
    error::RbacError,
    kv::{KvTable, WritePrecondition},
    record::ItemRecord as _,
    validator::NameValidator,
};

/// Describes the store surface for roles.
pub trait RoleStore {
    /// Creates a role under an existing resource.
    ///
    /// # Errors
    ///
    /// - [`RbacError::ResourceNotFound`] if the owning resource is absent
    /// - [`RbacError::AlreadyExists`] if the role is present
    fn create_role(
        &self,
        resource: &ResourceName,
        role: &RoleName,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<(), Report<RbacError>>> + Send;

    fn get_role(
        &self,
        resource: &ResourceName,
        role: &RoleName,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Option<Role>, Report<RbacError>>> + Send;

    /// Deletes the role and, transitively, every assignment referencing it in both
    /// views. Idempotent: deleting an absent role is a no-op and emits no event.
    fn delete_role(
        &self,
        resource: &ResourceName,
        role: &RoleName,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<(), Report<RbacError>>> + Send;
}

impl<T, V> RbacRepository<T, V>
where
    T: KvTable,
    V: NameValidator,
{
    pub(crate) fn validate_role_names(
        &self,
        resource: &ResourceName,
        role: &RoleName,
    ) -> Result<(), Report<RbacError>> {
        if !self.validator().is_valid_resource_name(resource) {
            return Err(Report::new(RbacError::InvalidResourceName(
                resource.to_string(),
            )));
        }
        if !self.validator().is_valid_role_name(role) {
            return Err(Report::new(RbacError::InvalidRoleName(role.to_string())));
        }
        Ok(())
    }
}

impl<T, V> RoleStore for RbacRepository<T, V>
where
    T: KvTable,
    V: NameValidator,
{
    #[tracing::instrument(level = "debug", skip(self, cancel))]
    async fn create_role(
        &self,
        resource: &ResourceName,
        role: &RoleName,
        cancel: &CancellationToken,
    ) -> Result<(), Report<RbacError>> {
        self.validate_role_names(resource, role)?;
        Self::ensure_active(cancel)?;
        self.require_resource(resource, cancel).await?;

        let entity = Role {
            resource_name: resource.clone(),
            role_name: role.clone(),
        };
        let key = entity.key();
        let attributes = entity
            .to_attributes(ETag::generate())
            .change_context(RbacError::Internal)?;
        self.table()
            .put(attributes, WritePrecondition::NotExists, cancel)
            .await
            .map_err(|report| write_failure(report, RbacError::AlreadyExists(key.clone())))?;

        let changes = self.tracked_changes(SaveAction::Created, None, Some(&entity))?;
        self.record_event(SaveAction::Created, &key, changes, cancel)
            .await
    }

    #[tracing::instrument(level = "debug", skip(self, cancel))]
    async fn get_role(
        &self,
        resource: &ResourceName,
        role: &RoleName,
        cancel: &CancellationToken,
    ) -> Result<Option<Role>, Report<RbacError>> {
        self.validate_role_names(resource, role)?;
        Self::ensure_active(cancel)?;

        let row = self
            .table()
            .get(&ItemKey::role(resource, role), cancel)
            .await
            .map_err(read_failure)?;
        Ok(row
            .as_ref()
            .and_then(Role::from_attributes)
            .map(|decoded| decoded.record))
    }

    #[tracing::instrument(level = "debug", skip(self, cancel))]
    async fn delete_role(
        &self,
        resource: &ResourceName,
        role: &RoleName,
        cancel: &CancellationToken,
    ) -> Result<(), Report<RbacError>> {
        self.validate_role_names(resource, role)?;
        Self::ensure_active(cancel)?;

        let key = ItemKey::role(resource, role);
        let existing = self
            .table()
            .get(&key, cancel)
            .await
            .map_err(read_failure)?
            .as_ref()
            .and_then(Role::from_attributes);
        let Some(decoded) = existing else {
            return Ok(());
        };

        let partition = key::resource_partition(resource);
        let prefix = key::assignments_for_role_prefix(role);
        try_join!(
            async {
                self.table()
                    .delete(&key, WritePrecondition::EtagMatches(decoded.etag), cancel)
                    .await
                    .map_err(|report| {
                        write_failure(report, RbacError::ConcurrentModification(key.clone()))
                    })
            },
            self.purge_assignment_rows(&partition, &prefix, cancel),
        )?;

        self.record_event(SaveAction::Deleted, &key, Vec::new(), cancel)
            .await
    }
}
