use error_stack::{Report, ResultExt as _};
use futures::try_join;
use palisade_rbac_types::{
    entity::{Resource, ResourceView, Role, Scope},
    event::SaveAction,
    key::{self, ASSIGNMENT_MARKER, ETag, ItemKey, RESOURCE_MARKER, ROLE_MARKER, SCOPE_MARKER},
    name::ResourceName,
};
use tokio_util::sync::CancellationToken;

use super::{RbacRepository, read_failure, write_failure};
use crate::{
    error::RbacError,
    kv::{KvTable, WritePrecondition},
    record::ItemRecord as _,
    validator::NameValidator,
};

/// Describes the store surface for resources.
pub trait ResourceStore {
    /// Creates the resource row, failing if it already exists.
    ///
    /// # Errors
    ///
    /// - [`RbacError::InvalidResourceName`] before any I/O
    /// - [`RbacError::AlreadyExists`] if the resource is present or a concurrent create
    ///   won the race
    fn create_resource(
        &self,
        name: &ResourceName,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<(), Report<RbacError>>> + Send;

    /// Materializes the resource together with its scopes and roles, both sorted
    /// ascending; `None` if the resource row is absent.
    fn get_resource(
        &self,
        name: &ResourceName,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Option<ResourceView>, Report<RbacError>>> + Send;

    /// Every resource name, sorted ascending.
    fn get_resources(
        &self,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Vec<ResourceName>, Report<RbacError>>> + Send;

    /// Deletes the resource and, transitively, its scopes, roles, and assignments in
    /// both views. Idempotent: deleting an absent resource is a no-op and emits no
    /// event.
    fn delete_resource(
        &self,
        name: &ResourceName,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<(), Report<RbacError>>> + Send;
}

impl<T, V> ResourceStore for RbacRepository<T, V>
where
    T: KvTable,
    V: NameValidator,
{
    #[tracing::instrument(level = "debug", skip(self, cancel))]
    async fn create_resource(
        &self,
        name: &ResourceName,
        cancel: &CancellationToken,
    ) -> Result<(), Report<RbacError>> {
        if !self.validator().is_valid_resource_name(name) {
            return Err(Report::new(RbacError::InvalidResourceName(
                name.to_string(),
            )));
        }
        Self::ensure_active(cancel)?;

        let resource = Resource {
            resource_name: name.clone(),
        };
        let key = resource.key();
        let attributes = resource
            .to_attributes(ETag::generate())
            .change_context(RbacError::Internal)?;
        self.table()
            .put(attributes, WritePrecondition::NotExists, cancel)
            .await
            .map_err(|report| write_failure(report, RbacError::AlreadyExists(key.clone())))?;

        let changes = self.tracked_changes(SaveAction::Created, None, Some(&resource))?;
        self.record_event(SaveAction::Created, &key, changes, cancel)
            .await
    }

    #[tracing::instrument(level = "debug", skip(self, cancel))]
    async fn get_resource(
        &self,
        name: &ResourceName,
        cancel: &CancellationToken,
    ) -> Result<Option<ResourceView>, Report<RbacError>> {
        if !self.validator().is_valid_resource_name(name) {
            return Err(Report::new(RbacError::InvalidResourceName(
                name.to_string(),
            )));
        }
        Self::ensure_active(cancel)?;

        let resource_key = ItemKey::resource(name);
        let partition = key::resource_partition(name);

        let (resource_row, scope_rows, role_rows) = try_join!(
            async {
                self.table()
                    .get(&resource_key, cancel)
                    .await
                    .map_err(read_failure)
            },
            async {
                self.table()
                    .scan(&partition, SCOPE_MARKER, cancel)
                    .await
                    .map_err(read_failure)
            },
            async {
                self.table()
                    .scan(&partition, ROLE_MARKER, cancel)
                    .await
                    .map_err(read_failure)
            },
        )?;

        if resource_row
            .as_ref()
            .and_then(Resource::from_attributes)
            .is_none()
        {
            return Ok(None);
        }

        let mut scopes: Vec<_> = scope_rows
            .iter()
            .filter_map(Scope::from_attributes)
            .map(|decoded| decoded.record.scope_name)
            .collect();
        scopes.sort_unstable();

        let mut roles: Vec<_> = role_rows
            .iter()
            .filter_map(Role::from_attributes)
            .map(|decoded| decoded.record.role_name)
            .collect();
        roles.sort_unstable();

        Ok(Some(ResourceView {
            resource_name: name.clone(),
            scopes,
            roles,
        }))
    }

    #[tracing::instrument(level = "debug", skip(self, cancel))]
    async fn get_resources(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<ResourceName>, Report<RbacError>> {
        Self::ensure_active(cancel)?;
        let rows = self
            .table()
            .scan(RESOURCE_MARKER, RESOURCE_MARKER, cancel)
            .await
            .map_err(read_failure)?;
        let mut names: Vec<_> = rows
            .iter()
            .filter_map(Resource::from_attributes)
            .map(|decoded| decoded.record.resource_name)
            .collect();
        names.sort_unstable();
        Ok(names)
    }

    #[tracing::instrument(level = "debug", skip(self, cancel))]
    async fn delete_resource(
        &self,
        name: &ResourceName,
        cancel: &CancellationToken,
    ) -> Result<(), Report<RbacError>> {
        if !self.validator().is_valid_resource_name(name) {
            return Err(Report::new(RbacError::InvalidResourceName(
                name.to_string(),
            )));
        }
        Self::ensure_active(cancel)?;

        let resource_key = ItemKey::resource(name);
        let partition = key::resource_partition(name);

        let existing = self
            .table()
            .get(&resource_key, cancel)
            .await
            .map_err(read_failure)?
            .as_ref()
            .and_then(Resource::from_attributes);

        try_join!(
            async {
                if let Some(decoded) = &existing {
                    self.table()
                        .delete(
                            &resource_key,
                            WritePrecondition::EtagMatches(decoded.etag),
                            cancel,
                        )
                        .await
                        .map_err(|report| {
                            write_failure(
                                report,
                                RbacError::ConcurrentModification(resource_key.clone()),
                            )
                        })
                } else {
                    Ok(())
                }
            },
            self.purge_rows(&partition, SCOPE_MARKER, cancel),
            self.purge_rows(&partition, ROLE_MARKER, cancel),
            self.purge_assignment_rows(&partition, ASSIGNMENT_MARKER, cancel),
        )?;

        if existing.is_some() {
            self.record_event(SaveAction::Deleted, &resource_key, Vec::new(), cancel)
                .await?;
        }
        Ok(())
    }
}
