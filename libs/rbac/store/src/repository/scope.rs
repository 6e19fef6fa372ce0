use error_stack::{Report, ResultExt as _};
use palisade_rbac_types::{
    entity::{Resource, Scope},
    event::SaveAction,
    key::{ETag, ItemKey},
    name::{ResourceName, ScopeName},
};
use tokio_util::sync::CancellationToken;

use super::{RbacRepository, read_failure, write_failure};
use crate::{
    error::RbacError,
    kv::{KvTable, WritePrecondition},
    record::ItemRecord as _,
    validator::NameValidator,
};

/// Describes the store surface for scopes.
///
/// Deleting a scope never touches assignments: scopes do not gate individual
/// assignments, callers filter access by scope at read time.
pub trait ScopeStore {
    /// Creates a scope under an existing resource.
    ///
    /// # Errors
    ///
    /// - [`RbacError::ResourceNotFound`] if the owning resource is absent
    /// - [`RbacError::AlreadyExists`] if the scope is present
    fn create_scope(
        &self,
        resource: &ResourceName,
        scope: &ScopeName,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<(), Report<RbacError>>> + Send;

    fn get_scope(
        &self,
        resource: &ResourceName,
        scope: &ScopeName,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Option<Scope>, Report<RbacError>>> + Send;

    /// Idempotent: deleting an absent scope is a no-op and emits no event.
    fn delete_scope(
        &self,
        resource: &ResourceName,
        scope: &ScopeName,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<(), Report<RbacError>>> + Send;
}

impl<T, V> RbacRepository<T, V>
where
    T: KvTable,
    V: NameValidator,
{
    fn validate_scope_names(
        &self,
        resource: &ResourceName,
        scope: &ScopeName,
    ) -> Result<(), Report<RbacError>> {
        if !self.validator().is_valid_resource_name(resource) {
            return Err(Report::new(RbacError::InvalidResourceName(
                resource.to_string(),
            )));
        }
        if !self.validator().is_valid_scope_name(scope) {
            return Err(Report::new(RbacError::InvalidScopeName(scope.to_string())));
        }
        Ok(())
    }

    /// The owning resource row must be present before any child is created.
    pub(crate) async fn require_resource(
        &self,
        resource: &ResourceName,
        cancel: &CancellationToken,
    ) -> Result<(), Report<RbacError>> {
        let row = self
            .table()
            .get(&ItemKey::resource(resource), cancel)
            .await
            .map_err(read_failure)?;
        if row.as_ref().and_then(Resource::from_attributes).is_none() {
            return Err(Report::new(RbacError::ResourceNotFound(resource.clone())));
        }
        Ok(())
    }
}

impl<T, V> ScopeStore for RbacRepository<T, V>
where
    T: KvTable,
    V: NameValidator,
{
    #[tracing::instrument(level = "debug", skip(self, cancel))]
    async fn create_scope(
        &self,
        resource: &ResourceName,
        scope: &ScopeName,
        cancel: &CancellationToken,
    ) -> Result<(), Report<RbacError>> {
        self.validate_scope_names(resource, scope)?;
        Self::ensure_active(cancel)?;
        self.require_resource(resource, cancel).await?;

        let entity = Scope {
            resource_name: resource.clone(),
            scope_name: scope.clone(),
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
    async fn get_scope(
        &self,
        resource: &ResourceName,
        scope: &ScopeName,
        cancel: &CancellationToken,
    ) -> Result<Option<Scope>, Report<RbacError>> {
        self.validate_scope_names(resource, scope)?;
        Self::ensure_active(cancel)?;

        let row = self
            .table()
            .get(&ItemKey::scope(resource, scope), cancel)
            .await
            .map_err(read_failure)?;
        Ok(row
            .as_ref()
            .and_then(Scope::from_attributes)
            .map(|decoded| decoded.record))
    }

    #[tracing::instrument(level = "debug", skip(self, cancel))]
    async fn delete_scope(
        &self,
        resource: &ResourceName,
        scope: &ScopeName,
        cancel: &CancellationToken,
    ) -> Result<(), Report<RbacError>> {
        self.validate_scope_names(resource, scope)?;
        Self::ensure_active(cancel)?;

        let key = ItemKey::scope(resource, scope);
        let Some(decoded) = self
            .table()
            .get(&key, cancel)
            .await
            .map_err(read_failure)?
            .as_ref()
            .and_then(Scope::from_attributes)
        else {
            return Ok(());
        };

        self.table()
            .delete(&key, WritePrecondition::EtagMatches(decoded.etag), cancel)
            .await
            .map_err(|report| {
                write_failure(report, RbacError::ConcurrentModification(key.clone()))
            })?;
        self.record_event(SaveAction::Deleted, &key, Vec::new(), cancel)
            .await
    }
}
