use error_stack::Report;
use palisade_rbac_types::{
    entity::{Assignment, PrincipalAccess},
    key::{self, ASSIGNMENT_MARKER},
    name::{PrincipalId, ResourceName, ScopeName},
};
use tokio_util::sync::CancellationToken;

use super::{RbacRepository, read_failure, resource::ResourceStore as _};
use crate::{
    error::RbacError, kv::KvTable, record::ItemRecord as _, validator::NameValidator,
};

/// Describes the principal-view store surface: the queries a caller combines with a
/// bearer-token claim, plus principal removal.
pub trait PrincipalStore {
    /// A principal's effective access to one resource.
    ///
    /// Roles are the intersection of the principal's assignments with the roles the
    /// resource currently has; stale assignments referencing deleted roles are silently
    /// dropped. Scopes are the single requested scope when a non-default scope is
    /// given, otherwise every scope of the resource. An absent resource yields empty
    /// lists.
    fn get_principal_access(
        &self,
        principal: &PrincipalId,
        resource: &ResourceName,
        scope: Option<&ScopeName>,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<PrincipalAccess, Report<RbacError>>> + Send;

    /// Every resource the principal holds at least one assignment under, sorted
    /// ascending.
    fn get_principal_resources(
        &self,
        principal: &PrincipalId,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Vec<ResourceName>, Report<RbacError>>> + Send;

    /// Deletes every assignment of the principal, in both views. Idempotent.
    fn delete_principal(
        &self,
        principal: &PrincipalId,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<(), Report<RbacError>>> + Send;
}

impl<T, V> PrincipalStore for RbacRepository<T, V>
where
    T: KvTable,
    V: NameValidator,
{
    #[tracing::instrument(level = "debug", skip(self, cancel))]
    async fn get_principal_access(
        &self,
        principal: &PrincipalId,
        resource: &ResourceName,
        scope: Option<&ScopeName>,
        cancel: &CancellationToken,
    ) -> Result<PrincipalAccess, Report<RbacError>> {
        if let Some(scope) = scope
            && !self.validator().is_valid_scope_name(scope)
        {
            return Err(Report::new(RbacError::InvalidScopeName(scope.to_string())));
        }

        let view = self.get_resource(resource, cancel).await?;

        let partition = key::principal_partition(principal);
        let prefix = key::assignments_for_resource_prefix(resource);
        let rows = self
            .table()
            .query(&partition, &prefix, cancel)
            .await
            .map_err(read_failure)?;

        let (known_roles, all_scopes) = view
            .map(|view| (view.roles, view.scopes))
            .unwrap_or_default();

        let mut roles: Vec<_> = rows
            .iter()
            .filter_map(Assignment::from_attributes)
            .map(|decoded| decoded.record.role_name)
            .filter(|role| known_roles.binary_search(role).is_ok())
            .collect();
        roles.sort_unstable();
        roles.dedup();

        let scopes = match scope {
            Some(scope) if !self.validator().is_default_scope(scope) => vec![scope.clone()],
            _ => all_scopes,
        };

        Ok(PrincipalAccess {
            principal_id: principal.clone(),
            resource_name: resource.clone(),
            scopes,
            roles,
        })
    }

    #[tracing::instrument(level = "debug", skip(self, cancel))]
    async fn get_principal_resources(
        &self,
        principal: &PrincipalId,
        cancel: &CancellationToken,
    ) -> Result<Vec<ResourceName>, Report<RbacError>> {
        Self::ensure_active(cancel)?;

        let partition = key::principal_partition(principal);
        let rows = self
            .table()
            .query(&partition, ASSIGNMENT_MARKER, cancel)
            .await
            .map_err(read_failure)?;

        let mut resources: Vec<_> = rows
            .iter()
            .filter_map(Assignment::from_attributes)
            .map(|decoded| decoded.record.resource_name)
            .collect();
        resources.sort_unstable();
        resources.dedup();
        Ok(resources)
    }

    #[tracing::instrument(level = "debug", skip(self, cancel))]
    async fn delete_principal(
        &self,
        principal: &PrincipalId,
        cancel: &CancellationToken,
    ) -> Result<(), Report<RbacError>> {
        Self::ensure_active(cancel)?;
        let partition = key::principal_partition(principal);
        self.purge_assignment_rows(&partition, ASSIGNMENT_MARKER, cancel)
            .await
    }
}
