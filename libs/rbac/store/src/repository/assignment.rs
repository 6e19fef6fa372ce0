use error_stack::{Report, ResultExt as _};
use futures::try_join;
use palisade_rbac_types::{
    entity::{Assignment, Role},
    event::SaveAction,
    key::{self, ETag, ItemKey},
    name::{PrincipalId, ResourceName, RoleName},
};
use tokio_util::sync::CancellationToken;

use super::{RbacRepository, read_failure, write_failure};
use crate::{
    error::RbacError,
    kv::{KvTable, WriteOperation, WritePrecondition},
    record::{AssignmentViews as _, ItemRecord as _},
    validator::NameValidator,
};

/// The effect of an assignment deletion.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UnassignmentStatus {
    /// Both twin rows were present and are now deleted.
    Unassigned,
    /// The assignment was already absent; the call was a no-op.
    NotAssigned,
}

/// Describes the store surface for principal→role assignments.
pub trait AssignmentStore {
    /// Binds a principal to a role. Both the resource and the role must exist. A
    /// half-written twin pair left by an earlier crash counts as absent and is
    /// overwritten whole.
    ///
    /// # Errors
    ///
    /// - [`RbacError::ResourceNotFound`] / [`RbacError::RoleNotFound`] if a parent is
    ///   absent
    /// - [`RbacError::AlreadyExists`] if both twin rows are present
    fn create_assignment(
        &self,
        resource: &ResourceName,
        role: &RoleName,
        principal: &PrincipalId,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<(), Report<RbacError>>> + Send;

    /// Unbinds a principal from a role, deleting both twin rows. The by-resource row is
    /// the serialization point: of two concurrent deletes exactly one observes its ETag.
    fn delete_assignment(
        &self,
        resource: &ResourceName,
        role: &RoleName,
        principal: &PrincipalId,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<UnassignmentStatus, Report<RbacError>>> + Send;

    /// Every principal assigned to the role, sorted ascending. An absent resource or
    /// role yields an empty list.
    fn get_principals_for_role(
        &self,
        resource: &ResourceName,
        role: &RoleName,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Vec<PrincipalId>, Report<RbacError>>> + Send;
}

impl<T, V> AssignmentStore for RbacRepository<T, V>
where
    T: KvTable,
    V: NameValidator,
{
    #[tracing::instrument(level = "debug", skip(self, cancel))]
    async fn create_assignment(
        &self,
        resource: &ResourceName,
        role: &RoleName,
        principal: &PrincipalId,
        cancel: &CancellationToken,
    ) -> Result<(), Report<RbacError>> {
        self.validate_role_names(resource, role)?;
        Self::ensure_active(cancel)?;

        let role_key = ItemKey::role(resource, role);
        let (_, role_row) = try_join!(
            self.require_resource(resource, cancel),
            async {
                self.table()
                    .get(&role_key, cancel)
                    .await
                    .map_err(read_failure)
            },
        )?;
        if role_row.as_ref().and_then(Role::from_attributes).is_none() {
            return Err(Report::new(RbacError::RoleNotFound {
                resource: resource.clone(),
                role: role.clone(),
            }));
        }

        let assignment = Assignment {
            resource_name: resource.clone(),
            role_name: role.clone(),
            principal_id: principal.clone(),
        };
        let by_resource = assignment.key();
        let by_principal = assignment.twin_key();

        let (primary_row, twin_row) = try_join!(
            async {
                self.table()
                    .get(&by_resource, cancel)
                    .await
                    .map_err(read_failure)
            },
            async {
                self.table()
                    .get(&by_principal, cancel)
                    .await
                    .map_err(read_failure)
            },
        )?;
        let present = primary_row
            .as_ref()
            .and_then(Assignment::from_attributes)
            .is_some()
            && twin_row
                .as_ref()
                .and_then(Assignment::from_attributes)
                .is_some();
        if present {
            return Err(Report::new(RbacError::AlreadyExists(by_resource)));
        }

        // Both views carry the same ETag so they stay recognizably one assignment.
        let etag = ETag::generate();
        let operations = vec![
            WriteOperation::Put(
                assignment
                    .to_attributes(etag)
                    .change_context(RbacError::Internal)?,
            ),
            WriteOperation::Put(
                assignment
                    .twin_attributes(etag)
                    .change_context(RbacError::Internal)?,
            ),
        ];
        self.batch_apply(operations, cancel).await?;

        let changes = self.tracked_changes(SaveAction::Created, None, Some(&assignment))?;
        self.record_event(SaveAction::Created, &by_resource, changes, cancel)
            .await
    }

    #[tracing::instrument(level = "debug", skip(self, cancel))]
    async fn delete_assignment(
        &self,
        resource: &ResourceName,
        role: &RoleName,
        principal: &PrincipalId,
        cancel: &CancellationToken,
    ) -> Result<UnassignmentStatus, Report<RbacError>> {
        self.validate_role_names(resource, role)?;
        Self::ensure_active(cancel)?;

        let assignment = Assignment {
            resource_name: resource.clone(),
            role_name: role.clone(),
            principal_id: principal.clone(),
        };
        let by_resource = assignment.key();
        let by_principal = assignment.twin_key();

        let existing = self
            .table()
            .get(&by_resource, cancel)
            .await
            .map_err(read_failure)?
            .as_ref()
            .and_then(Assignment::from_attributes);

        let Some(decoded) = existing else {
            // Clears a stray by-principal twin left by a crashed write; readers already
            // treat the pair as absent.
            self.batch_apply(
                vec![
                    WriteOperation::Delete(by_resource),
                    WriteOperation::Delete(by_principal),
                ],
                cancel,
            )
            .await?;
            return Ok(UnassignmentStatus::NotAssigned);
        };

        self.table()
            .delete(
                &by_resource,
                WritePrecondition::EtagMatches(decoded.etag),
                cancel,
            )
            .await
            .map_err(|report| {
                write_failure(report, RbacError::ConcurrentModification(by_resource.clone()))
            })?;
        self.batch_apply(vec![WriteOperation::Delete(by_principal)], cancel)
            .await?;

        self.record_event(SaveAction::Deleted, &by_resource, Vec::new(), cancel)
            .await?;
        Ok(UnassignmentStatus::Unassigned)
    }

    #[tracing::instrument(level = "debug", skip(self, cancel))]
    async fn get_principals_for_role(
        &self,
        resource: &ResourceName,
        role: &RoleName,
        cancel: &CancellationToken,
    ) -> Result<Vec<PrincipalId>, Report<RbacError>> {
        self.validate_role_names(resource, role)?;
        Self::ensure_active(cancel)?;

        let partition = key::resource_partition(resource);
        let prefix = key::assignments_for_role_prefix(role);
        let rows = self
            .table()
            .query(&partition, &prefix, cancel)
            .await
            .map_err(read_failure)?;

        let mut principals: Vec<_> = rows
            .iter()
            .filter_map(Assignment::from_attributes)
            .map(|decoded| decoded.record.principal_id)
            .collect();
        principals.sort_unstable();
        Ok(principals)
    }
}
