use palisade_rbac_types::{
    key::ItemKey,
    name::{ResourceName, RoleName},
};

/// The error taxonomy of every repository operation.
///
/// Only `Unavailable` is produced after internal retries; everything else surfaces
/// immediately. `EventPersistence` is special: the entity write has already succeeded
/// and is not rolled back, only the audit event is missing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RbacError {
    #[error("invalid resource name: `{0}`")]
    InvalidResourceName(String),

    #[error("invalid scope name: `{0}`")]
    InvalidScopeName(String),

    #[error("invalid role name: `{0}`")]
    InvalidRoleName(String),

    /// A parent entity was missing at precondition time.
    #[error("resource `{0}` does not exist")]
    ResourceNotFound(ResourceName),

    /// A parent entity was missing at precondition time.
    #[error("role `{role}` does not exist under resource `{resource}`")]
    RoleNotFound {
        resource: ResourceName,
        role: RoleName,
    },

    /// A `not_exists` precondition failed: create race or duplicate.
    #[error("row `{0}` already exists")]
    AlreadyExists(ItemKey),

    /// An ETag precondition failed. Callers may re-read and retry.
    #[error("row `{0}` was concurrently modified")]
    ConcurrentModification(ItemKey),

    /// Backend failures or throttling that exhausted the retry budget.
    #[error("the store is unavailable")]
    Unavailable,

    #[error("the operation was cancelled")]
    Cancelled,

    /// The entity write succeeded but the audit event could not be persisted. Non-fatal
    /// to the entity state.
    #[error("the entity was saved but its audit event could not be persisted")]
    EventPersistence,

    /// Unexpected mapper or serialization failures.
    #[error("the store encountered an internal error")]
    Internal,
}
