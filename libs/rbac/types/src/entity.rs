use serde::{Deserialize, Serialize};

use crate::name::{PrincipalId, ResourceName, RoleName, ScopeName};

/// A protected artifact. Scopes and roles owned by it are separate child rows; the
/// resource row itself carries no attributes beyond its name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Resource {
    pub resource_name: ResourceName,
}

/// An authorization boundary owned by a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Scope {
    pub resource_name: ResourceName,
    pub scope_name: ScopeName,
}

/// A role owned by a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Role {
    pub resource_name: ResourceName,
    pub role_name: RoleName,
}

/// The binding of a principal to a role under a resource. One logical assignment is
/// stored as two twin rows, one per query direction; a reader that sees only one twin
/// treats the assignment as absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Assignment {
    pub resource_name: ResourceName,
    pub role_name: RoleName,
    pub principal_id: PrincipalId,
}

/// A resource materialized together with its children, as returned by resource lookups.
/// Both lists are sorted ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ResourceView {
    pub resource_name: ResourceName,
    pub scopes: Vec<ScopeName>,
    pub roles: Vec<RoleName>,
}

/// A principal's effective access to one resource: the roles actually assigned (stale
/// assignments referencing deleted roles are dropped) and the scopes in effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct PrincipalAccess {
    pub principal_id: PrincipalId,
    pub resource_name: ResourceName,
    pub scopes: Vec<ScopeName>,
    pub roles: Vec<RoleName>,
}
