//! Composite-key formatting for the wide-row table.
//!
//! Every logical entity is one row keyed by `(entityName, subjectName)`. The markers below
//! arrange the sort-key space so that listing the children of a row is always a single
//! `begins_with` range with no overlap between child kinds. Formatting is total and
//! deterministic; names are treated as opaque and are never escaped — validators upstream
//! reject names that contain the marker separator.

use core::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    event::EventId,
    name::{PrincipalId, ResourceName, RoleName, ScopeName},
};

pub const RESOURCE_MARKER: &str = "RESOURCE#";
pub const SCOPE_MARKER: &str = "SCOPE#";
pub const ROLE_MARKER: &str = "ROLE#";
pub const ASSIGNMENT_MARKER: &str = "ASSIGNMENT#";
pub const PRINCIPAL_MARKER: &str = "PRINCIPAL#";
pub const EVENT_MARKER: &str = "EVENT#";

/// An opaque per-row version token advanced by every successful mutation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ETag(Uuid);

impl ETag {
    /// Mints the token for a new row generation.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, fmt)
    }
}

/// The composite `(entityName, subjectName)` key of one row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemKey {
    pub entity_name: String,
    pub subject_name: String,
}

impl ItemKey {
    #[must_use]
    pub fn resource(resource: &ResourceName) -> Self {
        Self {
            entity_name: RESOURCE_MARKER.to_owned(),
            subject_name: format!("{RESOURCE_MARKER}{resource}"),
        }
    }

    #[must_use]
    pub fn scope(resource: &ResourceName, scope: &ScopeName) -> Self {
        Self {
            entity_name: resource_partition(resource),
            subject_name: format!("{SCOPE_MARKER}{scope}"),
        }
    }

    #[must_use]
    pub fn role(resource: &ResourceName, role: &RoleName) -> Self {
        Self {
            entity_name: resource_partition(resource),
            subject_name: format!("{ROLE_MARKER}{role}"),
        }
    }

    /// The by-resource view of an assignment, queryable by `(resource, role)`.
    #[must_use]
    pub fn assignment_by_resource(
        resource: &ResourceName,
        role: &RoleName,
        principal: &PrincipalId,
    ) -> Self {
        Self {
            entity_name: resource_partition(resource),
            subject_name: format!(
                "{ASSIGNMENT_MARKER}{ROLE_MARKER}{role}#{PRINCIPAL_MARKER}{principal}"
            ),
        }
    }

    /// The by-principal twin of an assignment, queryable by principal.
    #[must_use]
    pub fn assignment_by_principal(
        principal: &PrincipalId,
        resource: &ResourceName,
        role: &RoleName,
    ) -> Self {
        Self {
            entity_name: principal_partition(principal),
            subject_name: format!(
                "{ASSIGNMENT_MARKER}{RESOURCE_MARKER}{resource}#{ROLE_MARKER}{role}"
            ),
        }
    }

    /// The key of an audit event row in the adjacent events partition. The sort key leads
    /// with the RFC 3339 timestamp so a descending range over the partition is
    /// newest-first.
    #[must_use]
    pub fn event(recorded_at: &str, event_id: EventId) -> Self {
        Self {
            entity_name: EVENT_MARKER.to_owned(),
            subject_name: format!("{EVENT_MARKER}{recorded_at}#{event_id}"),
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}/{}", self.entity_name, self.subject_name)
    }
}

/// The partition holding a resource's child rows.
#[must_use]
pub fn resource_partition(resource: &ResourceName) -> String {
    format!("{RESOURCE_MARKER}{resource}")
}

/// The partition holding a principal's assignment view rows.
#[must_use]
pub fn principal_partition(principal: &PrincipalId) -> String {
    format!("{PRINCIPAL_MARKER}{principal}")
}

/// Sort-key prefix of the by-resource assignment rows under one role, covering every
/// principal.
#[must_use]
pub fn assignments_for_role_prefix(role: &RoleName) -> String {
    format!("{ASSIGNMENT_MARKER}{ROLE_MARKER}{role}#{PRINCIPAL_MARKER}")
}

/// Sort-key prefix of the by-principal assignment rows under one resource, covering every
/// role.
#[must_use]
pub fn assignments_for_resource_prefix(resource: &ResourceName) -> String {
    format!("{ASSIGNMENT_MARKER}{RESOURCE_MARKER}{resource}#{ROLE_MARKER}")
}
