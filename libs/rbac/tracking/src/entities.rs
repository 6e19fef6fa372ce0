//! Tracking declarations for the domain entities. Every identifying field is tracked;
//! none are secret.

use palisade_rbac_types::entity::{Assignment, Resource, Role, Scope};

use crate::schema::{FieldRule, TrackedEntity, TrackingSchema};

static RESOURCE_SCHEMA: TrackingSchema =
    TrackingSchema::new(&[("resourceName", FieldRule::tracked())]);

static SCOPE_SCHEMA: TrackingSchema = TrackingSchema::new(&[
    ("resourceName", FieldRule::tracked()),
    ("scopeName", FieldRule::tracked()),
]);

static ROLE_SCHEMA: TrackingSchema = TrackingSchema::new(&[
    ("resourceName", FieldRule::tracked()),
    ("roleName", FieldRule::tracked()),
]);

static ASSIGNMENT_SCHEMA: TrackingSchema = TrackingSchema::new(&[
    ("resourceName", FieldRule::tracked()),
    ("roleName", FieldRule::tracked()),
    ("principalId", FieldRule::tracked()),
]);

impl TrackedEntity for Resource {
    fn tracking_schema() -> &'static TrackingSchema {
        &RESOURCE_SCHEMA
    }
}

impl TrackedEntity for Scope {
    fn tracking_schema() -> &'static TrackingSchema {
        &SCOPE_SCHEMA
    }
}

impl TrackedEntity for Role {
    fn tracking_schema() -> &'static TrackingSchema {
        &ROLE_SCHEMA
    }
}

impl TrackedEntity for Assignment {
    fn tracking_schema() -> &'static TrackingSchema {
        &ASSIGNMENT_SCHEMA
    }
}
