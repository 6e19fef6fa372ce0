use serde::Serialize;

/// Diff participation of one declared field.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FieldTracking {
    /// Included in diffs, compared by structural equality.
    Tracked,
    /// Excluded from diffs; the whole subtree is pruned.
    Untracked,
    /// Included in diffs, but both sides of an emitted change are replaced with
    /// ciphertext. Plaintext never appears in an event.
    Encrypted,
}

/// The rule attached to one declared field of a tracked type.
#[derive(Debug, Copy, Clone)]
pub struct FieldRule {
    pub tracking: FieldTracking,
    /// Declared subfields of a tracked compound field. Compounds without declared
    /// subfields are walked structurally (arrays by index, maps by key).
    pub children: Option<&'static TrackingSchema>,
}

impl FieldRule {
    #[must_use]
    pub const fn tracked() -> Self {
        Self {
            tracking: FieldTracking::Tracked,
            children: None,
        }
    }

    #[must_use]
    pub const fn tracked_with(children: &'static TrackingSchema) -> Self {
        Self {
            tracking: FieldTracking::Tracked,
            children: Some(children),
        }
    }

    #[must_use]
    pub const fn untracked() -> Self {
        Self {
            tracking: FieldTracking::Untracked,
            children: None,
        }
    }

    #[must_use]
    pub const fn encrypted() -> Self {
        Self {
            tracking: FieldTracking::Encrypted,
            children: None,
        }
    }
}

/// The flat, ordered list of declared fields of one tracked type.
///
/// Field names refer to the type's JSON projection, so they follow the serde renames of
/// the entity (`resourceName`, not `resource_name`). Declaration order is the diff
/// emission order.
#[derive(Debug)]
pub struct TrackingSchema {
    fields: &'static [(&'static str, FieldRule)],
}

impl TrackingSchema {
    #[must_use]
    pub const fn new(fields: &'static [(&'static str, FieldRule)]) -> Self {
        Self { fields }
    }

    #[must_use]
    pub const fn fields(&self) -> &'static [(&'static str, FieldRule)] {
        self.fields
    }
}

/// A type whose saves are audited through the change tracker.
pub trait TrackedEntity: Serialize {
    /// The declared tracking rules for this type's JSON projection.
    fn tracking_schema() -> &'static TrackingSchema;
}
