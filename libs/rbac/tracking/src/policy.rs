use palisade_rbac_types::event::SaveAction;
use serde::{Deserialize, Serialize};

/// Governs whether a save produces an audit event and whether that event carries the
/// property diff list.
///
/// | Policy       | CREATE          | UPDATE          | DELETE          |
/// |--------------|-----------------|-----------------|-----------------|
/// | `Disabled`   | no event        | no event        | no event        |
/// | `NoChanges`  | event, no diffs | event, no diffs | event, no diffs |
/// | `AllChanges` | event + diffs   | event + diffs   | event, no diffs |
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum EventPolicy {
    Disabled,
    NoChanges,
    #[default]
    AllChanges,
}

impl EventPolicy {
    /// Whether any event is emitted at all.
    #[must_use]
    pub const fn emits_events(self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// Whether the event for `action` carries diffs. Deletes never do; their baseline is
    /// the row itself and the row is gone.
    #[must_use]
    pub const fn includes_changes(self, action: SaveAction) -> bool {
        matches!(
            (self, action),
            (
                Self::AllChanges,
                SaveAction::Created | SaveAction::Updated
            )
        )
    }
}
