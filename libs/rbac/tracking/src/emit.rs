use palisade_rbac_types::{
    event::{EventId, ItemEvent, PropertyChange, SaveAction},
    key::ItemKey,
};
use time::OffsetDateTime;

use crate::policy::EventPolicy;

/// Binds a diff list to a save, producing the audit event the policy asks for.
///
/// Returns `None` under [`EventPolicy::Disabled`]. The diff list is dropped (not
/// recomputed) when the policy suppresses changes for this action, so callers can always
/// hand over whatever the tracker produced.
#[must_use]
pub fn build_event(
    policy: EventPolicy,
    action: SaveAction,
    subject: &ItemKey,
    trace_context: Option<String>,
    changes: Vec<PropertyChange>,
) -> Option<ItemEvent> {
    if !policy.emits_events() {
        return None;
    }
    Some(ItemEvent {
        event_id: EventId::new(),
        partition_key: subject.entity_name.clone(),
        save_action: action,
        recorded_at: OffsetDateTime::now_utc(),
        related_id: subject.subject_name.clone(),
        trace_context,
        changes: policy.includes_changes(action).then_some(changes),
    })
}
