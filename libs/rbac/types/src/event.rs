use core::fmt;

use jsonptr::PointerBuf;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

use crate::key::ItemKey;

/// The kind of mutation an [`ItemEvent`] describes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaveAction {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct EventId(Uuid);

impl EventId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, fmt)
    }
}

/// One property-level difference between the baseline and current state of an entity.
///
/// `path` is an RFC 6901 JSON Pointer into the entity's JSON projection. A missing side
/// is `null`: additions carry `old_value: null`, removals carry `new_value: null`. For
/// encrypted fields both sides hold base64 ciphertext rather than plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyChange {
    pub path: PointerBuf,
    pub old_value: Value,
    pub new_value: Value,
}

/// An immutable audit record of one CREATE/UPDATE/DELETE against an entity row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemEvent {
    pub event_id: EventId,
    /// The partition the affected row lives in.
    pub partition_key: String,
    pub save_action: SaveAction,
    #[serde(with = "time::serde::rfc3339")]
    pub recorded_at: OffsetDateTime,
    /// The affected row's subject name.
    pub related_id: String,
    /// Caller-supplied trace correlation value (e.g. a W3C `traceparent`); opaque to the
    /// core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_context: Option<String>,
    /// Property diffs for this save, or `None` when the event policy suppresses them.
    pub changes: Option<Vec<PropertyChange>>,
}

impl ItemEvent {
    /// The row key of this event in the adjacent events partition.
    ///
    /// Falls back to the debug rendering of the timestamp in the pathological case that
    /// RFC 3339 formatting fails; the key stays well-formed either way.
    #[must_use]
    pub fn key(&self) -> ItemKey {
        let recorded_at = self
            .recorded_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| format!("{:?}", self.recorded_at));
        ItemKey::event(&recorded_at, self.event_id)
    }
}
