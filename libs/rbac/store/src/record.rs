//! Mapping between domain entities and table rows.
//!
//! Each entity kind serializes its JSON projection into the row's attribute map, with
//! the composite key and the row's ETag stored alongside the payload fields.
//! Deserialization is deliberately total: [`ItemRecord::from_attributes`] revalidates
//! that the row's stored key matches the key it would reconstruct for the decoded
//! entity, and answers `None` on any mismatch — stale rows and foreign row kinds
//! returned by coarse prefix filters are skipped, never surfaced as errors.

use error_stack::{Report, ResultExt as _};
use palisade_rbac_types::{
    entity::{Assignment, Resource, Role, Scope},
    event::ItemEvent,
    key::{ETag, ItemKey},
};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::kv::{ATTR_ENTITY_NAME, ATTR_ETAG, ATTR_SUBJECT_NAME, AttributeMap};

#[derive(Debug, thiserror::Error)]
#[error("could not encode entity into row attributes")]
pub struct EncodeError;

/// A decoded row together with the version token it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedRecord<T> {
    pub record: T,
    pub etag: ETag,
}

/// An entity kind stored as one row of the table.
pub trait ItemRecord: Sized {
    /// The composite key this entity is stored under.
    fn key(&self) -> ItemKey;

    /// Serializes the entity into row attributes carrying `etag`.
    ///
    /// # Errors
    ///
    /// - [`EncodeError`] if the entity's projection is not a JSON object
    fn to_attributes(&self, etag: ETag) -> Result<AttributeMap, Report<EncodeError>>;

    /// Decodes a row, answering `None` when the row is not a valid instance of this
    /// entity kind stored under its own key.
    fn from_attributes(attributes: &AttributeMap) -> Option<VersionedRecord<Self>>;
}

fn encode<T: Serialize>(
    entity: &T,
    key: &ItemKey,
    etag: ETag,
) -> Result<AttributeMap, Report<EncodeError>> {
    let value = serde_json::to_value(entity).change_context(EncodeError)?;
    let Value::Object(mut attributes) = value else {
        return Err(Report::new(EncodeError)
            .attach_printable("entity projection must be a JSON object"));
    };
    attributes.insert(
        ATTR_ENTITY_NAME.to_owned(),
        Value::String(key.entity_name.clone()),
    );
    attributes.insert(
        ATTR_SUBJECT_NAME.to_owned(),
        Value::String(key.subject_name.clone()),
    );
    attributes.insert(ATTR_ETAG.to_owned(), Value::String(etag.to_string()));
    Ok(attributes)
}

fn decode<T: DeserializeOwned>(attributes: &AttributeMap) -> Option<(T, ETag)> {
    let mut payload = attributes.clone();
    payload.remove(ATTR_ENTITY_NAME);
    payload.remove(ATTR_SUBJECT_NAME);
    let etag = payload
        .remove(ATTR_ETAG)
        .and_then(|value| serde_json::from_value(value).ok())?;
    let record = serde_json::from_value(Value::Object(payload)).ok()?;
    Some((record, etag))
}

/// Decode plus key revalidation, shared by every entity kind.
fn decode_validated<T>(attributes: &AttributeMap) -> Option<VersionedRecord<T>>
where
    T: DeserializeOwned + ItemRecord,
{
    let (record, etag) = decode::<T>(attributes)?;
    let stored = crate::kv::item_key(attributes)?;
    if stored != record.key() {
        return None;
    }
    Some(VersionedRecord { record, etag })
}

impl ItemRecord for Resource {
    fn key(&self) -> ItemKey {
        ItemKey::resource(&self.resource_name)
    }

    fn to_attributes(&self, etag: ETag) -> Result<AttributeMap, Report<EncodeError>> {
        encode(self, &self.key(), etag)
    }

    fn from_attributes(attributes: &AttributeMap) -> Option<VersionedRecord<Self>> {
        decode_validated(attributes)
    }
}

impl ItemRecord for Scope {
    fn key(&self) -> ItemKey {
        ItemKey::scope(&self.resource_name, &self.scope_name)
    }

    fn to_attributes(&self, etag: ETag) -> Result<AttributeMap, Report<EncodeError>> {
        encode(self, &self.key(), etag)
    }

    fn from_attributes(attributes: &AttributeMap) -> Option<VersionedRecord<Self>> {
        decode_validated(attributes)
    }
}

impl ItemRecord for Role {
    fn key(&self) -> ItemKey {
        ItemKey::role(&self.resource_name, &self.role_name)
    }

    fn to_attributes(&self, etag: ETag) -> Result<AttributeMap, Report<EncodeError>> {
        encode(self, &self.key(), etag)
    }

    fn from_attributes(attributes: &AttributeMap) -> Option<VersionedRecord<Self>> {
        decode_validated(attributes)
    }
}

/// The by-resource view. The by-principal twin row of the same logical assignment is
/// encoded separately via [`Assignment::twin_key`].
impl ItemRecord for Assignment {
    fn key(&self) -> ItemKey {
        ItemKey::assignment_by_resource(&self.resource_name, &self.role_name, &self.principal_id)
    }

    fn to_attributes(&self, etag: ETag) -> Result<AttributeMap, Report<EncodeError>> {
        encode(self, &self.key(), etag)
    }

    fn from_attributes(attributes: &AttributeMap) -> Option<VersionedRecord<Self>> {
        let (record, etag) = decode::<Self>(attributes)?;
        let stored = crate::kv::item_key(attributes)?;
        // Either view of the assignment is a valid row for the decoded entity.
        if stored != record.key() && stored != record.twin_key() {
            return None;
        }
        Some(VersionedRecord { record, etag })
    }
}

/// Key helpers for the two views of one logical assignment.
pub trait AssignmentViews {
    /// The by-principal twin of the by-resource row (and vice versa's counterpart).
    fn twin_key(&self) -> ItemKey;

    /// Row attributes for the by-principal twin, carrying the same ETag as the
    /// by-resource row so the two views stay recognizably one assignment.
    fn twin_attributes(&self, etag: ETag) -> Result<AttributeMap, Report<EncodeError>>;
}

impl AssignmentViews for Assignment {
    fn twin_key(&self) -> ItemKey {
        ItemKey::assignment_by_principal(&self.principal_id, &self.resource_name, &self.role_name)
    }

    fn twin_attributes(&self, etag: ETag) -> Result<AttributeMap, Report<EncodeError>> {
        encode(self, &self.twin_key(), etag)
    }
}

impl ItemRecord for ItemEvent {
    fn key(&self) -> ItemKey {
        Self::key(self)
    }

    fn to_attributes(&self, etag: ETag) -> Result<AttributeMap, Report<EncodeError>> {
        encode(self, &ItemRecord::key(self), etag)
    }

    fn from_attributes(attributes: &AttributeMap) -> Option<VersionedRecord<Self>> {
        decode_validated(attributes)
    }
}
