//! The schema-driven structural diff walker.

use error_stack::{Report, ResultExt as _};
use jsonptr::{PointerBuf, Token};
use palisade_rbac_types::event::PropertyChange;
use serde_json::{Map, Value};

use crate::{
    cipher::{EncryptError, FieldCipher},
    schema::{FieldTracking, TrackedEntity, TrackingSchema},
};

#[derive(Debug, thiserror::Error)]
#[error("could not compute property changes")]
pub struct DiffError;

/// Computes the property changes between `baseline` and `current`.
///
/// `None` stands for the empty baseline of a create (or the empty target of a delete);
/// diffing two `None`s yields no changes. The returned list is ordered depth-first in
/// declared-field order, arrays by index and maps by key.
///
/// # Errors
///
/// - [`DiffError`] if an entity does not project to JSON or an encrypted value could not
///   be enciphered
pub fn diff_entities<T: TrackedEntity>(
    baseline: Option<&T>,
    current: Option<&T>,
    cipher: &dyn FieldCipher,
) -> Result<Vec<PropertyChange>, Report<DiffError>> {
    let baseline = project(baseline)?;
    let current = project(current)?;
    diff_values(T::tracking_schema(), &baseline, &current, cipher)
}

/// Diffs two JSON projections under an explicit schema.
///
/// # Errors
///
/// - [`DiffError`] if an encrypted value could not be enciphered
pub fn diff_values(
    schema: &TrackingSchema,
    baseline: &Value,
    current: &Value,
    cipher: &dyn FieldCipher,
) -> Result<Vec<PropertyChange>, Report<DiffError>> {
    let mut walker = Walker {
        cipher,
        path: PointerBuf::new(),
        changes: Vec::new(),
    };
    walker
        .declared(schema, baseline, current)
        .change_context(DiffError)?;
    Ok(walker.changes)
}

fn project<T: TrackedEntity>(entity: Option<&T>) -> Result<Value, Report<DiffError>> {
    entity.map_or(Ok(Value::Null), |entity| {
        serde_json::to_value(entity)
            .change_context(DiffError)
            .attach_printable("entity projection is not JSON-shaped")
    })
}

struct Walker<'c> {
    cipher: &'c dyn FieldCipher,
    path: PointerBuf,
    changes: Vec<PropertyChange>,
}

impl Walker<'_> {
    /// Walks the declared fields of a schema level. A `null` on either side reads as an
    /// object with no fields, which is what turns whole-compound transitions into
    /// per-leaf addition/removal changes.
    fn declared(
        &mut self,
        schema: &TrackingSchema,
        baseline: &Value,
        current: &Value,
    ) -> Result<(), Report<EncryptError>> {
        for (name, rule) in schema.fields() {
            let old_value = field(baseline, name);
            let new_value = field(current, name);
            match rule.tracking {
                FieldTracking::Untracked => {}
                FieldTracking::Encrypted => {
                    if old_value != new_value {
                        let change = PropertyChange {
                            path: self.child(name),
                            old_value: self.encrypt(old_value)?,
                            new_value: self.encrypt(new_value)?,
                        };
                        self.changes.push(change);
                    }
                }
                FieldTracking::Tracked => {
                    self.path.push_back(Token::new(*name));
                    match rule.children {
                        Some(children) => self.declared(children, old_value, new_value)?,
                        None => self.walk(old_value, new_value)?,
                    }
                    self.path.pop_back();
                }
            }
        }
        Ok(())
    }

    /// Structural walk of a tracked field without declared subfields.
    fn walk(&mut self, baseline: &Value, current: &Value) -> Result<(), Report<EncryptError>> {
        if baseline == current {
            return Ok(());
        }
        match (baseline, current) {
            (Value::Object(old), Value::Object(new)) => self.map(old, new),
            (Value::Null, Value::Object(new)) => self.map(&Map::new(), new),
            (Value::Object(old), Value::Null) => self.map(old, &Map::new()),
            (Value::Array(old), Value::Array(new)) => self.array(old, new),
            (Value::Null, Value::Array(new)) => self.array(&[], new),
            (Value::Array(old), Value::Null) => self.array(old, &[]),
            _ => {
                self.changes.push(PropertyChange {
                    path: self.path.clone(),
                    old_value: baseline.clone(),
                    new_value: current.clone(),
                });
                Ok(())
            }
        }
    }

    /// String-keyed map: changed keys plus added/removed keys, in key order.
    fn map(
        &mut self,
        baseline: &Map<String, Value>,
        current: &Map<String, Value>,
    ) -> Result<(), Report<EncryptError>> {
        let mut keys: Vec<&str> = baseline
            .keys()
            .chain(current.keys())
            .map(String::as_str)
            .collect();
        keys.sort_unstable();
        keys.dedup();
        for key in keys {
            let old_value = baseline.get(key).unwrap_or(&Value::Null);
            let new_value = current.get(key).unwrap_or(&Value::Null);
            self.path.push_back(Token::new(key));
            self.walk(old_value, new_value)?;
            self.path.pop_back();
        }
        Ok(())
    }

    /// Arrays align by index; the shorter side contributes `null` for its missing tail.
    fn array(&mut self, baseline: &[Value], current: &[Value]) -> Result<(), Report<EncryptError>> {
        for index in 0..baseline.len().max(current.len()) {
            let old_value = baseline.get(index).unwrap_or(&Value::Null);
            let new_value = current.get(index).unwrap_or(&Value::Null);
            self.path.push_back(Token::new(index.to_string()));
            self.walk(old_value, new_value)?;
            self.path.pop_back();
        }
        Ok(())
    }

    fn child(&self, name: &str) -> PointerBuf {
        let mut path = self.path.clone();
        path.push_back(Token::new(name));
        path
    }

    fn encrypt(&self, value: &Value) -> Result<Value, Report<EncryptError>> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::String(text) => self.cipher.encrypt(text.as_bytes()).map(Value::String),
            other => {
                let bytes = serde_json::to_vec(other)
                    .change_context(EncryptError)
                    .attach_printable("encrypted value is not JSON-encodable")?;
                self.cipher.encrypt(&bytes).map(Value::String)
            }
        }
    }
}

fn field<'v>(value: &'v Value, name: &str) -> &'v Value {
    value.get(name).unwrap_or(&Value::Null)
}
