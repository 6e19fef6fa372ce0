//! A table kept in process memory, honoring the same precondition semantics as the
//! DynamoDB adapter. Backs unit and integration tests.

use std::collections::BTreeMap;

use error_stack::Report;
use palisade_rbac_types::key::ItemKey;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::kv::{ATTR_ETAG, AttributeMap, KvError, KvTable, WriteOperation, WritePrecondition};

/// Rows ordered by `(entityName, subjectName)`, which makes every prefix read come back
/// in ascending sort-key order like the real backend.
#[derive(Debug, Default)]
pub struct InMemoryTable {
    rows: RwLock<BTreeMap<(String, String), AttributeMap>>,
}

impl InMemoryTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of rows currently stored, across all partitions.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }

    fn check(
        row: Option<&AttributeMap>,
        precondition: WritePrecondition,
    ) -> Result<(), Report<KvError>> {
        match precondition {
            WritePrecondition::None => Ok(()),
            WritePrecondition::NotExists => {
                if row.is_some() {
                    Err(Report::new(KvError::PreconditionFailed))
                } else {
                    Ok(())
                }
            }
            WritePrecondition::EtagMatches(etag) => {
                let stored = row.and_then(|attributes| attributes.get(ATTR_ETAG));
                if stored == Some(&Value::String(etag.to_string())) {
                    Ok(())
                } else {
                    Err(Report::new(KvError::PreconditionFailed))
                }
            }
        }
    }

    fn guard(cancel: &CancellationToken) -> Result<(), Report<KvError>> {
        if cancel.is_cancelled() {
            Err(Report::new(KvError::Cancelled))
        } else {
            Ok(())
        }
    }
}

impl KvTable for InMemoryTable {
    async fn put(
        &self,
        item: AttributeMap,
        precondition: WritePrecondition,
        cancel: &CancellationToken,
    ) -> Result<(), Report<KvError>> {
        Self::guard(cancel)?;
        let key = crate::kv::item_key(&item).ok_or_else(|| Report::new(KvError::NotFound))?;
        let mut rows = self.rows.write().await;
        let slot = (key.entity_name, key.subject_name);
        Self::check(rows.get(&slot), precondition)?;
        rows.insert(slot, item);
        Ok(())
    }

    async fn get(
        &self,
        key: &ItemKey,
        cancel: &CancellationToken,
    ) -> Result<Option<AttributeMap>, Report<KvError>> {
        Self::guard(cancel)?;
        let rows = self.rows.read().await;
        Ok(rows
            .get(&(key.entity_name.clone(), key.subject_name.clone()))
            .cloned())
    }

    async fn delete(
        &self,
        key: &ItemKey,
        precondition: WritePrecondition,
        cancel: &CancellationToken,
    ) -> Result<(), Report<KvError>> {
        Self::guard(cancel)?;
        let mut rows = self.rows.write().await;
        let slot = (key.entity_name.clone(), key.subject_name.clone());
        Self::check(rows.get(&slot), precondition)?;
        rows.remove(&slot);
        Ok(())
    }

    async fn batch_write(
        &self,
        operations: Vec<WriteOperation>,
        cancel: &CancellationToken,
    ) -> Result<(), Report<KvError>> {
        Self::guard(cancel)?;
        let mut rows = self.rows.write().await;
        for operation in operations {
            match operation {
                WriteOperation::Put(item) => {
                    let key = crate::kv::item_key(&item)
                        .ok_or_else(|| Report::new(KvError::NotFound))?;
                    rows.insert((key.entity_name, key.subject_name), item);
                }
                WriteOperation::Delete(key) => {
                    rows.remove(&(key.entity_name, key.subject_name));
                }
            }
        }
        Ok(())
    }

    async fn query(
        &self,
        partition: &str,
        prefix: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<AttributeMap>, Report<KvError>> {
        Self::guard(cancel)?;
        let rows = self.rows.read().await;
        Ok(rows
            .range((partition.to_owned(), prefix.to_owned())..)
            .take_while(|((entity_name, subject_name), _)| {
                entity_name == partition && subject_name.starts_with(prefix)
            })
            .map(|(_, attributes)| attributes.clone())
            .collect())
    }

    async fn scan(
        &self,
        partition: &str,
        prefix: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<AttributeMap>, Report<KvError>> {
        // Same shape as a query against this backend; the distinction only matters at
        // the wire.
        self.query(partition, prefix, cancel).await
    }
}
