use error_stack::Report;
use palisade_rbac_types::{event::ItemEvent, key::EVENT_MARKER};
use tokio_util::sync::CancellationToken;

use super::{RbacRepository, read_failure};
use crate::{error::RbacError, kv::KvTable, record::ItemRecord as _, validator::NameValidator};

/// Read access to the adjacent events partition, for audit tooling. Events survive
/// cascading deletes of the entities they describe.
pub trait EventLog {
    /// The newest `limit` events, newest first.
    fn get_events(
        &self,
        limit: usize,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Vec<ItemEvent>, Report<RbacError>>> + Send;
}

impl<T, V> EventLog for RbacRepository<T, V>
where
    T: KvTable,
    V: NameValidator,
{
    #[tracing::instrument(level = "debug", skip(self, cancel))]
    async fn get_events(
        &self,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<ItemEvent>, Report<RbacError>> {
        Self::ensure_active(cancel)?;
        let rows = self
            .table()
            .query(EVENT_MARKER, EVENT_MARKER, cancel)
            .await
            .map_err(read_failure)?;
        Ok(rows
            .iter()
            .rev()
            .filter_map(ItemEvent::from_attributes)
            .map(|decoded| decoded.record)
            .take(limit)
            .collect())
    }
}
