//! The domain repository.
//!
//! One [`RbacRepository`] serves all entity kinds. It is stateless apart from its
//! injected collaborators (table, validator, cipher) and safe to share across requests;
//! the table is the only shared mutable resource. Each operation module defines the
//! store trait it implements, following one-trait-per-entity-kind.

pub mod assignment;
pub mod events;
pub mod principal;
pub mod resource;
pub mod role;
pub mod scope;

use std::sync::Arc;

use error_stack::{Report, ResultExt as _};
use palisade_rbac_tracking::{
    cipher::{DecryptError, EncryptError, FieldCipher},
    diff::diff_entities,
    emit::build_event,
    policy::EventPolicy,
    schema::TrackedEntity,
};
use palisade_rbac_types::{
    entity::Assignment,
    event::{PropertyChange, SaveAction},
    key::{ETag, ItemKey},
};
use tokio_util::sync::CancellationToken;

use crate::{
    config::StoreConfig,
    error::RbacError,
    kv::{self, KvError, KvTable, WriteOperation, WritePrecondition},
    record::{AssignmentViews as _, ItemRecord},
    validator::{DefaultNameValidator, NameValidator},
};

/// All domain operations against one wide-row table.
#[derive(Clone)]
pub struct RbacRepository<T, V = DefaultNameValidator> {
    table: T,
    validator: V,
    cipher: Option<Arc<dyn FieldCipher>>,
    event_policy: EventPolicy,
    batch_size: usize,
    trace_context: Option<String>,
}

impl<T> RbacRepository<T, DefaultNameValidator>
where
    T: KvTable,
{
    #[must_use]
    pub fn new(table: T, config: &StoreConfig) -> Self {
        Self {
            table,
            validator: DefaultNameValidator,
            cipher: None,
            event_policy: config.event_policy(),
            batch_size: config.batch_size(),
            trace_context: None,
        }
    }
}

impl<T, V> RbacRepository<T, V> {
    /// Replaces the name validator.
    #[must_use]
    pub fn with_validator<W>(self, validator: W) -> RbacRepository<T, W>
    where
        W: NameValidator,
    {
        RbacRepository {
            table: self.table,
            validator,
            cipher: self.cipher,
            event_policy: self.event_policy,
            batch_size: self.batch_size,
            trace_context: self.trace_context,
        }
    }

    /// Wires the encryption collaborator used for `Encrypted` tracked fields.
    #[must_use]
    pub fn with_cipher(mut self, cipher: Arc<dyn FieldCipher>) -> Self {
        self.cipher = Some(cipher);
        self
    }

    /// Attaches a trace correlation value carried on every emitted audit event.
    #[must_use]
    pub fn with_trace_context(mut self, trace_context: impl Into<String>) -> Self {
        self.trace_context = Some(trace_context.into());
        self
    }

    #[must_use]
    pub const fn table(&self) -> &T {
        &self.table
    }
}

/// Stand-in cipher wired by default. Tracking schemas without `Encrypted` fields never
/// touch it; schemas with them fail loudly instead of leaking plaintext.
struct UnconfiguredCipher;

static UNCONFIGURED_CIPHER: UnconfiguredCipher = UnconfiguredCipher;

impl FieldCipher for UnconfiguredCipher {
    fn encrypt(&self, _plaintext: &[u8]) -> Result<String, Report<EncryptError>> {
        Err(Report::new(EncryptError).attach_printable("no field cipher is configured"))
    }

    fn decrypt(&self, _ciphertext: &str) -> Result<Vec<u8>, Report<DecryptError>> {
        Err(Report::new(DecryptError).attach_printable("no field cipher is configured"))
    }
}

/// Maps a failed single-row write into the public taxonomy; `on_precondition` names
/// what a failed conditional check means for this call site.
pub(crate) fn write_failure(
    report: Report<KvError>,
    on_precondition: RbacError,
) -> Report<RbacError> {
    let context = match report.current_context() {
        KvError::PreconditionFailed => on_precondition,
        KvError::Cancelled => RbacError::Cancelled,
        KvError::Unavailable | KvError::Throttled => RbacError::Unavailable,
        KvError::NotFound => RbacError::Internal,
    };
    report.change_context(context)
}

pub(crate) fn read_failure(report: Report<KvError>) -> Report<RbacError> {
    let context = match report.current_context() {
        KvError::Cancelled => RbacError::Cancelled,
        KvError::Unavailable | KvError::Throttled => RbacError::Unavailable,
        KvError::PreconditionFailed | KvError::NotFound => RbacError::Internal,
    };
    report.change_context(context)
}

impl<T, V> RbacRepository<T, V>
where
    T: KvTable,
    V: NameValidator,
{
    pub(crate) const fn validator(&self) -> &V {
        &self.validator
    }

    pub(crate) fn ensure_active(cancel: &CancellationToken) -> Result<(), Report<RbacError>> {
        if cancel.is_cancelled() {
            Err(Report::new(RbacError::Cancelled))
        } else {
            Ok(())
        }
    }

    fn cipher(&self) -> &dyn FieldCipher {
        self.cipher.as_deref().unwrap_or(&UNCONFIGURED_CIPHER)
    }

    /// Diffs for the event of this save, or nothing when the policy will not carry
    /// them.
    pub(crate) fn tracked_changes<E>(
        &self,
        action: SaveAction,
        baseline: Option<&E>,
        current: Option<&E>,
    ) -> Result<Vec<PropertyChange>, Report<RbacError>>
    where
        E: TrackedEntity,
    {
        if !self.event_policy.includes_changes(action) {
            return Ok(Vec::new());
        }
        diff_entities(baseline, current, self.cipher()).change_context(RbacError::Internal)
    }

    /// Appends the audit event for a completed entity write. The entity write is not
    /// rolled back when this fails; the failure surfaces as
    /// [`RbacError::EventPersistence`].
    pub(crate) async fn record_event(
        &self,
        action: SaveAction,
        subject: &ItemKey,
        changes: Vec<PropertyChange>,
        cancel: &CancellationToken,
    ) -> Result<(), Report<RbacError>> {
        let Some(event) = build_event(
            self.event_policy,
            action,
            subject,
            self.trace_context.clone(),
            changes,
        ) else {
            return Ok(());
        };

        let attributes = event
            .to_attributes(ETag::generate())
            .change_context(RbacError::EventPersistence)?;
        self.table
            .put(attributes, WritePrecondition::None, cancel)
            .await
            .map_err(|report| match report.current_context() {
                KvError::Cancelled => report.change_context(RbacError::Cancelled),
                _ => report.change_context(RbacError::EventPersistence),
            })?;
        tracing::debug!(%subject, ?action, "audit event recorded");
        Ok(())
    }

    /// Applies unconditioned deletes/puts in batches of the configured size.
    pub(crate) async fn batch_apply(
        &self,
        operations: Vec<WriteOperation>,
        cancel: &CancellationToken,
    ) -> Result<(), Report<RbacError>> {
        for chunk in operations.chunks(self.batch_size) {
            self.table
                .batch_write(chunk.to_vec(), cancel)
                .await
                .map_err(read_failure)?;
        }
        Ok(())
    }

    /// Deletes every row of `partition` whose sort key begins with `prefix`. Finding no
    /// rows is a no-op.
    pub(crate) async fn purge_rows(
        &self,
        partition: &str,
        prefix: &str,
        cancel: &CancellationToken,
    ) -> Result<(), Report<RbacError>> {
        let rows = self
            .table
            .scan(partition, prefix, cancel)
            .await
            .map_err(read_failure)?;
        let operations: Vec<_> = rows
            .iter()
            .filter_map(kv::item_key)
            .map(WriteOperation::Delete)
            .collect();
        if !operations.is_empty() {
            tracing::debug!(partition, prefix, rows = operations.len(), "purging rows");
        }
        self.batch_apply(operations, cancel).await
    }

    /// Deletes every assignment row under `partition`/`prefix` together with its twin
    /// in the opposite view.
    pub(crate) async fn purge_assignment_rows(
        &self,
        partition: &str,
        prefix: &str,
        cancel: &CancellationToken,
    ) -> Result<(), Report<RbacError>> {
        let rows = self
            .table
            .scan(partition, prefix, cancel)
            .await
            .map_err(read_failure)?;
        let mut operations = Vec::with_capacity(rows.len() * 2);
        for attributes in &rows {
            let Some(decoded) = Assignment::from_attributes(attributes) else {
                continue;
            };
            let Some(stored) = kv::item_key(attributes) else {
                continue;
            };
            let twin = if stored == decoded.record.key() {
                decoded.record.twin_key()
            } else {
                decoded.record.key()
            };
            operations.push(WriteOperation::Delete(stored));
            operations.push(WriteOperation::Delete(twin));
        }
        if !operations.is_empty() {
            tracing::debug!(
                partition,
                prefix,
                assignments = operations.len() / 2,
                "purging assignment twins"
            );
        }
        self.batch_apply(operations, cancel).await
    }
}
