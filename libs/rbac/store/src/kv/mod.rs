//! The abstract wide-row table.
//!
//! One table, composite `(entityName, subjectName)` key, one attribute map per row. Any
//! DynamoDB-class store satisfies this interface: conditional single-row writes, batch
//! writes whose unprocessed remainder the adapter drains internally, and strongly
//! consistent reads with prefix conditions on the sort key.

pub mod memory;

use error_stack::Report;
use palisade_rbac_types::key::{ETag, ItemKey};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// One row's attributes, JSON-shaped. Adapters translate this to their native item
/// representation at the wire.
pub type AttributeMap = serde_json::Map<String, Value>;

pub const ATTR_ENTITY_NAME: &str = "entityName";
pub const ATTR_SUBJECT_NAME: &str = "subjectName";
pub const ATTR_ETAG: &str = "etag";

/// The condition a single-row write is gated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePrecondition {
    /// Unconditional.
    None,
    /// The row must not exist yet.
    NotExists,
    /// The row must exist and carry exactly this version token.
    EtagMatches(ETag),
}

/// One element of a batch write. Batched operations carry no preconditions; they are
/// reserved for idempotent cascade deletes and twin-row writes.
#[derive(Debug, Clone)]
pub enum WriteOperation {
    Put(AttributeMap),
    Delete(ItemKey),
}

/// The adapter-level failure taxonomy. Backend exceptions are normalized into these
/// kinds before they reach the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum KvError {
    /// Retryable network or server failure that outlived the internal retry budget.
    #[error("the key-value backend is unavailable")]
    Unavailable,

    /// A conditional check failed.
    #[error("a write precondition did not hold")]
    PreconditionFailed,

    /// The backend reported a missing row where one was required.
    #[error("the row does not exist")]
    NotFound,

    /// Throughput exceeded beyond the retry budget.
    #[error("the key-value backend throttled the request")]
    Throttled,

    #[error("the operation was cancelled")]
    Cancelled,
}

/// Thin, abstract table operations against the composite-keyed table.
///
/// All reads are strongly consistent. Every call takes the caller's cancellation handle
/// and returns [`KvError::Cancelled`] promptly once it trips.
pub trait KvTable: Send + Sync {
    /// Writes one row, gated on `precondition`.
    ///
    /// # Errors
    ///
    /// - [`KvError::PreconditionFailed`] if the precondition did not hold
    fn put(
        &self,
        item: AttributeMap,
        precondition: WritePrecondition,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<(), Report<KvError>>> + Send;

    /// Reads one row by key; `None` if absent.
    fn get(
        &self,
        key: &ItemKey,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Option<AttributeMap>, Report<KvError>>> + Send;

    /// Deletes one row, gated on `precondition`. Unconditional deletes of absent rows
    /// succeed.
    ///
    /// # Errors
    ///
    /// - [`KvError::PreconditionFailed`] if the precondition did not hold
    fn delete(
        &self,
        key: &ItemKey,
        precondition: WritePrecondition,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<(), Report<KvError>>> + Send;

    /// Applies a bounded batch of unconditioned puts and deletes, retrying the
    /// unprocessed remainder until it drains or the retry budget is exhausted.
    fn batch_write(
        &self,
        operations: Vec<WriteOperation>,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<(), Report<KvError>>> + Send;

    /// Key-condition read: every row of `partition` whose sort key begins with
    /// `prefix`, in ascending sort-key order, paginated internally.
    fn query(
        &self,
        partition: &str,
        prefix: &str,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Vec<AttributeMap>, Report<KvError>>> + Send;

    /// Filter-expression read with the same contract as [`query`]. Kept separate
    /// because some backends price and paginate the two paths differently.
    ///
    /// [`query`]: Self::query
    fn scan(
        &self,
        partition: &str,
        prefix: &str,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Vec<AttributeMap>, Report<KvError>>> + Send;
}

/// Extracts the composite key a row is stored under.
#[must_use]
pub fn item_key(attributes: &AttributeMap) -> Option<ItemKey> {
    let entity_name = attributes.get(ATTR_ENTITY_NAME)?.as_str()?;
    let subject_name = attributes.get(ATTR_SUBJECT_NAME)?.as_str()?;
    Some(ItemKey {
        entity_name: entity_name.to_owned(),
        subject_name: subject_name.to_owned(),
    })
}
