//! Repository and abstract table operations for the Palisade RBAC service.
//!
//! The crate is split along the write path: [`kv`] defines the thin table interface any
//! wide-column store satisfies (conditional single-row writes, drained batch writes,
//! strongly consistent prefix reads), [`record`] maps domain entities onto attribute
//! maps, and [`repository`] implements every domain operation — creates guarded by
//! `not_exists` preconditions, ETag-serialized deletes, concurrent cascade fan-out, and
//! audit-event emission governed by the configured policy.

pub mod config;
pub mod error;
pub mod kv;
pub mod record;
pub mod repository;
pub mod validator;
