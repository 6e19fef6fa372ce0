//! DynamoDB adapter for the Palisade RBAC store.
//!
//! Implements the abstract table interface against `aws-sdk-dynamodb`: conditional
//! single-row writes expressed as condition expressions, strongly consistent reads,
//! internally paginated query/scan, and batch writes whose unprocessed remainder is
//! drained with exponential backoff under the configured retry budget. SDK failures are
//! normalized into the adapter taxonomy before they reach the repository.

pub mod table;

pub use self::table::DynamoDbTable;
