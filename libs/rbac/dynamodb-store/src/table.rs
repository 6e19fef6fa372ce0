use std::collections::HashMap;

use aws_sdk_dynamodb::{
    Client,
    error::{ProvideErrorMetadata, SdkError},
    types::{AttributeValue, DeleteRequest, PutRequest, WriteRequest},
};
use error_stack::{Report, ResultExt as _};
use palisade_rbac_store::{
    config::StoreConfig,
    kv::{
        ATTR_ENTITY_NAME, ATTR_SUBJECT_NAME, AttributeMap, KvError, KvTable, WriteOperation,
        WritePrecondition,
    },
};
use palisade_rbac_types::key::ItemKey;
use tokio_util::sync::CancellationToken;

const INITIAL_BACKOFF: core::time::Duration = core::time::Duration::from_millis(25);

/// The wide-row table backed by one DynamoDB table.
#[derive(Debug, Clone)]
pub struct DynamoDbTable {
    client: Client,
    table_name: String,
    retry_budget: u32,
}

impl DynamoDbTable {
    /// Connects through the ambient credential provider chain, honoring the configured
    /// region when set.
    pub async fn connect(config: &StoreConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = config.region() {
            loader = loader.region(aws_config::Region::new(region.to_owned()));
        }
        let sdk_config = loader.load().await;
        Self::with_client(Client::new(&sdk_config), config)
    }

    /// Wraps an already-configured client, e.g. one pointed at a local endpoint.
    #[must_use]
    pub fn with_client(client: Client, config: &StoreConfig) -> Self {
        Self {
            client,
            table_name: config.table_name().to_owned(),
            retry_budget: config.retry_budget(),
        }
    }

    /// Runs `call`, retrying transient failures with exponential backoff until the
    /// retry budget is exhausted. Cancellation wins over both the in-flight call and
    /// the backoff sleep.
    async fn with_retries<T, F, Fut>(
        &self,
        operation: &'static str,
        cancel: &CancellationToken,
        mut call: F,
    ) -> Result<T, Report<KvError>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Failure>>,
    {
        let mut backoff = INITIAL_BACKOFF;
        let mut attempt = 0;
        loop {
            let outcome = tokio::select! {
                () = cancel.cancelled() => return Err(Report::new(KvError::Cancelled)),
                outcome = call() => outcome,
            };
            let kind = match outcome {
                Ok(value) => return Ok(value),
                Err(Failure::Fatal(kind)) => return Err(Report::new(kind)),
                Err(Failure::Retryable(kind)) => kind,
            };
            attempt += 1;
            if attempt >= self.retry_budget {
                return Err(Report::new(kind)
                    .attach_printable(format!("{operation} exhausted the retry budget")));
            }
            tracing::debug!(operation, attempt, ?kind, "retrying after backend failure");
            tokio::select! {
                () = cancel.cancelled() => return Err(Report::new(KvError::Cancelled)),
                () = tokio::time::sleep(backoff) => {}
            }
            backoff *= 2;
        }
    }
}

impl KvTable for DynamoDbTable {
    async fn put(
        &self,
        item: AttributeMap,
        precondition: WritePrecondition,
        cancel: &CancellationToken,
    ) -> Result<(), Report<KvError>> {
        let item: HashMap<String, AttributeValue> = serde_dynamo::aws_sdk_dynamodb_1::to_item(
            &item,
        )
        .change_context(KvError::Unavailable)
        .attach_printable("item conversion failed")?;
        let (condition, names, values) = condition_parts(precondition);

        self.with_retries("put_item", cancel, || {
            let request = self
                .client
                .put_item()
                .table_name(&self.table_name)
                .set_item(Some(item.clone()))
                .set_condition_expression(condition.clone())
                .set_expression_attribute_names(names.clone())
                .set_expression_attribute_values(values.clone());
            async move { request.send().await.map(|_| ()).map_err(|error| classify(&error)) }
        })
        .await
    }

    async fn get(
        &self,
        key: &ItemKey,
        cancel: &CancellationToken,
    ) -> Result<Option<AttributeMap>, Report<KvError>> {
        let key: HashMap<String, AttributeValue> = serde_dynamo::aws_sdk_dynamodb_1::to_item(key)
            .change_context(KvError::Unavailable)
            .attach_printable("key conversion failed")?;

        let output = self
            .with_retries("get_item", cancel, || {
                let request = self
                    .client
                    .get_item()
                    .table_name(&self.table_name)
                    .consistent_read(true)
                    .set_key(Some(key.clone()));
                async move { request.send().await.map_err(|error| classify(&error)) }
            })
            .await?;

        Ok(output.item.and_then(convert_item))
    }

    async fn delete(
        &self,
        key: &ItemKey,
        precondition: WritePrecondition,
        cancel: &CancellationToken,
    ) -> Result<(), Report<KvError>> {
        let key: HashMap<String, AttributeValue> = serde_dynamo::aws_sdk_dynamodb_1::to_item(key)
            .change_context(KvError::Unavailable)
            .attach_printable("key conversion failed")?;
        let (condition, names, values) = condition_parts(precondition);

        self.with_retries("delete_item", cancel, || {
            let request = self
                .client
                .delete_item()
                .table_name(&self.table_name)
                .set_key(Some(key.clone()))
                .set_condition_expression(condition.clone())
                .set_expression_attribute_names(names.clone())
                .set_expression_attribute_values(values.clone());
            async move { request.send().await.map(|_| ()).map_err(|error| classify(&error)) }
        })
        .await
    }

    async fn batch_write(
        &self,
        operations: Vec<WriteOperation>,
        cancel: &CancellationToken,
    ) -> Result<(), Report<KvError>> {
        let mut pending = Vec::with_capacity(operations.len());
        for operation in operations {
            pending.push(write_request(operation)?);
        }

        let mut backoff = INITIAL_BACKOFF;
        let mut attempt = 0;
        while !pending.is_empty() {
            let output = self
                .with_retries("batch_write_item", cancel, || {
                    let request = self.client.batch_write_item().set_request_items(Some(
                        HashMap::from([(self.table_name.clone(), pending.clone())]),
                    ));
                    async move { request.send().await.map_err(|error| classify(&error)) }
                })
                .await?;

            pending = output
                .unprocessed_items
                .unwrap_or_default()
                .remove(&self.table_name)
                .unwrap_or_default();
            if pending.is_empty() {
                break;
            }

            attempt += 1;
            if attempt >= self.retry_budget {
                return Err(Report::new(KvError::Unavailable)
                    .attach_printable("unprocessed batch items did not drain"));
            }
            tracing::debug!(
                remaining = pending.len(),
                attempt,
                "retrying unprocessed batch items"
            );
            tokio::select! {
                () = cancel.cancelled() => return Err(Report::new(KvError::Cancelled)),
                () = tokio::time::sleep(backoff) => {}
            }
            backoff *= 2;
        }
        Ok(())
    }

    async fn query(
        &self,
        partition: &str,
        prefix: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<AttributeMap>, Report<KvError>> {
        let mut items = Vec::new();
        let mut exclusive_start_key: Option<HashMap<String, AttributeValue>> = None;
        loop {
            let output = self
                .with_retries("query", cancel, || {
                    let request = self
                        .client
                        .query()
                        .table_name(&self.table_name)
                        .consistent_read(true)
                        .key_condition_expression("#pk = :pk AND begins_with(#sk, :sk)")
                        .expression_attribute_names("#pk", ATTR_ENTITY_NAME)
                        .expression_attribute_names("#sk", ATTR_SUBJECT_NAME)
                        .expression_attribute_values(
                            ":pk",
                            AttributeValue::S(partition.to_owned()),
                        )
                        .expression_attribute_values(":sk", AttributeValue::S(prefix.to_owned()))
                        .set_exclusive_start_key(exclusive_start_key.clone());
                    async move { request.send().await.map_err(|error| classify(&error)) }
                })
                .await?;

            items.extend(
                output
                    .items
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(convert_item),
            );
            exclusive_start_key = output.last_evaluated_key;
            if exclusive_start_key.is_none() {
                return Ok(items);
            }
        }
    }

    async fn scan(
        &self,
        partition: &str,
        prefix: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<AttributeMap>, Report<KvError>> {
        let mut items = Vec::new();
        let mut exclusive_start_key: Option<HashMap<String, AttributeValue>> = None;
        loop {
            let output = self
                .with_retries("scan", cancel, || {
                    let request = self
                        .client
                        .scan()
                        .table_name(&self.table_name)
                        .consistent_read(true)
                        .filter_expression("#pk = :pk AND begins_with(#sk, :sk)")
                        .expression_attribute_names("#pk", ATTR_ENTITY_NAME)
                        .expression_attribute_names("#sk", ATTR_SUBJECT_NAME)
                        .expression_attribute_values(
                            ":pk",
                            AttributeValue::S(partition.to_owned()),
                        )
                        .expression_attribute_values(":sk", AttributeValue::S(prefix.to_owned()))
                        .set_exclusive_start_key(exclusive_start_key.clone());
                    async move { request.send().await.map_err(|error| classify(&error)) }
                })
                .await?;

            items.extend(
                output
                    .items
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(convert_item),
            );
            exclusive_start_key = output.last_evaluated_key;
            if exclusive_start_key.is_none() {
                // Scan pages are not sort-ordered across partitions; restore the
                // contract of ascending sort keys.
                items.sort_by(|left, right| {
                    let sort_key = |item: &AttributeMap| {
                        item.get(ATTR_SUBJECT_NAME)
                            .and_then(serde_json::Value::as_str)
                            .map(str::to_owned)
                    };
                    sort_key(left).cmp(&sort_key(right))
                });
                return Ok(items);
            }
        }
    }
}

enum Failure {
    Retryable(KvError),
    Fatal(KvError),
}

fn classify<E, R>(error: &SdkError<E, R>) -> Failure
where
    E: ProvideErrorMetadata,
{
    match error {
        SdkError::ServiceError(context) => classify_code(context.err().code()),
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            Failure::Retryable(KvError::Unavailable)
        }
        _ => Failure::Fatal(KvError::Unavailable),
    }
}

/// The service-error code strings DynamoDB reports, mapped onto the adapter taxonomy.
fn classify_code(code: Option<&str>) -> Failure {
    match code {
        Some("ConditionalCheckFailedException") => Failure::Fatal(KvError::PreconditionFailed),
        Some(
            "ProvisionedThroughputExceededException" | "ThrottlingException"
            | "RequestLimitExceeded",
        ) => Failure::Retryable(KvError::Throttled),
        Some("ResourceNotFoundException") => Failure::Fatal(KvError::NotFound),
        Some("InternalServerError" | "ServiceUnavailable") => {
            Failure::Retryable(KvError::Unavailable)
        }
        _ => Failure::Fatal(KvError::Unavailable),
    }
}

fn condition_parts(
    precondition: WritePrecondition,
) -> (
    Option<String>,
    Option<HashMap<String, String>>,
    Option<HashMap<String, AttributeValue>>,
) {
    match precondition {
        WritePrecondition::None => (None, None, None),
        WritePrecondition::NotExists => (
            Some("attribute_not_exists(#pk)".to_owned()),
            Some(HashMap::from([(
                "#pk".to_owned(),
                ATTR_ENTITY_NAME.to_owned(),
            )])),
            None,
        ),
        WritePrecondition::EtagMatches(etag) => (
            Some("#etag = :etag".to_owned()),
            Some(HashMap::from([("#etag".to_owned(), "etag".to_owned())])),
            Some(HashMap::from([(
                ":etag".to_owned(),
                AttributeValue::S(etag.to_string()),
            )])),
        ),
    }
}

fn write_request(operation: WriteOperation) -> Result<WriteRequest, Report<KvError>> {
    match operation {
        WriteOperation::Put(item) => {
            let item: HashMap<String, AttributeValue> =
                serde_dynamo::aws_sdk_dynamodb_1::to_item(&item)
                    .change_context(KvError::Unavailable)
                    .attach_printable("item conversion failed")?;
            let put = PutRequest::builder()
                .set_item(Some(item))
                .build()
                .change_context(KvError::Unavailable)?;
            Ok(WriteRequest::builder().put_request(put).build())
        }
        WriteOperation::Delete(key) => {
            let key: HashMap<String, AttributeValue> =
                serde_dynamo::aws_sdk_dynamodb_1::to_item(&key)
                    .change_context(KvError::Unavailable)
                    .attach_printable("key conversion failed")?;
            let delete = DeleteRequest::builder()
                .set_key(Some(key))
                .build()
                .change_context(KvError::Unavailable)?;
            Ok(WriteRequest::builder().delete_request(delete).build())
        }
    }
}

/// Response items come back as attribute values; anything that does not convert to a
/// JSON-shaped map was not written by this store and is skipped.
fn convert_item(item: HashMap<String, AttributeValue>) -> Option<AttributeMap> {
    match serde_dynamo::aws_sdk_dynamodb_1::from_item(item) {
        Ok(converted) => Some(converted),
        Err(error) => {
            tracing::warn!(%error, "skipping row that is not JSON-shaped");
            None
        }
    }
}
