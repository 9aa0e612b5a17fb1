//! The request surface the mapper needs from the underlying store.
//!
//! [`Store`] is implemented for [`aws_sdk_dynamodb::Client`]; tests and
//! alternative backends can provide their own implementation.

use crate::error::{Error, Result};

use async_trait::async_trait;
use aws_sdk_dynamodb::{
    Client,
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    operation::{
        batch_get_item::{BatchGetItemInput, BatchGetItemOutput},
        batch_write_item::{BatchWriteItemInput, BatchWriteItemOutput},
        delete_item::{DeleteItemInput, DeleteItemOutput},
        get_item::{GetItemInput, GetItemOutput},
        put_item::{PutItemInput, PutItemOutput},
        query::{QueryInput, QueryOutput},
        scan::{ScanInput, ScanOutput},
        update_item::{UpdateItemInput, UpdateItemOutput},
    },
};

/// Error codes the store uses for throttling and capacity exhaustion.
const TRANSIENT_CODES: &[&str] = &[
    "ProvisionedThroughputExceededException",
    "RequestLimitExceeded",
    "ThrottlingException",
];

const CONDITIONAL_CHECK_FAILED: &str = "ConditionalCheckFailedException";

/// One method per request category issued by the mapper.
///
/// Implementations must map a failed write condition to
/// [`Error::ConditionalCheckFailed`] and throttling to [`Error::Transient`];
/// the orchestration layer relies on that classification.
#[async_trait]
pub trait Store: Send + Sync {
    /// Fetch one item by key.
    async fn get_item(&self, input: GetItemInput) -> Result<GetItemOutput>;

    /// Create or replace one item.
    async fn put_item(&self, input: PutItemInput) -> Result<PutItemOutput>;

    /// Apply an update expression to one item.
    async fn update_item(&self, input: UpdateItemInput) -> Result<UpdateItemOutput>;

    /// Delete one item by key.
    async fn delete_item(&self, input: DeleteItemInput) -> Result<DeleteItemOutput>;

    /// Read one page of a single-partition query.
    async fn query(&self, input: QueryInput) -> Result<QueryOutput>;

    /// Read one page of a scan or scan segment.
    async fn scan(&self, input: ScanInput) -> Result<ScanOutput>;

    /// Fetch up to the per-request cap of keys.
    async fn batch_get_item(&self, input: BatchGetItemInput) -> Result<BatchGetItemOutput>;

    /// Write up to the per-request cap of put/delete requests.
    async fn batch_write_item(&self, input: BatchWriteItemInput) -> Result<BatchWriteItemOutput>;
}

/// Map an SDK failure onto the mapper's error taxonomy.
pub(crate) fn classify<E>(error: SdkError<E>) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let code = error
        .as_service_error()
        .and_then(|service_error| service_error.code())
        .map(str::to_owned);
    match code.as_deref() {
        Some(CONDITIONAL_CHECK_FAILED) => {
            Error::ConditionalCheckFailed(DisplayErrorContext(&error).to_string())
        }
        Some(code) if TRANSIENT_CODES.contains(&code) => Error::Transient(Box::new(error)),
        _ => Error::Store(Box::new(error)),
    }
}

#[async_trait]
impl Store for Client {
    async fn get_item(&self, input: GetItemInput) -> Result<GetItemOutput> {
        Client::get_item(self)
            .set_consistent_read(input.consistent_read)
            .set_expression_attribute_names(input.expression_attribute_names)
            .set_key(input.key)
            .set_projection_expression(input.projection_expression)
            .set_return_consumed_capacity(input.return_consumed_capacity)
            .set_table_name(input.table_name)
            .send()
            .await
            .map_err(classify)
    }

    async fn put_item(&self, input: PutItemInput) -> Result<PutItemOutput> {
        Client::put_item(self)
            .set_condition_expression(input.condition_expression)
            .set_expression_attribute_names(input.expression_attribute_names)
            .set_expression_attribute_values(input.expression_attribute_values)
            .set_item(input.item)
            .set_return_consumed_capacity(input.return_consumed_capacity)
            .set_return_item_collection_metrics(input.return_item_collection_metrics)
            .set_return_values(input.return_values)
            .set_return_values_on_condition_check_failure(
                input.return_values_on_condition_check_failure,
            )
            .set_table_name(input.table_name)
            .send()
            .await
            .map_err(classify)
    }

    async fn update_item(&self, input: UpdateItemInput) -> Result<UpdateItemOutput> {
        Client::update_item(self)
            .set_condition_expression(input.condition_expression)
            .set_expression_attribute_names(input.expression_attribute_names)
            .set_expression_attribute_values(input.expression_attribute_values)
            .set_key(input.key)
            .set_return_consumed_capacity(input.return_consumed_capacity)
            .set_return_item_collection_metrics(input.return_item_collection_metrics)
            .set_return_values(input.return_values)
            .set_return_values_on_condition_check_failure(
                input.return_values_on_condition_check_failure,
            )
            .set_table_name(input.table_name)
            .set_update_expression(input.update_expression)
            .send()
            .await
            .map_err(classify)
    }

    async fn delete_item(&self, input: DeleteItemInput) -> Result<DeleteItemOutput> {
        Client::delete_item(self)
            .set_condition_expression(input.condition_expression)
            .set_expression_attribute_names(input.expression_attribute_names)
            .set_expression_attribute_values(input.expression_attribute_values)
            .set_key(input.key)
            .set_return_consumed_capacity(input.return_consumed_capacity)
            .set_return_item_collection_metrics(input.return_item_collection_metrics)
            .set_return_values(input.return_values)
            .set_return_values_on_condition_check_failure(
                input.return_values_on_condition_check_failure,
            )
            .set_table_name(input.table_name)
            .send()
            .await
            .map_err(classify)
    }

    async fn query(&self, input: QueryInput) -> Result<QueryOutput> {
        Client::query(self)
            .set_consistent_read(input.consistent_read)
            .set_exclusive_start_key(input.exclusive_start_key)
            .set_expression_attribute_names(input.expression_attribute_names)
            .set_expression_attribute_values(input.expression_attribute_values)
            .set_filter_expression(input.filter_expression)
            .set_index_name(input.index_name)
            .set_key_condition_expression(input.key_condition_expression)
            .set_limit(input.limit)
            .set_projection_expression(input.projection_expression)
            .set_return_consumed_capacity(input.return_consumed_capacity)
            .set_scan_index_forward(input.scan_index_forward)
            .set_select(input.select)
            .set_table_name(input.table_name)
            .send()
            .await
            .map_err(classify)
    }

    async fn scan(&self, input: ScanInput) -> Result<ScanOutput> {
        Client::scan(self)
            .set_consistent_read(input.consistent_read)
            .set_exclusive_start_key(input.exclusive_start_key)
            .set_expression_attribute_names(input.expression_attribute_names)
            .set_expression_attribute_values(input.expression_attribute_values)
            .set_filter_expression(input.filter_expression)
            .set_index_name(input.index_name)
            .set_limit(input.limit)
            .set_projection_expression(input.projection_expression)
            .set_return_consumed_capacity(input.return_consumed_capacity)
            .set_segment(input.segment)
            .set_select(input.select)
            .set_table_name(input.table_name)
            .set_total_segments(input.total_segments)
            .send()
            .await
            .map_err(classify)
    }

    async fn batch_get_item(&self, input: BatchGetItemInput) -> Result<BatchGetItemOutput> {
        Client::batch_get_item(self)
            .set_request_items(input.request_items)
            .set_return_consumed_capacity(input.return_consumed_capacity)
            .send()
            .await
            .map_err(classify)
    }

    async fn batch_write_item(&self, input: BatchWriteItemInput) -> Result<BatchWriteItemOutput> {
        Client::batch_write_item(self)
            .set_request_items(input.request_items)
            .set_return_consumed_capacity(input.return_consumed_capacity)
            .set_return_item_collection_metrics(input.return_item_collection_metrics)
            .send()
            .await
            .map_err(classify)
    }
}
