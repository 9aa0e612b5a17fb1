use crate::{
    common::{
        self,
        batch::{self, BatchOptions},
        key::ItemKey,
    },
    error::{Error, Result, Unprocessed},
    model::{Item, Model},
};

use aws_sdk_dynamodb::{operation::batch_write_item::BatchWriteItemInput, types};
use indexmap::IndexMap;
use std::sync::Arc;

/// Most write requests the store accepts in one batch write request.
pub const BATCH_WRITE_LIMIT: usize = 25;

/// A single request within a batch write.
///
/// Each request either puts (creates or replaces) an item or deletes one by key.
#[derive(Clone, Debug, PartialEq)]
pub enum BatchWriteRequest {
    /// Put request - full item attributes.
    Put(common::Attributes),
    /// Delete request - the key attributes of the item to remove.
    Delete(common::Attributes),
}

impl BatchWriteRequest {
    fn from_write_request(write_request: types::WriteRequest) -> Result<Self> {
        if let Some(put_request) = write_request.put_request {
            return Ok(Self::Put(common::from_attribute_map(put_request.item)?));
        }
        if let Some(delete_request) = write_request.delete_request {
            return Ok(Self::Delete(common::from_attribute_map(delete_request.key)?));
        }
        Err(Error::validation("write request has neither a put nor a delete"))
    }
}

impl Model {
    /// Validate, stamp and encode a put.
    fn put_request(&self, attributes: common::Attributes) -> Result<(common::Attributes, types::WriteRequest)> {
        let mut attributes = self.validate(attributes)?;
        self.stamp_created(&mut attributes);
        self.key_of(attributes.clone())?;
        let put_request = types::PutRequest::builder()
            .set_item(Some(self.encode(&attributes)?))
            .build()?;
        let write_request = types::WriteRequest::builder()
            .put_request(put_request)
            .build();
        Ok((attributes, write_request))
    }

    fn delete_request(&self, key: impl Into<ItemKey>) -> Result<types::WriteRequest> {
        let key = common::to_attribute_map(&self.key_of(key)?)?;
        let delete_request = types::DeleteRequest::builder().set_key(Some(key)).build()?;
        let write_request = types::WriteRequest::builder()
            .delete_request(delete_request)
            .build();
        Ok(write_request)
    }

    /// Send prepared write requests in chunks, last request per key wins.
    async fn write_all(
        &self,
        write_requests: Vec<types::WriteRequest>,
        options: BatchOptions,
    ) -> Result<()> {
        let key_names = self.key_names();
        let mut unique = IndexMap::with_capacity(write_requests.len());
        for write_request in write_requests {
            let key = match (&write_request.put_request, &write_request.delete_request) {
                (Some(put_request), _) => &put_request.item,
                (None, Some(delete_request)) => &delete_request.key,
                (None, None) => continue,
            };
            unique.insert(common::key_signature(key, &key_names)?, write_request);
        }
        if unique.is_empty() {
            return Ok(());
        }
        let chunk_size = options.chunk_size(BATCH_WRITE_LIMIT);
        let chunks: Vec<Vec<types::WriteRequest>> = unique
            .into_values()
            .collect::<Vec<_>>()
            .chunks(chunk_size)
            .map(<[types::WriteRequest]>::to_vec)
            .collect();
        let policy = options.retry.as_ref().unwrap_or(self.retry());
        let store = self.store();
        let table_name = self.table_name();
        let table_name = &table_name;
        let return_consumed_capacity = &options.return_consumed_capacity;
        let outcome = batch::run(policy, chunks, options.concurrency(), |write_requests| {
            let input = BatchWriteItemInput::builder()
                .request_items(table_name.clone(), write_requests)
                .set_return_consumed_capacity(return_consumed_capacity.clone())
                .build();
            async move {
                let mut output = store.batch_write_item(input?).await?;
                let unprocessed = output
                    .unprocessed_items
                    .as_mut()
                    .and_then(|unprocessed| unprocessed.remove(table_name))
                    .unwrap_or_default();
                Ok((Vec::<()>::new(), unprocessed))
            }
        })
        .await?;
        if !outcome.unprocessed.is_empty() {
            let writes = outcome
                .unprocessed
                .into_iter()
                .map(BatchWriteRequest::from_write_request)
                .collect::<Result<_>>()?;
            return Err(Error::PartialFailure {
                unprocessed: Unprocessed::Writes(writes),
                attempts: outcome.attempts,
            });
        }
        Ok(())
    }

    /// Put and delete many items.
    ///
    /// Every put is validated and timestamped before the first request is
    /// sent. Requests are split into chunks of at most [`BATCH_WRITE_LIMIT`],
    /// issued concurrently, and whatever the store leaves unprocessed is
    /// retried under the retry policy. Lifecycle hooks do not run.
    ///
    /// ```rust,no_run
    /// use dynamodb_mapper::write::batch_write_item::BatchWriteRequest;
    /// use serde_json::json;
    ///
    /// # async fn example(accounts: std::sync::Arc<dynamodb_mapper::model::Model>) -> dynamodb_mapper::error::Result<()> {
    /// let put = json!({"email": "foo@example.com", "name": "Foo"});
    /// let delete = json!({"email": "bar@example.com"});
    /// accounts
    ///     .batch_write(
    ///         [
    ///             BatchWriteRequest::Put(put.as_object().cloned().unwrap_or_default()),
    ///             BatchWriteRequest::Delete(delete.as_object().cloned().unwrap_or_default()),
    ///         ],
    ///         Default::default(),
    ///     )
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.batch_write", skip_all, fields(model = self.name()), err)
    )]
    pub async fn batch_write(
        self: &Arc<Self>,
        requests: impl IntoIterator<Item = BatchWriteRequest>,
        options: BatchOptions,
    ) -> Result<()> {
        let write_requests = requests
            .into_iter()
            .map(|request| match request {
                BatchWriteRequest::Put(attributes) => {
                    self.put_request(attributes).map(|(_, write_request)| write_request)
                }
                BatchWriteRequest::Delete(key) => self.delete_request(key),
            })
            .collect::<Result<_>>()?;
        self.write_all(write_requests, options).await
    }

    /// Put many items and return them as written.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.batch_create", skip_all, fields(model = self.name()), err)
    )]
    pub async fn batch_create(
        self: &Arc<Self>,
        items: impl IntoIterator<Item = common::Attributes>,
        options: BatchOptions,
    ) -> Result<Vec<Item>> {
        let (items, write_requests): (Vec<_>, Vec<_>) = items
            .into_iter()
            .map(|attributes| self.put_request(attributes))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .unzip();
        self.write_all(write_requests, options).await?;
        Ok(items.into_iter().map(|attributes| self.bind(attributes)).collect())
    }

    /// Delete many items by key.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.batch_destroy", skip_all, fields(model = self.name()), err)
    )]
    pub async fn batch_destroy<K: Into<ItemKey>>(
        self: &Arc<Self>,
        keys: impl IntoIterator<Item = K>,
        options: BatchOptions,
    ) -> Result<()> {
        let write_requests = keys
            .into_iter()
            .map(|key| self.delete_request(key))
            .collect::<Result<_>>()?;
        self.write_all(write_requests, options).await
    }
}
