use crate::{
    common::{
        self, AttributeMap,
        batch::{self, BatchOptions},
        expression::Placeholders,
        key::ItemKey,
    },
    error::{Error, Result, Unprocessed},
    model::{Item, Model},
};

use aws_sdk_dynamodb::{operation::batch_get_item::BatchGetItemInput, types};
use indexmap::IndexMap;
use std::{collections, sync::Arc};

/// Most keys the store accepts in one batch get request.
pub const BATCH_GET_LIMIT: usize = 100;

/// Projection shared by every request of one batch get.
#[derive(Clone, Debug, Default, PartialEq)]
struct KeysTemplate {
    consistent_read: Option<bool>,
    expression_attribute_names: Option<collections::HashMap<String, String>>,
    projection_expression: Option<String>,
    return_consumed_capacity: Option<types::ReturnConsumedCapacity>,
    table_name: String,
}

impl KeysTemplate {
    fn new(model: &Model, options: &BatchOptions) -> Self {
        let mut placeholders = Placeholders::default();
        let projection_expression = options.attributes.as_ref().map(|attributes| {
            let mut projection = attributes.compile(&mut placeholders);
            for key_name in model.key_names() {
                let placeholder = placeholders.name(key_name);
                if !projection.split(", ").any(|part| part == placeholder) {
                    projection = format!("{projection}, {placeholder}");
                }
            }
            projection
        });
        let (expression_attribute_names, _) = placeholders.into_maps();
        Self {
            consistent_read: options.consistent_read,
            expression_attribute_names,
            projection_expression,
            return_consumed_capacity: options.return_consumed_capacity.clone(),
            table_name: model.table_name(),
        }
    }

    fn input(&self, keys: Vec<AttributeMap>) -> Result<BatchGetItemInput> {
        let keys_and_attributes = types::KeysAndAttributes::builder()
            .set_consistent_read(self.consistent_read)
            .set_expression_attribute_names(self.expression_attribute_names.clone())
            .set_keys(Some(keys))
            .set_projection_expression(self.projection_expression.clone())
            .build()?;
        let input = BatchGetItemInput::builder()
            .request_items(self.table_name.clone(), keys_and_attributes)
            .set_return_consumed_capacity(self.return_consumed_capacity.clone())
            .build()?;
        Ok(input)
    }
}

impl Model {
    /// Fetch many items by key, in input order.
    ///
    /// Keys are deduplicated, split into requests of at most
    /// [`BATCH_GET_LIMIT`] keys and issued concurrently; keys the store leaves
    /// unprocessed are retried under the retry policy. Missing items come
    /// back as `None`.
    ///
    /// ```rust,no_run
    /// use serde_json::json;
    ///
    /// # async fn example(accounts: std::sync::Arc<dynamodb_mapper::model::Model>) -> dynamodb_mapper::error::Result<()> {
    /// let items = accounts
    ///     .get_items(["foo@example.com", "bar@example.com"], Default::default())
    ///     .await?;
    /// assert_eq!(items.len(), 2);
    /// # Ok(())
    /// # }
    /// ```
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_mapper.get_items", skip_all, fields(model = self.name()), err)
    )]
    pub async fn get_items<K: Into<ItemKey>>(
        self: &Arc<Self>,
        keys: impl IntoIterator<Item = K>,
        options: BatchOptions,
    ) -> Result<Vec<Option<Item>>> {
        let key_names = self.key_names();
        let mut positions = Vec::new();
        let mut unique = IndexMap::new();
        for key in keys {
            let key = common::to_attribute_map(&self.key_of(key)?)?;
            let signature = common::key_signature(&key, &key_names)?;
            unique.entry(signature.clone()).or_insert(key);
            positions.push(signature);
        }
        if unique.is_empty() {
            return Ok(Vec::new());
        }
        let template = KeysTemplate::new(self, &options);
        let chunk_size = options.chunk_size(BATCH_GET_LIMIT);
        let chunks: Vec<Vec<AttributeMap>> = unique
            .into_values()
            .collect::<Vec<_>>()
            .chunks(chunk_size)
            .map(<[AttributeMap]>::to_vec)
            .collect();
        let policy = options.retry.as_ref().unwrap_or(self.retry());
        let store = self.store();
        let template = &template;
        let outcome = batch::run(policy, chunks, options.concurrency(), |keys| {
            let input = template.input(keys);
            async move {
                let mut output = store.batch_get_item(input?).await?;
                let found = output
                    .responses
                    .as_mut()
                    .and_then(|responses| responses.remove(&template.table_name))
                    .unwrap_or_default();
                let unprocessed = output
                    .unprocessed_keys
                    .as_mut()
                    .and_then(|unprocessed| unprocessed.remove(&template.table_name))
                    .map(|keys_and_attributes| keys_and_attributes.keys)
                    .unwrap_or_default();
                Ok((found, unprocessed))
            }
        })
        .await?;
        if !outcome.unprocessed.is_empty() {
            let keys = outcome
                .unprocessed
                .into_iter()
                .map(common::from_attribute_map)
                .collect::<Result<_>>()?;
            return Err(Error::PartialFailure {
                unprocessed: Unprocessed::Keys(keys),
                attempts: outcome.attempts,
            });
        }
        let mut found = collections::HashMap::with_capacity(outcome.results.len());
        for item in outcome.results {
            let signature = common::key_signature(&item, &key_names)?;
            found.insert(signature, self.decode(item)?);
        }
        Ok(positions
            .iter()
            .map(|signature| found.get(signature).cloned())
            .collect())
    }

    /// Alias of [`Model::get_items`].
    pub async fn batch_get_items<K: Into<ItemKey>>(
        self: &Arc<Self>,
        keys: impl IntoIterator<Item = K>,
        options: BatchOptions,
    ) -> Result<Vec<Option<Item>>> {
        self.get_items(keys, options).await
    }
}
