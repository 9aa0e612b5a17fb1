use crate::{
    common::{
        condition::{
            Condition, FilterConditionTarget, KeyCondition, KeyConditionChain, KeyConditionTarget,
        },
        expression::Placeholders,
        key::ItemKey,
    },
    error::{Error, Result},
    model::{IndexKind, Model},
    read::{
        common::{MultipleReadArgs, MultipleReadInput, multiple_read_methods},
        stream::{PageRequest, ResultStream},
    },
};

use aws_sdk_dynamodb::operation::query::QueryInput;
use serde_json::Value;
use std::sync::Arc;

/// Single-partition read against the table or one of its indexes.
///
/// Built with [`Model::query`]; nothing is sent before [`Query::exec`].
///
/// ```rust,no_run
/// use futures::TryStreamExt;
///
/// # async fn example(tweets: std::sync::Arc<dynamodb_mapper::model::Model>) -> dynamodb_mapper::error::Result<()> {
/// let mut pages = tweets
///     .query("werner")
///     .where_("published")
///     .gte("2024-01-01")
///     .filter("retweets")
///     .gt(10)
///     .descending()
///     .limit(20)
///     .exec()?;
/// while let Some(page) = pages.try_next().await? {
///     println!("{} tweets", page.count);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
#[must_use = "a query does nothing until executed"]
pub struct Query {
    args: MultipleReadArgs,
    hash_value: Value,
    key_conditions: Vec<KeyCondition<Value>>,
    model: Arc<Model>,
    scan_index_forward: Option<bool>,
    start_key: Option<ItemKey>,
}

impl KeyConditionTarget for Query {
    fn push_key_condition(mut self, condition: KeyCondition<Value>) -> Self {
        self.key_conditions.push(condition);
        self
    }
}

impl FilterConditionTarget for Query {
    fn push_filter_condition(mut self, condition: KeyCondition<Value>) -> Self {
        self.args.filter_conditions.push(condition);
        self
    }
}

impl Model {
    /// Start a query for every item sharing `hash_value`.
    pub fn query(self: &Arc<Self>, hash_value: impl Into<Value>) -> Query {
        Query {
            args: MultipleReadArgs::default(),
            hash_value: hash_value.into(),
            key_conditions: Vec::new(),
            model: Arc::clone(self),
            scan_index_forward: None,
            start_key: None,
        }
    }
}

impl Query {
    /// Condition on the range key of the queried table or index.
    pub fn where_(self, attribute: impl Into<String>) -> KeyConditionChain<Self> {
        KeyConditionChain::new(self, attribute)
    }

    /// Append a pre-built range key condition.
    pub fn add_key_condition(self, condition: KeyCondition<Value>) -> Self {
        self.push_key_condition(condition)
    }

    /// Query a declared secondary index instead of the table.
    pub fn using_index(mut self, name: impl Into<String>) -> Self {
        self.args.index_name = Some(name.into());
        self
    }

    /// Ascending range key order.
    pub fn ascending(mut self) -> Self {
        self.scan_index_forward = Some(true);
        self
    }

    /// Descending range key order.
    pub fn descending(mut self) -> Self {
        self.scan_index_forward = Some(false);
        self
    }

    /// Resume after the item with this table key.
    ///
    /// Index queries resume from a page's `last_evaluated_key` through
    /// `exclusive_start_key` instead, as the store needs the index keys too.
    pub fn start_key(mut self, key: impl Into<ItemKey>) -> Self {
        self.start_key = Some(key.into());
        self
    }

    multiple_read_methods!();

    /// Compile and start streaming pages.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "dynamodb_mapper.query",
            skip(self),
            fields(model = self.model.name()),
            err
        )
    )]
    pub fn exec(self) -> Result<ResultStream> {
        let model = Arc::clone(&self.model);
        let load_all = self.args.load_all;
        let input = self.compile()?;
        Ok(ResultStream::paginate(
            model,
            PageRequest::Query(input),
            load_all,
        ))
    }

    fn compile(self) -> Result<QueryInput> {
        let (hash_key, range_key) = self.target()?;
        if self.hash_value.is_null() {
            return Err(Error::validation(format!(
                "query on `{}` needs a hash key value for `{hash_key}`",
                self.model.name()
            )));
        }
        if self.key_conditions.len() > 1 {
            return Err(Error::validation(
                "a query accepts at most one range key condition",
            ));
        }
        for key_condition in &self.key_conditions {
            match range_key.as_deref() {
                Some(range_key) if range_key == key_condition.name => {}
                Some(range_key) => {
                    return Err(Error::validation(format!(
                        "`{}` is not the range key `{range_key}`; use `filter` instead",
                        key_condition.name
                    )));
                }
                None => {
                    return Err(Error::validation(format!(
                        "`{}` cannot be a key condition, the query target has no range key",
                        key_condition.name
                    )));
                }
            }
            if !key_condition.condition.is_key_operator() {
                return Err(Error::validation(format!(
                    "operator on `{}` is not allowed in a key condition",
                    key_condition.name
                )));
            }
        }
        let mut key_conditions = vec![KeyCondition {
            condition: Condition::Equals(self.hash_value),
            name: hash_key.clone(),
        }];
        key_conditions.extend(self.key_conditions);
        let mut placeholders = Placeholders::default();
        let key_condition_expression = KeyCondition::compile_all(key_conditions, &mut placeholders)?;
        let mut args = self.args;
        if let Some(key) = self.start_key {
            args.exclusive_start_key = Some(self.model.key_of(key)?);
        }
        let input: MultipleReadInput = args.compile(self.model.table_name(), placeholders)?;
        let scan_index_forward = range_key.and(self.scan_index_forward);
        let builder = QueryInput::builder()
            .set_key_condition_expression(key_condition_expression)
            .set_scan_index_forward(scan_index_forward);
        let input = crate::apply_multiple_read_operation!(builder, input).build()?;
        Ok(input)
    }

    /// Hash and range key names of the queried table or index.
    fn target(&self) -> Result<(String, Option<String>)> {
        let Some(index_name) = self.args.index_name.as_deref() else {
            return Ok((
                self.model.hash_key().to_string(),
                self.model.range_key().map(str::to_string),
            ));
        };
        let index = self.model.index(index_name).ok_or_else(|| {
            Error::validation(format!(
                "model `{}` has no index `{index_name}`",
                self.model.name()
            ))
        })?;
        if index.kind == IndexKind::Global && self.args.consistent_read == Some(true) {
            return Err(Error::validation(format!(
                "global index `{index_name}` does not support consistent reads"
            )));
        }
        Ok((index.hash_key.clone(), index.range_key.clone()))
    }
}
