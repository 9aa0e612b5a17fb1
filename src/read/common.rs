use crate::{
    common::{
        self,
        condition::KeyCondition,
        expression::{self, Placeholders},
        selection::SelectionMap,
    },
    error::{Error, Result},
};

use aws_sdk_dynamodb::types;
use serde_json::Value;
use std::collections;

/// Options of a single-item read.
///
/// ```rust
/// use dynamodb_mapper::read::common::GetOptions;
///
/// let options = GetOptions {
///     consistent_read: Some(true),
///     attributes: Some(["email", "name"].into_iter().collect()),
///     ..Default::default()
/// };
/// ```
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct GetOptions {
    /// Which attributes to return; all of them when `None`.
    pub attributes: Option<SelectionMap>,
    /// Strongly consistent read when `Some(true)`.
    pub consistent_read: Option<bool>,
    /// Whether to report consumed capacity.
    pub return_consumed_capacity: Option<types::ReturnConsumedCapacity>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct SingleReadInput {
    pub(crate) consistent_read: Option<bool>,
    pub(crate) expression_attribute_names: Option<collections::HashMap<String, String>>,
    pub(crate) projection_expression: Option<String>,
    pub(crate) return_consumed_capacity: Option<types::ReturnConsumedCapacity>,
    pub(crate) table_name: String,
}

impl GetOptions {
    pub(crate) fn compile(self, table_name: String) -> SingleReadInput {
        let mut placeholders = Placeholders::default();
        let projection_expression = self
            .attributes
            .map(|attributes| attributes.compile(&mut placeholders));
        let (expression_attribute_names, _) = placeholders.into_maps();
        SingleReadInput {
            consistent_read: self.consistent_read,
            expression_attribute_names,
            projection_expression,
            return_consumed_capacity: self.return_consumed_capacity,
            table_name,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct MultipleReadInput {
    pub(crate) consistent_read: Option<bool>,
    pub(crate) exclusive_start_key: Option<common::AttributeMap>,
    pub(crate) expression_attribute_names: Option<collections::HashMap<String, String>>,
    pub(crate) expression_attribute_values: Option<common::AttributeMap>,
    pub(crate) filter_expression: Option<String>,
    pub(crate) index_name: Option<String>,
    pub(crate) limit: Option<i32>,
    pub(crate) projection_expression: Option<String>,
    pub(crate) return_consumed_capacity: Option<types::ReturnConsumedCapacity>,
    pub(crate) select: Option<types::Select>,
    pub(crate) table_name: String,
}

/// Builder state shared by queries and scans.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct MultipleReadArgs {
    pub(crate) attributes: Option<SelectionMap>,
    pub(crate) consistent_read: Option<bool>,
    pub(crate) exclusive_start_key: Option<common::Attributes>,
    pub(crate) expression_attribute_names: collections::HashMap<String, String>,
    pub(crate) expression_attribute_values: common::Attributes,
    pub(crate) filter_conditions: Vec<KeyCondition<Value>>,
    pub(crate) filter_expression: Option<String>,
    pub(crate) index_name: Option<String>,
    pub(crate) limit: Option<i32>,
    pub(crate) load_all: bool,
    pub(crate) projection_expression: Option<String>,
    pub(crate) return_consumed_capacity: Option<types::ReturnConsumedCapacity>,
    pub(crate) select: Option<types::Select>,
}

impl MultipleReadArgs {
    /// Compile filters and projection into `placeholders`, which may already
    /// hold the key condition's entries.
    pub(crate) fn compile(
        self,
        table_name: String,
        mut placeholders: Placeholders,
    ) -> Result<MultipleReadInput> {
        if let Some(limit) = self.limit.filter(|limit| *limit <= 0) {
            return Err(Error::validation(format!(
                "limit must be positive, got {limit}"
            )));
        }
        let compiled_filter = KeyCondition::compile_all(self.filter_conditions, &mut placeholders)?;
        let filter_expression = expression::join(
            " AND ",
            compiled_filter
                .into_iter()
                .chain(self.filter_expression)
                .collect(),
        );
        let projection_expression = [
            self.attributes
                .map(|attributes| attributes.compile(&mut placeholders)),
            self.projection_expression,
        ]
        .into_iter()
        .flatten()
        .filter(|projection| !projection.is_empty())
        .reduce(|left, right| format!("{left}, {right}"));
        placeholders.extend_names(self.expression_attribute_names)?;
        placeholders.extend_values(self.expression_attribute_values)?;
        let exclusive_start_key = self
            .exclusive_start_key
            .as_ref()
            .map(common::to_attribute_map)
            .transpose()?;
        let (expression_attribute_names, expression_attribute_values) = placeholders.into_maps();
        Ok(MultipleReadInput {
            consistent_read: self.consistent_read,
            exclusive_start_key,
            expression_attribute_names,
            expression_attribute_values,
            filter_expression,
            index_name: self.index_name,
            limit: self.limit,
            projection_expression,
            return_consumed_capacity: self.return_consumed_capacity,
            select: self.select,
            table_name,
        })
    }
}

/// Builder methods shared by queries and scans.
macro_rules! multiple_read_methods {
    () => {
        /// Filter on a non-key attribute; evaluated after items are read.
        pub fn filter(
            self,
            attribute: impl Into<String>,
        ) -> $crate::common::condition::FilterConditionChain<Self> {
            $crate::common::condition::FilterConditionChain::new(self, attribute)
        }

        /// Append a pre-built filter condition.
        pub fn add_filter_condition(
            mut self,
            condition: $crate::common::condition::KeyCondition<serde_json::Value>,
        ) -> Self {
            self.args.filter_conditions.push(condition);
            self
        }

        /// Raw filter expression, AND-merged with the compiled conditions.
        pub fn filter_expression(mut self, expression: impl Into<String>) -> Self {
            self.args.filter_expression = Some(expression.into());
            self
        }

        /// Raw projection expression, appended to [`Self::attributes`].
        pub fn projection_expression(mut self, expression: impl Into<String>) -> Self {
            self.args.projection_expression = Some(expression.into());
            self
        }

        /// Name placeholders referenced by raw expressions.
        pub fn expression_attribute_names(
            mut self,
            names: impl IntoIterator<Item = (String, String)>,
        ) -> Self {
            self.args.expression_attribute_names.extend(names);
            self
        }

        /// Value placeholders referenced by raw expressions.
        pub fn expression_attribute_values(mut self, values: $crate::common::Attributes) -> Self {
            self.args.expression_attribute_values.extend(values);
            self
        }

        /// Return only these attributes.
        pub fn attributes<S: Into<String>>(mut self, attributes: impl IntoIterator<Item = S>) -> Self {
            self.args.attributes = Some(attributes.into_iter().collect());
            self
        }

        /// Nested attribute selection.
        pub fn selection(mut self, selection: $crate::common::selection::SelectionMap) -> Self {
            self.args.attributes = Some(selection);
            self
        }

        /// What the store returns for each item.
        pub fn select(mut self, select: aws_sdk_dynamodb::types::Select) -> Self {
            self.args.select = Some(select);
            self
        }

        /// Shorthand for `select(Select::Count)`.
        pub fn count(self) -> Self {
            self.select(aws_sdk_dynamodb::types::Select::Count)
        }

        /// Total number of items to return; with [`Self::load_all`] it caps
        /// the sum across pages.
        pub fn limit(mut self, limit: i32) -> Self {
            self.args.limit = Some(limit);
            self
        }

        /// Strongly consistent read.
        pub fn consistent_read(mut self, consistent_read: bool) -> Self {
            self.args.consistent_read = Some(consistent_read);
            self
        }

        /// Continue after a previous page's `last_evaluated_key`.
        pub fn exclusive_start_key(mut self, key: $crate::common::Attributes) -> Self {
            self.args.exclusive_start_key = Some(key);
            self
        }

        /// Follow continuation keys until exhausted or the limit is reached.
        pub fn load_all(mut self) -> Self {
            self.args.load_all = true;
            self
        }

        /// Report consumed capacity on every page.
        pub fn return_consumed_capacity(
            mut self,
            return_consumed_capacity: aws_sdk_dynamodb::types::ReturnConsumedCapacity,
        ) -> Self {
            self.args.return_consumed_capacity = Some(return_consumed_capacity);
            self
        }

        /// Execute and collect every page the stream would produce.
        pub async fn exec_all(self) -> $crate::error::Result<$crate::read::stream::Response> {
            self.exec()?.collect_response().await
        }
    };
}

pub(crate) use multiple_read_methods;

/// apply common single read operation settings to a builder
#[macro_export]
#[doc(hidden)]
macro_rules! apply_single_read_operation {
    ($builder:expr, $single_read_operation:expr) => {
        $builder
            .set_consistent_read($single_read_operation.consistent_read)
            .set_expression_attribute_names($single_read_operation.expression_attribute_names)
            .set_projection_expression($single_read_operation.projection_expression)
            .set_return_consumed_capacity($single_read_operation.return_consumed_capacity)
            .table_name($single_read_operation.table_name)
    };
}

/// apply common multiple read operation settings to a builder
#[macro_export]
#[doc(hidden)]
macro_rules! apply_multiple_read_operation {
    ($builder:expr, $multiple_read_operation:expr) => {
        $builder
            .set_consistent_read($multiple_read_operation.consistent_read)
            .set_exclusive_start_key($multiple_read_operation.exclusive_start_key)
            .set_expression_attribute_names($multiple_read_operation.expression_attribute_names)
            .set_expression_attribute_values($multiple_read_operation.expression_attribute_values)
            .set_filter_expression($multiple_read_operation.filter_expression)
            .set_index_name($multiple_read_operation.index_name)
            .set_limit($multiple_read_operation.limit)
            .set_projection_expression($multiple_read_operation.projection_expression)
            .set_return_consumed_capacity($multiple_read_operation.return_consumed_capacity)
            .set_select($multiple_read_operation.select)
            .table_name($multiple_read_operation.table_name)
    };
}

pub(crate) fn aggregate_capacity(
    capacities: Vec<types::ConsumedCapacity>,
) -> Option<types::ConsumedCapacity> {
    if capacities.is_empty() {
        return None;
    }
    let (cap, read, write, table) = capacities.into_iter().fold(
        (0.0, 0.0, 0.0, None),
        |(cap, read, write, table), capacity| {
            (
                cap + capacity.capacity_units.unwrap_or(0.0),
                read + capacity.read_capacity_units.unwrap_or(0.0),
                write + capacity.write_capacity_units.unwrap_or(0.0),
                table.or(capacity.table_name),
            )
        },
    );
    let capacity = types::ConsumedCapacity::builder()
        .set_table_name(table)
        .set_capacity_units(Some(cap))
        .set_read_capacity_units(Some(read))
        .set_write_capacity_units(Some(write))
        .build();
    Some(capacity)
}
