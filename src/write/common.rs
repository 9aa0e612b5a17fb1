use crate::{
    common::{
        AttributeMap,
        condition::{ConditionMap, Expected, KeyCondition},
        expression::{self, Placeholders},
    },
    error::Result,
};

use aws_sdk_dynamodb::types;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections;

/// Internal representation of write operation parameters.
///
/// Holds the resolved condition expression and the placeholder maps of the
/// whole request, ready to be applied to a request builder.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct WriteInput {
    pub(crate) condition_expression: Option<String>,
    pub(crate) expression_attribute_names: Option<collections::HashMap<String, String>>,
    pub(crate) expression_attribute_values: Option<AttributeMap>,
    pub(crate) return_consumed_capacity: Option<types::ReturnConsumedCapacity>,
    pub(crate) return_item_collection_metrics: Option<types::ReturnItemCollectionMetrics>,
    pub(crate) return_values: Option<types::ReturnValue>,
    pub(crate) return_values_on_condition_check_failure:
        Option<types::ReturnValuesOnConditionCheckFailure>,
    pub(crate) table_name: String,
}

/// Arguments common to create, update and destroy.
///
/// ```rust
/// use dynamodb_mapper::{common::condition::Expected, write::common::WriteArgs};
/// use indexmap::IndexMap;
/// use serde_json::json;
///
/// let write_args = WriteArgs {
///     expected: IndexMap::from([
///         ("status".to_string(), Expected::Equals(json!("draft"))),
///         ("lockedBy".to_string(), Expected::NotExists),
///     ]),
///     ..Default::default()
/// };
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WriteArgs {
    /// Arbitrary condition that must hold for the write to happen.
    pub condition: Option<ConditionMap<Value>>,
    /// Expected value or existence per attribute, AND-combined with `condition`.
    pub expected: IndexMap<String, Expected>,
    /// Whether to return the consumed capacity information.
    pub return_consumed_capacity: Option<types::ReturnConsumedCapacity>,
    /// Whether to return item collection metrics.
    pub return_item_collection_metrics: Option<types::ReturnItemCollectionMetrics>,
    /// Which item attributes to return in the response.
    ///
    /// Operations pick their own default when `None`.
    pub return_values: Option<types::ReturnValue>,
    /// Which item attributes to return if a condition check fails.
    pub return_values_on_condition_check_failure:
        Option<types::ReturnValuesOnConditionCheckFailure>,
}

impl WriteArgs {
    /// Compile the conditions into `placeholders`, which may already hold the
    /// entries of an update expression.
    ///
    /// `guards` are conditions the operation itself adds, e.g. key absence.
    pub(crate) fn compile(
        self,
        table_name: String,
        mut placeholders: Placeholders,
        guards: Vec<KeyCondition<Value>>,
    ) -> Result<WriteInput> {
        let mut conditions = guards;
        conditions.extend(self.expected.into_iter().map(|(name, expected)| KeyCondition {
            condition: expected.into(),
            name,
        }));
        let mut expressions = Vec::with_capacity(2);
        expressions.extend(KeyCondition::compile_all(conditions, &mut placeholders)?);
        if let Some(condition) = self.condition {
            expressions.extend(condition.compile(&mut placeholders)?);
        }
        let condition_expression = expression::join(" AND ", expressions);
        let (expression_attribute_names, expression_attribute_values) = placeholders.into_maps();
        Ok(WriteInput {
            condition_expression,
            expression_attribute_names,
            expression_attribute_values,
            return_consumed_capacity: self.return_consumed_capacity,
            return_item_collection_metrics: self.return_item_collection_metrics,
            return_values: self.return_values,
            return_values_on_condition_check_failure: self.return_values_on_condition_check_failure,
            table_name,
        })
    }
}

/// apply common write operation settings to a builder
#[macro_export]
#[doc(hidden)]
macro_rules! apply_write_operation {
    ($builder:expr, $write_operation:expr) => {
        $builder
            .set_condition_expression($write_operation.condition_expression)
            .set_expression_attribute_names($write_operation.expression_attribute_names)
            .set_expression_attribute_values($write_operation.expression_attribute_values)
            .set_return_consumed_capacity($write_operation.return_consumed_capacity)
            .set_return_item_collection_metrics($write_operation.return_item_collection_metrics)
            .set_return_values($write_operation.return_values)
            .set_return_values_on_condition_check_failure(
                $write_operation.return_values_on_condition_check_failure,
            )
            .table_name($write_operation.table_name)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::condition::{Condition, LogicalOperator};

    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case::empty(
        WriteArgs::default(),
        vec![],
        WriteInput {
            table_name: "t".to_string(),
            ..Default::default()
        }
    )]
    #[case::guards_expected_and_condition(
        WriteArgs {
            condition: Some(
                ConditionMap::Leaves(
                    LogicalOperator::Or,
                    vec![
                        KeyCondition {
                            condition: Condition::LessThan(json!(3)),
                            name: "age".to_string(),
                        },
                        KeyCondition {
                            condition: Condition::Null,
                            name: "age".to_string(),
                        },
                    ]
                )
            ),
            expected: IndexMap::from(
                [
                    ("status".to_string(), Expected::Equals(json!("draft"))),
                ]
            ),
            return_values: Some(types::ReturnValue::AllOld),
            ..Default::default()
        },
        vec![
            KeyCondition {
                condition: Condition::Null,
                name: "id".to_string(),
            },
        ],
        WriteInput {
            condition_expression: Some(
                "(attribute_not_exists(#id) AND #status = :status_eq0) AND (#age < :age_lt1 OR attribute_not_exists(#age))".to_string()
            ),
            expression_attribute_names: Some(
                collections::HashMap::from(
                    [
                        ("#id".to_string(), "id".to_string()),
                        ("#status".to_string(), "status".to_string()),
                        ("#age".to_string(), "age".to_string()),
                    ]
                )
            ),
            expression_attribute_values: Some(
                collections::HashMap::from(
                    [
                        (":status_eq0".to_string(), types::AttributeValue::S("draft".to_string())),
                        (":age_lt1".to_string(), types::AttributeValue::N("3".to_string())),
                    ]
                )
            ),
            return_values: Some(types::ReturnValue::AllOld),
            table_name: "t".to_string(),
            ..Default::default()
        }
    )]
    fn test_write_args_compile(
        #[case] write_args: WriteArgs,
        #[case] guards: Vec<KeyCondition<Value>>,
        #[case] expected: WriteInput,
    ) {
        let actual = write_args
            .compile("t".to_string(), Placeholders::default(), guards)
            .unwrap();
        assert_eq!(actual, expected);
    }
}
