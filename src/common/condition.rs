use crate::{
    common::expression::{self, Placeholders},
    error::{Error, Result},
};

use aws_sdk_dynamodb::types;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::ops;

/// Logical operator for combining conditions.
#[derive(Clone, Debug, PartialEq)]
pub enum LogicalOperator {
    /// Logical AND - all conditions must be true.
    And,
    /// Logical OR - at least one condition must be true.
    Or,
}

impl ops::Deref for LogicalOperator {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        match self {
            Self::And => " AND ",
            Self::Or => " OR ",
        }
    }
}

/// Condition types for DynamoDB expressions.
///
/// ```rust
/// use dynamodb_mapper::common::condition;
///
/// let eq = condition::Condition::Equals("value".to_string());
/// let gt = condition::Condition::GreaterThan(100);
/// let null: condition::Condition<String> = condition::Condition::Null;
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum Condition<T> {
    /// Checks if an attribute begins with a specified prefix (string types only).
    BeginsWith(String),
    /// Checks if an attribute value is between two values (inclusive).
    Between(T, T),
    /// Checks if an attribute contains a specified value.
    Contains(T),
    /// Checks if an attribute value equals a specified value.
    Equals(T),
    /// Checks if an attribute value is greater than a specified value.
    GreaterThan(T),
    /// Checks if an attribute value is greater than or equal to a specified value.
    GreaterThanOrEqual(T),
    /// Checks if an attribute value is in a list of specified values.
    In(Vec<T>),
    /// Checks if an attribute value is less than a specified value.
    LessThan(T),
    /// Checks if an attribute value is less than or equal to a specified value.
    LessThanOrEqual(T),
    /// Checks if an attribute does not contain a specified value.
    NotContains(T),
    /// Checks if an attribute value does not equal a specified value.
    NotEqual(T),
    /// Checks if an attribute exists (is not null).
    NotNull,
    /// Checks if an attribute does not exist (is null).
    Null,
}

impl<T> Condition<T> {
    /// Whether the store accepts this operator in a key condition expression.
    pub fn is_key_operator(&self) -> bool {
        matches!(
            self,
            Self::BeginsWith(_)
                | Self::Between(_, _)
                | Self::Equals(_)
                | Self::GreaterThan(_)
                | Self::GreaterThanOrEqual(_)
                | Self::LessThan(_)
                | Self::LessThanOrEqual(_)
        )
    }
}

impl<T: Serialize> Condition<T> {
    fn compare(
        placeholders: &mut Placeholders,
        name: &str,
        path: &str,
        operator: &str,
        symbol: &str,
        value: T,
    ) -> Result<String> {
        let value_placeholder = placeholders.serialize(name, operator, value)?;
        Ok(format!("{path} {symbol} {value_placeholder}"))
    }

    pub(crate) fn compile(
        self,
        name: &str,
        path: &str,
        placeholders: &mut Placeholders,
    ) -> Result<String> {
        let expression = match self {
            Self::BeginsWith(prefix) => {
                let value_placeholder =
                    placeholders.value(name, "begins_with", types::AttributeValue::S(prefix));
                format!("begins_with({path}, {value_placeholder})")
            }
            Self::Between(value1, value2) => {
                let value_placeholder_1 = placeholders.serialize(name, "between", value1)?;
                let value_placeholder_2 = placeholders.serialize(name, "between", value2)?;
                format!("{path} BETWEEN {value_placeholder_1} AND {value_placeholder_2}")
            }
            Self::Contains(value) => {
                let value_placeholder = placeholders.serialize(name, "contains", value)?;
                format!("contains({path}, {value_placeholder})")
            }
            Self::Equals(value) => Self::compare(placeholders, name, path, "eq", "=", value)?,
            Self::GreaterThan(value) => Self::compare(placeholders, name, path, "gt", ">", value)?,
            Self::GreaterThanOrEqual(value) => {
                Self::compare(placeholders, name, path, "gte", ">=", value)?
            }
            Self::In(values) => {
                if values.is_empty() {
                    return Err(Error::validation(format!(
                        "`in` condition on `{name}` needs at least one value"
                    )));
                }
                let mut value_placeholders = Vec::with_capacity(values.len());
                for value in values {
                    value_placeholders.push(placeholders.serialize(name, "in", value)?);
                }
                format!("{path} IN ({})", value_placeholders.join(", "))
            }
            Self::LessThan(value) => Self::compare(placeholders, name, path, "lt", "<", value)?,
            Self::LessThanOrEqual(value) => {
                Self::compare(placeholders, name, path, "lte", "<=", value)?
            }
            Self::NotContains(value) => {
                let value_placeholder = placeholders.serialize(name, "not_contains", value)?;
                format!("NOT contains({path}, {value_placeholder})")
            }
            Self::NotEqual(value) => Self::compare(placeholders, name, path, "ne", "<>", value)?,
            Self::NotNull => format!("attribute_exists({path})"),
            Self::Null => format!("attribute_not_exists({path})"),
        };
        Ok(expression)
    }
}

/// Condition applied to an attribute.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyCondition<T> {
    /// The condition to apply to the attribute.
    pub condition: Condition<T>,
    /// The name of the attribute to apply the condition to.
    pub name: String,
}

impl<T: Serialize> KeyCondition<T> {
    pub(crate) fn compile(self, placeholders: &mut Placeholders) -> Result<String> {
        let path = placeholders.name(&self.name);
        self.condition.compile(&self.name, &path, placeholders)
    }

    /// Compile conditions joined by AND.
    pub(crate) fn compile_all(
        conditions: Vec<Self>,
        placeholders: &mut Placeholders,
    ) -> Result<Option<String>> {
        let mut expressions = Vec::with_capacity(conditions.len());
        for condition in conditions {
            expressions.push(condition.compile(placeholders)?);
        }
        Ok(expression::join(&LogicalOperator::And, expressions))
    }
}

/// Map of conditions with logical operators.
///
/// ```rust
/// use dynamodb_mapper::common::condition;
///
/// let map = condition::ConditionMap::Leaves(
///     condition::LogicalOperator::And,
///     vec![
///         condition::KeyCondition {
///             name: "status".to_string(),
///             condition: condition::Condition::Equals("active".to_string()),
///         },
///     ],
/// );
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum ConditionMap<T> {
    /// Leaf conditions - flat list of conditions combined with the logical operator.
    Leaves(LogicalOperator, Vec<KeyCondition<T>>),
    /// Node conditions - nested conditions for hierarchical attribute paths.
    Node(LogicalOperator, IndexMap<String, ConditionMap<T>>),
}

impl<T: Serialize> ConditionMap<T> {
    pub(crate) fn compile(self, placeholders: &mut Placeholders) -> Result<Option<String>> {
        self.compile_recursive(&[], placeholders)
    }

    fn compile_recursive(
        self,
        keys: &[String],
        placeholders: &mut Placeholders,
    ) -> Result<Option<String>> {
        let mut expressions = Vec::new();
        let operator = match self {
            Self::Leaves(operator, key_conditions) => {
                for key_condition in key_conditions {
                    let mut path = keys.to_vec();
                    path.push(key_condition.name.clone());
                    let path = placeholders.path(&path);
                    let expression =
                        key_condition
                            .condition
                            .compile(&key_condition.name, &path, placeholders)?;
                    expressions.push(expression);
                }
                operator
            }
            Self::Node(operator, map) => {
                for (key, value) in map {
                    let mut path = keys.to_vec();
                    path.push(key);
                    if let Some(expression) = value.compile_recursive(&path, placeholders)? {
                        expressions.push(expression);
                    }
                }
                operator
            }
        };
        Ok(expression::join(&operator, expressions))
    }
}

/// Expected state of an attribute for a conditional write.
#[derive(Clone, Debug, PartialEq)]
pub enum Expected {
    /// The attribute must hold this value.
    Equals(Value),
    /// The attribute must exist.
    Exists,
    /// The attribute must not exist.
    NotExists,
}

impl From<Expected> for Condition<Value> {
    fn from(expected: Expected) -> Self {
        match expected {
            Expected::Equals(value) => Self::Equals(value),
            Expected::Exists => Self::NotNull,
            Expected::NotExists => Self::Null,
        }
    }
}

/// Builders that accept key conditions.
pub trait KeyConditionTarget: Sized {
    /// Append a key condition.
    fn push_key_condition(self, condition: KeyCondition<Value>) -> Self;
}

/// Builders that accept filter conditions.
pub trait FilterConditionTarget: Sized {
    /// Append a filter condition.
    fn push_filter_condition(self, condition: KeyCondition<Value>) -> Self;
}

macro_rules! key_operators {
    () => {
        /// Attribute equals `value`.
        pub fn equals(self, value: impl Into<Value>) -> B {
            self.push(Condition::Equals(value.into()))
        }

        /// Alias of [`Self::equals`].
        #[allow(clippy::should_implement_trait)]
        pub fn eq(self, value: impl Into<Value>) -> B {
            self.equals(value)
        }

        /// Attribute is strictly lower than `value`.
        pub fn lt(self, value: impl Into<Value>) -> B {
            self.push(Condition::LessThan(value.into()))
        }

        /// Attribute is lower than or equal to `value`.
        pub fn lte(self, value: impl Into<Value>) -> B {
            self.push(Condition::LessThanOrEqual(value.into()))
        }

        /// Attribute is strictly greater than `value`.
        pub fn gt(self, value: impl Into<Value>) -> B {
            self.push(Condition::GreaterThan(value.into()))
        }

        /// Attribute is greater than or equal to `value`.
        pub fn gte(self, value: impl Into<Value>) -> B {
            self.push(Condition::GreaterThanOrEqual(value.into()))
        }

        /// Attribute lies between `low` and `high`, both inclusive.
        pub fn between(self, low: impl Into<Value>, high: impl Into<Value>) -> B {
            self.push(Condition::Between(low.into(), high.into()))
        }

        /// Attribute starts with `prefix`.
        pub fn begins_with(self, prefix: impl Into<String>) -> B {
            self.push(Condition::BeginsWith(prefix.into()))
        }
    };
}

/// Operators legal on key attributes.
///
/// Returned by `Query::where_`; every call hands the query back.
#[derive(Debug)]
#[must_use = "a condition chain does nothing until an operator is applied"]
pub struct KeyConditionChain<B> {
    attribute: String,
    builder: B,
}

impl<B: KeyConditionTarget> KeyConditionChain<B> {
    pub(crate) fn new(builder: B, attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            builder,
        }
    }

    fn push(self, condition: Condition<Value>) -> B {
        self.builder.push_key_condition(KeyCondition {
            condition,
            name: self.attribute,
        })
    }

    key_operators!();
}

/// Operators legal in filter expressions.
///
/// Returned by `Query::filter`, `Scan::where_` and `Scan::filter`.
#[derive(Debug)]
#[must_use = "a condition chain does nothing until an operator is applied"]
pub struct FilterConditionChain<B> {
    attribute: String,
    builder: B,
}

impl<B: FilterConditionTarget> FilterConditionChain<B> {
    pub(crate) fn new(builder: B, attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            builder,
        }
    }

    fn push(self, condition: Condition<Value>) -> B {
        self.builder.push_filter_condition(KeyCondition {
            condition,
            name: self.attribute,
        })
    }

    key_operators!();

    /// Attribute does not exist.
    pub fn null(self) -> B {
        self.push(Condition::Null)
    }

    /// Attribute exists.
    pub fn not_null(self) -> B {
        self.push(Condition::NotNull)
    }

    /// Alias of [`Self::not_null`].
    pub fn exists(self) -> B {
        self.not_null()
    }

    /// String attribute contains a substring, or set/list attribute contains an element.
    pub fn contains(self, value: impl Into<Value>) -> B {
        self.push(Condition::Contains(value.into()))
    }

    /// Negation of [`Self::contains`].
    pub fn not_contains(self, value: impl Into<Value>) -> B {
        self.push(Condition::NotContains(value.into()))
    }

    /// Attribute equals one of `values`.
    pub fn in_<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> B {
        self.push(Condition::In(values.into_iter().map(Into::into).collect()))
    }

    /// Attribute differs from `value`.
    pub fn ne(self, value: impl Into<Value>) -> B {
        self.push(Condition::NotEqual(value.into()))
    }
}
