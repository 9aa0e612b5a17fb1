use crate::common;

use serde_json::Value;

/// One key attribute and its value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Key<T> {
    /// The attribute name of the key.
    pub name: String,
    /// The value of the key.
    pub value: T,
}

/// Primary key of one item: hash key and optional range key.
///
/// ```rust
/// use dynamodb_mapper::common::{Attributes, key::{Key, Keys}};
/// use serde_json::json;
///
/// let keys = Keys {
///     partition_key: Key {
///         name: "user_id".to_string(),
///         value: json!("werner"),
///     },
///     sort_key: Some(Key {
///         name: "tweet_id".to_string(),
///         value: json!("2024-01-01"),
///     }),
/// };
/// let attributes: Attributes = keys.into();
/// assert_eq!(attributes.len(), 2);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Keys<T> {
    /// The partition key (required).
    pub partition_key: Key<T>,
    /// The sort key (optional, only for tables with composite primary keys).
    pub sort_key: Option<Key<T>>,
}

impl From<Keys<Value>> for common::Attributes {
    fn from(key: Keys<Value>) -> Self {
        let mut attributes = Self::new();
        attributes.insert(key.partition_key.name, key.partition_key.value);
        if let Some(sort_key) = key.sort_key {
            attributes.insert(sort_key.name, sort_key.value);
        }
        attributes
    }
}

/// How a caller identifies one item of a model.
///
/// Models resolve these against their own hash and range key names.
///
/// ```rust
/// use dynamodb_mapper::common::key::ItemKey;
/// use serde_json::json;
///
/// let by_hash = ItemKey::from("user@example.com");
/// let by_pair = ItemKey::from((json!("user@example.com"), json!(3)));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum ItemKey {
    /// Hash key value only, for tables without a range key.
    Hash(Value),
    /// Hash and range key values.
    HashRange(Value, Value),
    /// A full attribute map containing at least the key attributes.
    Attributes(common::Attributes),
}

impl From<Value> for ItemKey {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(attributes) => Self::Attributes(attributes),
            value => Self::Hash(value),
        }
    }
}

impl From<&str> for ItemKey {
    fn from(value: &str) -> Self {
        Self::Hash(Value::String(value.to_string()))
    }
}

impl From<String> for ItemKey {
    fn from(value: String) -> Self {
        Self::Hash(Value::String(value))
    }
}

impl<H: Into<Value>, R: Into<Value>> From<(H, R)> for ItemKey {
    fn from((hash, range): (H, R)) -> Self {
        Self::HashRange(hash.into(), range.into())
    }
}

impl From<common::Attributes> for ItemKey {
    fn from(attributes: common::Attributes) -> Self {
        Self::Attributes(attributes)
    }
}
