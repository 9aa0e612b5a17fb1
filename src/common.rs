//! Common utilities shared by read and write operations.
//!
//! This module provides attribute conversion helpers, key handling, condition
//! chains, placeholder allocation, attribute selection, batching and retry policies.

/// Chunked, concurrent and retried batch requests.
pub mod batch;

/// Condition types and the chains used to attach them to queries and scans.
pub mod condition;

/// Collision-free placeholder allocation for expression strings.
pub mod expression;

/// Key types for identifying items in DynamoDB tables.
pub mod key;

/// Bounded exponential backoff for retried requests.
pub mod retry;

/// Attribute selection for projection expressions.
pub mod selection;

use crate::error::{Error, Result};

use aws_sdk_dynamodb::types;
use serde_dynamo::{from_item, to_item};
use serde_json::{Map, Value};
use std::collections;

/// Item attributes as plain JSON values.
pub type Attributes = Map<String, Value>;

/// Item attributes in the store's wire representation.
pub type AttributeMap = collections::HashMap<String, types::AttributeValue>;

pub(crate) fn to_attribute_map(attributes: &Attributes) -> Result<AttributeMap> {
    let item = to_item(attributes)?;
    Ok(item)
}

pub(crate) fn from_attribute_map(item: AttributeMap) -> Result<Attributes> {
    let attributes = from_item(item)?;
    Ok(attributes)
}

/// Convert a list of strings or numbers into the matching set type.
///
/// Values that are not homogeneous string or number lists are returned untouched.
pub(crate) fn list_to_set(value: types::AttributeValue) -> types::AttributeValue {
    let types::AttributeValue::L(list) = value else {
        return value;
    };
    if list.is_empty() {
        return types::AttributeValue::L(list);
    }
    if list.iter().all(|value| matches!(value, types::AttributeValue::S(_))) {
        let strings = list
            .into_iter()
            .filter_map(|value| match value {
                types::AttributeValue::S(string) => Some(string),
                _ => None,
            })
            .collect();
        return types::AttributeValue::Ss(strings);
    }
    if list.iter().all(|value| matches!(value, types::AttributeValue::N(_))) {
        let numbers = list
            .into_iter()
            .filter_map(|value| match value {
                types::AttributeValue::N(number) => Some(number),
                _ => None,
            })
            .collect();
        return types::AttributeValue::Ns(numbers);
    }
    types::AttributeValue::L(list)
}

/// Stable textual identity of a key, used to match store responses back to requests.
pub(crate) fn key_signature(key: &AttributeMap, names: &[&str]) -> Result<String> {
    let mut parts = Vec::with_capacity(names.len());
    for name in names {
        let value = key
            .get(*name)
            .ok_or_else(|| Error::validation(format!("key attribute `{name}` is missing")))?;
        parts.push(format!("{value:?}"));
    }
    Ok(parts.join("\u{1f}"))
}
