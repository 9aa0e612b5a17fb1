//! Model definitions: table binding, keys, schema, indexes, hooks and items.
//!
//! A [`Model`] is created once, usually through [`registry::define`], and is
//! immutable afterwards. Every operation is a method on `Arc<Model>`:
//!
//! ```rust,no_run
//! use dynamodb_mapper::model::{self, ModelConfig, schema::{Attribute, Schema}};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example(client: aws_sdk_dynamodb::Client) -> dynamodb_mapper::error::Result<()> {
//! let account = model::registry::define(
//!     "Account",
//!     ModelConfig {
//!         hash_key: "email".to_string(),
//!         schema: Schema::default()
//!             .attribute("email", Attribute::string().required())
//!             .attribute("name", Attribute::string()),
//!         ..Default::default()
//!     },
//!     Arc::new(client),
//! )?;
//! let item = account
//!     .create(
//!         json!({"email": "foo@example.com", "name": "Foo"}).as_object().cloned().unwrap_or_default(),
//!         Default::default(),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

/// Before/after lifecycle hooks.
pub mod hooks;

mod item;

/// Process-wide named model registry.
pub mod registry;

/// Declared attribute types, defaults and validation.
pub mod schema;

pub use item::Item;

use crate::{
    common::{
        self, AttributeMap,
        key::{ItemKey, Key, Keys},
        retry::RetryPolicy,
    },
    error::{Error, Result},
    model::schema::{ValidationMode, Validator},
    store::Store,
};

use aws_sdk_dynamodb::types;
use serde_json::Value;
use std::{fmt, sync::Arc};

/// Table a model is bound to.
#[derive(Clone)]
pub enum TableName {
    /// Fixed table name.
    Literal(String),
    /// Resolved on every request, e.g. to add an environment prefix.
    Resolver(Arc<dyn Fn() -> String + Send + Sync>),
}

impl fmt::Debug for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(name) => f.debug_tuple("Literal").field(name).finish(),
            Self::Resolver(_) => f.write_str("Resolver(..)"),
        }
    }
}

impl From<&str> for TableName {
    fn from(name: &str) -> Self {
        Self::Literal(name.to_string())
    }
}

impl From<String> for TableName {
    fn from(name: String) -> Self {
        Self::Literal(name)
    }
}

/// Kind of secondary index.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum IndexKind {
    /// Own hash key; eventually consistent only.
    Global,
    /// Shares the table's hash key with another range key.
    Local,
}

/// Declared secondary index.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Index {
    /// Index name as known to the store.
    pub name: String,
    /// Global or local.
    pub kind: IndexKind,
    /// Hash key attribute of the index.
    pub hash_key: String,
    /// Range key attribute of the index, if any.
    pub range_key: Option<String>,
}

/// Automatic creation and update timestamps.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Timestamps {
    /// Whether timestamps are written at all.
    pub enabled: bool,
    /// Attribute set on create; `None` disables it.
    pub created_at: Option<String>,
    /// Attribute set on update; `None` disables it.
    pub updated_at: Option<String>,
}

impl Default for Timestamps {
    fn default() -> Self {
        Self {
            enabled: false,
            created_at: Some("createdAt".to_string()),
            updated_at: Some("updatedAt".to_string()),
        }
    }
}

impl Timestamps {
    /// Timestamps enabled with the default attribute names.
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Default::default()
        }
    }

    fn created_at(&self) -> Option<&str> {
        self.enabled.then_some(self.created_at.as_deref()).flatten()
    }

    fn updated_at(&self) -> Option<&str> {
        self.enabled.then_some(self.updated_at.as_deref()).flatten()
    }
}

/// Everything a model is defined with, besides its name and store.
#[derive(Clone, Debug, Default)]
pub struct ModelConfig {
    /// Hash key attribute.
    pub hash_key: String,
    /// Range key attribute, if the table has one.
    pub range_key: Option<String>,
    /// Table name; defaults to the lowercased model name with an `s` suffix.
    pub table_name: Option<TableName>,
    /// Declared attributes.
    pub schema: schema::Schema,
    /// Validator used instead of `schema` when set.
    pub validator: Option<Arc<dyn Validator>>,
    /// Declared secondary indexes.
    pub indexes: Vec<Index>,
    /// Automatic timestamps.
    pub timestamps: Timestamps,
    /// Lifecycle hooks.
    pub hooks: hooks::Hooks,
    /// Retry policy for batch work and throttled pages.
    pub retry: RetryPolicy,
}

/// A store table bound to a key layout, a schema and lifecycle hooks.
pub struct Model {
    config: ModelConfig,
    name: String,
    store: Arc<dyn Store>,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.name)
            .field("table_name", &self.table_name())
            .field("hash_key", &self.config.hash_key)
            .field("range_key", &self.config.range_key)
            .field("indexes", &self.config.indexes)
            .finish_non_exhaustive()
    }
}

impl Model {
    /// Build a model outside of the registry.
    pub fn new(
        name: impl Into<String>,
        config: ModelConfig,
        store: Arc<dyn Store>,
    ) -> Result<Arc<Self>> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::validation("model name must not be empty"));
        }
        if config.hash_key.is_empty() {
            return Err(Error::validation(format!(
                "model `{name}` needs a hash key"
            )));
        }
        for (position, index) in config.indexes.iter().enumerate() {
            if index.hash_key.is_empty() {
                return Err(Error::validation(format!(
                    "index `{}` needs a hash key",
                    index.name
                )));
            }
            if index.kind == IndexKind::Local && index.hash_key != config.hash_key {
                return Err(Error::validation(format!(
                    "local index `{}` must share the table hash key `{}`",
                    index.name, config.hash_key
                )));
            }
            if config.indexes[..position]
                .iter()
                .any(|other| other.name == index.name)
            {
                return Err(Error::validation(format!(
                    "index `{}` is declared twice",
                    index.name
                )));
            }
        }
        Ok(Arc::new(Self {
            config,
            name,
            store,
        }))
    }

    /// Model name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Table name requests are sent to.
    pub fn table_name(&self) -> String {
        match &self.config.table_name {
            Some(TableName::Literal(name)) => name.clone(),
            Some(TableName::Resolver(resolve)) => resolve(),
            None => format!("{}s", self.name.to_lowercase()),
        }
    }

    /// Hash key attribute.
    pub fn hash_key(&self) -> &str {
        &self.config.hash_key
    }

    /// Range key attribute, if any.
    pub fn range_key(&self) -> Option<&str> {
        self.config.range_key.as_deref()
    }

    /// Declared index by name.
    pub fn index(&self, name: &str) -> Option<&Index> {
        self.config.indexes.iter().find(|index| index.name == name)
    }

    /// Declared schema.
    pub fn schema(&self) -> &schema::Schema {
        &self.config.schema
    }

    /// Retry policy for batch work and throttled pages.
    pub fn retry(&self) -> &RetryPolicy {
        &self.config.retry
    }

    pub(crate) fn hooks(&self) -> &hooks::Hooks {
        &self.config.hooks
    }

    pub(crate) fn timestamps(&self) -> &Timestamps {
        &self.config.timestamps
    }

    pub(crate) fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    fn validator(&self) -> &dyn Validator {
        match &self.config.validator {
            Some(validator) => validator.as_ref(),
            None => &self.config.schema,
        }
    }

    /// Key attribute names, hash key first.
    pub(crate) fn key_names(&self) -> Vec<&str> {
        let mut names = vec![self.config.hash_key.as_str()];
        names.extend(self.range_key());
        names
    }

    /// Bind attributes to this model without persisting them.
    ///
    /// The attributes must carry the hash key, plus the range key when the
    /// model declares one. Neither may be null.
    pub fn item(self: &Arc<Self>, attributes: common::Attributes) -> Result<Item> {
        self.key_of(self.key_subset(&attributes))?;
        Ok(self.bind(attributes))
    }

    pub(crate) fn bind(self: &Arc<Self>, attributes: common::Attributes) -> Item {
        Item::new(Arc::clone(self), attributes)
    }

    fn key_subset(&self, attributes: &common::Attributes) -> common::Attributes {
        self.key_names()
            .into_iter()
            .filter_map(|name| {
                attributes
                    .get(name)
                    .map(|value| (name.to_string(), value.clone()))
            })
            .collect()
    }

    /// Validate a full candidate item, applying schema defaults.
    pub fn validate(&self, attributes: common::Attributes) -> Result<common::Attributes> {
        self.validate_with(attributes, ValidationMode::Full)
    }

    pub(crate) fn validate_partial(
        &self,
        attributes: common::Attributes,
    ) -> Result<common::Attributes> {
        self.validate_with(attributes, ValidationMode::Partial)
    }

    /// Timestamp attributes are managed here and bypass the validator.
    fn validate_with(
        &self,
        mut attributes: common::Attributes,
        mode: ValidationMode,
    ) -> Result<common::Attributes> {
        let timestamps = self.timestamps();
        let stamps: Vec<_> = [timestamps.created_at(), timestamps.updated_at()]
            .into_iter()
            .flatten()
            .filter_map(|name| attributes.remove_entry(name))
            .collect();
        let mut normalized = self.validator().validate(attributes, mode)?;
        normalized.extend(stamps);
        Ok(normalized)
    }

    /// Resolve the key attributes of one item.
    pub fn key_of(&self, key: impl Into<ItemKey>) -> Result<common::Attributes> {
        let hash_key = |value| Key {
            name: self.config.hash_key.clone(),
            value,
        };
        let keys = match (key.into(), self.range_key()) {
            (ItemKey::Hash(hash), None) => Keys {
                partition_key: hash_key(hash),
                sort_key: None,
            },
            (ItemKey::Hash(_), Some(range_key)) => {
                return Err(Error::validation(format!(
                    "model `{}` needs a value for range key `{range_key}`",
                    self.name
                )));
            }
            (ItemKey::HashRange(hash, range), Some(range_key)) => Keys {
                partition_key: hash_key(hash),
                sort_key: Some(Key {
                    name: range_key.to_string(),
                    value: range,
                }),
            },
            (ItemKey::HashRange(_, _), None) => {
                return Err(Error::validation(format!(
                    "model `{}` has no range key",
                    self.name
                )));
            }
            (ItemKey::Attributes(mut item), range_key) => {
                let mut take = |name: &str| {
                    item.remove(name)
                        .map(|value| Key {
                            name: name.to_string(),
                            value,
                        })
                        .ok_or_else(|| {
                            Error::validation(format!("key attribute `{name}` is missing"))
                        })
                };
                Keys {
                    partition_key: take(self.hash_key())?,
                    sort_key: range_key.map(&mut take).transpose()?,
                }
            }
        };
        let attributes: common::Attributes = keys.into();
        if let Some((name, _)) = attributes.iter().find(|(_, value)| value.is_null()) {
            return Err(Error::validation(format!(
                "key attribute `{name}` must not be null"
            )));
        }
        Ok(attributes)
    }

    /// Serialize attributes into the store representation, applying set encoding.
    pub(crate) fn encode(&self, attributes: &common::Attributes) -> Result<AttributeMap> {
        let mut item = common::to_attribute_map(attributes)?;
        self.validator().encode(&mut item);
        Ok(item)
    }

    /// Apply set encoding to the value of one top-level attribute.
    pub(crate) fn encode_value(
        &self,
        name: &str,
        value: types::AttributeValue,
    ) -> types::AttributeValue {
        let mut item = AttributeMap::from([(name.to_string(), value)]);
        self.validator().encode(&mut item);
        item.remove(name).unwrap_or(types::AttributeValue::Null(true))
    }

    pub(crate) fn decode(self: &Arc<Self>, item: AttributeMap) -> Result<Item> {
        let attributes = common::from_attribute_map(item)?;
        Ok(self.bind(attributes))
    }

    pub(crate) fn stamp_created(&self, attributes: &mut common::Attributes) {
        if let Some(created_at) = self.timestamps().created_at() {
            attributes.insert(created_at.to_string(), Value::String(schema::now()));
        }
    }

    pub(crate) fn stamp_updated(&self, attributes: &mut common::Attributes) {
        if let Some(updated_at) = self.timestamps().updated_at() {
            attributes.insert(updated_at.to_string(), Value::String(schema::now()));
        }
    }
}
