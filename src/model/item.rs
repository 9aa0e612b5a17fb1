use crate::{
    common::{self, expression::PATH_SEPARATOR},
    error::{Error, Result},
    model::Model,
    write::{delete_item::DestroyOptions, put_item::CreateOptions, update_item::UpdateOptions},
};

use serde::{Serialize, Serializer};
use serde_json::Value;
use std::{fmt, sync::Arc};

/// One item of a model.
///
/// Items are plain attribute maps bound to the model they were read from or
/// built for; persisting them goes through that model's hooks, schema and store.
#[derive(Clone)]
pub struct Item {
    attributes: common::Attributes,
    model: Arc<Model>,
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item")
            .field("model", &self.model.name())
            .field("attributes", &self.attributes)
            .finish()
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.model.name() == other.model.name() && self.attributes == other.attributes
    }
}

impl Serialize for Item {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.attributes.serialize(serializer)
    }
}

impl Item {
    pub(crate) fn new(model: Arc<Model>, attributes: common::Attributes) -> Self {
        Self { attributes, model }
    }

    /// Model the item belongs to.
    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    /// All attributes.
    pub fn attributes(&self) -> &common::Attributes {
        &self.attributes
    }

    /// Top-level attribute by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Attribute by dotted path, descending into nested maps.
    ///
    /// ```rust,ignore
    /// item.get_attr("settings.nickname");
    /// ```
    pub fn get_attr(&self, path: &str) -> Option<&Value> {
        let mut components = path.split(PATH_SEPARATOR);
        let first = components.next()?;
        components.try_fold(self.attributes.get(first)?, |value, component| {
            value.as_object()?.get(component)
        })
    }

    /// Merge attributes into the item, replacing existing values.
    ///
    /// Key attributes may be repeated but not changed.
    pub fn set(&mut self, attributes: common::Attributes) -> Result<&mut Self> {
        for name in self.model.key_names() {
            if let Some(value) = attributes.get(name) {
                if self.attributes.get(name) != Some(value) {
                    return Err(Error::validation(format!(
                        "key attribute `{name}` of a bound item cannot change"
                    )));
                }
            }
        }
        self.attributes.extend(attributes);
        Ok(self)
    }

    /// Persist the whole item, replacing any stored item with the same key.
    pub async fn save(&self) -> Result<Item> {
        self.model
            .create(self.attributes.clone(), CreateOptions::default())
            .await
    }

    /// Persist the item's attributes as a partial update.
    pub async fn update(&self, options: UpdateOptions) -> Result<Item> {
        self.model.update(self.attributes.clone(), options).await
    }

    /// Delete the stored item with this item's key.
    pub async fn destroy(&self, options: DestroyOptions) -> Result<Option<Item>> {
        self.model
            .destroy(self.attributes.clone(), options)
            .await
    }

    /// Attributes as a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(self.attributes.clone())
    }

    /// Unwrap into the attribute map.
    pub fn into_attributes(self) -> common::Attributes {
        self.attributes
    }
}
